//! Arena-allocated kinematic tree in left-child/right-sibling form, with the
//! forward-kinematics pass.
//!
//! Parent, child and sibling edges are [Option]al [NodeId] indices into a
//! flat arena, so traversal is iterative and no ownership cycles arise. The
//! node set is fixed after construction: [Tree::init] numbers joints and
//! effectors once (these sequence numbers define Jacobian rows and columns)
//! and [Tree::compute] refreshes the world-space state from the joint
//! angles.

pub mod node;

pub use node::{Node, NodeId, Purpose};

use crate::errors::ArmatureError;
use crate::linear::{Rot3, Vec3};

/// The kinematic tree. Owns its nodes for the lifetime of the planning
/// session.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    /// Pre-order over the arena, cached by [Tree::init].
    order: Vec<NodeId>,
    joint_count: usize,
    effector_count: usize,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn effector_count(&self) -> usize {
        self.effector_count
    }

    pub fn root(&self) -> Result<NodeId, ArmatureError> {
        if self.nodes.is_empty() {
            Err(ArmatureError::RootNotSet)
        } else {
            Ok(NodeId(0))
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Node ids in insertion order (the order used by plan vectors and
    /// [crate::ArmSolution::serialize]).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn check(&self, id: NodeId) -> Result<(), ArmatureError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(ArmatureError::ReferenceOutOfBound(id.index()))
        }
    }

    pub fn insert_root(&mut self, node: Node) -> Result<NodeId, ArmatureError> {
        if !self.nodes.is_empty() {
            return Err(ArmatureError::RootAlreadySet);
        }
        Ok(self.push(node))
    }

    /// Insert as the parent's left child. An existing left child becomes the
    /// new node's right sibling.
    pub fn insert_left_child(
        &mut self,
        parent: NodeId,
        mut node: Node,
    ) -> Result<NodeId, ArmatureError> {
        self.check(parent)?;
        node.parent = Some(parent);
        node.right_sibling = self.nodes[parent.index()].left_child;
        let id = self.push(node);
        self.nodes[parent.index()].left_child = Some(id);
        Ok(id)
    }

    /// Insert directly after `sibling` in its sibling chain.
    pub fn insert_right_sibling(
        &mut self,
        sibling: NodeId,
        mut node: Node,
    ) -> Result<NodeId, ArmatureError> {
        self.check(sibling)?;
        let anchor = &self.nodes[sibling.index()];
        node.parent = anchor.parent;
        node.right_sibling = anchor.right_sibling;
        let id = self.push(node);
        self.nodes[sibling.index()].right_sibling = Some(id);
        Ok(id)
    }

    /// The structural parent (the node whose child chain contains this one).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Assign joint and effector sequence numbers in pre-order, with
    /// separate counters, and cache the traversal order.
    pub fn init(&mut self) -> Result<(), ArmatureError> {
        self.root()?;
        self.order = self.preorder().collect();
        let mut joints = 0;
        let mut effectors = 0;
        for i in 0..self.order.len() {
            let id = self.order[i];
            let node = &mut self.nodes[id.index()];
            match node.purpose() {
                Purpose::Joint => {
                    node.seq_joint = Some(joints);
                    joints += 1;
                }
                Purpose::Effector => {
                    node.seq_effector = Some(effectors);
                    effectors += 1;
                }
            }
        }
        self.joint_count = joints;
        self.effector_count = effectors;
        Ok(())
    }

    /// The pre-order cached by the last [Tree::init]; empty before that.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Iterative pre-order traversal: node, then its child subtree, then its
    /// right siblings.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = Vec::with_capacity(self.nodes.len());
        if !self.nodes.is_empty() {
            stack.push(NodeId(0));
        }
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = &self.nodes[id.index()];
            if let Some(sibling) = node.right_sibling {
                stack.push(sibling);
            }
            if let Some(child) = node.left_child {
                stack.push(child);
            }
            Some(id)
        })
    }

    /// Forward-kinematics pass. The parent's accumulated frame rotates each
    /// node's local attachment into `r`, positions the node at
    /// `s = parent.s + r` and carries the rotation axis into world space;
    /// the node's own rotation (Rodrigues about its local axis) extends the
    /// frame for its child subtree. Root-to-node application order.
    pub fn compute(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack: Vec<(NodeId, Rot3, Vec3)> = Vec::with_capacity(self.nodes.len());
        stack.push((NodeId(0), Rot3::IDENTITY, Vec3::ZERO));
        while let Some((id, rot, origin)) = stack.pop() {
            let node = &mut self.nodes[id.index()];
            node.r = rot.apply(node.attach());
            node.s = origin + node.r;
            node.w = rot.apply(node.local_axis());
            let child_frame = rot * Rot3::from_axis_angle(node.local_axis(), node.theta());
            let (s, child, sibling) = (node.s, node.left_child, node.right_sibling);
            if let Some(sibling) = sibling {
                // Siblings hang off the same parent frame
                stack.push((sibling, rot, origin));
            }
            if let Some(child) = child {
                stack.push((child, child_frame, s));
            }
        }
    }

    /// Joint angles in node (insertion) order; effectors contribute their
    /// fixed zero.
    pub fn thetas(&self) -> Vec<f64> {
        self.nodes.iter().map(Node::theta).collect()
    }

    /// Bulk-assign joint angles in node order, clamped into limits. Does not
    /// run the forward pass.
    pub fn set_thetas(&mut self, thetas: &[f64]) -> Result<(), ArmatureError> {
        if thetas.len() != self.nodes.len() {
            return Err(ArmatureError::ShapeMismatch {
                expected: self.nodes.len(),
                actual: thetas.len(),
            });
        }
        for (node, &theta) in self.nodes.iter_mut().zip(thetas) {
            node.set_theta(theta);
        }
        Ok(())
    }

    /// World positions in node order, as of the last forward pass.
    pub fn positions(&self) -> Vec<Vec3> {
        self.nodes.iter().map(Node::position).collect()
    }
}
