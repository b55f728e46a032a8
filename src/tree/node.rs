//! A single revolute joint or end effector and its computed world-space state.

use crate::linear::Vec3;

/// Stable reference into the [crate::tree::Tree] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a node contributes to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// One rotational degree of freedom about a fixed local axis.
    Joint,
    /// Terminal point driven towards a target. Carries no degree of freedom.
    Effector,
}

/// One revolute joint or end effector.
///
/// The attachment offset, rotation axis and limits are fixed at
/// construction; the joint angle is the only mutable input. The world-space
/// fields (`position`, `world_axis`, `offset_from_parent`) are outputs of
/// [crate::tree::Tree::compute].
#[derive(Debug, Clone)]
pub struct Node {
    purpose: Purpose,
    /// Attachment offset relative to the parent, in the parent's frame.
    attach: Vec3,
    /// Rotation axis in the local frame, normalized at construction.
    axis: Vec3,
    theta: f64,
    min_theta: f64,
    max_theta: f64,
    frozen: bool,

    // Computed by the forward pass
    pub(crate) s: Vec3,
    pub(crate) w: Vec3,
    pub(crate) r: Vec3,

    // Assigned by Tree::init
    pub(crate) seq_joint: Option<usize>,
    pub(crate) seq_effector: Option<usize>,

    // Arena links
    pub(crate) parent: Option<NodeId>,
    pub(crate) left_child: Option<NodeId>,
    pub(crate) right_sibling: Option<NodeId>,
}

impl Node {
    fn new(purpose: Purpose, attach: Vec3, axis: Vec3, min_theta: f64, max_theta: f64) -> Self {
        Node {
            purpose,
            attach,
            axis: axis.normalized(),
            theta: 0.0,
            min_theta,
            max_theta,
            frozen: false,
            s: Vec3::ZERO,
            w: Vec3::ZERO,
            r: Vec3::ZERO,
            seq_joint: None,
            seq_effector: None,
            parent: None,
            left_child: None,
            right_sibling: None,
        }
    }

    /// A revolute joint rotating about `axis` with inclusive angular limits.
    pub fn joint(attach: Vec3, axis: Vec3, min_theta: f64, max_theta: f64) -> Self {
        Node::new(Purpose::Joint, attach, axis, min_theta, max_theta)
    }

    /// An end effector. Effectors have no axis, a fixed angle of zero and
    /// must stay leaves.
    pub fn effector(attach: Vec3) -> Self {
        Node::new(Purpose::Effector, attach, Vec3::ZERO, 0.0, 0.0)
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn is_effector(&self) -> bool {
        self.purpose == Purpose::Effector
    }

    pub fn is_joint(&self) -> bool {
        self.purpose == Purpose::Joint
    }

    pub fn attach(&self) -> Vec3 {
        self.attach
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Assign a joint angle, clamped into the limits. Freezing guards
    /// against the solvers, not against explicit assignment.
    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta.clamp(self.min_theta, self.max_theta);
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.min_theta, self.max_theta)
    }

    /// Hold the current angle fixed for the solvers.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// World-space position after the last forward pass.
    pub fn position(&self) -> Vec3 {
        self.s
    }

    /// World-space rotation axis after the last forward pass.
    pub fn world_axis(&self) -> Vec3 {
        self.w
    }

    /// Vector from the parent's position to this node's position.
    pub fn offset_from_parent(&self) -> Vec3 {
        self.r
    }

    pub(crate) fn local_axis(&self) -> Vec3 {
        self.axis
    }

    /// Column index in the Jacobian; `None` before [crate::tree::Tree::init]
    /// or for effectors.
    pub fn joint_index(&self) -> Option<usize> {
        self.seq_joint
    }

    /// Row-block index in the Jacobian; `None` for joints.
    pub fn effector_index(&self) -> Option<usize> {
        self.seq_effector
    }
}
