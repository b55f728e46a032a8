/*! One plannable arm: tree, IK solver, collision state and targets composed
behind a single façade.

The default arm is a four-joint chain (a yaw base and three pitch joints)
with an end effector, matching the physical unit this plans for. Hosts with
different geometry can build their own [Tree] and wrap it the same way. */

use crate::collision::{CollisionConfig, CollisionModel};
use crate::errors::ArmatureError;
use crate::jacobian::{JacobianSolver, SolverConfig, StepOutcome};
use crate::linear::Vec3;
use crate::tree::{Node, Tree};
use std::f64::consts::PI;
use tracing::trace;

/// Segment offsets of the default arm, base to tip.
const SEGMENT_OFFSETS: [Vec3; 3] = [
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 3.0, 0.0),
    Vec3::new(0.0, 4.0, 0.0),
];
const EFFECTOR_OFFSET: Vec3 = Vec3::new(0.0, 3.0, 0.0);
const DEFAULT_TARGET: Vec3 = Vec3::new(0.0, 6.0, 0.0);

/// Gently bent rest pose. The straight pose is singular with respect to the
/// default target (every Jacobian column is orthogonal to the residual).
const DEFAULT_POSE: [f64; 5] = [0.0, 0.5, 0.5, 0.5, 0.0];

/// A solvable arm configuration. Owns its tree, solver and collision state
/// for the lifetime of the planning session.
pub struct ArmSolution {
    tree: Tree,
    solver: JacobianSolver,
    collision: CollisionModel,
    targets: Vec<Vec3>,
}

impl ArmSolution {
    /// Build the default arm, optionally with a starting pose (node order,
    /// one angle per node), and run one planning step.
    pub fn new(initial_thetas: Option<&[f64]>) -> Result<Self, ArmatureError> {
        let mut tree = Tree::new();
        let base = tree.insert_root(Node::joint(Vec3::ZERO, Vec3::Y, -PI, PI))?;
        let mut parent = base;
        for offset in SEGMENT_OFFSETS {
            parent = tree.insert_left_child(parent, Node::joint(offset, Vec3::X, -PI, PI))?;
        }
        tree.insert_left_child(parent, Node::effector(EFFECTOR_OFFSET))?;
        tree.init()?;
        tree.set_thetas(initial_thetas.unwrap_or(&DEFAULT_POSE))?;
        tree.compute();

        let solver = JacobianSolver::new(&tree, SolverConfig::default());
        let collision = CollisionModel::new(&tree.positions(), CollisionConfig::default());
        let targets = vec![DEFAULT_TARGET; tree.effector_count()];

        let mut solution = ArmSolution {
            tree,
            solver,
            collision,
            targets,
        };
        solution.update()?;
        Ok(solution)
    }

    /// One planning tick: ground-clamp the targets, run one IK iteration and
    /// refresh the collision state.
    pub fn update(&mut self) -> Result<StepOutcome, ArmatureError> {
        for target in &mut self.targets {
            // Targets may not be steered below the ground plane
            if target.y < 0.0 {
                target.y = 0.0;
            }
        }
        let outcome = self.step_ik()?;
        self.collision.update(&self.tree.positions());
        trace!(?outcome, valid = self.solution_is_valid(), "arm update");
        Ok(outcome)
    }

    /// One IK iteration against the current targets, without touching the
    /// collision state.
    pub fn step_ik(&mut self) -> Result<StepOutcome, ArmatureError> {
        self.solver.step(&mut self.tree, &self.targets)
    }

    /// The ground constraint, indexed by chain position: the base is always
    /// acceptable, everything else must stay at or above the plane.
    pub fn validate_point(&self, point: Vec3, index: usize) -> bool {
        index == 0 || point.y >= 0.0
    }

    /// All node positions pass [ArmSolution::validate_point] and no
    /// collision is flagged.
    pub fn solution_is_valid(&self) -> bool {
        self.tree
            .positions()
            .into_iter()
            .enumerate()
            .all(|(i, p)| self.validate_point(p, i))
            && !self.collision.any_colliding()
    }

    /// The joint angles in node order, sufficient to reproduce the posture.
    pub fn serialize(&self) -> Vec<f64> {
        self.tree.thetas()
    }

    /// Assign a joint vector and refresh the kinematics and collision state.
    /// Runs no IK. `ShapeMismatch` (state unchanged) on a wrong length.
    pub fn apply_solution(&mut self, thetas: &[f64]) -> Result<(), ArmatureError> {
        self.tree.set_thetas(thetas)?;
        self.tree.compute();
        self.collision.update(&self.tree.positions());
        Ok(())
    }

    pub fn targets(&self) -> &[Vec3] {
        &self.targets
    }

    /// Write a target, nudging it up to the ground plane if below.
    pub fn set_target(&mut self, index: usize, target: Vec3) -> Result<(), ArmatureError> {
        let slot = self
            .targets
            .get_mut(index)
            .ok_or(ArmatureError::ReferenceOutOfBound(index))?;
        *slot = Vec3::new(target.x, target.y.max(0.0), target.z);
        Ok(())
    }

    /// World position of the effector with the given sequence number.
    pub fn effector_position(&self, index: usize) -> Option<Vec3> {
        self.tree
            .nodes()
            .find(|n| n.effector_index() == Some(index))
            .map(|n| n.position())
    }

    /// Distance from each effector to its target, for observers.
    pub fn residuals(&self) -> Vec<f64> {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(e, t)| self.effector_position(e).map(|p| p.distance(*t)))
            .collect()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable tree access, e.g. for freezing joints. Run
    /// [ArmSolution::apply_solution] or [ArmSolution::update] afterwards if
    /// angles were touched directly.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn solver(&self) -> &JacobianSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut JacobianSolver {
        &mut self.solver
    }

    pub fn collision(&self) -> &CollisionModel {
        &self.collision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_arm_shape() {
        let solution = ArmSolution::new(None).unwrap();
        assert_eq!(solution.tree().len(), 5);
        assert_eq!(solution.tree().joint_count(), 4);
        assert_eq!(solution.tree().effector_count(), 1);
        assert_eq!(solution.targets(), &[DEFAULT_TARGET]);
        assert_eq!(solution.collision().segments().len(), 4);
    }

    #[test]
    fn serialize_apply_round_trip_is_a_no_op() {
        let mut solution = ArmSolution::new(None).unwrap();
        for _ in 0..5 {
            solution.update().unwrap();
        }
        let saved = solution.serialize();
        let positions = solution.tree().positions();
        solution.apply_solution(&saved).unwrap();
        assert_eq!(solution.serialize(), saved);
        for (before, after) in positions.iter().zip(solution.tree().positions()) {
            assert_abs_diff_eq!(before.distance(after), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn apply_solution_rejects_wrong_length() {
        let mut solution = ArmSolution::new(None).unwrap();
        let saved = solution.serialize();
        let err = solution.apply_solution(&[0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            ArmatureError::ShapeMismatch {
                expected: 5,
                actual: 3
            }
        );
        assert_eq!(solution.serialize(), saved);
    }

    #[test]
    fn custom_initial_pose_is_applied() {
        let pose = [0.1, 0.2, 0.3, 0.4, 0.0];
        let solution = ArmSolution::new(Some(&pose)).unwrap();
        // One step has run; the pose has moved but within the step bound
        let config = *solution.solver().config();
        for (initial, current) in pose.iter().zip(solution.serialize()) {
            assert!((initial - current).abs() <= config.max_total_rotation + 1e-12);
        }
    }

    #[test]
    fn ground_violation_invalidates() {
        let mut solution = ArmSolution::new(None).unwrap();
        assert!(solution.solution_is_valid());
        // Bend the first pitch joint far below the plane
        solution
            .apply_solution(&[0.0, -2.5, 0.0, 0.0, 0.0])
            .unwrap();
        assert!(!solution.solution_is_valid());
    }

    #[test]
    fn base_is_exempt_from_the_ground_check() {
        let solution = ArmSolution::new(None).unwrap();
        assert!(solution.validate_point(Vec3::new(0.0, -1.0, 0.0), 0));
        assert!(!solution.validate_point(Vec3::new(0.0, -1.0, 0.0), 1));
        assert!(solution.validate_point(Vec3::ZERO, 2));
    }

    #[test]
    fn hold_goal_parks_the_arm() {
        use crate::jacobian::Goal;

        let mut solution = ArmSolution::new(None).unwrap();
        solution.solver_mut().set_goal(Goal::Hold);
        let parked = solution.effector_position(0).unwrap();
        solution.set_target(0, parked).unwrap();

        let before = solution.serialize();
        for _ in 0..10 {
            solution.update().unwrap();
        }
        for (a, b) in before.iter().zip(solution.serialize()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn targets_are_nudged_above_ground() {
        let mut solution = ArmSolution::new(None).unwrap();
        solution.set_target(0, Vec3::new(1.0, -5.0, 0.0)).unwrap();
        assert_eq!(solution.targets()[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            solution.set_target(3, Vec3::ZERO).unwrap_err(),
            ArmatureError::ReferenceOutOfBound(3)
        );

        // The clamp also guards direct writes picked up by update()
        solution.targets[0].y = -2.0;
        solution.update().unwrap();
        assert_eq!(solution.targets()[0].y, 0.0);
    }
}
