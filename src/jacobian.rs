/*! The selectively damped least squares (SDLS) inverse-kinematics solver.

One [JacobianSolver::step] performs a single iteration against the owning
tree: rebuild the Jacobians and the clamped displacement, solve for Δθ
through the singular value decomposition with per-direction damping, apply
the clamped update and refresh the forward kinematics. Matrices are sized
once per tree shape; the SVD workspace is reused between steps. */

use crate::errors::ArmatureError;
use crate::linear::Vec3;
use crate::matrix::{Matrix, SvdWorkspace};
use crate::tree::Tree;
use std::f64::consts::FRAC_PI_4;
use tracing::{debug, warn};

/// What each effector is driven towards.
///
/// Two states, explicit transitions only. `Target` (the default) solves
/// towards the assigned target points; under `Hold` every effector's goal is
/// its own current position, which makes the solve a passive relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Goal {
    #[default]
    Target,
    Hold,
}

/// Step bounds of the solver, all in SI-consistent units.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Per-effector displacement clamp (ΔS_max), world units.
    pub max_displacement: f64,
    /// Largest per-joint rotation a single singular direction may induce
    /// (γ_max), radians.
    pub max_component_rotation: f64,
    /// Largest per-joint rotation of the summed update (γ_total), radians.
    pub max_total_rotation: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_displacement: 0.4,
            max_component_rotation: FRAC_PI_4,
            max_total_rotation: FRAC_PI_4,
        }
    }
}

/// What a step did. A rejected step leaves the tree untouched; the cause is
/// logged and the solver is ready for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Rejected,
}

/// SDLS solver state for one tree shape.
pub struct JacobianSolver {
    config: SolverConfig,
    goal: Goal,
    n_joints: usize,
    n_effectors: usize,
    /// Columns anchored at the effector positions: `w_j × (s_e − s_j)`. This
    /// is the matrix every solve runs on.
    jac_effector: Matrix,
    /// Columns anchored at the target points instead: `w_j × (t_e − s_j)`.
    /// Rebuilt alongside for observers; near convergence the two coincide.
    jac_target: Matrix,
    /// Clamped per-effector displacement, interleaved x/y/z.
    d_s: Vec<f64>,
    d_theta: Vec<f64>,
    /// How strongly each joint moves all effectors depending on it (ρ_j).
    joint_response: Vec<f64>,
    phi: Vec<f64>,
    svd: SvdWorkspace,
}

impl JacobianSolver {
    /// Allocate for the tree's current shape. Call again if the tree is
    /// rebuilt with a different node set.
    pub fn new(tree: &Tree, config: SolverConfig) -> Self {
        let n_joints = tree.joint_count();
        let n_effectors = tree.effector_count();
        JacobianSolver {
            config,
            goal: Goal::default(),
            n_joints,
            n_effectors,
            jac_target: Matrix::zeros(3 * n_effectors, n_joints),
            jac_effector: Matrix::zeros(3 * n_effectors, n_joints),
            d_s: vec![0.0; 3 * n_effectors],
            d_theta: vec![0.0; n_joints],
            joint_response: vec![0.0; n_joints],
            phi: vec![0.0; n_joints],
            svd: SvdWorkspace::new(),
        }
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    /// Explicit mode transition; there are no automatic ones.
    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = goal;
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The most recent joint update.
    pub fn delta_thetas(&self) -> &[f64] {
        &self.d_theta
    }

    /// The clamped effector displacement as of the end of the last step.
    pub fn displacement(&self) -> &[f64] {
        &self.d_s
    }

    /// The matrix the next solve runs on (effector-anchored).
    pub fn jacobian(&self) -> &Matrix {
        &self.jac_effector
    }

    /// The target-anchored companion matrix.
    pub fn target_jacobian(&self) -> &Matrix {
        &self.jac_target
    }

    /// One IK iteration: Jacobian rebuild, SDLS solve, clamped update,
    /// forward pass, displacement refresh.
    ///
    /// `ShapeMismatch` if the target count differs from the effector count
    /// (state untouched). A numerical breakdown is not an error: the step
    /// reports [StepOutcome::Rejected], Δθ is zeroed and the tree keeps its
    /// previous configuration.
    pub fn step(&mut self, tree: &mut Tree, targets: &[Vec3]) -> Result<StepOutcome, ArmatureError> {
        if targets.len() != self.n_effectors {
            return Err(ArmatureError::ShapeMismatch {
                expected: self.n_effectors,
                actual: targets.len(),
            });
        }

        self.compute_jacobians(tree, targets);

        if let Err(err) = self.calc_delta_thetas_sdls() {
            warn!(%err, "discarding IK step");
            self.d_theta.fill(0.0);
            return Ok(StepOutcome::Rejected);
        }
        if self.d_theta.iter().any(|x| !x.is_finite()) {
            warn!("non-finite joint update, discarding IK step");
            self.d_theta.fill(0.0);
            return Ok(StepOutcome::Rejected);
        }

        self.update_thetas(tree);
        tree.compute();
        self.update_clamped_displacement(tree, targets);
        Ok(StepOutcome::Applied)
    }

    /// Rebuild both Jacobians and the clamped displacement for the current
    /// configuration. Entries exist for every (effector, non-frozen ancestor
    /// joint) pair; everything else stays zero, frozen joints keep their
    /// (zeroed) column.
    fn compute_jacobians(&mut self, tree: &Tree, targets: &[Vec3]) {
        self.jac_target.fill(0.0);
        self.jac_effector.fill(0.0);

        for &id in tree.order() {
            let node = tree.node(id);
            let Some(e) = node.effector_index() else {
                continue;
            };
            let s_e = node.position();
            let t_e = targets[e];
            self.write_displacement(e, self.goal_offset(t_e, s_e));

            let mut ancestor = tree.parent(id);
            while let Some(pid) = ancestor {
                let joint = tree.node(pid);
                if let Some(j) = joint.joint_index() {
                    if !joint.is_frozen() {
                        let axis = joint.world_axis();
                        let s_j = joint.position();
                        set_triple(&mut self.jac_effector, e, j, axis.cross(s_e - s_j));
                        set_triple(&mut self.jac_target, e, j, axis.cross(t_e - s_j));
                    }
                }
                ancestor = tree.parent(pid);
            }
        }
    }

    /// What the effector is asked to move by, before clamping: towards its
    /// target, or (holding) nothing at all.
    fn goal_offset(&self, target: Vec3, effector: Vec3) -> Vec3 {
        match self.goal {
            Goal::Target => target - effector,
            Goal::Hold => Vec3::ZERO,
        }
    }

    fn write_displacement(&mut self, e: usize, raw: Vec3) {
        let norm = raw.norm();
        let clamped = if norm > self.config.max_displacement {
            raw * (self.config.max_displacement / norm)
        } else {
            raw
        };
        self.d_s[3 * e] = clamped.x;
        self.d_s[3 * e + 1] = clamped.y;
        self.d_s[3 * e + 2] = clamped.z;
    }

    /// Recompute the clamped displacement for the updated configuration so
    /// the residual read back after a step matches what the next call will
    /// start from.
    fn update_clamped_displacement(&mut self, tree: &Tree, targets: &[Vec3]) {
        for &id in tree.order() {
            let node = tree.node(id);
            if let Some(e) = node.effector_index() {
                self.write_displacement(e, self.goal_offset(targets[e], node.position()));
            }
        }
    }

    /// Selectively damped least squares: each singular direction of the
    /// active Jacobian contributes `(u_iᵀ dS)/w_i · v_i`, rescaled so that no
    /// single direction rotates any joint by more than
    /// `γ_max · w_i / (Σ_j |v_ji| ρ_j)`, with ρ_j the summed effector
    /// response of joint j. The summed update is then clamped to γ_total.
    fn calc_delta_thetas_sdls(&mut self) -> Result<(), ArmatureError> {
        let jacobian = &self.jac_effector;
        jacobian.svd_into(&mut self.svd)?;

        for j in 0..self.n_joints {
            self.joint_response[j] = (0..self.n_effectors)
                .map(|e| {
                    Vec3::new(
                        jacobian[(3 * e, j)],
                        jacobian[(3 * e + 1, j)],
                        jacobian[(3 * e + 2, j)],
                    )
                    .norm()
                })
                .sum();
        }

        self.d_theta.fill(0.0);
        let tol = self.svd.zero_threshold();
        let (u, v) = (self.svd.u(), self.svd.v());

        for (i, &w_i) in self.svd.singular_values().iter().enumerate() {
            if w_i <= tol {
                // Numerically zero: this direction contributes nothing
                continue;
            }
            let alpha: f64 = (0..self.d_s.len()).map(|r| u[(r, i)] * self.d_s[r]).sum();
            let gain = alpha / w_i;
            for (j, phi) in self.phi.iter_mut().enumerate() {
                *phi = gain * v[(j, i)];
            }

            let response: f64 = (0..self.n_joints)
                .map(|j| v[(j, i)].abs() * self.joint_response[j])
                .sum();
            if response > 0.0 {
                let bound = self.config.max_component_rotation * w_i / response;
                clamp_max_abs(&mut self.phi, bound);
            }

            for (acc, &phi) in self.d_theta.iter_mut().zip(&self.phi) {
                *acc += phi;
            }
        }

        clamp_max_abs(&mut self.d_theta, self.config.max_total_rotation);
        debug!(
            update = self
                .d_theta
                .iter()
                .fold(0.0f64, |acc, x| acc.max(x.abs())),
            "sdls solve"
        );
        Ok(())
    }

    /// Apply Δθ to every non-frozen joint, clamped into its limits.
    fn update_thetas(&self, tree: &mut Tree) {
        for id in tree.ids().collect::<Vec<_>>() {
            let node = tree.node_mut(id);
            if node.is_frozen() {
                continue;
            }
            if let Some(j) = node.joint_index() {
                node.set_theta(node.theta() + self.d_theta[j]);
            }
        }
    }
}

fn set_triple(m: &mut Matrix, effector: usize, joint: usize, value: Vec3) {
    m[(3 * effector, joint)] = value.x;
    m[(3 * effector + 1, joint)] = value.y;
    m[(3 * effector + 2, joint)] = value.z;
}

/// Uniformly rescale so that no component exceeds `bound` in magnitude. The
/// mix between components is preserved.
fn clamp_max_abs(values: &mut [f64], bound: f64) {
    let max = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if max > bound {
        let factor = bound / max;
        for v in values.iter_mut() {
            *v *= factor;
        }
    }
}
