//! ## About
//!
//! This crate contains the motion planner for an articulated arm of revolute
//! joints: a kinematic tree with an iterative forward pass, an inverse
//! kinematics solver based on *selectively damped least squares* (SDLS, with
//! its own Golub-Reinsch SVD underneath), a sphere-chain self-collision
//! check, and a derivative-free simulated-annealing fallback that solves the
//! same problem through nothing but forward kinematics. On top of the
//! solvers sit the planning facilities: planned/committed dual solutions,
//! serializable plans and a pull-based keyframe animator.
//!
//! See [ArmSolution] and [PlanningSession] to get started.
//!
//! Everything runs single-threaded and cooperatively: one
//! [ArmSolution::update] per host tick, one [Animator::tick] per scheduled
//! frame. The library never panics on solver input; fallible operations
//! return [ArmatureError] and numerical breakdowns degrade to a rejected,
//! logged step.
//!
//! ## Reading list
//!
//! * [Selectively Damped Least Squares for Inverse Kinematics (Buss & Kim)](https://mathweb.ucsd.edu/~sbuss/ResearchWeb/ikmethods/)
//!
//! ## Naming conventions
//! * Structs – substantives that indicate the entity implementing a behavior
//! * Methods – imperative forms with the exception of getters and factories,
//!             which use substantives (i.e., omit a `get_` prefix) much like
//!             the standard library

pub mod animation;
pub mod annealing;
pub mod collision;
pub mod errors;
pub mod jacobian;
pub mod linear;
pub mod matrix;
pub mod plan;
pub mod solution;
pub mod tree;

pub use animation::{Animation, AnimationToken, Animator, Keyframe};
pub use annealing::{AnnealingConfig, AnnealingSolver, SolutionAndCost};
pub use collision::{CollisionConfig, CollisionModel, Segment, Volume};
pub use errors::ArmatureError;
pub use jacobian::{Goal, JacobianSolver, SolverConfig, StepOutcome};
pub use linear::{Rot3, Vec3};
pub use matrix::{Matrix, SvdWorkspace};
pub use plan::{Plan, PlanningSession};
pub use solution::ArmSolution;
pub use tree::{Node, NodeId, Purpose, Tree};
