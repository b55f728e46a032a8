/*! Plans and the planned/committed dual-state session.

A [Plan] is the portable unit of a posture: the joint vector in node order
plus the target it was solved for. The session keeps two fully independent
[ArmSolution]s: `planned` live-solves against the user's target while
`committed` holds the last confirmed plan, ready for rendering and for
forwarding to a physical arm (an array of radians in node order; the wire
format beyond that is the host's business). */

use crate::errors::ArmatureError;
use crate::jacobian::StepOutcome;
use crate::linear::Vec3;
use crate::solution::ArmSolution;
use serde::{Deserialize, Serialize};

/// A serialized posture: joint angles in node order and the associated
/// target. Round-trips through any serde format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan: Vec<f64>,
    pub target: Vec3,
}

/// Planned and committed solutions plus the initial snapshot taken at
/// construction. The two solutions share no mutable state.
pub struct PlanningSession {
    planned: ArmSolution,
    committed: ArmSolution,
    initial_thetas: Vec<f64>,
    initial_target: Vec3,
}

impl PlanningSession {
    pub fn new() -> Result<Self, ArmatureError> {
        Self::with_pose(None)
    }

    /// Both solutions start from the same (optionally given) pose.
    pub fn with_pose(initial_thetas: Option<&[f64]>) -> Result<Self, ArmatureError> {
        let planned = ArmSolution::new(initial_thetas)?;
        let committed = ArmSolution::new(initial_thetas)?;
        let initial_thetas = planned.serialize();
        let initial_target = planned.targets()[0];
        Ok(PlanningSession {
            planned,
            committed,
            initial_thetas,
            initial_target,
        })
    }

    pub fn planned(&self) -> &ArmSolution {
        &self.planned
    }

    pub fn planned_mut(&mut self) -> &mut ArmSolution {
        &mut self.planned
    }

    pub fn committed(&self) -> &ArmSolution {
        &self.committed
    }

    /// One live-planning tick.
    pub fn update(&mut self) -> Result<StepOutcome, ArmatureError> {
        self.planned.update()
    }

    /// Confirm the current plan: copy the planned joint vector into the
    /// committed solution and hand it to the caller, e.g. for forwarding
    /// over a command channel.
    pub fn commit_plan(&mut self) -> Result<Vec<f64>, ArmatureError> {
        let thetas = self.planned.serialize();
        self.committed.apply_solution(&thetas)?;
        Ok(thetas)
    }

    /// Snapshot the planned posture.
    pub fn plan(&self) -> Plan {
        Plan {
            plan: self.planned.serialize(),
            target: self.planned.targets()[0],
        }
    }

    /// Restore a posture: angles via [ArmSolution::apply_solution] (forward
    /// pass only, no IK), then the target.
    pub fn load_plan(&mut self, plan: &Plan) -> Result<(), ArmatureError> {
        self.planned.apply_solution(&plan.plan)?;
        self.planned.set_target(0, plan.target)
    }

    /// Back to the construction snapshot; the target only on request. Does
    /// not cancel a running animation.
    pub fn reset_to_initial(&mut self, also_reset_target: bool) -> Result<(), ArmatureError> {
        self.planned.apply_solution(&self.initial_thetas)?;
        if also_reset_target {
            self.planned.set_target(0, self.initial_target)?;
        }
        Ok(())
    }
}
