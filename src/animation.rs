/*! Keyframe playback driving a [PlanningSession].

Pull-based: the host calls [Animator::tick] with its monotone clock each
frame instead of handing callbacks over. Starting a playback invalidates any
earlier one through a monotonically increasing token, so a stale schedule
can never steer the session again. */

use crate::errors::ArmatureError;
use crate::plan::{Plan, PlanningSession};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One keyframe: how long it holds, and the posture to restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds until the next frame takes over.
    pub interval: f64,
    pub plan: Plan,
}

/// An ordered keyframe list, optionally looping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub frames: Vec<Keyframe>,
    pub looped: bool,
}

/// Handle to one playback. Only the most recently issued token is live.
pub type AnimationToken = u64;

#[derive(Debug)]
struct Playback {
    token: AnimationToken,
    animation: Animation,
    start_time: f64,
    elapsed_interval_sum: f64,
    current_frame: usize,
}

/// Drives at most one [Animation] at a time against a session.
#[derive(Debug, Default)]
pub struct Animator {
    token: AnimationToken,
    playback: Option<Playback>,
}

impl Animator {
    pub fn new() -> Self {
        Animator::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Start playing at `now` (host seconds). Any earlier playback's token
    /// goes stale immediately.
    pub fn play(&mut self, animation: Animation, now: f64) -> AnimationToken {
        self.token += 1;
        self.playback = Some(Playback {
            token: self.token,
            animation,
            start_time: now,
            elapsed_interval_sum: 0.0,
            current_frame: 0,
        });
        self.token
    }

    /// Stop the playback `token` refers to. Stale tokens are ignored, so a
    /// cancel raced against a newer [Animator::play] cannot kill the newer
    /// playback.
    pub fn cancel(&mut self, token: AnimationToken) {
        if self.playback.as_ref().is_some_and(|p| p.token == token) {
            self.playback = None;
        }
    }

    /// Host tick: advance past completed frames (restoring their plans),
    /// interpolate the target towards the next frame, handle looping.
    /// Returns whether a playback is still active afterwards.
    pub fn tick(
        &mut self,
        now: f64,
        session: &mut PlanningSession,
    ) -> Result<bool, ArmatureError> {
        let Some(playback) = self.playback.as_mut() else {
            return Ok(false);
        };
        if playback.token != self.token {
            // A newer playback was issued; this schedule self-aborts
            self.playback = None;
            return Ok(false);
        }

        let since_start = now - playback.start_time;

        while playback
            .animation
            .frames
            .get(playback.current_frame)
            .is_some_and(|f| playback.elapsed_interval_sum + f.interval < since_start)
        {
            playback.elapsed_interval_sum +=
                playback.animation.frames[playback.current_frame].interval;
            playback.current_frame += 1;
            if let Some(frame) = playback.animation.frames.get(playback.current_frame) {
                session.load_plan(&frame.plan)?;
            }
        }

        let frame_count = playback.animation.frames.len();
        if playback.current_frame + 1 < frame_count {
            let frame = &playback.animation.frames[playback.current_frame];
            let next = &playback.animation.frames[playback.current_frame + 1];
            let frame_completion = since_start - playback.elapsed_interval_sum / frame.interval;
            let target = frame.plan.target.lerp(next.plan.target, frame_completion);
            session.planned_mut().set_target(0, target)?;
            trace!(
                frame = playback.current_frame,
                completion = frame_completion,
                "animation tick"
            );
        } else if playback.animation.looped {
            // Out of frames to interpolate towards: wrap around
            playback.start_time = now;
            playback.elapsed_interval_sum = 0.0;
            playback.current_frame = 0;
        } else if playback.current_frame >= frame_count {
            self.playback = None;
            return Ok(false);
        }

        Ok(true)
    }
}
