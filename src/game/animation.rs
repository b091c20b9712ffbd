use log::warn;
use std::time::{Duration, Instant};

use crate::models::session::HistoryMove;

/// How long one move's visual transition is allowed to play.
pub const ANIMATION_WINDOW: Duration = Duration::from_millis(300);

/// Safety bound: a lock held this long has missed its completion
/// callback and is force-released by the watchdog.
pub const WATCHDOG_LIMIT: Duration = Duration::from_secs(2);

/// Session-scoped mutual-exclusion state: at most one committed move
/// may be visually in flight at a time. This is the single owner of
/// the "animating" flag; input handling, bot triggering and
/// persistence all read it through the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Locked { mv: HistoryMove, since: Instant },
}

impl AnimationState {
    pub fn is_locked(&self) -> bool {
        matches!(self, AnimationState::Locked { .. })
    }

    /// Entering `Locked` is only permitted from `Idle`.
    pub fn try_lock(&mut self, mv: HistoryMove, now: Instant) -> bool {
        match self {
            AnimationState::Idle => {
                *self = AnimationState::Locked { mv, since: now };
                true
            }
            AnimationState::Locked { .. } => false,
        }
    }

    /// Unconditional return to `Idle`; the sequencer must never stay
    /// stuck `Locked`.
    pub fn unlock(&mut self) {
        *self = AnimationState::Idle;
    }

    /// Watchdog: force-unlock a transition that overstayed the safety
    /// bound. Returns true if it fired.
    pub fn force_unlock_if_stuck(&mut self, now: Instant) -> bool {
        if let AnimationState::Locked { mv, since } = self {
            if now.duration_since(*since) >= WATCHDOG_LIMIT {
                warn!(
                    "animation for {} held the lock past the watchdog limit; force-unlocking",
                    mv.san
                );
                *self = AnimationState::Idle;
                return true;
            }
        }
        false
    }
}
