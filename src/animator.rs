//! Cancellable, time-stepped sweep of a single value.
//!
//! The animator does not own a clock. The caller advances it with the time
//! that has elapsed since the last turn of its event loop, and every whole
//! interval inside that span produces one tick. Each started animation
//! carries a [`CancelToken`]; the token is checked before every tick, so a
//! cancelled animation never reports another value, even if the cancel came
//! from inside a tick callback.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Parameters for one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSpec {
    pub from: f64,
    pub to: f64,
    /// Distance covered per tick. The sign is ignored; direction comes from `from`/`to`.
    pub step: f64,
    pub interval: Duration,
}

impl AnimationSpec {
    pub fn new(from: f64, to: f64, step: f64, interval_ms: u64) -> Self {
        Self {
            from,
            to,
            step,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Interval actually used for scheduling. Never zero.
    fn effective_interval(&self) -> Duration {
        self.interval.max(Duration::from_millis(1))
    }

    /// Value reported by the `n`th tick (1-based), clamped to `to`.
    fn value_at(&self, n: u64) -> f64 {
        let step = self.step.abs();
        if !step.is_finite() || step == 0.0 || !self.from.is_finite() || !self.to.is_finite() {
            return self.to;
        }
        let distance = self.to - self.from;
        let travelled = step * n as f64;
        // Snap when within rounding noise of the end.
        if travelled >= distance.abs() - step * 1e-9 {
            self.to
        } else {
            self.from + travelled.copysign(distance)
        }
    }
}

/// Identifies one started animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationId(pub u64);

/// Shared cancellation flag for one animation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Returned by [`ParameterAnimator::start`]; lets the owner cancel later.
#[derive(Debug, Clone)]
pub struct AnimationHandle {
    pub id: AnimationId,
    pub token: CancelToken,
}

impl AnimationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Lifecycle of the animator: `Idle -> Running -> (Completed | Cancelled) -> Idle`.
///
/// A terminal state holds until the owner acknowledges it with
/// [`ParameterAnimator::acknowledge`] or calls [`ParameterAnimator::stop`] again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// One value reported by a running animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub animation: AnimationId,
    /// 1-based tick number within the animation.
    pub index: u64,
    pub value: f64,
    /// True for the tick that lands on `to`.
    pub last: bool,
}

#[derive(Debug)]
struct ActiveAnimation {
    id: AnimationId,
    spec: AnimationSpec,
    token: CancelToken,
    ticks: u64,
    /// Time accumulated towards the next tick.
    pending: Duration,
}

/// Drives at most one animation at a time.
#[derive(Debug)]
pub struct ParameterAnimator {
    active: Option<ActiveAnimation>,
    state: AnimatorState,
    next_id: u64,
}

impl Default for ParameterAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterAnimator {
    pub fn new() -> Self {
        Self {
            active: None,
            state: AnimatorState::Idle,
            next_id: 0,
        }
    }

    /// Start a sweep, stopping any animation that is still running first.
    pub fn start(&mut self, spec: AnimationSpec) -> AnimationHandle {
        self.stop();

        let id = AnimationId(self.next_id);
        self.next_id += 1;
        let token = CancelToken::new();

        log::debug!(
            "Animation {:?} started: {} -> {} by {} every {:?}",
            id,
            spec.from,
            spec.to,
            spec.step,
            spec.effective_interval()
        );

        self.active = Some(ActiveAnimation {
            id,
            spec,
            token: token.clone(),
            ticks: 0,
            pending: Duration::ZERO,
        });
        self.state = AnimatorState::Running;

        AnimationHandle { id, token }
    }

    /// Cancel the running animation, if any. Safe to call at any time.
    ///
    /// A running animation moves to `Cancelled`; an animator already in a
    /// terminal state returns to `Idle`. Returns true if an animation was running.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.token.cancel();
                self.state = AnimatorState::Cancelled;
                log::debug!("Animation {:?} cancelled after {} ticks", active.id, active.ticks);
                true
            }
            None => {
                self.acknowledge();
                false
            }
        }
    }

    /// Take the outcome of a finished animation and return to `Idle`.
    ///
    /// Returns `None` while idle or running.
    pub fn acknowledge(&mut self) -> Option<AnimatorState> {
        match self.state {
            AnimatorState::Completed | AnimatorState::Cancelled => {
                Some(std::mem::replace(&mut self.state, AnimatorState::Idle))
            }
            AnimatorState::Idle | AnimatorState::Running => None,
        }
    }

    pub fn state(&self) -> AnimatorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AnimatorState::Running
    }

    /// Id of the running animation.
    pub fn current(&self) -> Option<AnimationId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Advance time and report every tick that falls due.
    ///
    /// Returns the number of ticks reported.
    pub fn advance(&mut self, elapsed: Duration, on_tick: &mut dyn FnMut(Tick)) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };

        let interval = active.spec.effective_interval();
        active.pending += elapsed;

        let mut fired = 0;
        let mut finished = false;
        let mut cancelled = false;

        while active.pending >= interval {
            if active.token.is_cancelled() {
                cancelled = true;
                break;
            }
            active.pending -= interval;
            active.ticks += 1;

            let value = active.spec.value_at(active.ticks);
            let last = value == active.spec.to;
            on_tick(Tick {
                animation: active.id,
                index: active.ticks,
                value,
                last,
            });
            fired += 1;

            if last {
                finished = true;
                break;
            }
        }

        if !finished && !cancelled && active.token.is_cancelled() {
            cancelled = true;
        }

        if finished {
            log::debug!("Animation {:?} completed after {} ticks", active.id, active.ticks);
            self.active = None;
            self.state = AnimatorState::Completed;
        } else if cancelled {
            log::debug!("Animation {:?} cancelled through its token", active.id);
            self.active = None;
            self.state = AnimatorState::Cancelled;
        }

        fired
    }
}
