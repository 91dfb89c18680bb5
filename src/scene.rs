//! Narrative steps and the scene state machine.
//!
//! Each step of the story is described by a [`SceneDescriptor`]. The
//! [`SceneController`] interprets descriptors when the scroll observer
//! reports a step boundary: it cancels whatever animation is running, applies
//! the scene's parameter changes and starts the scene's own animation unless
//! that step has already played since the last reset.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::ViewKind;
use crate::animator::{AnimationId, AnimationSpec, AnimatorState, ParameterAnimator, Tick};
use crate::risk::{ClimateParameter, ClimateParameters};

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    50
}

/// Sweep of one climate parameter played when a step is entered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationConfig {
    pub parameter: ClimateParameter,
    pub from: f64,
    pub to: f64,
    pub step: f64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl AnimationConfig {
    pub fn spec(&self) -> AnimationSpec {
        AnimationSpec::new(self.from, self.to, self.step, self.interval_ms)
    }
}

/// A fixed parameter value applied when a step is entered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub parameter: ClimateParameter,
    pub value: f64,
}

/// Static description of one narrative step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescriptor {
    pub step: u32,

    #[serde(default)]
    pub title: String,

    /// Aggregate requested when the step is entered.
    #[serde(default)]
    pub view: ViewKind,

    /// Zero all climate parameters and forget which steps have played.
    #[serde(default)]
    pub reset: bool,

    /// Whether the taxon filter restricts this scene's aggregate.
    #[serde(default = "default_true")]
    pub apply_filter: bool,

    /// Values pinned before the animation starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<ParameterValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animate: Option<AnimationConfig>,
}

impl SceneDescriptor {
    pub fn new(step: u32) -> Self {
        Self {
            step,
            title: String::new(),
            view: ViewKind::default(),
            reset: false,
            apply_filter: true,
            set: Vec::new(),
            animate: None,
        }
    }

    pub fn with_animation(mut self, animation: AnimationConfig) -> Self {
        self.animate = Some(animation);
        self
    }

    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    pub fn with_view(mut self, view: ViewKind) -> Self {
        self.view = view;
        self
    }
}

/// Runtime progress of one step's animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneStatus {
    NotVisited,
    Running,
    Done,
}

#[derive(Debug)]
struct SceneEntry {
    descriptor: SceneDescriptor,
    status: SceneStatus,
}

/// What the caller should do after a step was entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSetup {
    pub step: u32,
    pub view: ViewKind,
    pub apply_filter: bool,
    pub reset: bool,
    /// Animation started by this entry, if any.
    pub started: Option<AnimationId>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveBinding {
    step: u32,
    parameter: ClimateParameter,
}

/// State machine over the story's steps.
#[derive(Debug)]
pub struct SceneController {
    scenes: BTreeMap<u32, SceneEntry>,
    current: Option<u32>,
    animator: ParameterAnimator,
    binding: Option<ActiveBinding>,
}

impl SceneController {
    pub fn new(descriptors: impl IntoIterator<Item = SceneDescriptor>) -> Self {
        let scenes = descriptors
            .into_iter()
            .map(|descriptor| {
                (
                    descriptor.step,
                    SceneEntry {
                        descriptor,
                        status: SceneStatus::NotVisited,
                    },
                )
            })
            .collect();

        Self {
            scenes,
            current: None,
            animator: ParameterAnimator::new(),
            binding: None,
        }
    }

    pub fn current_step(&self) -> Option<u32> {
        self.current
    }

    pub fn status(&self, step: u32) -> Option<SceneStatus> {
        self.scenes.get(&step).map(|e| e.status)
    }

    /// Descriptors in step order.
    pub fn descriptors(&self) -> impl Iterator<Item = &SceneDescriptor> {
        self.scenes.values().map(|e| &e.descriptor)
    }

    pub fn animator_state(&self) -> AnimatorState {
        self.animator.state()
    }

    /// Parameter currently driven by an animation.
    pub fn animating(&self) -> Option<ClimateParameter> {
        self.binding.map(|b| b.parameter)
    }

    /// Handle a step-enter from the scroll observer.
    ///
    /// Returns `None` for steps the story does not define.
    pub fn enter_step(&mut self, step: u32, params: &mut ClimateParameters) -> Option<SceneSetup> {
        let Some(entry) = self.scenes.get(&step) else {
            log::debug!("Ignoring enter for unknown step {}", step);
            return None;
        };
        let descriptor = entry.descriptor.clone();

        // Scroll jitter: re-entering the step whose animation is still
        // playing leaves that animation alone.
        if self.binding.map(|b| b.step) == Some(step) {
            log::debug!("Step {} re-entered while its animation is running", step);
            self.current = Some(step);
            return Some(SceneSetup {
                step,
                view: descriptor.view,
                apply_filter: descriptor.apply_filter,
                reset: false,
                started: None,
            });
        }

        self.cancel_animation();

        log::info!(
            "Scene {:?} -> {} ({})",
            self.current,
            step,
            if descriptor.title.is_empty() { "untitled" } else { descriptor.title.as_str() }
        );
        self.current = Some(step);

        if descriptor.reset {
            *params = ClimateParameters::zero();
            for entry in self.scenes.values_mut() {
                entry.status = SceneStatus::NotVisited;
            }
        }

        for pinned in &descriptor.set {
            params.set(pinned.parameter, pinned.value.max(0.0));
        }

        let mut started = None;
        if let Some(animation) = descriptor.animate {
            let status = self.status(step).unwrap_or(SceneStatus::NotVisited);
            if status == SceneStatus::NotVisited {
                params.set(animation.parameter, animation.from.max(0.0));
                let handle = self.animator.start(animation.spec());
                self.binding = Some(ActiveBinding {
                    step,
                    parameter: animation.parameter,
                });
                self.set_status(step, SceneStatus::Running);
                started = Some(handle.id);
            } else {
                log::debug!("Step {} already played ({:?}); not restarting", step, status);
            }
        }

        Some(SceneSetup {
            step,
            view: descriptor.view,
            apply_filter: descriptor.apply_filter,
            reset: descriptor.reset,
            started,
        })
    }

    /// Handle a step-exit from the scroll observer.
    ///
    /// The running animation keeps playing until another step is entered.
    pub fn exit_step(&mut self, step: u32) -> bool {
        if self.current == Some(step) {
            log::debug!("Left step {}", step);
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Stop the running animation, if any. Its step counts as played.
    pub fn cancel_animation(&mut self) -> bool {
        let stopped = self.animator.stop();
        self.animator.acknowledge();
        if let Some(binding) = self.binding.take() {
            self.set_status(binding.step, SceneStatus::Done);
        }
        stopped
    }

    /// Advance the running animation, writing each tick into `params`.
    ///
    /// `on_tick` sees the parameters after each write.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        params: &mut ClimateParameters,
        on_tick: &mut dyn FnMut(&ClimateParameters, Tick),
    ) -> usize {
        let Some(binding) = self.binding else {
            return 0;
        };

        let fired = self.animator.advance(elapsed, &mut |tick| {
            params.set(binding.parameter, tick.value);
            on_tick(params, tick);
        });

        if let Some(outcome) = self.animator.acknowledge() {
            log::debug!("Step {} animation ended: {:?}", binding.step, outcome);
            self.binding = None;
            self.set_status(binding.step, SceneStatus::Done);
        }
        fired
    }

    fn set_status(&mut self, step: u32, status: SceneStatus) {
        if let Some(entry) = self.scenes.get_mut(&step) {
            entry.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(parameter: ClimateParameter, to: f64) -> AnimationConfig {
        AnimationConfig {
            parameter,
            from: 0.0,
            to,
            step: 1.0,
            interval_ms: 10,
        }
    }

    fn controller() -> SceneController {
        SceneController::new(vec![
            SceneDescriptor::new(1).with_reset(),
            SceneDescriptor::new(2).with_animation(sweep(ClimateParameter::Temp, 4.0)),
            SceneDescriptor::new(3).with_animation(sweep(ClimateParameter::Co2, 100.0)),
            SceneDescriptor::new(4).with_view(ViewKind::WorstByTaxon),
        ])
    }

    fn run(controller: &mut SceneController, params: &mut ClimateParameters, ms: u64) -> Vec<Tick> {
        let mut ticks = Vec::new();
        controller.advance(Duration::from_millis(ms), params, &mut |_, t| ticks.push(t));
        ticks
    }

    #[test]
    fn test_unknown_step_is_ignored() {
        let mut controller = controller();
        let mut params = ClimateParameters::new(1.0, 2.0, 3.0);
        assert!(controller.enter_step(99, &mut params).is_none());
        assert_eq!(controller.current_step(), None);
        assert_eq!(params, ClimateParameters::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_animation_drives_parameter_to_end() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();
        let setup = controller.enter_step(2, &mut params).unwrap();
        assert!(setup.started.is_some());
        assert_eq!(controller.status(2), Some(SceneStatus::Running));
        assert_eq!(controller.animating(), Some(ClimateParameter::Temp));
        assert_eq!(controller.animator_state(), AnimatorState::Running);

        let ticks = run(&mut controller, &mut params, 1_000);
        assert_eq!(ticks.len(), 4);
        assert_eq!(params.temp, 4.0);
        assert_eq!(controller.status(2), Some(SceneStatus::Done));
        assert_eq!(controller.animating(), None);
        assert_eq!(controller.animator_state(), AnimatorState::Idle);
    }

    #[test]
    fn test_reentry_does_not_restart_animation() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();

        controller.enter_step(2, &mut params).unwrap();
        run(&mut controller, &mut params, 20);
        assert_eq!(params.temp, 2.0);

        let setup = controller.enter_step(3, &mut params).unwrap();
        assert!(setup.started.is_some());
        assert_eq!(controller.status(2), Some(SceneStatus::Done));

        let setup = controller.enter_step(2, &mut params).unwrap();
        assert!(setup.started.is_none());
        assert_eq!(controller.animating(), None);
        assert_eq!(params.temp, 2.0);
        assert!(run(&mut controller, &mut params, 1_000).is_empty());
    }

    #[test]
    fn test_scene_change_silences_previous_animation() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();

        controller.enter_step(2, &mut params).unwrap();
        run(&mut controller, &mut params, 10);
        let temp_at_switch = params.temp;

        let setup = controller.enter_step(3, &mut params).unwrap();
        let second = setup.started.unwrap();
        let ticks = run(&mut controller, &mut params, 50);
        assert!(ticks.iter().all(|t| t.animation == second));
        assert_eq!(params.temp, temp_at_switch);
        assert_eq!(params.co2, 5.0);

        controller.enter_step(4, &mut params).unwrap();
        assert_eq!(controller.animator_state(), AnimatorState::Idle);
        assert_eq!(controller.status(3), Some(SceneStatus::Done));
    }

    #[test]
    fn test_descriptors_in_step_order() {
        let controller = SceneController::new(vec![
            SceneDescriptor::new(3),
            SceneDescriptor::new(1),
            SceneDescriptor::new(2),
        ]);
        let steps: Vec<u32> = controller.descriptors().map(|d| d.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn test_jitter_keeps_running_animation() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();

        let first = controller.enter_step(2, &mut params).unwrap().started;
        run(&mut controller, &mut params, 10);
        controller.exit_step(2);
        let again = controller.enter_step(2, &mut params).unwrap();
        assert!(again.started.is_none());
        assert_eq!(controller.status(2), Some(SceneStatus::Running));

        let ticks = run(&mut controller, &mut params, 1_000);
        assert!(ticks.iter().all(|t| Some(t.animation) == first));
        assert_eq!(params.temp, 4.0);
    }

    #[test]
    fn test_reset_scene_clears_guards_and_parameters() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();

        controller.enter_step(2, &mut params).unwrap();
        run(&mut controller, &mut params, 1_000);
        assert_eq!(controller.status(2), Some(SceneStatus::Done));

        let setup = controller.enter_step(1, &mut params).unwrap();
        assert!(setup.reset);
        assert_eq!(params, ClimateParameters::zero());
        assert_eq!(controller.status(2), Some(SceneStatus::NotVisited));

        let setup = controller.enter_step(2, &mut params).unwrap();
        assert!(setup.started.is_some());
    }

    #[test]
    fn test_pinned_values_apply_on_entry() {
        let mut scene = SceneDescriptor::new(1);
        scene.set.push(ParameterValue {
            parameter: ClimateParameter::HabitatLoss,
            value: 30.0,
        });
        let mut controller = SceneController::new(vec![scene]);
        let mut params = ClimateParameters::zero();
        controller.enter_step(1, &mut params).unwrap();
        assert_eq!(params.habitat_loss, 30.0);
    }

    #[test]
    fn test_exit_only_clears_matching_step() {
        let mut controller = controller();
        let mut params = ClimateParameters::zero();
        controller.enter_step(4, &mut params).unwrap();
        assert!(!controller.exit_step(3));
        assert_eq!(controller.current_step(), Some(4));
        assert!(controller.exit_step(4));
        assert_eq!(controller.current_step(), None);
    }
}
