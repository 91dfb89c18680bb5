//! The story runtime: one owner for all mutable state.
//!
//! [`StoryRuntime`] holds the dataset, the climate parameters, the taxon
//! filter, the scene controller and the renderer. Every input source (scroll
//! observer, sliders, checkboxes, the animation clock) goes through one of its
//! methods, and every method that changes state ends by recomputing the
//! aggregate and rendering it.

use std::time::Duration;

use crate::aggregate::{recompute, ViewKind};
use crate::config::{ParameterBounds, StoryConfig};
use crate::filter::FilterState;
use crate::render::{RenderReason, Renderer, ViewModel};
use crate::risk::{ClimateParameter, ClimateParameters};
use crate::scene::{SceneController, SceneSetup};
use crate::species::SpeciesRecord;

/// Mutable scenario state shared by the input handlers and the scoring pass.
#[derive(Debug, Clone)]
pub struct StoryContext {
    pub records: Vec<SpeciesRecord>,
    pub params: ClimateParameters,
    pub filter: FilterState,
}

impl StoryContext {
    pub fn new(records: Vec<SpeciesRecord>) -> Self {
        let filter = FilterState::from_records(&records);
        Self {
            records,
            params: ClimateParameters::zero(),
            filter,
        }
    }
}

/// Which aggregate the active scene asked for.
#[derive(Debug, Clone, Copy)]
struct ViewRequest {
    kind: ViewKind,
    apply_filter: bool,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            kind: ViewKind::CategoryByTaxon,
            apply_filter: true,
        }
    }
}

/// Build the view model for the current state.
///
/// Kept free of `self` so it can run inside the animation tick callback while
/// the scene controller holds the parameters mutably.
fn build_view(
    sequence: u64,
    reason: RenderReason,
    step: Option<u32>,
    records: &[SpeciesRecord],
    filter: &FilterState,
    params: &ClimateParameters,
    request: ViewRequest,
) -> ViewModel {
    let view = if request.apply_filter {
        recompute(filter.apply(records), filter.included_taxa(), params, request.kind)
    } else {
        recompute(records, filter.known_taxa(), params, request.kind)
    };

    ViewModel {
        sequence,
        reason,
        step,
        params: *params,
        included_taxa: filter.included_taxa().iter().cloned().collect(),
        filtered: request.apply_filter,
        view,
    }
}

/// Drives a story over a dataset and renders every state change.
pub struct StoryRuntime<R: Renderer> {
    context: StoryContext,
    scenes: SceneController,
    bounds: ParameterBounds,
    request: ViewRequest,
    renderer: R,
    sequence: u64,
}

impl<R: Renderer> StoryRuntime<R> {
    /// Build a runtime and render the initial state.
    ///
    /// An empty dataset is valid; every aggregate is then zero.
    pub fn new(records: Vec<SpeciesRecord>, config: StoryConfig, renderer: R) -> Self {
        if records.is_empty() {
            log::warn!("Starting story with an empty dataset");
        }
        let mut runtime = Self {
            context: StoryContext::new(records),
            scenes: SceneController::new(config.scenes),
            bounds: config.bounds,
            request: ViewRequest::default(),
            renderer,
            sequence: 0,
        };
        runtime.refresh(RenderReason::Startup);
        runtime
    }

    pub fn params(&self) -> ClimateParameters {
        self.context.params
    }

    pub fn scenes(&self) -> &SceneController {
        &self.scenes
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Number of view models rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.sequence
    }

    /// Scroll observer: a step came into view.
    ///
    /// Returns the setup that ran, or `None` for an unknown step.
    pub fn on_step_enter(&mut self, step: u32) -> Option<SceneSetup> {
        let setup = self.scenes.enter_step(step, &mut self.context.params)?;
        self.request = ViewRequest {
            kind: setup.view,
            apply_filter: setup.apply_filter,
        };
        self.refresh(RenderReason::SceneEnter);
        Some(setup)
    }

    /// Scroll observer: a step left the view.
    pub fn on_step_exit(&mut self, step: u32) {
        self.scenes.exit_step(step);
    }

    /// Slider input. Stops any running animation, then writes the clamped value.
    pub fn set_parameter(&mut self, parameter: ClimateParameter, value: f64) {
        if self.scenes.cancel_animation() {
            log::debug!("Slider on {} took over from the running animation", parameter);
        }
        let clamped = self.bounds.clamp(parameter, value);
        if clamped != value {
            log::debug!("Clamped {} from {} to {}", parameter, value, clamped);
        }
        self.context.params.set(parameter, clamped);
        self.refresh(RenderReason::Slider);
    }

    /// Checkbox input. Unknown taxa are ignored, but the view is still refreshed.
    pub fn toggle_taxon(&mut self, taxon: &str, included: bool) {
        self.context.filter.toggle(taxon, included);
        self.refresh(RenderReason::Filter);
    }

    /// Let `elapsed` pass on the animation clock, rendering every tick.
    ///
    /// Returns the number of ticks.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        let step = self.scenes.current_step();
        let request = self.request;
        let records = &self.context.records;
        let filter = &self.context.filter;
        let renderer = &mut self.renderer;
        let sequence = &mut self.sequence;

        self.scenes
            .advance(elapsed, &mut self.context.params, &mut |params, _tick| {
                let view = build_view(
                    *sequence,
                    RenderReason::AnimationTick,
                    step,
                    records,
                    filter,
                    params,
                    request,
                );
                *sequence += 1;
                renderer.render(&view);
            })
    }

    fn refresh(&mut self, reason: RenderReason) {
        let view = build_view(
            self.sequence,
            reason,
            self.scenes.current_step(),
            &self.context.records,
            &self.context.filter,
            &self.context.params,
            self.request,
        );
        self.sequence += 1;
        self.renderer.render(&view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateView;
    use crate::category::Category;
    use crate::render::RecordingRenderer;
    use crate::scene::{AnimationConfig, SceneDescriptor};

    fn config() -> StoryConfig {
        StoryConfig {
            title: "test".to_string(),
            bounds: ParameterBounds::default(),
            scenes: vec![
                SceneDescriptor::new(1).with_reset(),
                SceneDescriptor::new(2).with_animation(AnimationConfig {
                    parameter: ClimateParameter::Temp,
                    from: 0.0,
                    to: 2.0,
                    step: 0.5,
                    interval_ms: 10,
                }),
                SceneDescriptor::new(3).with_view(ViewKind::WorstByTaxon),
            ],
        }
    }

    fn records() -> Vec<SpeciesRecord> {
        vec![
            SpeciesRecord::new("aves", 0.5, 1.0, 0.0, 0.0),
            SpeciesRecord::new("amphibia", 4.0, 1.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_startup_renders_once() {
        let runtime = StoryRuntime::new(records(), config(), RecordingRenderer::new());
        assert_eq!(runtime.renderer().frames.len(), 1);
        assert_eq!(runtime.renderer().frames[0].reason, RenderReason::Startup);
    }

    #[test]
    fn test_animation_ticks_render_and_reach_target() {
        let mut runtime = StoryRuntime::new(records(), config(), RecordingRenderer::new());
        runtime.on_step_enter(2).unwrap();
        let ticks = runtime.advance(Duration::from_secs(1));
        assert_eq!(ticks, 4);
        assert_eq!(runtime.params().temp, 2.0);

        let frames = &runtime.renderer().frames;
        let tick_frames = frames
            .iter()
            .filter(|f| f.reason == RenderReason::AnimationTick)
            .count();
        assert_eq!(tick_frames, 4);

        // 0.5 + 2 = 2.5 is VU; 4.0 + 2 = 6.0 is EX.
        let AggregateView::CategoryByTaxon { totals, .. } = &frames.last().unwrap().view else {
            panic!("expected category view");
        };
        assert_eq!(totals[&Category::VU], 1);
        assert_eq!(totals[&Category::EX], 1);

        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn test_slider_stops_animation_and_clamps() {
        let mut runtime = StoryRuntime::new(records(), config(), RecordingRenderer::new());
        runtime.on_step_enter(2).unwrap();
        runtime.advance(Duration::from_millis(10));

        runtime.set_parameter(ClimateParameter::Temp, 50.0);
        assert_eq!(runtime.params().temp, ParameterBounds::default().temp_max);
        assert_eq!(runtime.advance(Duration::from_secs(1)), 0);
        assert_eq!(runtime.params().temp, ParameterBounds::default().temp_max);

        runtime.set_parameter(ClimateParameter::Co2, -3.0);
        assert_eq!(runtime.params().co2, 0.0);
    }

    #[test]
    fn test_filter_applies_only_to_filtered_scenes() {
        let mut config = config();
        config.scenes[2].apply_filter = false;
        let mut runtime = StoryRuntime::new(records(), config, RecordingRenderer::new());
        runtime.set_parameter(ClimateParameter::Temp, 2.0);

        runtime.toggle_taxon("Amphibia", false);
        let last = runtime.renderer().last().unwrap();
        assert_eq!(last.reason, RenderReason::Filter);
        assert_eq!(last.view.counted(), 1);
        assert_eq!(last.included_taxa, vec!["aves".to_string()]);

        runtime.on_step_enter(3).unwrap();
        let last = runtime.renderer().last().unwrap();
        assert!(!last.filtered);
        // amphibia at 6.0 is counted even though it is unchecked.
        assert_eq!(last.view.counted(), 1);
        match &last.view {
            AggregateView::WorstByTaxon { taxa, .. } => {
                assert_eq!(taxa.len(), 2);
                assert_eq!(taxa[0].taxon, "amphibia");
                assert_eq!(taxa[0].count, 1);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_unknown_step_renders_nothing() {
        let mut runtime = StoryRuntime::new(records(), config(), RecordingRenderer::new());
        assert!(runtime.on_step_enter(42).is_none());
        assert_eq!(runtime.frames_rendered(), 1);
    }

    #[test]
    fn test_empty_dataset_renders_zero_aggregates() {
        let mut runtime = StoryRuntime::new(Vec::new(), config(), RecordingRenderer::new());
        runtime.on_step_enter(2).unwrap();
        runtime.advance(Duration::from_secs(1));
        runtime.on_step_enter(3).unwrap();
        for frame in &runtime.renderer().frames {
            assert_eq!(frame.view.counted(), 0);
        }
    }

    #[test]
    fn test_reset_scene_zeroes_parameters() {
        let mut runtime = StoryRuntime::new(records(), config(), RecordingRenderer::new());
        runtime.set_parameter(ClimateParameter::HabitatLoss, 40.0);
        runtime.on_step_enter(1).unwrap();
        assert_eq!(runtime.params(), ClimateParameters::zero());
    }
}
