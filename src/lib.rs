//! Climate-adjusted extinction risk for a scroll-driven story.
//!
//! Species are scored against a climate scenario, classified into six
//! IUCN-style categories and summarised for a renderer. A [`StoryRuntime`]
//! ties the scoring to a narrative: scroll steps select scenes, scenes sweep
//! climate parameters through animations, and slider or checkbox input
//! feeds straight into the same recomputation.

pub mod aggregate;
pub mod animator;
pub mod category;
pub mod config;
pub mod filter;
pub mod playback;
pub mod render;
pub mod risk;
pub mod scene;
pub mod species;
pub mod story;

pub mod cli;

pub use aggregate::{recompute, score_all, AggregateView, ScoredSpecies, ViewKind};
pub use animator::{AnimationHandle, AnimationSpec, AnimatorState, ParameterAnimator, Tick};
pub use category::{classify, Category};
pub use config::{ConfigError, ParameterBounds, StoryConfig};
pub use filter::FilterState;
pub use render::{JsonLinesRenderer, RecordingRenderer, RenderReason, Renderer, ViewModel};
pub use risk::{score, ClimateParameter, ClimateParameters};
pub use scene::{SceneController, SceneDescriptor, SceneSetup, SceneStatus};
pub use species::{load_species, load_species_or_empty, read_species, LoadError, SpeciesRecord};
pub use story::{StoryContext, StoryRuntime};
