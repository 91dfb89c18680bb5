//! Headless playback of recorded input.
//!
//! A [`PlaybackScript`] is a list of scroll, slider, checkbox and wait events
//! as they would arrive from a page. [`run_playback`] feeds them to a
//! [`StoryRuntime`] and advances the animation clock in fixed frames during
//! waits, so a whole session replays deterministically without a browser.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::StoryConfig;
use crate::render::Renderer;
use crate::risk::ClimateParameter;
use crate::story::StoryRuntime;

fn default_frame_ms() -> u64 {
    16
}

/// One input event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StoryEvent {
    StepEnter { step: u32 },
    StepExit { step: u32 },
    #[serde(rename_all = "camelCase")]
    Slider { parameter: ClimateParameter, value: f64 },
    Toggle { taxon: String, included: bool },
    /// Let time pass on the animation clock.
    Wait { ms: u64 },
}

/// A recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackScript {
    /// Clock granularity used while waiting.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    pub events: Vec<StoryEvent>,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to read playback script {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse playback script {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write playback metadata {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PlaybackScript {
    pub fn from_file(path: &Path) -> Result<Self, PlaybackError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PlaybackError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| PlaybackError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A reader scrolling straight through every scene, pausing `dwell_ms` on each.
    pub fn scroll_through(config: &StoryConfig, dwell_ms: u64) -> Self {
        let mut steps: Vec<u32> = config.scenes.iter().map(|s| s.step).collect();
        steps.sort_unstable();

        let mut events = Vec::with_capacity(steps.len() * 3);
        for step in steps {
            events.push(StoryEvent::StepEnter { step });
            events.push(StoryEvent::Wait { ms: dwell_ms });
            events.push(StoryEvent::StepExit { step });
        }

        Self {
            frame_ms: default_frame_ms(),
            events,
        }
    }
}

/// Counters from one playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSummary {
    pub events: usize,
    pub ignored_steps: usize,
    pub ticks: usize,
    pub frames: u64,
    /// Virtual time covered by waits.
    pub virtual_ms: u64,
}

/// Replay `script` against `runtime`.
pub fn run_playback<R: Renderer>(
    runtime: &mut StoryRuntime<R>,
    script: &PlaybackScript,
) -> PlaybackSummary {
    let frame = Duration::from_millis(script.frame_ms.max(1));
    let mut summary = PlaybackSummary::default();

    for event in &script.events {
        summary.events += 1;
        match event {
            StoryEvent::StepEnter { step } => {
                if runtime.on_step_enter(*step).is_none() {
                    summary.ignored_steps += 1;
                }
            }
            StoryEvent::StepExit { step } => runtime.on_step_exit(*step),
            StoryEvent::Slider { parameter, value } => runtime.set_parameter(*parameter, *value),
            StoryEvent::Toggle { taxon, included } => runtime.toggle_taxon(taxon, *included),
            StoryEvent::Wait { ms } => {
                let mut remaining = Duration::from_millis(*ms);
                while !remaining.is_zero() {
                    let slice = remaining.min(frame);
                    summary.ticks += runtime.advance(slice);
                    remaining -= slice;
                }
                summary.virtual_ms += ms;
            }
        }
    }

    summary.frames = runtime.frames_rendered();
    log::info!(
        "Playback finished: {} events, {} ticks, {} frames",
        summary.events,
        summary.ticks,
        summary.frames
    );
    summary
}

/// Metadata for a completed playback, written alongside the frames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackMetadata {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub wall_duration_secs: f64,
    pub story_title: String,
    pub species_count: usize,
    /// SHA-256 of the dataset file, when one was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<String>,
    pub summary: PlaybackSummary,
    pub version: String,
}

impl PlaybackMetadata {
    /// SHA-256 of a file, hex encoded.
    pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
        let bytes = std::fs::read(path)?;
        Ok(Self::hash_bytes(&bytes))
    }

    pub fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    pub fn save(&self, path: &Path) -> Result<(), PlaybackError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| PlaybackError::Write {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        std::fs::write(path, json).map_err(|source| PlaybackError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Wall-clock bookkeeping for [`PlaybackMetadata`].
pub struct PlaybackTimer {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl PlaybackTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn finish(
        self,
        story_title: &str,
        species_count: usize,
        dataset_hash: Option<String>,
        summary: PlaybackSummary,
    ) -> PlaybackMetadata {
        PlaybackMetadata {
            started_at: self.started_at,
            completed_at: Utc::now(),
            wall_duration_secs: self.started.elapsed().as_secs_f64(),
            story_title: story_title.to_string(),
            species_count,
            dataset_hash,
            summary,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
