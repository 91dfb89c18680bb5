use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::{recompute, ViewKind};
use crate::config::StoryConfig;
use crate::filter::FilterState;
use crate::playback::{run_playback, PlaybackMetadata, PlaybackScript, PlaybackTimer};
use crate::render::JsonLinesRenderer;
use crate::risk::ClimateParameters;
use crate::scene::SceneController;
use crate::species::{load_species, load_species_or_empty};
use crate::story::StoryRuntime;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the dataset under one climate scenario and print the aggregate
    Score {
        /// Species CSV file
        #[arg(long)]
        data: PathBuf,

        /// Warming in °C
        #[arg(long, default_value_t = 0.0)]
        temp: f64,

        /// Habitat loss in percent
        #[arg(long, default_value_t = 0.0)]
        habitat_loss: f64,

        /// Additional CO2 in ppm
        #[arg(long, default_value_t = 0.0)]
        co2: f64,

        /// Aggregate to print: "category" or "worst"
        #[arg(long, default_value = "category")]
        view: ViewKind,

        /// Taxa to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// List the scenes of a story
    Scenes {
        /// Story config JSON (defaults to the built-in story)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replay scroll and input events and write every view model as JSON lines
    Play {
        /// Species CSV file
        #[arg(long)]
        data: PathBuf,

        /// Story config JSON (defaults to the built-in story)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Recorded event script; without one, every scene is scrolled through in order
        #[arg(long)]
        script: Option<PathBuf>,

        /// Time spent on each scene when no script is given
        #[arg(long, default_value_t = 5_000)]
        dwell_ms: u64,

        /// Output file for view models (defaults to stdout)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write playback metadata JSON here
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score { data, temp, habitat_loss, co2, view, exclude } => {
            score(&data, ClimateParameters::new(temp, habitat_loss, co2), view, &exclude)?;
        }
        Commands::Scenes { config } => {
            list_scenes(config.as_deref())?;
        }
        Commands::Play { data, config, script, dwell_ms, out, metadata } => {
            play(&data, config.as_deref(), script.as_deref(), dwell_ms, out.as_deref(), metadata.as_deref())?;
        }
    }
    Ok(())
}

fn score(data: &Path, params: ClimateParameters, view: ViewKind, exclude: &[String]) -> Result<()> {
    let records = load_species(data).with_context(|| format!("Could not score {:?}", data))?;

    let mut filter = FilterState::from_records(&records);
    for taxon in exclude {
        if !filter.toggle(taxon, false) {
            log::warn!("Taxon {:?} is not in the dataset", taxon);
        }
    }

    let aggregate = recompute(filter.apply(&records), filter.included_taxa(), &params, view);
    let json = serde_json::to_string_pretty(&aggregate)?;
    println!("{}", json);
    Ok(())
}

fn list_scenes(config: Option<&Path>) -> Result<()> {
    let config = StoryConfig::load(config)?;
    println!("{}", config.title);
    let controller = SceneController::new(config.scenes);
    for scene in controller.descriptors() {
        let animation = match &scene.animate {
            Some(a) => format!("{} {} -> {} by {} every {}ms", a.parameter, a.from, a.to, a.step, a.interval_ms),
            None => "-".to_string(),
        };
        println!(
            "{:>3}  {:<32} {:?}{}{}  {}",
            scene.step,
            scene.title,
            scene.view,
            if scene.reset { " reset" } else { "" },
            if scene.apply_filter { "" } else { " unfiltered" },
            animation
        );
    }
    Ok(())
}

fn play(
    data: &Path,
    config: Option<&Path>,
    script: Option<&Path>,
    dwell_ms: u64,
    out: Option<&Path>,
    metadata: Option<&Path>,
) -> Result<()> {
    let config = StoryConfig::load(config)?;
    let script = match script {
        Some(path) => PlaybackScript::from_file(path)?,
        None => PlaybackScript::scroll_through(&config, dwell_ms),
    };

    // A missing or broken dataset still plays, with empty aggregates.
    let records = load_species_or_empty(data);
    let species_count = records.len();
    let dataset_hash = PlaybackMetadata::hash_file(data).ok();

    let writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Could not create {:?}", path))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let timer = PlaybackTimer::start();
    let title = config.title.clone();
    let mut runtime = StoryRuntime::new(records, config, JsonLinesRenderer::new(writer));
    let summary = run_playback(&mut runtime, &script);

    let failures = runtime.renderer().failures();
    if failures > 0 {
        anyhow::bail!("{} view models could not be written", failures);
    }
    runtime
        .into_renderer()
        .finish()
        .context("Could not flush view models")?;

    if let Some(path) = metadata {
        let meta = timer.finish(&title, species_count, dataset_hash, summary);
        meta.save(path)?;
        log::info!("Wrote playback metadata to {:?}", path);
    }
    Ok(())
}
