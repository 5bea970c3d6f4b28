//! Command-line surface.
//!
//! Each subcommand loads its inputs, runs one engine operation and saves the
//! result. Backend configuration is only read by subcommands that call the
//! generation backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use tracing::{debug, info};

use crate::authoring::{LlmAuthor, TextAuthor};
use crate::backend::GenerationClient;
use crate::config::{CheckpointConfig, Config};
use crate::error::AppResult;
use crate::expansion::{BranchExpander, ExpansionParams};
use crate::media::{
    ImageSettings, ImageStrategy, ImageWorld, ImageWorldGenerator, JsonSnapshot, VideoSettings,
    VideoStrategy, VideoWorld, VideoWorldGenerator,
};
use crate::render::HttpRenderer;
use crate::storage::open_checkpoint_store;
use crate::world::World;

/// Curator subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Author a linear world from an initial and a goal description
    Linear {
        /// Scenario name, used as the world name prefix
        #[arg(long)]
        scenario: String,

        /// Description of the initial state
        #[arg(long)]
        initial: String,

        /// Description of the goal state
        #[arg(long)]
        goal: String,

        /// Number of intermediate steps
        #[arg(long, default_value = "5")]
        steps: usize,

        /// Extra guidance for the author
        #[arg(long)]
        context: Option<String>,

        /// Output world file
        #[arg(long)]
        out: PathBuf,
    },

    /// Expand a linear world into a branching world
    Expand {
        /// Linear world file
        #[arg(long)]
        input: PathBuf,

        /// Output world file
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "20")]
        total_states: usize,

        #[arg(long, default_value = "3")]
        success_endings: usize,

        #[arg(long, default_value = "2")]
        failure_endings: usize,

        #[arg(long, default_value = "3")]
        branching_points: usize,

        #[arg(long, default_value = "5")]
        max_deviation_steps: usize,
    },

    /// Print the path structure of a world
    Analyze {
        /// World file
        #[arg(long)]
        input: PathBuf,
    },

    /// Render state images for a world
    Images {
        /// Text world file
        #[arg(long)]
        input: PathBuf,

        /// Output image world file
        #[arg(long)]
        out: PathBuf,

        /// canonical_path or full_world
        #[arg(long, default_value = "full_world")]
        strategy: ImageStrategy,

        /// Image world saved by an interrupted run
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Render transition videos for an image world
    Videos {
        /// Image world file
        #[arg(long)]
        input: PathBuf,

        /// Output video world file
        #[arg(long)]
        out: PathBuf,

        /// all_transitions or canonical_only
        #[arg(long, default_value = "all_transitions")]
        strategy: VideoStrategy,

        /// Video world saved by an interrupted run
        #[arg(long)]
        resume: Option<PathBuf>,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create a failure result with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a curator command.
///
/// Errors are returned for failures that stop the command. Render failures
/// do not: the partial media world is saved and the result carries exit
/// code 1.
pub async fn execute_command(command: Commands) -> AppResult<CliResult> {
    match command {
        Commands::Linear {
            scenario,
            initial,
            goal,
            steps,
            context,
            out,
        } => {
            let config = Config::from_env()?;
            let author = llm_author(&config)?;
            let draft = author
                .author_linear_world(
                    &scenario,
                    &initial,
                    &goal,
                    steps,
                    context.as_deref().unwrap_or_default(),
                )
                .await?;

            let description = format!("{} -> {}", initial, goal);
            let world =
                World::from_linear_authoring(&scenario, &description, draft.states, draft.steps)?;
            world.validate()?;
            world.save(&out).await?;

            Ok(CliResult::success(format!(
                "Saved linear world {} ({} states) to {}",
                world.name,
                world.state_count(),
                out.display()
            )))
        }

        Commands::Expand {
            input,
            out,
            total_states,
            success_endings,
            failure_endings,
            branching_points,
            max_deviation_steps,
        } => {
            let config = Config::from_env()?;
            let linear = World::load(&input).await?;
            linear.validate()?;
            let params = ExpansionParams::default()
                .with_total_states(total_states)
                .with_endings(success_endings, failure_endings)
                .with_branching_points(branching_points)
                .with_max_deviation_steps(max_deviation_steps);

            let expander = BranchExpander::new(Arc::new(llm_author(&config)?));
            let expansion = expander.expand_to_branching_world(&linear, &params).await?;
            expansion.world.save(&out).await?;
            debug!(report = %expansion.world.path_report()?, "Branching world paths");

            let report = expansion.report;
            Ok(CliResult::success(format!(
                "Saved branching world {} to {}: {} states, {} transitions, {} successful and {} failed paths, {} abandoned branch points",
                expansion.world.name,
                out.display(),
                report.states,
                report.transitions,
                report.successful_paths,
                report.failed_paths,
                report.abandoned_branches.len()
            )))
        }

        Commands::Analyze { input } => {
            let world = World::load(&input).await?;
            world.validate()?;
            let report = world.path_report()?;
            Ok(CliResult::success(report.to_string()))
        }

        Commands::Images {
            input,
            out,
            strategy,
            resume,
        } => {
            let config = Config::from_env()?;
            let world = World::load(&input).await?;
            world.validate()?;
            let checkpoints = open_checkpoint_store(&checkpoint_for(&config.checkpoint, "images"))
                .await?;

            let mut generator = ImageWorldGenerator::new(
                Arc::new(http_renderer(&config)?),
                checkpoints,
                ImageSettings::from(&config.render),
            )
            .with_source(input.display().to_string())
            .with_progress_sink(Arc::new(JsonSnapshot::new(&out)));
            if let Some(previous) = resume {
                generator = generator.with_resume_from(ImageWorld::load(&previous).await?);
            }

            let image_world = generator.generate(&world, strategy).await?;
            image_world.save(&out).await?;

            let summary = image_world.summary();
            let message = format!(
                "Saved image world {} to {}: {} rendered, {} failed",
                image_world.name,
                out.display(),
                summary.completed,
                summary.failed
            );
            Ok(finish(summary.has_failures(), message))
        }

        Commands::Videos {
            input,
            out,
            strategy,
            resume,
        } => {
            let config = Config::from_env()?;
            let image_world = ImageWorld::load(&input).await?;
            let checkpoints = open_checkpoint_store(&checkpoint_for(&config.checkpoint, "videos"))
                .await?;

            let mut generator = VideoWorldGenerator::new(
                Arc::new(http_renderer(&config)?),
                checkpoints,
                VideoSettings::from(&config.render),
            )
            .with_progress_sink(Arc::new(JsonSnapshot::new(&out)));
            if let Some(previous) = resume {
                generator = generator.with_resume_from(VideoWorld::load(&previous).await?);
            }

            let video_world = generator.generate(&image_world, strategy).await?;
            video_world.save(&out).await?;

            let summary = video_world.summary();
            let message = format!(
                "Saved video world {} to {}: {} rendered, {} failed, {} skipped",
                video_world.name,
                out.display(),
                summary.completed,
                summary.failed,
                summary.skipped
            );
            Ok(finish(summary.has_failures(), message))
        }
    }
}

fn finish(has_failures: bool, message: String) -> CliResult {
    if has_failures {
        CliResult::failure(message)
    } else {
        CliResult::success(message)
    }
}

fn generation_client(config: &Config) -> AppResult<GenerationClient> {
    let client = GenerationClient::new(&config.backend, config.request.clone())?;
    info!(base_url = %config.backend.base_url, "Generation client initialized");
    Ok(client)
}

fn llm_author(config: &Config) -> AppResult<LlmAuthor> {
    Ok(LlmAuthor::new(
        generation_client(config)?,
        &config.backend.text_model,
    ))
}

fn http_renderer(config: &Config) -> AppResult<HttpRenderer> {
    Ok(HttpRenderer::new(
        generation_client(config)?,
        &config.backend.image_model,
        &config.backend.video_model,
    ))
}

/// Per-layer ledger path: `progress.json` becomes `progress_images.json`
fn checkpoint_for(config: &CheckpointConfig, layer: &str) -> CheckpointConfig {
    let path = with_stem_suffix(&config.path, layer);
    CheckpointConfig {
        backend: config.backend.clone(),
        path,
    }
}

fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "progress".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckpointBackend;

    #[test]
    fn test_checkpoint_paths_are_split_per_layer() {
        let config = CheckpointConfig {
            backend: CheckpointBackend::Json,
            path: PathBuf::from("./data/progress.json"),
        };
        assert_eq!(
            checkpoint_for(&config, "images").path,
            PathBuf::from("./data/progress_images.json")
        );
        assert_eq!(
            with_stem_suffix(Path::new("ledger"), "videos"),
            PathBuf::from("ledger_videos")
        );
    }

    #[test]
    fn test_finish_sets_exit_code() {
        assert_eq!(finish(false, "ok".to_string()).exit_code, 0);
        assert_eq!(finish(true, "partial".to_string()).exit_code, 1);
    }
}
