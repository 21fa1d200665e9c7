//! Pipeline orchestration.
//!
//! One run walks the state machine
//! `Idle → Scraping → LoadingRaw → Transforming → Enriching →
//! LoadingDetections → Idle`, invoking exactly one typed stage per state.
//! The first stage failure transitions to `Failed` and aborts the run; no
//! stage is retried and no partial continuation happens. Re-invocation is
//! safe because both loaders are idempotent.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::detect::{ObjectDetector, YoloDetector};
use crate::detection_loader::{self, DetectionLoadSummary};
use crate::enrich::{self, EnrichSummary};
use crate::error::{PipelineError, Result};
use crate::logging::OperationTimer;
use crate::metrics as pipeline_metrics;
use crate::raw_loader::{self, LoadSummary};
use crate::transform::TransformRunner;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Scraping,
    LoadingRaw,
    Transforming,
    Enriching,
    LoadingDetections,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scraping => "scraping",
            Self::LoadingRaw => "loading-raw",
            Self::Transforming => "transforming",
            Self::Enriching => "enriching",
            Self::LoadingDetections => "loading-detections",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Opaque-producer boundary for the scrape step.
pub trait Scraper {
    fn scrape(&self) -> Result<()>;
}

/// Runs a configured external scraper command.
pub struct CommandScraper {
    command: String,
}

impl CommandScraper {
    /// Build from configuration; `None` when no command is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config
            .scrape
            .command
            .as_ref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| Self { command: c.clone() })
    }
}

impl Scraper for CommandScraper {
    fn scrape(&self) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::InvalidConfig("scrape.command is empty".to_string()))?;

        info!("Running scrape command: {}", self.command);
        let status = Command::new(program)
            .args(parts)
            .status()
            .map_err(|e| PipelineError::Scrape(format!("{}: {e}", self.command)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::Scrape(format!(
                "{} exited with {status}",
                self.command
            )))
        }
    }
}

/// Aggregated outcome of one successful run.
#[derive(Debug)]
pub struct RunReport {
    pub raw: LoadSummary,
    pub enrich: EnrichSummary,
    pub detections: DetectionLoadSummary,
    pub duration: Duration,
}

/// Sequential single-run orchestrator.
///
/// Stages execute strictly in order, each blocking until its call completes
/// or fails. Run-level mutual exclusion between concurrent invocations is
/// the external scheduler's responsibility.
pub struct Pipeline {
    config: AppConfig,
    scraper: Option<Box<dyn Scraper>>,
    transform: Box<dyn TransformRunner>,
    detector: Box<dyn ObjectDetector>,
    state: PipelineState,
}

impl Pipeline {
    /// Assemble a pipeline with explicit collaborators.
    pub fn new(
        config: AppConfig,
        scraper: Option<Box<dyn Scraper>>,
        transform: Box<dyn TransformRunner>,
        detector: Box<dyn ObjectDetector>,
    ) -> Self {
        Self {
            config,
            scraper,
            transform,
            detector,
            state: PipelineState::Idle,
        }
    }

    /// Assemble the production pipeline from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let scraper = CommandScraper::from_config(config)
            .map(|s| Box::new(s) as Box<dyn Scraper>);
        let transform = crate::transform::from_config(config);
        let detector = Box::new(YoloDetector::from_config(&config.detection)?);
        Ok(Self::new(config.clone(), scraper, transform, detector))
    }

    /// Current orchestrator state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Execute one full run.
    pub fn run(&mut self) -> Result<RunReport> {
        let timer = OperationTimer::new("pipeline_run");
        let start = std::time::Instant::now();

        match self.run_stages() {
            Ok((raw, enrich, detections)) => {
                self.state = PipelineState::Idle;
                pipeline_metrics::record_run(true);
                let duration = start.elapsed();
                timer.finish();
                info!("Pipeline run completed in {:.1}s", duration.as_secs_f64());
                Ok(RunReport {
                    raw,
                    enrich,
                    detections,
                    duration,
                })
            }
            Err(e) => {
                error!("Pipeline run failed in state {}: {}", self.state, e);
                self.state = PipelineState::Failed;
                pipeline_metrics::record_run(false);
                Err(e)
            }
        }
    }

    fn run_stages(&mut self) -> Result<(LoadSummary, EnrichSummary, DetectionLoadSummary)> {
        self.enter(PipelineState::Scraping);
        match &self.scraper {
            Some(scraper) => scraper.scrape()?,
            None => debug!("No scrape command configured; stage passes through"),
        }

        self.enter(PipelineState::LoadingRaw);
        let raw = raw_loader::load_raw_messages(&self.config)?;

        self.enter(PipelineState::Transforming);
        info!("Running {} transform", self.transform.name());
        self.transform.run(&self.config)?;

        self.enter(PipelineState::Enriching);
        let enrich = enrich::enrich_images(&self.config, self.detector.as_mut())?;

        self.enter(PipelineState::LoadingDetections);
        let detections = detection_loader::load_detections(&self.config)?;

        Ok((raw, enrich, detections))
    }

    fn enter(&mut self, state: PipelineState) {
        info!("Pipeline stage: {state}");
        self.state = state;
    }
}

/// New-data sensor: true as soon as any file exists under `root`.
///
/// Stops scanning at the first file; it checks existence, it does not
/// enumerate the tree.
pub fn new_data_available(root: &Path) -> bool {
    if !root.is_dir() {
        return false;
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.file_type().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_is_quiet_for_missing_root() {
        assert!(!new_data_available(Path::new("no/such/root")));
    }

    #[test]
    fn state_names_render_for_logs() {
        assert_eq!(PipelineState::LoadingRaw.to_string(), "loading-raw");
        assert_eq!(PipelineState::Failed.to_string(), "failed");
    }
}
