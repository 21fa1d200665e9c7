//! Transform stage boundary.
//!
//! The transform tool is an external collaborator: the pipeline only knows
//! that it derives `fct_messages` from the raw table and reports success or
//! failure. [`CommandTransform`] shells out to a configured tool (e.g.
//! `dbt run`); [`SqlTransform`] is the built-in fallback that materializes
//! the fact table directly, with the same drop-and-recreate semantics a
//! table materialization has.

use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{PipelineError, Result};
use crate::schema::{fct_messages, raw_messages};

/// External-tool boundary for the transform stage.
pub trait TransformRunner {
    /// Derive the downstream fact tables; any failure aborts the run.
    fn run(&self, config: &AppConfig) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Runs a configured external transform command.
pub struct CommandTransform {
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandTransform {
    pub fn new(command: String, working_dir: Option<PathBuf>) -> Self {
        Self {
            command,
            working_dir,
        }
    }
}

impl TransformRunner for CommandTransform {
    fn run(&self, _config: &AppConfig) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            PipelineError::InvalidConfig("transform.command is empty".to_string())
        })?;

        let mut command = Command::new(program);
        command.args(parts);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!("Running transform command: {}", self.command);
        let status = command
            .status()
            .map_err(|e| PipelineError::Transform(format!("{}: {e}", self.command)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::Transform(format!(
                "{} exited with {status}",
                self.command
            )))
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Built-in SQL materialization of `fct_messages`.
pub struct SqlTransform;

impl TransformRunner for SqlTransform {
    fn run(&self, config: &AppConfig) -> Result<()> {
        let db = Database::open(&config.database)?;

        // Table materialization: the fact table is rebuilt wholesale from
        // the raw table on every run.
        let sql = format!(
            "DROP TABLE IF EXISTS {fct};
             CREATE TABLE {fct} AS
             SELECT
                 {id} AS {message_id},
                 {channel} AS {fct_channel},
                 date({date}) AS {fct_date},
                 {text} AS {fct_text},
                 {has_media} AS {fct_has_media}
             FROM {raw};",
            fct = fct_messages::TABLE,
            message_id = fct_messages::MESSAGE_ID,
            fct_channel = fct_messages::CHANNEL_NAME,
            fct_date = fct_messages::DATE,
            fct_text = fct_messages::TEXT,
            fct_has_media = fct_messages::HAS_MEDIA,
            raw = raw_messages::TABLE,
            id = raw_messages::ID,
            channel = raw_messages::CHANNEL_NAME,
            date = raw_messages::DATE,
            text = raw_messages::TEXT,
            has_media = raw_messages::HAS_MEDIA,
        );
        db.connection().execute_batch(&sql)?;

        info!("Materialized {}", fct_messages::TABLE);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sql"
    }
}

/// Pick the transform implementation from configuration.
///
/// A configured external command wins; otherwise the built-in SQL
/// materialization runs.
pub fn from_config(config: &AppConfig) -> Box<dyn TransformRunner> {
    match &config.transform.command {
        Some(command) if !command.trim().is_empty() => Box::new(CommandTransform::new(
            command.clone(),
            config.transform.working_dir.clone().map(PathBuf::from),
        )),
        _ => Box::new(SqlTransform),
    }
}
