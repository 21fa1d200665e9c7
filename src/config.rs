use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration structure
///
/// Constructed once at process start and passed into each stage's entry
/// point; no stage reads configuration from the environment on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub detection: DetectionConfig,
    pub scrape: ScrapeConfig,
    pub transform: TransformConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite store
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root of the scraped data tree (`<root>/<scrape_date>/<channel>/<file>`)
    pub raw_data_root: String,
    /// Path of the intermediate detections artifact
    pub detections_csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Path of the ONNX model weights
    pub model_path: String,
    /// Optional explicit class labels file; defaults to the model's
    /// `.labels.txt` sidecar, then the built-in COCO table
    pub labels_path: Option<String>,
    /// Minimum confidence for a detection to be kept
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// External scraper command; the scrape stage passes through when unset
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// External transform command (e.g. `dbt run`); when unset the built-in
    /// SQL materialization runs instead
    pub command: Option<String>,
    /// Working directory for the external command
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between new-data scans in watch mode
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "data/telegram.db".to_string(),
            },
            ingest: IngestConfig {
                raw_data_root: "data/raw/telegram_messages".to_string(),
                detections_csv: "data/yolo_detections.csv".to_string(),
            },
            detection: DetectionConfig {
                model_path: "models/yolov8n.onnx".to_string(),
                labels_path: None,
                confidence_threshold: 0.25,
            },
            scrape: ScrapeConfig { command: None },
            transform: TransformConfig {
                command: None,
                working_dir: None,
            },
            watch: WatchConfig {
                poll_interval_secs: 300,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// struct defaults, then optional config files, then `TELEGRAM_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let defaults = AppConfig::default();

        let config = Config::builder()
            .set_default("database.path", defaults.database.path)?
            .set_default("ingest.raw_data_root", defaults.ingest.raw_data_root)?
            .set_default("ingest.detections_csv", defaults.ingest.detections_csv)?
            .set_default("detection.model_path", defaults.detection.model_path)?
            .set_default(
                "detection.confidence_threshold",
                defaults.detection.confidence_threshold,
            )?
            .set_default("watch.poll_interval_secs", defaults.watch.poll_interval_secs)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix, e.g. TELEGRAM_DATABASE__PATH
            .add_source(Environment::with_prefix("TELEGRAM").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(anyhow::anyhow!("database.path must not be empty"));
        }

        if self.ingest.raw_data_root.trim().is_empty() {
            return Err(anyhow::anyhow!("ingest.raw_data_root must not be empty"));
        }

        if self.ingest.detections_csv.trim().is_empty() {
            return Err(anyhow::anyhow!("ingest.detections_csv must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(anyhow::anyhow!(
                "detection.confidence_threshold must be within [0, 1], got {}",
                self.detection.confidence_threshold
            ));
        }

        if self.watch.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("watch.poll_interval_secs must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get the store path from environment or config.
    ///
    /// `DATABASE_URL` is honored for deployment parity; a `sqlite:` scheme
    /// prefix is stripped.
    pub fn get_database_path(&self) -> String {
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let trimmed = url
                    .strip_prefix("sqlite://")
                    .or_else(|| url.strip_prefix("sqlite:"))
                    .unwrap_or(&url);
                trimmed.to_string()
            }
            Err(_) => self.database.path.clone(),
        }
    }

    /// Get the model weights path from environment or config.
    ///
    /// `YOLO_MODEL_PATH` matches the variable the scraping deployment already
    /// exports.
    pub fn get_model_path(&self) -> String {
        std::env::var("YOLO_MODEL_PATH").unwrap_or_else(|_| self.detection.model_path.clone())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}
