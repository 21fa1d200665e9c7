//! Message flattening.
//!
//! A per-channel dump file is a JSON array of [`ScrapedMessage`] records.
//! The channel name and scrape date are not in the records; they are encoded
//! by the file's position in the data tree and extracted here. The positional
//! contract is deliberate and brittle, so the depth and the date segment are
//! validated eagerly: a violation fails the single file, never the run.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::models::{RawMessage, ScrapedMessage};

/// Metadata derived from a source file's path.
///
/// For `<root>/<scrape_date>/<channel_name>/<file>`, the scrape date is the
/// third-from-last path segment and the channel name the second-from-last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMeta {
    pub channel_name: String,
    pub scrape_date: NaiveDate,
}

impl PathMeta {
    /// Extract channel and scrape date from a source file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let segments: Vec<&str> = path
            .iter()
            .filter_map(|part| part.to_str())
            .collect();

        if segments.len() < 3 {
            return Err(PipelineError::PathLayout {
                path: path.display().to_string(),
                reason: format!(
                    "expected at least <scrape_date>/<channel_name>/<file>, got {} segments",
                    segments.len()
                ),
            });
        }

        let date_segment = segments[segments.len() - 3];
        let channel_segment = segments[segments.len() - 2];

        let scrape_date = NaiveDate::parse_from_str(date_segment, "%Y-%m-%d").map_err(|_| {
            PipelineError::PathLayout {
                path: path.display().to_string(),
                reason: format!("scrape date segment {date_segment:?} is not a YYYY-MM-DD date"),
            }
        })?;

        Ok(Self {
            channel_name: channel_segment.to_string(),
            scrape_date,
        })
    }
}

/// Normalize one decoded record into the canonical flat row.
///
/// Missing optional fields default to `None`/`false`. A record without an
/// `id` cannot form the natural key and yields `None`; the caller logs and
/// skips it.
pub fn flatten_message(msg: ScrapedMessage, meta: &PathMeta) -> Option<RawMessage> {
    let id = msg.id?;
    Some(RawMessage {
        id,
        date: msg.date,
        text: msg.text,
        has_media: msg.has_media.unwrap_or(false),
        media_path: msg.media_path,
        channel_name: meta.channel_name.clone(),
        scrape_date: meta.scrape_date,
    })
}

/// Decode and flatten one per-channel dump file.
///
/// Any error here (bad path layout, unreadable file, malformed JSON) is a
/// single-file failure; the caller skips the file and continues.
pub fn read_message_file(path: &Path) -> Result<Vec<RawMessage>> {
    let meta = PathMeta::from_path(path)?;

    let file = File::open(path)?;
    let records: Vec<ScrapedMessage> = serde_json::from_reader(BufReader::new(file))?;

    let total = records.len();
    let rows: Vec<RawMessage> = records
        .into_iter()
        .filter_map(|msg| flatten_message(msg, &meta))
        .collect();

    if rows.len() < total {
        warn!(
            "Skipped {} record(s) without an id in {}",
            total - rows.len(),
            path.display()
        );
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_channel_and_date_from_path() {
        let meta =
            PathMeta::from_path(Path::new("data/raw/telegram_messages/2024-07-10/chemed/msg1.json"))
                .expect("valid path");
        assert_eq!(meta.channel_name, "chemed");
        assert_eq!(
            meta.scrape_date,
            NaiveDate::from_ymd_opt(2024, 7, 10).expect("valid date")
        );
    }

    #[test]
    fn rejects_shallow_path() {
        let err = PathMeta::from_path(Path::new("chemed/msg1.json"));
        assert!(matches!(err, Err(PipelineError::PathLayout { .. })));
    }

    #[test]
    fn rejects_non_date_segment() {
        let err = PathMeta::from_path(Path::new("data/raw/latest/chemed/msg1.json"));
        assert!(matches!(err, Err(PipelineError::PathLayout { .. })));
    }

    #[test]
    fn missing_fields_default_to_none() {
        let meta = PathMeta {
            channel_name: "chemed".to_string(),
            scrape_date: NaiveDate::from_ymd_opt(2024, 7, 10).expect("valid date"),
        };
        let msg = ScrapedMessage {
            id: Some(42),
            ..ScrapedMessage::default()
        };

        let row = flatten_message(msg, &meta).expect("row with id");
        assert_eq!(row.id, 42);
        assert_eq!(row.date, None);
        assert_eq!(row.text, None);
        assert!(!row.has_media);
        assert_eq!(row.media_path, None);
    }

    #[test]
    fn record_without_id_is_dropped() {
        let meta = PathMeta {
            channel_name: "chemed".to_string(),
            scrape_date: NaiveDate::from_ymd_opt(2024, 7, 10).expect("valid date"),
        };
        assert!(flatten_message(ScrapedMessage::default(), &meta).is_none());
    }
}
