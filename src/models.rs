//! Data models for message ingestion and enrichment
//!
//! This module contains the row types owned by the pipeline: the raw decoded
//! scrape record, the canonical flattened message, the image detection tuple,
//! and the analytics report rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One decoded record from a per-channel scrape dump.
///
/// Every field is optional; validation and defaulting happen at the
/// flattening boundary, not during decoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedMessage {
    /// Message identifier within the channel
    #[serde(default)]
    pub id: Option<i64>,
    /// Timestamp when the message was posted
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Message text content
    #[serde(default)]
    pub text: Option<String>,
    /// True if the message carried media
    #[serde(default)]
    pub has_media: Option<bool>,
    /// Path of the downloaded media file, if any
    #[serde(default)]
    pub media_path: Option<String>,
}

/// The canonical flat message row loaded into `raw_telegram_messages`.
///
/// Natural key: `(id, channel_name, scrape_date)`. Re-loading the same key
/// overwrites the non-key fields with the latest values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Message identifier within the channel
    pub id: i64,
    /// Timestamp when the message was posted
    pub date: Option<DateTime<Utc>>,
    /// Message text content
    pub text: Option<String>,
    /// True if the message carried media
    pub has_media: bool,
    /// Path of the downloaded media file, if any
    pub media_path: Option<String>,
    /// Channel the message was scraped from (path-derived)
    pub channel_name: String,
    /// Date of the scrape run (path-derived)
    pub scrape_date: NaiveDate,
}

/// One object detection for a message image.
///
/// Natural key: the full tuple. Re-inserting an existing tuple is a no-op,
/// never an overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Message the image belongs to
    pub message_id: i64,
    /// Path of the source image
    pub image_path: String,
    /// Detected object class label
    pub detected_object_class: String,
    /// Model confidence in [0, 1]
    pub confidence_score: f64,
}

/// Message count for one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    /// Channel name
    pub channel_name: String,
    /// Number of messages in the channel
    pub count: i64,
}

/// Message count for one day
#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    /// Day in `YYYY-MM-DD` form
    pub date: String,
    /// Number of messages posted that day
    pub messages: i64,
}

/// Posting activity for one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelActivity {
    /// Channel name
    pub channel_name: String,
    /// Total number of messages in the channel
    pub total_messages: i64,
    /// Per-day message histogram, ascending by date
    pub messages_per_day: Vec<DailyCount>,
}

/// One keyword search hit
#[derive(Debug, Clone, Serialize)]
pub struct MessageSearchResult {
    /// Message identifier
    pub message_id: i64,
    /// Channel name
    pub channel_name: String,
    /// Message date in `YYYY-MM-DD` form
    pub date: Option<String>,
    /// Message text
    pub text: Option<String>,
}
