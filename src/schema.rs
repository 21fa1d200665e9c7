//! Database schema definitions
//!
//! This module provides constants for table and column names used with
//! rusqlite. The loaders build their DDL and upsert statements from these so
//! that a column rename happens in exactly one place.

/// Raw messages table schema
pub mod raw_messages {
    /// Table name
    pub const TABLE: &str = "raw_telegram_messages";
    /// Message identifier column (key member)
    pub const ID: &str = "id";
    /// Message timestamp column
    pub const DATE: &str = "date";
    /// Message text column
    pub const TEXT: &str = "text";
    /// Flag indicating if the message carried media
    pub const HAS_MEDIA: &str = "has_media";
    /// Media file path column
    pub const MEDIA_PATH: &str = "media_path";
    /// Channel name column (key member)
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Scrape date column (key member)
    pub const SCRAPE_DATE: &str = "scrape_date";
}

/// Image detections table schema
pub mod detections {
    /// Table name
    pub const TABLE: &str = "fct_image_detections";
    /// Message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Source image path column
    pub const IMAGE_PATH: &str = "image_path";
    /// Detected object class column
    pub const CLASS: &str = "detected_object_class";
    /// Detection confidence column
    pub const CONFIDENCE: &str = "confidence_score";
}

/// Derived message fact table schema (materialized by the transform stage)
pub mod fct_messages {
    /// Table name
    pub const TABLE: &str = "fct_messages";
    /// Message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Message date column (day granularity)
    pub const DATE: &str = "date";
    /// Message text column
    pub const TEXT: &str = "text";
    /// Flag indicating if the message carried media
    pub const HAS_MEDIA: &str = "has_media";
}
