use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{Detection, RawMessage};
use crate::schema::{detections, raw_messages};

/// Database access for the pipeline's tables.
///
/// Each stage opens its own `Database` at stage entry and drops it at stage
/// exit; connections are not pooled or shared across stages. Statement-level
/// atomicity comes from SQLite itself; batch atomicity from explicit
/// transactions around the bulk loads.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the store, creating the parent directory if needed.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::open_path(Path::new(&config.path))
    }

    /// Open the store at an explicit path.
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        debug!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    /// Borrow the underlying connection for read-only query layers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the raw messages table if it does not exist.
    ///
    /// Kept separate from the upsert: table creation and the bulk statement
    /// are independent, and either failure aborts the stage.
    pub fn ensure_raw_messages_table(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id} INTEGER NOT NULL,
                {date} TIMESTAMP,
                {text} TEXT,
                {has_media} BOOLEAN,
                {media_path} TEXT,
                {channel} TEXT NOT NULL,
                {scrape_date} DATE NOT NULL,
                PRIMARY KEY ({id}, {channel}, {scrape_date})
            )",
            table = raw_messages::TABLE,
            id = raw_messages::ID,
            date = raw_messages::DATE,
            text = raw_messages::TEXT,
            has_media = raw_messages::HAS_MEDIA,
            media_path = raw_messages::MEDIA_PATH,
            channel = raw_messages::CHANNEL_NAME,
            scrape_date = raw_messages::SCRAPE_DATE,
        );
        self.conn.execute(&ddl, [])?;
        Ok(())
    }

    /// Bulk insert-or-update of flattened message rows.
    ///
    /// Keyed by `(id, channel_name, scrape_date)`; the non-key fields are
    /// overwritten on conflict so a re-ingest carries the latest values. The
    /// whole batch commits in one transaction: a failure mid-batch leaves
    /// prior committed state intact.
    pub fn upsert_raw_messages(&mut self, rows: &[RawMessage]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {table} ({id}, {date}, {text}, {has_media}, {media_path}, {channel}, {scrape_date})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT ({id}, {channel}, {scrape_date}) DO UPDATE SET
                {date} = excluded.{date},
                {text} = excluded.{text},
                {has_media} = excluded.{has_media},
                {media_path} = excluded.{media_path}",
            table = raw_messages::TABLE,
            id = raw_messages::ID,
            date = raw_messages::DATE,
            text = raw_messages::TEXT,
            has_media = raw_messages::HAS_MEDIA,
            media_path = raw_messages::MEDIA_PATH,
            channel = raw_messages::CHANNEL_NAME,
            scrape_date = raw_messages::SCRAPE_DATE,
        );

        let tx = self.conn.transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                affected += stmt.execute(params![
                    row.id,
                    row.date,
                    row.text,
                    row.has_media,
                    row.media_path,
                    row.channel_name,
                    row.scrape_date,
                ])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    /// Create the image detections table if it does not exist.
    pub fn ensure_detections_table(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {message_id} INTEGER NOT NULL,
                {image_path} TEXT NOT NULL,
                {class} TEXT NOT NULL,
                {confidence} REAL NOT NULL,
                PRIMARY KEY ({message_id}, {image_path}, {class}, {confidence})
            )",
            table = detections::TABLE,
            message_id = detections::MESSAGE_ID,
            image_path = detections::IMAGE_PATH,
            class = detections::CLASS,
            confidence = detections::CONFIDENCE,
        );
        self.conn.execute(&ddl, [])?;
        Ok(())
    }

    /// Bulk insert of detection tuples with conflict-do-nothing semantics.
    ///
    /// The natural key is the full tuple; a duplicate is silently dropped,
    /// never overwritten. Returns the number of rows actually inserted.
    pub fn insert_detections(&mut self, rows: &[Detection]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {table} ({message_id}, {image_path}, {class}, {confidence})
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT ({message_id}, {image_path}, {class}, {confidence}) DO NOTHING",
            table = detections::TABLE,
            message_id = detections::MESSAGE_ID,
            image_path = detections::IMAGE_PATH,
            class = detections::CLASS,
            confidence = detections::CONFIDENCE,
        );

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.message_id,
                    row.image_path,
                    row.detected_object_class,
                    row.confidence_score,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Number of rows in the raw messages table.
    pub fn raw_message_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", raw_messages::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of rows in the detections table.
    pub fn detection_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", detections::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Fetch one raw message by its natural key.
    pub fn get_raw_message(
        &self,
        id: i64,
        channel_name: &str,
        scrape_date: chrono::NaiveDate,
    ) -> Result<Option<RawMessage>> {
        let sql = format!(
            "SELECT {id}, {date}, {text}, {has_media}, {media_path}, {channel}, {scrape_date}
             FROM {table}
             WHERE {id} = ?1 AND {channel} = ?2 AND {scrape_date} = ?3",
            table = raw_messages::TABLE,
            id = raw_messages::ID,
            date = raw_messages::DATE,
            text = raw_messages::TEXT,
            has_media = raw_messages::HAS_MEDIA,
            media_path = raw_messages::MEDIA_PATH,
            channel = raw_messages::CHANNEL_NAME,
            scrape_date = raw_messages::SCRAPE_DATE,
        );

        let message = self
            .conn
            .query_row(&sql, params![id, channel_name, scrape_date], map_raw_message)
            .optional()?;
        Ok(message)
    }

    /// Fetch every detection tuple for one message, ordered by class.
    pub fn get_detections_for_message(&self, message_id: i64) -> Result<Vec<Detection>> {
        let sql = format!(
            "SELECT {message_id}, {image_path}, {class}, {confidence}
             FROM {table}
             WHERE {message_id} = ?1
             ORDER BY {class}, {confidence}",
            table = detections::TABLE,
            message_id = detections::MESSAGE_ID,
            image_path = detections::IMAGE_PATH,
            class = detections::CLASS,
            confidence = detections::CONFIDENCE,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![message_id], map_detection)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

/// Map a database row to a RawMessage
fn map_raw_message(row: &Row) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: row.get(0)?,
        date: row.get(1)?,
        text: row.get(2)?,
        has_media: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
        media_path: row.get(4)?,
        channel_name: row.get(5)?,
        scrape_date: row.get(6)?,
    })
}

/// Map a database row to a Detection
fn map_detection(row: &Row) -> rusqlite::Result<Detection> {
    Ok(Detection {
        message_id: row.get(0)?,
        image_path: row.get(1)?,
        detected_object_class: row.get(2)?,
        confidence_score: row.get(3)?,
    })
}
