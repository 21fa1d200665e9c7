//! Read-only analytics queries.
//!
//! The analytics layer consumes the derived `fct_messages` table produced by
//! the transform stage; it never reads the raw tables. Queries are plain SQL
//! over a caller-provided [`Database`].

use rusqlite::params;

use crate::db::Database;
use crate::error::Result;
use crate::models::{ChannelActivity, ChannelReport, DailyCount, MessageSearchResult};
use crate::schema::fct_messages;

/// Maximum rows returned by keyword search.
const SEARCH_LIMIT: usize = 50;

/// The most active channels by message count, descending.
pub fn top_channels(db: &Database, limit: usize) -> Result<Vec<ChannelReport>> {
    let sql = format!(
        "SELECT {channel}, COUNT(*) AS count
         FROM {table}
         GROUP BY {channel}
         ORDER BY count DESC
         LIMIT ?1",
        table = fct_messages::TABLE,
        channel = fct_messages::CHANNEL_NAME,
    );

    let mut stmt = db.connection().prepare(&sql)?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(ChannelReport {
            channel_name: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Posting activity for one channel: total plus a per-day histogram.
///
/// Returns `None` for a channel with no messages.
pub fn channel_activity(db: &Database, channel_name: &str) -> Result<Option<ChannelActivity>> {
    let total_sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE {channel} = ?1",
        table = fct_messages::TABLE,
        channel = fct_messages::CHANNEL_NAME,
    );
    let total_messages: i64 =
        db.connection()
            .query_row(&total_sql, params![channel_name], |row| row.get(0))?;

    if total_messages == 0 {
        return Ok(None);
    }

    let per_day_sql = format!(
        "SELECT {date}, COUNT(*) AS messages
         FROM {table}
         WHERE {channel} = ?1 AND {date} IS NOT NULL
         GROUP BY {date}
         ORDER BY {date}",
        table = fct_messages::TABLE,
        channel = fct_messages::CHANNEL_NAME,
        date = fct_messages::DATE,
    );

    let mut stmt = db.connection().prepare(&per_day_sql)?;
    let rows = stmt.query_map(params![channel_name], |row| {
        Ok(DailyCount {
            date: row.get(0)?,
            messages: row.get(1)?,
        })
    })?;

    let mut messages_per_day = Vec::new();
    for row in rows {
        messages_per_day.push(row?);
    }

    Ok(Some(ChannelActivity {
        channel_name: channel_name.to_string(),
        total_messages,
        messages_per_day,
    }))
}

/// Case-insensitive keyword search over message text.
pub fn search_messages(db: &Database, keyword: &str) -> Result<Vec<MessageSearchResult>> {
    let sql = format!(
        "SELECT {message_id}, {channel}, {date}, {text}
         FROM {table}
         WHERE {text} IS NOT NULL AND lower({text}) LIKE lower(?1)
         LIMIT ?2",
        table = fct_messages::TABLE,
        message_id = fct_messages::MESSAGE_ID,
        channel = fct_messages::CHANNEL_NAME,
        date = fct_messages::DATE,
        text = fct_messages::TEXT,
    );

    let pattern = format!("%{keyword}%");
    let mut stmt = db.connection().prepare(&sql)?;
    let rows = stmt.query_map(params![pattern, SEARCH_LIMIT as i64], |row| {
        Ok(MessageSearchResult {
            message_id: row.get(0)?,
            channel_name: row.get(1)?,
            date: row.get(2)?,
            text: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
