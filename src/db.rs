use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Card, CardState, DisplayTier, Scheme};

/// Durable home of the cards, keyed by line id with an index on `due`.
pub trait CardStore {
    fn get(&self, id: &str) -> Result<Option<Card>>;

    /// Insert or replace, keyed by `card.id`.
    fn put(&self, card: &Card) -> Result<()>;

    fn delete(&self, id: &str) -> Result<bool>;

    fn get_all(&self) -> Result<Vec<Card>>;

    fn get_all_keys(&self) -> Result<Vec<String>>;

    /// Cards with `lower <= due <= upper`, ascending by due.
    fn query_by_due_range(&self, lower: DateTime<Utc>, upper: DateTime<Utc>) -> Result<Vec<Card>>;

    fn scheme(&self) -> Result<Option<Scheme>>;

    fn bind_scheme(&self, scheme: Scheme) -> Result<()>;

    /// Wipe every card and the scheme binding.
    fn reset(&self) -> Result<()>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lines (
                id TEXT PRIMARY KEY,
                due TEXT NOT NULL,
                last_review TEXT NOT NULL,
                display INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lines_due ON lines(due);
            "#,
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))?)
    }
}

// Second precision with a `Z` suffix keeps text order equal to time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

const CARD_COLUMNS: &str = "id, due, last_review, display, state";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let due: String = row.get(1)?;
    let last_review: String = row.get(2)?;
    let state_json: String = row.get(4)?;
    let state: CardState = serde_json::from_str(&state_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Card {
        id: row.get(0)?,
        due: parse_timestamp(&due)?,
        last_review: parse_timestamp(&last_review)?,
        display: DisplayTier::from_i32(row.get(3)?),
        state,
    })
}

impl CardStore for Database {
    fn get(&self, id: &str) -> Result<Option<Card>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {} FROM lines WHERE id = ?1", CARD_COLUMNS),
                params![id],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }

    fn put(&self, card: &Card) -> Result<()> {
        let state = serde_json::to_string(&card.state)?;
        self.conn.execute(
            r#"
            INSERT INTO lines (id, due, last_review, display, state)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                due = excluded.due,
                last_review = excluded.last_review,
                display = excluded.display,
                state = excluded.state
            "#,
            params![
                card.id,
                timestamp(card.due),
                timestamp(card.last_review),
                card.display.as_i32(),
                state
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM lines WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn get_all(&self) -> Result<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM lines ORDER BY id", CARD_COLUMNS))?;
        let rows = stmt.query_map([], card_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_all_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM lines ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn query_by_due_range(&self, lower: DateTime<Utc>, upper: DateTime<Utc>) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lines WHERE due >= ?1 AND due <= ?2 ORDER BY due ASC, id ASC",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![timestamp(lower), timestamp(upper)], card_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn scheme(&self) -> Result<Option<Scheme>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'scheme'", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(raw.and_then(|s| Scheme::from_str(&s)))
    }

    /// Binds an unbound store to `scheme`. A store already bound to another
    /// scheme is only rebound when it holds no cards.
    fn bind_scheme(&self, scheme: Scheme) -> Result<()> {
        if let Some(stored) = self.scheme()? {
            if stored == scheme {
                return Ok(());
            }
            if self.count()? > 0 {
                return Err(Error::SchemeMismatch {
                    stored,
                    configured: scheme,
                });
            }
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('scheme', ?1)",
            params![scheme.as_str()],
        )?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM lines; DELETE FROM meta;")?;
        Ok(())
    }
}
