//! `personalities` table.

use ananya_core::ids::PersonalityId;
use ananya_core::personality::PersonalityProfile;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, StoreError};

/// Personality catalog repository.
pub struct PersonalityRepo;

impl PersonalityRepo {
    /// All entries in insertion order.
    pub fn list(conn: &Connection) -> Result<Vec<PersonalityProfile>> {
        let mut stmt = conn.prepare(
            "SELECT id, display_name, description, system_prompt, is_default
             FROM personalities ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PersonalityProfile {
                    id: PersonalityId::from_string(row.get(0)?),
                    display_name: row.get(1)?,
                    description: row.get(2)?,
                    system_prompt: row.get(3)?,
                    is_default: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of entries.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM personalities", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Insert an entry. A new default clears the previous default in the same transaction.
    pub fn insert(conn: &Connection, profile: &PersonalityProfile, now: DateTime<Utc>) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM personalities WHERE id = ?1",
                params![profile.id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Duplicate(format!("personality '{}'", profile.id)));
        }
        if profile.is_default {
            let _ = tx.execute("UPDATE personalities SET is_default = 0 WHERE is_default = 1", [])?;
        }
        let _ = tx.execute(
            "INSERT INTO personalities (id, display_name, description, system_prompt, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.id.as_str(),
                profile.display_name,
                profile.description,
                profile.system_prompt,
                profile.is_default,
                now.to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a non-default entry. Returns whether it existed.
    pub fn delete(conn: &Connection, id: &PersonalityId) -> Result<bool> {
        let is_default: Option<bool> = conn
            .query_row(
                "SELECT is_default FROM personalities WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match is_default {
            None => Ok(false),
            Some(true) => Err(StoreError::InvalidOperation(format!(
                "personality '{id}' is the default and cannot be removed"
            ))),
            Some(false) => {
                let n = conn.execute("DELETE FROM personalities WHERE id = ?1", params![id.as_str()])?;
                Ok(n > 0)
            }
        }
    }

    /// Replace description and, when given, the system prompt. Returns the updated entry.
    pub fn update(
        conn: &Connection,
        id: &PersonalityId,
        description: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<PersonalityProfile>> {
        let n = conn.execute(
            "UPDATE personalities SET description = ?2, system_prompt = COALESCE(?3, system_prompt) WHERE id = ?1",
            params![id.as_str(), description, system_prompt],
        )?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Self::list(conn)?.into_iter().find(|p| &p.id == id))
    }

    /// Write `entries` when the catalog is empty. Returns how many were written.
    pub fn seed_if_empty(conn: &Connection, entries: &[PersonalityProfile], now: DateTime<Utc>) -> Result<usize> {
        if Self::count(conn)? > 0 {
            return Ok(0);
        }
        for entry in entries {
            Self::insert(conn, entry, now)?;
        }
        Ok(entries.len())
    }
}
