//! `turns` table.

use ananya_core::ids::UserId;
use ananya_core::media::MediaKind;
use ananya_core::messages::{Role, Turn};
use rusqlite::{Connection, params};

use super::{bad_label, parse_time};
use crate::errors::Result;

/// Turn history repository.
pub struct TurnRepo;

impl TurnRepo {
    /// Append one turn.
    pub fn append(conn: &Connection, user_id: UserId, turn: &Turn) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO turns (user_id, role, kind, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id.get(),
                turn.role().as_str(),
                turn.kind().as_str(),
                turn.content(),
                turn.timestamp().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// The newest `limit` turns, oldest first.
    pub fn recent(conn: &Connection, user_id: UserId, limit: usize) -> Result<Vec<Turn>> {
        let mut stmt = conn.prepare(
            "SELECT role, kind, content, created_at FROM (
                 SELECT id, role, kind, content, created_at FROM turns
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let turns = stmt
            .query_map(params![user_id.get(), limit], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    /// Number of turns stored for the user.
    pub fn count(conn: &Connection, user_id: UserId) -> Result<u64> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE user_id = ?1",
            params![user_id.get()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Delete all turns for the user. Returns rows removed.
    pub fn clear(conn: &Connection, user_id: UserId) -> Result<usize> {
        Ok(conn.execute("DELETE FROM turns WHERE user_id = ?1", params![user_id.get()])?)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
        let role: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let created: String = row.get(3)?;
        Ok(Turn::from_parts(
            Role::parse(&role).ok_or_else(|| bad_label(0, "role", &role))?,
            MediaKind::parse(&kind).ok_or_else(|| bad_label(1, "kind", &kind))?,
            row.get(2)?,
            parse_time(3, &created)?,
        ))
    }
}
