//! `broadcasts` and `broadcast_outcomes` tables.

use ananya_core::delivery::{BroadcastRecord, DeliveryOutcome, DeliverySummary};
use ananya_core::ids::{BroadcastId, UserId};
use rusqlite::{Connection, params};

use super::{bad_label, parse_time};
use crate::errors::Result;

/// Broadcast archive repository.
pub struct BroadcastRepo;

impl BroadcastRepo {
    /// Insert a finished broadcast and its outcomes atomically.
    pub fn insert(conn: &Connection, record: &BroadcastRecord) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let s = &record.summary;
        let _ = tx.execute(
            "INSERT INTO broadcasts (id, message, delivered, blocked, failed, total, cancelled, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id.as_str(),
                record.message,
                s.delivered as i64,
                s.blocked as i64,
                s.failed as i64,
                s.total as i64,
                record.cancelled,
                record.created_at.to_rfc3339(),
                record.completed_at.to_rfc3339()
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO broadcast_outcomes (broadcast_id, position, user_id, outcome, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, (user_id, outcome)) in record.outcomes.iter().enumerate() {
                let _ = stmt.execute(params![
                    record.id.as_str(),
                    position as i64,
                    user_id.get(),
                    outcome.label(),
                    outcome.reason()
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Newest first, without outcomes.
    pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<BroadcastRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, message, delivered, blocked, failed, total, cancelled, created_at, completed_at
             FROM broadcasts ORDER BY completed_at DESC, rowid DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| {
                let created: String = row.get(7)?;
                let completed: String = row.get(8)?;
                Ok(BroadcastRecord {
                    id: BroadcastId::from_string(row.get(0)?),
                    message: row.get(1)?,
                    summary: DeliverySummary {
                        delivered: row.get::<_, i64>(2)? as usize,
                        blocked: row.get::<_, i64>(3)? as usize,
                        failed: row.get::<_, i64>(4)? as usize,
                        total: row.get::<_, i64>(5)? as usize,
                    },
                    cancelled: row.get(6)?,
                    created_at: parse_time(7, &created)?,
                    completed_at: parse_time(8, &completed)?,
                    outcomes: Vec::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Per-user outcomes of one broadcast in target order.
    pub fn outcomes(conn: &Connection, id: &BroadcastId) -> Result<Vec<(UserId, DeliveryOutcome)>> {
        let mut stmt = conn.prepare(
            "SELECT user_id, outcome, reason FROM broadcast_outcomes
             WHERE broadcast_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let label: String = row.get(1)?;
                let reason: Option<String> = row.get(2)?;
                let outcome = match label.as_str() {
                    "delivered" => DeliveryOutcome::Delivered,
                    "blocked" => DeliveryOutcome::Blocked,
                    "failed" => DeliveryOutcome::failed(reason.unwrap_or_default()),
                    _ => return Err(bad_label(1, "outcome", &label)),
                };
                Ok((UserId::new(row.get(0)?), outcome))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of archived broadcasts.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM broadcasts", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
