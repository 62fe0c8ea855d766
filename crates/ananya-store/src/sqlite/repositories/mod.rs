//! Stateless repositories. Every method takes a `&Connection`.

pub mod broadcasts;
pub mod personalities;
pub mod turns;
pub mod users;

pub use broadcasts::BroadcastRepo;
pub use personalities::PersonalityRepo;
pub use turns::TurnRepo;
pub use users::UserRepo;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Parse an RFC 3339 column value.
pub(crate) fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Conversion failure for an unrecognised enum label.
pub(crate) fn bad_label(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown {what} '{raw}'").into())
}
