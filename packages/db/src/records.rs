//! Row shapes and conversions shared by the repositories.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use dispatch_core::ParseError;
use serde::Deserialize;
use surrealdb::sql::{Datetime, Thing};

use crate::DbError;

/// The key part of a record id, e.g. `01J..` for `job:01J..`.
pub(crate) fn record_key(thing: &Thing) -> String {
    thing.id.to_raw()
}

/// Parse a record id's key into a typed identifier.
pub(crate) fn parse_key<T>(thing: &Thing) -> Result<T, DbError>
where
    T: FromStr<Err = ParseError>,
{
    record_key(thing)
        .parse()
        .map_err(|e: ParseError| DbError::Serialization(format!("{}: {}", thing.tb, e)))
}

pub(crate) fn timestamp(value: Datetime) -> DateTime<Utc> {
    value.0
}

pub(crate) fn opt_timestamp(value: Option<Datetime>) -> Option<DateTime<Utc>> {
    value.map(timestamp)
}

/// Rows returned by bulk statements, counted for affected-row totals.
#[derive(Debug, Deserialize)]
pub(crate) struct IdRow {
    pub id: Thing,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountRow {
    pub count: i64,
}
