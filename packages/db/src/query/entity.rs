use dispatch_core::AuthScope;
use serde::de::DeserializeOwned;

use super::{Conditions, FilterField, SortField};
use crate::DbError;

/// A related row loaded alongside the primary record.
///
/// Rendered as a projection that fetches the `table` record whose key is
/// stored in the parent's `key` column and exposes it under `name`. A key
/// with no record yields `NONE`.
#[derive(Debug, Clone, Copy)]
pub struct Preload {
    pub name: &'static str,
    pub table: &'static str,
    pub key: &'static str,
}

impl Preload {
    pub const fn new(name: &'static str, table: &'static str, key: &'static str) -> Self {
        Self { name, table, key }
    }

    pub(crate) fn projection(&self) -> String {
        format!(
            "(type::thing('{table}', {key})).* AS {name}",
            table = self.table,
            key = self.key,
            name = self.name,
        )
    }
}

/// Table metadata the generic query engine needs for one domain type.
pub trait Entity: Sized + Send {
    /// Table name.
    const TABLE: &'static str;
    /// Human readable name used in error messages.
    const NAME: &'static str;
    /// Accepted filter fields.
    const FILTERS: &'static [FilterField];
    /// Accepted sort keys.
    const SORTS: &'static [SortField];
    /// Relations loaded by [`find_by_id`](super::find_by_id).
    const PRELOAD_ONE: &'static [Preload] = &[];
    /// Relations loaded by [`list`](super::list). Keep this a subset of
    /// `PRELOAD_ONE`; every listed row pays for each entry.
    const PRELOAD_MANY: &'static [Preload] = &[];

    /// Stored row shape.
    type Record: DeserializeOwned + Send;

    /// Restrict the table to what `scope` may see. Must add nothing for an
    /// unrestricted scope.
    fn scope(scope: &AuthScope, conditions: &mut Conditions);

    fn from_record(record: Self::Record) -> Result<Self, DbError>;
}
