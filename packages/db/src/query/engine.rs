use std::collections::BTreeMap;

use dispatch_core::{AuthScope, PageRequest, PageResponse};

use super::filter::{apply_filters, order_clause};
use super::{Conditions, Entity, Preload};
use crate::records::CountRow;
use crate::{DbError, get_db};

/// Build the scoped and filtered predicate shared by list and count.
fn predicate<E: Entity>(
    filters: &BTreeMap<String, Vec<String>>,
    scope: &AuthScope,
) -> Result<Conditions, DbError> {
    let mut conditions = Conditions::new();
    apply_filters(E::FILTERS, filters, &mut conditions)?;
    if !scope.is_unrestricted() {
        E::scope(scope, &mut conditions);
    }
    Ok(conditions)
}

/// Largest row offset the store parses; pages past it are simply empty.
const MAX_OFFSET: u64 = i64::MAX as u64;

fn projection(preloads: &[Preload]) -> String {
    std::iter::once("*".to_string())
        .chain(preloads.iter().map(Preload::projection))
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_page(request: &PageRequest) -> Result<(), DbError> {
    if request.page < 1 {
        return Err(DbError::Validation("page must be at least 1".into()));
    }
    if request.page_size < 1 {
        return Err(DbError::Validation("page_size must be at least 1".into()));
    }
    Ok(())
}

/// One page of `E`, filtered, sorted and restricted to `scope`.
///
/// The total is counted over the same predicate, before pagination.
pub async fn list<E: Entity>(
    request: &PageRequest,
    scope: &AuthScope,
) -> Result<PageResponse<E>, DbError> {
    validate_page(request)?;
    let order = order_clause(E::SORTS, request.sort.as_ref())?;
    let conditions = predicate::<E>(&request.filters, scope)?;
    let where_clause = conditions.where_clause();

    let sql = format!(
        "SELECT {fields} FROM {table} {where_clause} {order} LIMIT {limit} START {start}; \
         SELECT count() AS count FROM {table} {where_clause} GROUP ALL;",
        fields = projection(E::PRELOAD_MANY),
        table = E::TABLE,
        limit = request.page_size,
        start = request.offset().min(MAX_OFFSET),
    );
    tracing::debug!(table = E::TABLE, %sql, "list query");

    let db = get_db()?;
    let mut query = db.query(sql);
    for binding in conditions.into_bindings() {
        query = query.bind(binding);
    }
    let mut response = query.await?.check()?;

    let records: Vec<E::Record> = response.take(0)?;
    let counts: Vec<CountRow> = response.take(1)?;
    let total = counts.first().map(|c| c.count.max(0) as u64).unwrap_or(0);

    let items = records
        .into_iter()
        .map(E::from_record)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageResponse::new(items, total, request))
}

/// Number of rows of `E` matching `filters` within `scope`.
pub async fn count<E: Entity>(
    filters: &BTreeMap<String, Vec<String>>,
    scope: &AuthScope,
) -> Result<u64, DbError> {
    let conditions = predicate::<E>(filters, scope)?;
    let sql = format!(
        "SELECT count() AS count FROM {} {} GROUP ALL",
        E::TABLE,
        conditions.where_clause()
    );

    let db = get_db()?;
    let mut query = db.query(sql);
    for binding in conditions.into_bindings() {
        query = query.bind(binding);
    }
    let mut response = query.await?.check()?;
    let counts: Vec<CountRow> = response.take(0)?;

    Ok(counts.first().map(|c| c.count.max(0) as u64).unwrap_or(0))
}

/// A single row of `E` by record key. Rows outside `scope` are reported as
/// not found.
pub async fn find_by_id<E: Entity>(id: &str, scope: &AuthScope) -> Result<E, DbError> {
    let mut conditions = Conditions::new();
    conditions.record_is(E::TABLE, id);
    if !scope.is_unrestricted() {
        E::scope(scope, &mut conditions);
    }

    let sql = format!(
        "SELECT {} FROM {} {}",
        projection(E::PRELOAD_ONE),
        E::TABLE,
        conditions.where_clause()
    );

    let db = get_db()?;
    let mut query = db.query(sql);
    for binding in conditions.into_bindings() {
        query = query.bind(binding);
    }
    let mut response = query.await?.check()?;
    let records: Vec<E::Record> = response.take(0)?;

    records
        .into_iter()
        .next()
        .map(E::from_record)
        .transpose()?
        .ok_or_else(|| DbError::NotFound(format!("{} not found: {}", E::NAME, id)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn projection_lists_preloads_after_star() {
        let preloads = [Preload::new("agent", "agent", "agent_id")];
        assert_eq!(
            projection(&preloads),
            "*, (type::thing('agent', agent_id)).* AS agent"
        );
        assert_eq!(projection(&[]), "*");
    }

    #[test]
    fn zero_page_is_rejected() {
        assert!(validate_page(&PageRequest::new(0, 10)).unwrap_err().is_validation());
        assert!(validate_page(&PageRequest::new(1, 0)).unwrap_err().is_validation());
        assert!(validate_page(&PageRequest::new(1, 1)).is_ok());
    }
}
