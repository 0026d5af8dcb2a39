//! Filter and sort whitelists.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use dispatch_core::{ParseError, Sort};
use serde_json::Value;

use super::Conditions;
use crate::DbError;

/// Validates one raw filter value and converts it to its stored form.
pub type ValueParser = fn(&str) -> Result<Value, String>;

/// How a filter value is compared with its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Equality, or membership when several values are given.
    Exact,
    /// Case-insensitive substring; several values match any of them.
    Contains,
}

/// A filterable field: the external name callers use, the column it maps to,
/// and how supplied values are parsed.
#[derive(Clone, Copy)]
pub struct FilterField {
    pub name: &'static str,
    pub column: &'static str,
    pub matching: Match,
    pub parse: ValueParser,
}

impl FilterField {
    pub const fn exact(name: &'static str, column: &'static str, parse: ValueParser) -> Self {
        Self {
            name,
            column,
            matching: Match::Exact,
            parse,
        }
    }

    pub const fn contains(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            matching: Match::Contains,
            parse: parse_text,
        }
    }

    fn apply(&self, raw: &[String], conditions: &mut Conditions) -> Result<(), DbError> {
        if raw.is_empty() {
            return Err(DbError::Validation(format!(
                "filter '{}' requires at least one value",
                self.name
            )));
        }

        let mut values = raw
            .iter()
            .map(|v| {
                (self.parse)(v).map_err(|e| {
                    DbError::Validation(format!("invalid value for filter '{}': {}", self.name, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.matching {
            Match::Exact if values.len() == 1 => conditions.eq(self.column, values.remove(0)),
            Match::Exact => conditions.one_of(self.column, values),
            Match::Contains => {
                let column = self.column;
                let alternatives = values
                    .into_iter()
                    .map(|v| {
                        let needle = v.as_str().map(str::to_lowercase).unwrap_or_default();
                        let p = conditions.param(needle);
                        format!("string::contains(string::lowercase({column}), {p})")
                    })
                    .collect::<Vec<_>>();
                conditions.push(format!("({})", alternatives.join(" OR ")));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for FilterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterField")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("matching", &self.matching)
            .finish()
    }
}

/// Translate a caller's filter map into conditions. Every key must be in the
/// whitelist; unknown keys are rejected, never ignored.
pub(crate) fn apply_filters(
    whitelist: &[FilterField],
    filters: &BTreeMap<String, Vec<String>>,
    conditions: &mut Conditions,
) -> Result<(), DbError> {
    for (name, values) in filters {
        let field = whitelist
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| DbError::Validation(format!("unknown filter field '{}'", name)))?;
        field.apply(values, conditions)?;
    }
    Ok(())
}

/// A sortable field: external key and the column it orders by.
#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub name: &'static str,
    pub column: &'static str,
}

impl SortField {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self { name, column }
    }
}

/// `ORDER BY` for a requested sort, or an empty string for natural order.
pub(crate) fn order_clause(whitelist: &[SortField], sort: Option<&Sort>) -> Result<String, DbError> {
    let Some(sort) = sort else {
        return Ok(String::new());
    };

    let field = whitelist
        .iter()
        .find(|f| f.name == sort.field)
        .ok_or_else(|| DbError::Validation(format!("unknown sort field '{}'", sort.field)))?;

    Ok(format!("ORDER BY {} {}", field.column, sort.direction.as_sql()))
}

/// Parse through a domain type's `FromStr` and store its canonical string.
/// Used for ids and enums.
pub fn parse_as<T>(raw: &str) -> Result<Value, String>
where
    T: FromStr<Err = ParseError> + Display,
{
    raw.parse::<T>()
        .map(|v| Value::String(v.to_string()))
        .map_err(|e| e.to_string())
}

pub fn parse_int(raw: &str) -> Result<Value, String> {
    raw.trim()
        .parse::<i64>()
        .map(Value::from)
        .map_err(|_| format!("'{}' is not an integer", raw))
}

pub fn parse_text(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("value must not be empty".to_string());
    }
    Ok(Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use dispatch_core::{JobId, JobState, SortDirection};
    use serde_json::json;

    const FIELDS: &[FilterField] = &[
        FilterField::exact("state", "state", parse_as::<JobState>),
        FilterField::exact("id", "job_id", parse_as::<JobId>),
        FilterField::exact("priority", "priority", parse_int),
        FilterField::contains("name", "name"),
    ];

    const SORTS: &[SortField] = &[SortField::new("createdAt", "created_at")];

    fn filters(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let mut conditions = Conditions::new();
        let err = apply_filters(FIELDS, &filters(&[("color", &["red"])]), &mut conditions)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(conditions.is_empty());
    }

    #[test]
    fn enum_values_are_normalised() {
        let mut conditions = Conditions::new();
        apply_filters(FIELDS, &filters(&[("state", &["PENDING"])]), &mut conditions).unwrap();
        assert_eq!(conditions.where_clause(), "WHERE state = $p0");
        assert_eq!(conditions.into_bindings()[0].1, json!("pending"));
    }

    #[test]
    fn multiple_values_become_membership() {
        let mut conditions = Conditions::new();
        apply_filters(
            FIELDS,
            &filters(&[("state", &["pending", "failed"])]),
            &mut conditions,
        )
        .unwrap();
        assert_eq!(conditions.where_clause(), "WHERE state IN $p0");
    }

    #[test]
    fn malformed_values_are_rejected() {
        for (field, value) in [("state", "sleeping"), ("id", "nope"), ("priority", "high")] {
            let mut conditions = Conditions::new();
            let err = apply_filters(FIELDS, &filters(&[(field, &[value])]), &mut conditions)
                .unwrap_err();
            assert!(err.is_validation(), "{field}={value} should fail");
        }
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let mut conditions = Conditions::new();
        let err = apply_filters(FIELDS, &filters(&[("state", &[])]), &mut conditions).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn contains_builds_or_group() {
        let mut conditions = Conditions::new();
        apply_filters(FIELDS, &filters(&[("name", &["Web", "db"])]), &mut conditions).unwrap();
        assert_eq!(
            conditions.where_clause(),
            "WHERE (string::contains(string::lowercase(name), $p0) OR string::contains(string::lowercase(name), $p1))"
        );
        assert_eq!(conditions.into_bindings()[0].1, json!("web"));
    }

    #[test]
    fn sort_maps_to_column() {
        let sort = Sort {
            field: "createdAt".into(),
            direction: SortDirection::Desc,
        };
        assert_eq!(
            order_clause(SORTS, Some(&sort)).unwrap(),
            "ORDER BY created_at DESC"
        );
        assert_eq!(order_clause(SORTS, None).unwrap(), "");
    }

    #[test]
    fn unknown_sort_is_rejected() {
        let err = order_clause(SORTS, Some(&Sort::asc("created_at"))).unwrap_err();
        assert!(err.is_validation());
    }
}
