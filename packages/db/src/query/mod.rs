//! Generic filtered, sorted, paginated and scope-restricted queries.
//!
//! Every table is described by an [`Entity`] implementation: its filter and
//! sort whitelists, the predicates that restrict it to a caller's
//! [`AuthScope`](dispatch_core::AuthScope), and the relations to preload.
//! [`list`], [`count`] and [`find_by_id`] are written once against that
//! description.

mod conditions;
mod engine;
mod entity;
mod filter;

pub use conditions::Conditions;
pub use engine::{count, find_by_id, list};
pub use entity::{Entity, Preload};
pub use filter::{FilterField, Match, SortField, ValueParser, parse_as, parse_int, parse_text};
