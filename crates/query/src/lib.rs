//! Query engine for tansu
//!
//! - Operator / Direction: condition operators and sort directions
//! - Condition: one column predicate, compiled before evaluation
//! - Query: conditions (ANDed), sort, offset/limit, row shape
//! - planner: picks index lookups or scans per condition
//! - executor: evaluates a plan against a pinned snapshot
//! - ResultSet: lazy rows resolved from that snapshot

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod executor;
pub mod operator;
pub mod planner;
pub mod query;
pub mod result;

pub use condition::{tokens, CompiledCondition, Condition};
pub use executor::{count, execute, matching_keys};
pub use operator::{Direction, Operator};
pub use planner::{plan, Access, PlanStep, QueryPlan};
pub use query::{OrderBy, Query};
pub use result::{ResultSet, Row};
