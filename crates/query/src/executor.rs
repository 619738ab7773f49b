//! Query execution against a pinned snapshot
//!
//! 1. Index steps produce candidate key sets, intersected (AND)
//! 2. Scan steps filter the candidates, or the whole store if no index
//!    step applied
//! 3. Optional stable sort
//! 4. Offset/limit window

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tansu_core::{parse_decimal, Value};
use tansu_storage::index::indexed_value;
use tansu_storage::StoreSnapshot;
use tracing::trace;

use crate::planner::{Access, PlanStep, QueryPlan};

/// Keys matching every condition, before sort and window
///
/// Full scans return keys in store iteration order; index-driven
/// evaluation returns them in primary key order.
pub fn matching_keys(plan: &QueryPlan, snapshot: &StoreSnapshot) -> Vec<String> {
    let mut candidates: Option<BTreeSet<String>> = None;
    for step in plan.indexed_steps() {
        let hits = index_hits(step, snapshot);
        candidates = Some(match candidates {
            None => hits,
            Some(acc) => acc.intersection(&hits).cloned().collect(),
        });
        if candidates.as_ref().map_or(false, |c| c.is_empty()) {
            break;
        }
    }

    let scans: Vec<&PlanStep> = plan.scan_steps().collect();
    let passes = |key: &str, value: &Value| scans.iter().all(|s| s.condition.matches(key, value));

    let keys: Vec<String> = match candidates {
        Some(set) => set
            .into_iter()
            .filter(|key| match snapshot.state().get(key) {
                Some(record) => passes(key, &record.value),
                None => false,
            })
            .collect(),
        None => snapshot
            .state()
            .backend()
            .iter()
            .filter(|(key, record)| passes(key, &record.value))
            .map(|(key, _)| key.clone())
            .collect(),
    };
    trace!(
        target: "tansu::query",
        matched = keys.len(),
        full_scan = plan.is_full_scan(),
        "Evaluated conditions"
    );
    keys
}

fn index_hits(step: &PlanStep, snapshot: &StoreSnapshot) -> BTreeSet<String> {
    let Access::Index { lookup, .. } = &step.access else {
        return BTreeSet::new();
    };
    snapshot
        .indexes()
        .get(step.condition.column())
        .and_then(|index| index.lookup(lookup))
        .unwrap_or_default()
}

/// Run the plan: filter, sort, window
pub fn execute(plan: &QueryPlan, snapshot: &StoreSnapshot) -> Vec<String> {
    let mut keys = matching_keys(plan, snapshot);
    if let Some((column, direction)) = &plan.order {
        sort_keys(&mut keys, snapshot, column, direction.is_numeric(), direction.is_descending());
    }
    let end = match plan.limit {
        Some(max) => plan.offset.saturating_add(max).min(keys.len()),
        None => keys.len(),
    };
    if plan.offset >= end {
        return Vec::new();
    }
    keys.truncate(end);
    keys.drain(..plan.offset);
    keys
}

/// Number of rows `execute` would return, without sorting
pub fn count(plan: &QueryPlan, snapshot: &StoreSnapshot) -> usize {
    plan.window(matching_keys(plan, snapshot).len())
}

fn sort_keys(keys: &mut [String], snapshot: &StoreSnapshot, column: &str, numeric: bool, descending: bool) {
    let field = |key: &str| -> String {
        snapshot
            .state()
            .get(key)
            .and_then(|r| indexed_value(column, key, &r.value).map(str::to_string))
            .unwrap_or_default()
    };
    if numeric {
        let mut decorated: Vec<(f64, String)> = keys
            .iter()
            .map(|k| (parse_decimal(&field(k)), k.clone()))
            .collect();
        decorated.sort_by(|a, b| directed(a.0.total_cmp(&b.0), descending));
        for (slot, (_, key)) in keys.iter_mut().zip(decorated) {
            *slot = key;
        }
    } else {
        let mut decorated: Vec<(String, String)> =
            keys.iter().map(|k| (field(k), k.clone())).collect();
        decorated.sort_by(|a, b| directed(a.0.cmp(&b.0), descending));
        for (slot, (_, key)) in keys.iter_mut().zip(decorated) {
            *slot = key;
        }
    }
}

fn directed(ord: Ordering, descending: bool) -> Ordering {
    if descending {
        ord.reverse()
    } else {
        ord
    }
}
