//! Query planning
//!
//! Each condition is either served by a secondary index (when one of the
//! right kind exists on its column, the condition is positive and the
//! no-index flag is unset) or evaluated by scanning.

use std::fmt;

use tansu_core::{IndexKind, Result};
use tansu_storage::{normalize_column, IndexLookup, StoreSnapshot};

use crate::condition::CompiledCondition;
use crate::operator::Direction;
use crate::query::Query;

/// How one condition is evaluated
#[derive(Debug, Clone)]
pub enum Access {
    /// Candidate keys come from an index
    Index {
        /// Kind of the index used
        kind: IndexKind,
        /// Lookup issued against it
        lookup: IndexLookup,
    },
    /// Every candidate record is tested
    Scan,
}

/// One planned condition
#[derive(Debug, Clone)]
pub struct PlanStep {
    /// The condition
    pub condition: CompiledCondition,
    /// How it is evaluated
    pub access: Access,
}

/// Executable plan for a [`Query`]
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Planned conditions, in query order
    pub steps: Vec<PlanStep>,
    /// Sort column (canonical) and direction
    pub order: Option<(String, Direction)>,
    /// Rows skipped
    pub offset: usize,
    /// Row cap
    pub limit: Option<usize>,
}

impl QueryPlan {
    /// Steps answered from an index
    pub fn indexed_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.access, Access::Index { .. }))
    }

    /// Steps answered by scanning
    pub fn scan_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.access, Access::Scan))
    }

    /// True if no condition uses an index
    pub fn is_full_scan(&self) -> bool {
        self.indexed_steps().next().is_none()
    }

    /// Apply offset and limit to a match count
    pub fn window(&self, matches: usize) -> usize {
        let after_offset = matches.saturating_sub(self.offset);
        match self.limit {
            Some(max) => after_offset.min(max),
            None => after_offset,
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            writeln!(f, "scan all records")?;
        }
        for step in &self.steps {
            let c = &step.condition;
            let column = if c.column().is_empty() { ":pk" } else { c.column() };
            let neg = if c.is_negated() { "not " } else { "" };
            match &step.access {
                Access::Index { kind, .. } => {
                    writeln!(f, "index {} ({}): {}{}", column, kind, neg, c.op())?
                }
                Access::Scan => writeln!(f, "scan {}: {}{}", column, neg, c.op())?,
            }
        }
        if let Some((column, direction)) = &self.order {
            writeln!(f, "order by {} {}", column, direction)?;
        }
        if self.offset > 0 || self.limit.is_some() {
            match self.limit {
                Some(max) => writeln!(f, "offset {} limit {}", self.offset, max)?,
                None => writeln!(f, "offset {}", self.offset)?,
            }
        }
        Ok(())
    }
}

/// Compile `query` and choose an access path for each condition
pub fn plan(query: &Query, snapshot: &StoreSnapshot) -> Result<QueryPlan> {
    let mut steps = Vec::with_capacity(query.conditions().len());
    for condition in query.conditions() {
        let compiled = condition.compile()?;
        let access = choose_access(&compiled, snapshot);
        steps.push(PlanStep {
            condition: compiled,
            access,
        });
    }
    Ok(QueryPlan {
        steps,
        order: query
            .ordering()
            .map(|o| (normalize_column(&o.column).to_string(), o.direction)),
        offset: query.skip(),
        limit: query.max_rows(),
    })
}

fn choose_access(condition: &CompiledCondition, snapshot: &StoreSnapshot) -> Access {
    let lookup = match condition.index_lookup() {
        Some(p) => p,
        None => return Access::Scan,
    };
    match snapshot.indexes().kind_of(condition.column()) {
        Some(kind) if kind == lookup.kind() => Access::Index { kind, lookup },
        _ => Access::Scan,
    }
}
