//! Query conditions
//!
//! A [`Condition`] is the user-facing description (column, operator,
//! operand text, flags). Compiling it parses numeric operands strictly,
//! tokenizes token operands and builds any regex, so evaluation itself
//! cannot fail.

use std::ops::Bound;

use regex::Regex;
use tansu_core::value::parse_double_strict;
use tansu_core::{parse_decimal, Error, Result, Value};
use tansu_storage::index::indexed_value;
use tansu_storage::{normalize_column, IndexLookup};

use crate::operator::Operator;

/// One filter on one column
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name (`""` or `":pk"` for the primary key)
    pub column: String,
    /// Operator
    pub op: Operator,
    /// Operand text
    pub operand: String,
    /// Invert the match
    pub negate: bool,
    /// Never serve this condition from an index
    pub no_index: bool,
}

impl Condition {
    /// Positive, index-eligible condition
    pub fn new(column: impl Into<String>, op: Operator, operand: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            operand: operand.into(),
            negate: false,
            no_index: false,
        }
    }

    /// Invert the match
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Force a scan for this condition
    pub fn without_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    /// Validate operands and prepare for evaluation
    pub fn compile(&self) -> Result<CompiledCondition> {
        let matcher = match self.op {
            Operator::StrEq => Matcher::StrEq(self.operand.clone()),
            Operator::StrInc => Matcher::StrInc(self.operand.clone()),
            Operator::StrBw => Matcher::StrBw(self.operand.clone()),
            Operator::StrEw => Matcher::StrEw(self.operand.clone()),
            Operator::StrAnd => Matcher::StrAnd(tokens(&self.operand)),
            Operator::StrOr => Matcher::StrOr(tokens(&self.operand)),
            Operator::StrOrEq => Matcher::StrOrEq(tokens(&self.operand)),
            Operator::StrRx => Matcher::StrRx(Regex::new(&self.operand).map_err(|e| {
                Error::query(format!("invalid regex {:?}: {}", self.operand, e))
            })?),
            Operator::NumEq => Matcher::Num {
                lower: Bound::Included(self.number(&self.operand)?),
                upper: Bound::Included(self.number(&self.operand)?),
            },
            Operator::NumGt => Matcher::Num {
                lower: Bound::Excluded(self.number(&self.operand)?),
                upper: Bound::Unbounded,
            },
            Operator::NumGe => Matcher::Num {
                lower: Bound::Included(self.number(&self.operand)?),
                upper: Bound::Unbounded,
            },
            Operator::NumLt => Matcher::Num {
                lower: Bound::Unbounded,
                upper: Bound::Excluded(self.number(&self.operand)?),
            },
            Operator::NumLe => Matcher::Num {
                lower: Bound::Unbounded,
                upper: Bound::Included(self.number(&self.operand)?),
            },
            Operator::NumBt => {
                let parts = tokens(&self.operand);
                if parts.len() != 2 {
                    return Err(Error::query(format!(
                        "{} on column {:?} needs two numbers, got {:?}",
                        self.op, self.column, self.operand
                    )));
                }
                let a = self.number(&parts[0])?;
                let b = self.number(&parts[1])?;
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                Matcher::Num {
                    lower: Bound::Included(lo),
                    upper: Bound::Included(hi),
                }
            }
            Operator::NumOrEq => {
                let numbers = tokens(&self.operand)
                    .iter()
                    .map(|t| self.number(t))
                    .collect::<Result<Vec<f64>>>()?;
                Matcher::NumAny(numbers)
            }
        };
        Ok(CompiledCondition {
            column: normalize_column(&self.column).to_string(),
            op: self.op,
            negate: self.negate,
            no_index: self.no_index,
            matcher,
        })
    }

    fn number(&self, text: &str) -> Result<f64> {
        parse_double_strict(text).ok_or_else(|| {
            Error::query(format!(
                "{} on column {:?} expects a number, got {:?}",
                self.op, self.column, text
            ))
        })
    }
}

/// Split a token operand on whitespace and commas
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
enum Matcher {
    StrEq(String),
    StrInc(String),
    StrBw(String),
    StrEw(String),
    StrAnd(Vec<String>),
    StrOr(Vec<String>),
    StrOrEq(Vec<String>),
    StrRx(Regex),
    Num { lower: Bound<f64>, upper: Bound<f64> },
    NumAny(Vec<f64>),
}

impl Matcher {
    fn test(&self, text: &str) -> bool {
        match self {
            Matcher::StrEq(s) => text == s,
            Matcher::StrInc(s) => text.contains(s.as_str()),
            Matcher::StrBw(s) => text.starts_with(s.as_str()),
            Matcher::StrEw(s) => text.ends_with(s.as_str()),
            Matcher::StrAnd(wanted) => {
                let have = tokens(text);
                wanted.iter().all(|w| have.contains(w))
            }
            Matcher::StrOr(wanted) => {
                let have = tokens(text);
                wanted.iter().any(|w| have.contains(w))
            }
            Matcher::StrOrEq(options) => options.iter().any(|o| o == text),
            Matcher::StrRx(re) => re.is_match(text),
            Matcher::Num { lower, upper } => {
                let n = parse_decimal(text);
                let above = match lower {
                    Bound::Included(v) => n >= *v,
                    Bound::Excluded(v) => n > *v,
                    Bound::Unbounded => true,
                };
                let below = match upper {
                    Bound::Included(v) => n <= *v,
                    Bound::Excluded(v) => n < *v,
                    Bound::Unbounded => true,
                };
                above && below
            }
            Matcher::NumAny(options) => {
                let n = parse_decimal(text);
                options.iter().any(|o| *o == n)
            }
        }
    }
}

/// A validated condition ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    column: String,
    op: Operator,
    negate: bool,
    no_index: bool,
    matcher: Matcher,
}

impl CompiledCondition {
    /// Canonical column name (`""` for the primary key)
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Operator
    pub fn op(&self) -> Operator {
        self.op
    }

    /// True if inverted
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Evaluate against one record
    ///
    /// A missing column never satisfies a positive condition; negation
    /// turns that into a match.
    pub fn matches(&self, key: &str, value: &Value) -> bool {
        match indexed_value(&self.column, key, value) {
            Some(text) => self.matcher.test(text) != self.negate,
            None => self.negate,
        }
    }

    /// Index lookup equivalent to this condition, if one exists
    pub fn index_lookup(&self) -> Option<IndexLookup> {
        if self.negate || self.no_index {
            return None;
        }
        match &self.matcher {
            Matcher::StrEq(s) => Some(IndexLookup::Exact(s.clone())),
            Matcher::StrBw(s) => Some(IndexLookup::Prefix(s.clone())),
            Matcher::StrOrEq(options) => Some(IndexLookup::AnyOf(options.clone())),
            Matcher::Num { lower, upper } => Some(IndexLookup::Range {
                lower: *lower,
                upper: *upper,
            }),
            Matcher::NumAny(options) => Some(IndexLookup::AnyNumber(options.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansu_core::Record;

    fn rec(pairs: &[(&str, &str)]) -> Value {
        Value::from(Record::from_pairs(pairs.iter().copied()))
    }

    fn check(op: Operator, operand: &str, field: &str) -> bool {
        Condition::new("c", op, operand)
            .compile()
            .unwrap()
            .matches("k", &rec(&[("c", field)]))
    }

    #[test]
    fn test_string_family() {
        assert!(check(Operator::StrEq, "bob", "bob"));
        assert!(!check(Operator::StrEq, "bob", "bobby"));
        assert!(check(Operator::StrInc, "ob", "bobby"));
        assert!(check(Operator::StrBw, "bo", "bobby"));
        assert!(check(Operator::StrEw, "by", "bobby"));
        assert!(check(Operator::StrAnd, "red,blue", "blue green red"));
        assert!(!check(Operator::StrAnd, "red blue", "red green"));
        assert!(check(Operator::StrOr, "red blue", "red green"));
        assert!(!check(Operator::StrOr, "re", "red green"));
        assert!(check(Operator::StrOrEq, "alice, bob", "bob"));
        assert!(check(Operator::StrRx, "^b.b", "bobby"));
    }

    #[test]
    fn test_numeric_family() {
        assert!(check(Operator::NumEq, "45", "45.0"));
        assert!(check(Operator::NumGt, "44", "45"));
        assert!(!check(Operator::NumGt, "45", "45"));
        assert!(check(Operator::NumGe, "45", "45"));
        assert!(check(Operator::NumLt, "46", "45abc"));
        assert!(check(Operator::NumLe, "0", "not a number"));
        assert!(check(Operator::NumBt, "50 10", "22"));
        assert!(check(Operator::NumOrEq, "1,2,3", "2"));
    }

    #[test]
    fn test_missing_column_and_negation() {
        let cond = Condition::new("age", Operator::NumGt, "1").compile().unwrap();
        let v = rec(&[("name", "x")]);
        assert!(!cond.matches("k", &v));

        let neg = Condition::new("age", Operator::NumGt, "1")
            .negated()
            .compile()
            .unwrap();
        assert!(neg.matches("k", &v));
        assert!(neg.index_lookup().is_none());
    }

    #[test]
    fn test_primary_key_column() {
        let cond = Condition::new(":pk", Operator::StrBw, "user:")
            .compile()
            .unwrap();
        assert_eq!(cond.column(), "");
        assert!(cond.matches("user:1", &rec(&[])));
        assert!(cond.matches("user:2", &Value::from("raw")));
        assert!(!cond.matches("admin:1", &rec(&[])));
    }

    #[test]
    fn test_bad_operands() {
        assert!(Condition::new("a", Operator::NumGt, "ten").compile().is_err());
        assert!(Condition::new("a", Operator::NumBt, "1").compile().is_err());
        assert!(Condition::new("a", Operator::NumOrEq, "1 x").compile().is_err());
        let err = Condition::new("a", Operator::StrRx, "(").compile().unwrap_err();
        assert_eq!(err.kind(), tansu_core::ErrorKind::Query);
    }

    #[test]
    fn test_index_lookups() {
        let c = Condition::new("a", Operator::NumBt, "9 3").compile().unwrap();
        assert_eq!(
            c.index_lookup(),
            Some(IndexLookup::Range {
                lower: Bound::Included(3.0),
                upper: Bound::Included(9.0),
            })
        );
        let c = Condition::new("a", Operator::StrEq, "x")
            .without_index()
            .compile()
            .unwrap();
        assert!(c.index_lookup().is_none());
        let c = Condition::new("a", Operator::StrInc, "x").compile().unwrap();
        assert!(c.index_lookup().is_none());
    }
}
