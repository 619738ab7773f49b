//! Condition operators and sort directions
//!
//! Both parse from the classic table-query names and their aliases, e.g.
//! `"streq"`, `"eq"`, `"equals"` all name [`Operator::StrEq`].

use std::fmt;
use std::str::FromStr;

use tansu_core::{Error, IndexKind};

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// String equals operand
    StrEq,
    /// String contains operand
    StrInc,
    /// String begins with operand
    StrBw,
    /// String ends with operand
    StrEw,
    /// String contains every operand token as a token
    StrAnd,
    /// String contains at least one operand token as a token
    StrOr,
    /// String equals one of the operand tokens
    StrOrEq,
    /// String matches the operand regex
    StrRx,
    /// Number equals operand
    NumEq,
    /// Number greater than operand
    NumGt,
    /// Number greater than or equal to operand
    NumGe,
    /// Number less than operand
    NumLt,
    /// Number less than or equal to operand
    NumLe,
    /// Number between the two operand tokens (inclusive)
    NumBt,
    /// Number equals one of the operand tokens
    NumOrEq,
}

impl Operator {
    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Operator::StrEq => "streq",
            Operator::StrInc => "strinc",
            Operator::StrBw => "strbw",
            Operator::StrEw => "strew",
            Operator::StrAnd => "strand",
            Operator::StrOr => "stror",
            Operator::StrOrEq => "stroreq",
            Operator::StrRx => "strrx",
            Operator::NumEq => "numeq",
            Operator::NumGt => "numgt",
            Operator::NumGe => "numge",
            Operator::NumLt => "numlt",
            Operator::NumLe => "numle",
            Operator::NumBt => "numbt",
            Operator::NumOrEq => "numoreq",
        }
    }

    /// True for the numeric family
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Operator::NumEq
                | Operator::NumGt
                | Operator::NumGe
                | Operator::NumLt
                | Operator::NumLe
                | Operator::NumBt
                | Operator::NumOrEq
        )
    }

    /// Index kind that can serve this operator, if any
    pub fn index_kind(self) -> Option<IndexKind> {
        match self {
            Operator::StrEq | Operator::StrBw | Operator::StrOrEq => Some(IndexKind::Lexical),
            Operator::StrInc
            | Operator::StrEw
            | Operator::StrAnd
            | Operator::StrOr
            | Operator::StrRx => None,
            _ => Some(IndexKind::Decimal),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_ascii_lowercase().as_str() {
            "streq" | "eq" | "eql" | "equals" => Operator::StrEq,
            "strinc" | "inc" | "includes" => Operator::StrInc,
            "strbw" | "bw" | "starts_with" => Operator::StrBw,
            "strew" | "ew" | "ends_with" => Operator::StrEw,
            "strand" | "and" => Operator::StrAnd,
            "stror" | "or" => Operator::StrOr,
            "stroreq" => Operator::StrOrEq,
            "strrx" | "strorrx" | "regex" | "matches" => Operator::StrRx,
            "numeq" | "numequals" => Operator::NumEq,
            "numgt" | "gt" => Operator::NumGt,
            "numge" | "ge" | "gte" => Operator::NumGe,
            "numlt" | "lt" => Operator::NumLt,
            "numle" | "le" | "lte" => Operator::NumLe,
            "numbt" | "bt" | "between" => Operator::NumBt,
            "numoreq" => Operator::NumOrEq,
            other => return Err(Error::query(format!("unknown operator '{}'", other))),
        };
        Ok(op)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Lexical ascending
    #[default]
    StrAsc,
    /// Lexical descending
    StrDesc,
    /// Numeric ascending
    NumAsc,
    /// Numeric descending
    NumDesc,
}

impl Direction {
    /// True for numeric ordering
    pub fn is_numeric(self) -> bool {
        matches!(self, Direction::NumAsc | Direction::NumDesc)
    }

    /// True for descending ordering
    pub fn is_descending(self) -> bool {
        matches!(self, Direction::StrDesc | Direction::NumDesc)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::StrAsc => "strasc",
            Direction::StrDesc => "strdesc",
            Direction::NumAsc => "numasc",
            Direction::NumDesc => "numdesc",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strasc" | "asc" => Ok(Direction::StrAsc),
            "strdesc" | "desc" => Ok(Direction::StrDesc),
            "numasc" => Ok(Direction::NumAsc),
            "numdesc" => Ok(Direction::NumDesc),
            other => Err(Error::query(format!("unknown sort direction '{}'", other))),
        }
    }
}
