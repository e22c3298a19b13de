//!
//! Value model for NFD match expressions.
//!
//! This crate is intentionally small and shared by:
//! - the rule document loader (deploy-time deserialization),
//! - the set/rule evaluators (runtime),
//! - and any caller that needs to validate a rule before evaluating it.
//!
//! Key types:
//! - `MatchOp` / `MatchValue` / `MatchExpression`: the operator + raw-string operand model.
//! - `validate`: the arity/content checks from the invariants table, run once before evaluation.
//! - `RegexCache`: a bounded, thread-safe cache of compiled patterns shared across evaluations.

use std::num::ParseIntError;
use std::sync::Mutex;

use lru::LruCache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The operator half of a `MatchExpression`.
pub enum MatchOp {
    In,
    NotIn,
    InRegexp,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
    GtLt,
    IsTrue,
    IsFalse,
    Any,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// An ordered sequence of raw string operands.
///
/// Numeric and regex interpretation happens at evaluation time; `MatchValue`
/// itself never parses anything.
pub struct MatchValue(pub Vec<String>);

impl MatchValue {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for MatchValue {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single operator + operand pair, applied to one key (and optionally its value).
pub struct MatchExpression {
    pub op: MatchOp,
    #[serde(default, skip_serializing_if = "MatchValue::is_empty")]
    pub value: MatchValue,
}

impl MatchExpression {
    pub fn new(op: MatchOp, value: MatchValue) -> Self {
        Self { op, value }
    }

    pub fn op_only(op: MatchOp) -> Self {
        Self {
            op,
            value: MatchValue::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("operator {op:?} must not carry a value, got {count} element(s)")]
    InvalidExpression { op: MatchOp, count: usize },
    #[error("operator {op:?} requires at least one value")]
    InvalidExpressionEmpty { op: MatchOp },
    #[error("operator {op:?} requires exactly {expected} value(s), got {got}")]
    InvalidExpressionArity {
        op: MatchOp,
        expected: usize,
        got: usize,
    },
    #[error("GtLt requires the first value to be strictly less than the second")]
    InvalidExpressionRange,
    #[error("operator {op:?} cannot be evaluated without a value in this context")]
    InvalidOperandNoValue { op: MatchOp },
    #[error("operand {operand:?} is not a valid signed integer: {source}")]
    InvalidOperandInt {
        operand: String,
        #[source]
        source: ParseIntError,
    },
    #[error("operand {pattern:?} does not compile as a regular expression: {message}")]
    InvalidOperandRegex { pattern: String, message: String },
    #[error("unknown operator")]
    UnknownOperator,
}

/// Validates a `MatchExpression` against the arity/content invariants.
///
/// Must be run before evaluation; evaluation assumes validated expressions.
pub fn validate(expr: &MatchExpression) -> Result<(), ValueError> {
    match expr.op {
        MatchOp::Exists
        | MatchOp::DoesNotExist
        | MatchOp::Any
        | MatchOp::IsTrue
        | MatchOp::IsFalse => {
            if !expr.value.is_empty() {
                return Err(ValueError::InvalidExpression {
                    op: expr.op,
                    count: expr.value.len(),
                });
            }
        }
        MatchOp::Gt | MatchOp::Lt => {
            if expr.value.len() != 1 {
                return Err(ValueError::InvalidExpressionArity {
                    op: expr.op,
                    expected: 1,
                    got: expr.value.len(),
                });
            }
            parse_int(&expr.value.0[0])?;
        }
        MatchOp::GtLt => {
            if expr.value.len() != 2 {
                return Err(ValueError::InvalidExpressionArity {
                    op: expr.op,
                    expected: 2,
                    got: expr.value.len(),
                });
            }
            let a = parse_int(&expr.value.0[0])?;
            let b = parse_int(&expr.value.0[1])?;
            if a >= b {
                return Err(ValueError::InvalidExpressionRange);
            }
        }
        MatchOp::In | MatchOp::NotIn => {
            if expr.value.is_empty() {
                return Err(ValueError::InvalidExpressionEmpty { op: expr.op });
            }
        }
        MatchOp::InRegexp => {
            if expr.value.is_empty() {
                return Err(ValueError::InvalidExpressionEmpty { op: expr.op });
            }
            for pattern in &expr.value.0 {
                Regex::new(pattern).map_err(|e| ValueError::InvalidOperandRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            }
        }
    }
    Ok(())
}

fn parse_int(s: &str) -> Result<i64, ValueError> {
    s.parse::<i64>()
        .map_err(|source| ValueError::InvalidOperandInt {
            operand: s.to_string(),
            source,
        })
}

/// Default capacity of the shared regex cache (see `RegexCache`).
pub const DEFAULT_REGEX_CACHE_SIZE: usize = 256;

/// A bounded, thread-safe LRU cache of compiled regular expressions, keyed by
/// pattern string.
///
/// Shared across evaluations so repeated `InRegexp` matches against the same
/// pattern don't recompile it. A cache miss never fails the engine: the
/// pattern is compiled on the spot and only the insertion into the cache is
/// best-effort.
pub struct RegexCache {
    inner: Mutex<LruCache<String, Regex>>,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the compiled regex for `pattern`, compiling and caching it on miss.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Regex, ValueError> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
        drop(guard);

        let re = Regex::new(pattern).map_err(|e| ValueError::InvalidOperandRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut guard = self.inner.lock().unwrap();
        guard.put(pattern.to_string(), re.clone());
        Ok(re)
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_SIZE)
    }
}
