//! Filter and ordering predicates for remote selects.

use crate::row::{format_timestamp, parse_timestamp, RemoteRow};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// Column equals value.
    Eq,
    /// Column is strictly greater than value.
    Gt,
}

impl PredicateOp {
    /// Returns the operator's wire name (`eq`, `gt`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "eq",
            PredicateOp::Gt => "gt",
        }
    }
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Column name.
    pub column: String,
    /// Operator.
    pub op: PredicateOp,
    /// Comparison value.
    pub value: Value,
}

impl Predicate {
    /// Returns true if the row satisfies this predicate.
    ///
    /// A missing column never matches.
    pub fn matches(&self, row: &RemoteRow) -> bool {
        let Some(actual) = row.get(&self.column) else {
            return false;
        };
        match self.op {
            PredicateOp::Eq => compare_values(actual, &self.value) == Some(Ordering::Equal),
            PredicateOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
        }
    }
}

/// Sort order of a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to sort by.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
}

/// A select query against one remote table.
///
/// # Example
///
/// ```
/// use walletsync_protocol::Query;
///
/// let query = Query::new()
///     .eq("table_name", "tags")
///     .order_by("deleted_at", true);
/// assert_eq!(query.predicates.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Predicates, combined with AND.
    pub predicates: Vec<Predicate>,
    /// Optional ordering.
    pub order: Option<Order>,
}

impl Query {
    /// Creates a query matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality predicate.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            column: column.into(),
            op: PredicateOp::Eq,
            value: value.into(),
        });
        self
    }

    /// Adds a greater-than predicate.
    pub fn gt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            column: column.into(),
            op: PredicateOp::Gt,
            value: value.into(),
        });
        self
    }

    /// Adds a greater-than predicate on a timestamp column.
    pub fn after(self, column: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.gt(column, format_timestamp(at))
    }

    /// Sets the ordering.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Returns true if the row satisfies every predicate.
    pub fn matches(&self, row: &RemoteRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Filters and sorts rows the way a backend would.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a RemoteRow>) -> Vec<RemoteRow> {
        let mut selected: Vec<RemoteRow> =
            rows.into_iter().filter(|r| self.matches(r)).cloned().collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        selected
    }
}

/// Compares two JSON values.
///
/// Strings that both parse as RFC 3339 timestamps compare chronologically,
/// numbers numerically. Values of different kinds are incomparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Ok(tx), Ok(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
