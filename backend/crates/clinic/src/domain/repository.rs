//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use kernel::id::AdminId;
use platform::password::HashedPassword;
use serde_json::{Map, Value};

use crate::domain::entity::admin::Admin;
use crate::error::{ClinicError, ClinicResult};

/// One table row as returned by the hosted store
pub type Row = Map<String, Value>;

/// Comparison operator of a single filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Lte,
    Gte,
}

impl Op {
    /// PostgREST operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Gte => "gte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of column conditions; empty matches every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Eq, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lt, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lte, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Gte, value)
    }

    fn with(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a row (in-process stores)
    ///
    /// A missing column or incomparable values never match.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| {
            let Some(actual) = row.get(&c.column) else {
                return false;
            };
            match c.op {
                Op::Eq => compare_values(actual, &c.value) == Some(Ordering::Equal),
                Op::Lt => compare_values(actual, &c.value) == Some(Ordering::Less),
                Op::Lte => matches!(
                    compare_values(actual, &c.value),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                Op::Gte => matches!(
                    compare_values(actual, &c.value),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
            }
        })
    }
}

/// Reject an update or delete whose filter would touch every row
pub fn refuse_unfiltered(action: &str, table: &str, filter: &Filter) -> ClinicResult<()> {
    if filter.is_empty() {
        return Err(ClinicError::Validation(format!(
            "refusing unfiltered {action} on {table}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filter plus ordering and limit for reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Order two JSON values
///
/// Numbers compare numerically, strings that both parse as RFC 3339
/// timestamps compare as instants, other strings lexicographically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => {
            match (
                x.parse::<DateTime<Utc>>().ok(),
                y.parse::<DateTime<Utc>>().ok(),
            ) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

/// Hosted row store
#[trait_variant::make(RowStore: Send)]
pub trait LocalRowStore {
    /// Rows matching the query
    async fn select(&self, table: &str, query: &Query) -> ClinicResult<Vec<Row>>;

    /// Insert a row, returning it as stored
    async fn insert(&self, table: &str, row: Row) -> ClinicResult<Row>;

    /// Merge `patch` into every matching row, returning the updated rows
    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> ClinicResult<Vec<Row>>;

    /// Delete matching rows, returning how many were removed
    async fn delete(&self, table: &str, filter: &Filter) -> ClinicResult<u64>;
}

/// Admin account repository
#[trait_variant::make(AdminRepository: Send)]
pub trait LocalAdminRepository {
    /// Find admin by normalized email
    async fn find_by_email(&self, email: &str) -> ClinicResult<Option<Admin>>;

    /// Replace the stored password hash
    async fn update_password_hash(
        &self,
        admin_id: &AdminId,
        password_hash: &HashedPassword,
    ) -> ClinicResult<()>;
}
