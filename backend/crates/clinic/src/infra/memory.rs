//! In-process row store
//!
//! Same filter, ordering and limit semantics as the REST store. Used by
//! tests and local development.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::domain::repository::{
    Direction, Filter, Query, Row, RowStore, compare_values, refuse_unfiltered,
};
use crate::error::ClinicResult;

#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Row>>> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of rows currently in `table`
    pub fn count(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, Vec::len)
    }

    /// Copy of every row in `table`, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().get(table).cloned().unwrap_or_default()
    }
}

impl RowStore for InMemoryRowStore {
    async fn select(&self, table: &str, query: &Query) -> ClinicResult<Vec<Row>> {
        let tables = self.lock();
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = match (a.get(column), b.get(column)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> ClinicResult<Row> {
        self.lock()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> ClinicResult<Vec<Row>> {
        refuse_unfiltered("update", table, filter)?;
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (key, value) in &patch {
                row.insert(key.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> ClinicResult<u64> {
        refuse_unfiltered("delete", table, filter)?;
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

/// Build a row from a JSON object literal; non-objects give an empty row
pub fn row_from(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
