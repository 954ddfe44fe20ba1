//! Structured statements understood by [`crate::Database`].
//!
//! Services build these directly; [`crate::sql`] produces the same values
//! from SQL text. Predicate evaluation, ordering and DISTINCT projection live
//! here so that both paths share one set of semantics.

use serde_json::Value;
use std::cmp::Ordering;

use crate::schema::Table;
use crate::store::Record;

/// What INSERT does when a row with the same natural key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Plain INSERT: always append
    #[default]
    Append,
    /// INSERT OR REPLACE
    Replace,
    /// INSERT OR IGNORE
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: Value },
    Like { column: String, pattern: String },
    Range { column: String, low: Value, high: Value },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn range(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Range {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Eq { column, value } => record.get(column) == Some(value),
            Predicate::Like { column, pattern } => {
                let needle = pattern.replace('%', "").to_lowercase();
                like_text(record.get(column))
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            }
            Predicate::Range { column, low, high } => {
                let Some(field) = record.get(column) else {
                    return false;
                };
                matches!(
                    compare_values(field, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(field, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}

/// Text a LIKE pattern is matched against. Empty, zero, false and null fields never match.
fn like_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Array(_) | Value::Object(_) => value.map(|v| v.to_string()),
        _ => None,
    }
}

/// Position of a value's type in ORDER BY: missing and null first, then bools, numbers, text
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_) | Value::Object(_)) => 4,
    }
}

/// Total order over optional field values, used for sorting
pub fn sort_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ (Value::Array(_) | Value::Object(_))), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    })
}

/// Natural ordering of two field values. `None` when the types are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    /// Stable sort: rows that compare equal keep their relative order.
    /// Rows missing the column or holding null sort before every other value.
    pub fn sort(&self, rows: &mut [Record]) {
        rows.sort_by(|a, b| {
            let ord = sort_values(a.get(&self.column), b.get(&self.column));
            match self.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    pub filter: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub distinct: Option<String>,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filter: None,
            order_by: None,
            distinct: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn distinct(mut self, column: impl Into<String>) -> Self {
        self.distinct = Some(column.into());
        self
    }

    /// Filter, order, then project a table snapshot
    pub fn evaluate(&self, rows: Vec<Record>) -> Vec<Record> {
        let mut rows: Vec<Record> = match &self.filter {
            Some(predicate) => rows.into_iter().filter(|r| predicate.matches(r)).collect(),
            None => rows,
        };

        if let Some(order) = &self.order_by {
            order.sort(&mut rows);
        }

        match &self.distinct {
            Some(column) => {
                let mut seen: Vec<Value> = Vec::new();
                for row in &rows {
                    let value = row.get(column).cloned().unwrap_or(Value::Null);
                    if !seen.contains(&value) {
                        seen.push(value);
                    }
                }
                seen.into_iter()
                    .map(|value| {
                        let mut projected = Record::new();
                        projected.insert(column.clone(), value);
                        projected
                    })
                    .collect()
            }
            None => rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: Table,
        columns: Vec<String>,
        values: Vec<Value>,
        on_conflict: OnConflict,
    },
    /// Patch the single row whose `id` equals `id`
    Update {
        table: Table,
        assignments: Vec<(String, Value)>,
        id: Value,
    },
    Delete {
        table: Table,
        filter: Option<Predicate>,
    },
    Select(Select),
}

impl Statement {
    /// Build an INSERT from column/value pairs
    pub fn insert<I, K>(table: Table, pairs: I, on_conflict: OnConflict) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Statement::Insert {
            table,
            columns,
            values,
            on_conflict,
        }
    }

    /// INSERT that reproduces an existing record column for column
    pub fn insert_record(table: Table, record: &Record, on_conflict: OnConflict) -> Self {
        Self::insert(
            table,
            record.iter().map(|(k, v)| (k.clone(), v.clone())),
            on_conflict,
        )
    }

    pub fn table(&self) -> Table {
        match self {
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => *table,
            Statement::Select(select) => select.table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Insert { .. } => "INSERT",
            Statement::Update { .. } => "UPDATE",
            Statement::Delete { .. } => "DELETE",
            Statement::Select(_) => "SELECT",
        }
    }
}
