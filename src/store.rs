//! Tabular storage the analyser reads from and writes to.
//!
//! Every table is addressed by name and holds a header row followed by data
//! rows. Two backends exist: [`crate::db::PgStore`] for real runs and
//! [`MemoryStore`] for tests and `--dry-run`.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;

use crate::models::Row;

pub const SURVEY_TABLE: &str = "survey";
pub const DIFFERENCES_TABLE: &str = "monthly_differences";
pub const RECOMMENDATIONS_TABLE: &str = "feature_recommendations";

pub const SURVEY_HEADER: [&str; 7] = [
    "Timestamp",
    "Gender",
    "Age Group",
    "Satisfaction",
    "Recommend",
    "Favorite Feature",
    "Comments",
];
pub const DIFFERENCES_HEADER: [&str; 2] = ["Month", "Difference"];
pub const RECOMMENDATIONS_HEADER: [&str; 1] = ["Recommendation"];

pub fn headers() -> Vec<(&'static str, Row)> {
    let to_row = |cells: &[&str]| cells.iter().map(|cell| cell.to_string()).collect::<Row>();
    vec![
        (SURVEY_TABLE, to_row(&SURVEY_HEADER)),
        (DIFFERENCES_TABLE, to_row(&DIFFERENCES_HEADER)),
        (RECOMMENDATIONS_TABLE, to_row(&RECOMMENDATIONS_HEADER)),
    ]
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Every row of the table, header first.
    async fn read_all(&self, table: &str) -> anyhow::Result<Vec<Row>>;

    async fn append_one(&self, table: &str, row: Row) -> anyhow::Result<()>;

    async fn append_many(&self, table: &str, rows: Vec<Row>) -> anyhow::Result<()>;

    /// Removes all rows except the header.
    async fn clear_body(&self, table: &str) -> anyhow::Result<()>;

    /// Last `n` values of a column, skipping the header and rows too short
    /// to have that column.
    async fn read_column_tail(
        &self,
        table: &str,
        column: usize,
        n: usize,
    ) -> anyhow::Result<Vec<String>>;

    /// Writes the header row when the table has none yet.
    async fn ensure_header(&self, table: &str, header: Row) -> anyhow::Result<()>;

    /// Data rows only. A table without a header returns every row.
    async fn read_body(&self, table: &str) -> anyhow::Result<Vec<Row>>;
}

pub(crate) fn column_tail(body: &[Row], column: usize, n: usize) -> Vec<String> {
    let values: Vec<String> = body
        .iter()
        .filter_map(|row| row.get(column).cloned())
        .collect();
    let skip = values.len().saturating_sub(n);
    values.into_iter().skip(skip).collect()
}

#[derive(Debug, Default)]
struct MemoryTable {
    header: Option<Row>,
    body: Vec<Row>,
}

/// In-process store; tables spring into existence on first write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: std::sync::Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with all analyser tables created and their headers written.
    pub fn with_headers() -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            for (name, header) in headers() {
                tables.insert(
                    name.to_string(),
                    MemoryTable {
                        header: Some(header),
                        body: Vec::new(),
                    },
                );
            }
        }
        store
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, MemoryTable>) -> T,
    ) -> anyhow::Result<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(f(&mut tables))
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn read_all(&self, table: &str) -> anyhow::Result<Vec<Row>> {
        self.with_tables(|tables| {
            tables.get(table).map(|t| {
                t.header
                    .iter()
                    .cloned()
                    .chain(t.body.iter().cloned())
                    .collect::<Vec<Row>>()
            })
        })?
        .with_context(|| format!("table {table} does not exist"))
    }

    async fn read_body(&self, table: &str) -> anyhow::Result<Vec<Row>> {
        self.with_tables(|tables| tables.get(table).map(|t| t.body.clone()))?
            .with_context(|| format!("table {table} does not exist"))
    }

    async fn append_one(&self, table: &str, row: Row) -> anyhow::Result<()> {
        self.with_tables(|tables| {
            tables.entry(table.to_string()).or_default().body.push(row);
        })
    }

    async fn append_many(&self, table: &str, rows: Vec<Row>) -> anyhow::Result<()> {
        self.with_tables(|tables| {
            tables.entry(table.to_string()).or_default().body.extend(rows);
        })
    }

    async fn clear_body(&self, table: &str) -> anyhow::Result<()> {
        self.with_tables(|tables| {
            if let Some(t) = tables.get_mut(table) {
                t.body.clear();
            }
        })
    }

    async fn read_column_tail(
        &self,
        table: &str,
        column: usize,
        n: usize,
    ) -> anyhow::Result<Vec<String>> {
        self.with_tables(|tables| {
            tables
                .get(table)
                .map(|t| column_tail(&t.body, column, n))
                .unwrap_or_default()
        })
    }

    async fn ensure_header(&self, table: &str, header: Row) -> anyhow::Result<()> {
        self.with_tables(|tables| {
            let t = tables.entry(table.to_string()).or_default();
            if t.header.is_none() {
                t.header = Some(header);
            }
        })
    }
}
