use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row as _};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Row;
use crate::store::{self, SheetStore, SURVEY_TABLE};
use crate::validate;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn init_db<S: SheetStore + ?Sized>(pool: &PgPool, store: &S) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    for (table, header) in store::headers() {
        store.ensure_header(table, header).await?;
    }
    Ok(())
}

#[async_trait]
impl SheetStore for PgStore {
    async fn read_all(&self, table: &str) -> anyhow::Result<Vec<Row>> {
        let records = sqlx::query(
            r#"
            SELECT cells FROM survey_results.sheet_rows
            WHERE sheet = $1
            ORDER BY is_header DESC, position ASC
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to read table {table}"))?;

        Ok(records.into_iter().map(|row| row.get::<Vec<String>, _>("cells")).collect())
    }

    async fn read_body(&self, table: &str) -> anyhow::Result<Vec<Row>> {
        let records = sqlx::query(
            r#"
            SELECT cells FROM survey_results.sheet_rows
            WHERE sheet = $1 AND NOT is_header
            ORDER BY position ASC
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to read table {table}"))?;

        Ok(records.into_iter().map(|row| row.get::<Vec<String>, _>("cells")).collect())
    }

    async fn append_one(&self, table: &str, row: Row) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO survey_results.sheet_rows (id, sheet, is_header, cells)
            VALUES ($1, $2, FALSE, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(table)
        .bind(&row)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to append to table {table}"))?;
        Ok(())
    }

    async fn append_many(&self, table: &str, rows: Vec<Row>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO survey_results.sheet_rows (id, sheet, is_header, cells)
                VALUES ($1, $2, FALSE, $3)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(table)
            .bind(&row)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to append to table {table}"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_body(&self, table: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM survey_results.sheet_rows WHERE sheet = $1 AND NOT is_header")
            .bind(table)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear table {table}"))?;
        Ok(())
    }

    async fn read_column_tail(
        &self,
        table: &str,
        column: usize,
        n: usize,
    ) -> anyhow::Result<Vec<String>> {
        let body = self.read_body(table).await?;
        Ok(store::column_tail(&body, column, n))
    }

    async fn ensure_header(&self, table: &str, header: Row) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO survey_results.sheet_rows (id, sheet, is_header, cells)
            SELECT $1, $2, TRUE, $3
            WHERE NOT EXISTS (
                SELECT 1 FROM survey_results.sheet_rows WHERE sheet = $2 AND is_header
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(table)
        .bind(&header)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write header for table {table}"))?;
        Ok(())
    }
}

pub fn sample_rows() -> Vec<Row> {
    let rows: [[&str; 7]; 8] = [
        ["02/07/2024 09:12", "Female", "25-34", "4", "Yes", "Design", "Looks great on mobile."],
        ["11/07/2024 14:40", "Male", "45-54", "2", "No", "Price", "Too expensive for what it does."],
        ["23/07/2024 18:05", "Female", "35-44", "3", "No", "Customer Support", "Waited a week for a reply."],
        ["01/08/2024 10:50", "Female", "45-54", "4", "Yes", "Price", "Reasonably priced for what it offers."],
        ["09/08/2024 08:30", "Male", "18-24", "5", "Yes", "Ease of Use", "Set up in minutes."],
        ["17/08/2024 21:14", "Non-binary", "25-34", "2", "No", "Price", "Subscription went up again."],
        ["04/09/2024 12:02", "Male", "55-64", "3", "No", "Functionality", "Missing export options."],
        ["19/09/2024 16:45", "Female", "35-44", "4", "Yes", "Functionality", "Does everything I need."],
    ];
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

pub async fn seed<S: SheetStore + ?Sized>(store: &S) -> anyhow::Result<usize> {
    for (table, header) in store::headers() {
        store.ensure_header(table, header).await?;
    }
    let rows = sample_rows();
    let count = rows.len();
    store.append_many(SURVEY_TABLE, rows).await?;
    Ok(count)
}

pub async fn import_csv<S: SheetStore + ?Sized>(
    store: &S,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    // Headers match the survey table; snake_case names are accepted too.
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(rename = "Timestamp", alias = "timestamp")]
        timestamp: String,
        #[serde(rename = "Gender", alias = "gender")]
        gender: String,
        #[serde(rename = "Age Group", alias = "age_group")]
        age_group: String,
        #[serde(rename = "Satisfaction", alias = "satisfaction")]
        satisfaction: String,
        #[serde(rename = "Recommend", alias = "recommend")]
        recommend: String,
        #[serde(rename = "Favorite Feature", alias = "favorite_feature")]
        favorite_feature: String,
        #[serde(rename = "Comments", alias = "comments")]
        comments: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut accepted = Vec::new();

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let lineno = idx + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(lineno, error = %err, "skipping malformed csv line");
                continue;
            }
        };
        let fields = [
            row.timestamp,
            row.gender,
            row.age_group,
            row.satisfaction,
            row.recommend,
            row.favorite_feature,
            row.comments,
        ];
        match validate::coerce(&fields) {
            Ok(record) => accepted.push(record.to_row()),
            Err(err) => warn!(lineno, error = %err, "skipping invalid survey row"),
        }
    }

    let inserted = accepted.len();
    if inserted > 0 {
        store.append_many(SURVEY_TABLE, accepted).await?;
    }
    info!(inserted, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn sample_rows_are_valid_submissions() {
        for row in sample_rows() {
            assert!(validate::validate(&row).is_ok(), "{row:?}");
        }
    }

    #[tokio::test]
    async fn seed_writes_headers_and_rows() {
        let store = MemoryStore::new();
        let count = seed(&store).await.unwrap();
        let rows = store.read_all(SURVEY_TABLE).await.unwrap();
        assert_eq!(rows.len(), count + 1);
        assert_eq!(rows[0][0], "Timestamp");
    }

    #[tokio::test]
    async fn import_skips_invalid_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "timestamp,gender,age_group,satisfaction,recommend,favorite_feature,comments"
        )
        .unwrap();
        writeln!(file, "01/08/2024,Female,45-54,4,Yes,Price,Fair price").unwrap();
        writeln!(file, "02/08/2024,Male,18-24,great,No,Design,Bad colours").unwrap();
        writeln!(file, "03/08/2024,Male,18-24,1,No,Design").unwrap();
        writeln!(file, "04/08/2024,Female,25-34,2,No,Design,\"Cluttered, hard to read\"").unwrap();
        file.flush().unwrap();

        let store = MemoryStore::with_headers();
        let inserted = import_csv(&store, file.path()).await.unwrap();
        assert_eq!(inserted, 2);

        let body = store.read_body(SURVEY_TABLE).await.unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[1][6], "Cluttered, hard to read");
    }

    #[tokio::test]
    async fn import_reads_survey_table_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", store::SURVEY_HEADER.join(",")).unwrap();
        writeln!(file, "01/08/2024 10:50,Female,45-54,4,Yes,Price,Fair price").unwrap();
        file.flush().unwrap();

        let store = MemoryStore::with_headers();
        let inserted = import_csv(&store, file.path()).await.unwrap();
        assert_eq!(inserted, 1);

        let body = store.read_body(SURVEY_TABLE).await.unwrap();
        assert_eq!(body[0][0], "01/08/2024 10:50");
        assert_eq!(body[0][5], "Price");
    }

    #[tokio::test]
    async fn import_of_missing_file_fails() {
        let store = MemoryStore::with_headers();
        let result = import_csv(&store, std::path::Path::new("/nonexistent/survey.csv")).await;
        assert!(result.is_err());
    }
}
