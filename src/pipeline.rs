//! One analyser run: store a submission, then recompute and persist the
//! derived tables from the full dataset.
//!
//! Each step after the append only runs when the data it needs exists. A
//! step that is skipped never undoes the steps before it. Storage errors are
//! passed straight back to the caller.

use tracing::{debug, info};

use crate::models::{AnalysisSummary, MonthlyAverages, MonthlyDifferences, Row, SurveyRecord};
use crate::recommend;
use crate::stats;
use crate::store::{SheetStore, DIFFERENCES_TABLE, RECOMMENDATIONS_TABLE, SURVEY_TABLE};

/// Read-only view of the same aggregates [`Pipeline::analyze`] persists.
pub fn summarize(rows: &[Row]) -> AnalysisSummary {
    let average = stats::average_satisfaction(rows);
    let monthly_averages = if average.is_some() {
        stats::group_by_month(rows)
    } else {
        MonthlyAverages::default()
    };
    AnalysisSummary {
        rows_read: rows.len(),
        average,
        monthly_differences: stats::month_over_month_difference(&monthly_averages),
        monthly_averages,
        recommendation: recommend::rank(rows).map(recommend::recommendation_text),
    }
}

pub struct Pipeline<'a, S: SheetStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SheetStore + ?Sized> Pipeline<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn submit(&self, record: &SurveyRecord) -> anyhow::Result<AnalysisSummary> {
        self.store.append_one(SURVEY_TABLE, record.to_row()).await?;
        info!(
            timestamp = record.timestamp(),
            gender = record.gender(),
            age_group = record.age_group(),
            satisfaction = record.satisfaction(),
            recommend = record.recommend(),
            favorite_feature = record.favorite_feature(),
            "survey response recorded"
        );
        debug!(comments = record.comments(), "survey response comments");
        self.analyze().await
    }

    pub async fn analyze(&self) -> anyhow::Result<AnalysisSummary> {
        let rows = self.store.read_body(SURVEY_TABLE).await?;
        let mut summary = AnalysisSummary {
            rows_read: rows.len(),
            average: stats::average_satisfaction(&rows),
            monthly_averages: Default::default(),
            monthly_differences: Default::default(),
            recommendation: None,
        };

        let Some(average) = summary.average else {
            info!("no valid satisfaction scores yet");
            return Ok(summary);
        };
        info!(average, rows = rows.len(), "average satisfaction computed");

        // Re-read so every step sees the table as it is now.
        let rows = self.store.read_body(SURVEY_TABLE).await?;
        summary.monthly_averages = stats::group_by_month(&rows);
        info!(months = summary.monthly_averages.len(), "monthly averages computed");
        if !summary.monthly_averages.is_empty() {
            summary.monthly_differences =
                stats::month_over_month_difference(&summary.monthly_averages);
            self.write_differences(&summary.monthly_differences).await?;
        }

        let rows = self.store.read_body(SURVEY_TABLE).await?;
        if let Some(feature) = recommend::rank(&rows) {
            let text = recommend::recommendation_text(feature);
            self.record_recommendation(&text).await?;
            summary.recommendation = Some(text);
        }

        Ok(summary)
    }

    async fn write_differences(&self, differences: &MonthlyDifferences) -> anyhow::Result<()> {
        let rows: Vec<Row> = differences
            .iter()
            .map(|(month, diff)| vec![month.clone(), format!("{diff:.2}")])
            .collect();
        self.store.clear_body(DIFFERENCES_TABLE).await?;
        self.store.append_many(DIFFERENCES_TABLE, rows).await?;
        info!(months = differences.len(), "monthly differences updated");
        Ok(())
    }

    async fn record_recommendation(&self, text: &str) -> anyhow::Result<()> {
        let existing = self.store.read_body(RECOMMENDATIONS_TABLE).await?;
        if existing
            .iter()
            .any(|row| row.first().map(String::as_str) == Some(text))
        {
            info!(recommendation = text, "recommendation already recorded");
            return Ok(());
        }
        self.store
            .append_one(RECOMMENDATIONS_TABLE, vec![text.to_string()])
            .await?;
        info!(recommendation = text, "recommendation recorded");
        Ok(())
    }
}
