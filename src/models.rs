use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A stored row as handed back by a sheet store: one text cell per column.
pub type Row = Vec<String>;

pub const SURVEY_FIELD_COUNT: usize = 7;

pub const TIMESTAMP_COL: usize = 0;
pub const SATISFACTION_COL: usize = 3;
pub const RECOMMEND_COL: usize = 4;
pub const FAVORITE_FEATURE_COL: usize = 5;
pub const COMMENTS_COL: usize = 6;

/// A submission that passed validation. Only the satisfaction score is typed;
/// the timestamp is kept as entered and parsed later during month grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyRecord {
    timestamp: String,
    gender: String,
    age_group: String,
    satisfaction: i64,
    recommend: String,
    favorite_feature: String,
    comments: String,
}

impl SurveyRecord {
    pub(crate) fn new(
        timestamp: String,
        gender: String,
        age_group: String,
        satisfaction: i64,
        recommend: String,
        favorite_feature: String,
        comments: String,
    ) -> Self {
        Self {
            timestamp,
            gender,
            age_group,
            satisfaction,
            recommend,
            favorite_feature,
            comments,
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn age_group(&self) -> &str {
        &self.age_group
    }

    pub fn satisfaction(&self) -> i64 {
        self.satisfaction
    }

    pub fn recommend(&self) -> &str {
        &self.recommend
    }

    pub fn favorite_feature(&self) -> &str {
        &self.favorite_feature
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    /// Cells in survey column order, ready to append to the `survey` table.
    pub fn to_row(&self) -> Row {
        vec![
            self.timestamp.clone(),
            self.gender.clone(),
            self.age_group.clone(),
            self.satisfaction.to_string(),
            self.recommend.clone(),
            self.favorite_feature.clone(),
            self.comments.clone(),
        ]
    }
}

/// Features a respondent can pick as their favourite. Declaration order is
/// the tie-break order for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    CustomerSupport,
    Price,
    Functionality,
    EaseOfUse,
    Design,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::CustomerSupport,
        Feature::Price,
        Feature::Functionality,
        Feature::EaseOfUse,
        Feature::Design,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Feature::CustomerSupport => "Customer Support",
            Feature::Price => "Price",
            Feature::Functionality => "Functionality",
            Feature::EaseOfUse => "Ease of Use",
            Feature::Design => "Design",
        }
    }

    /// Exact, case-sensitive match against the declared labels.
    pub fn from_label(label: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|feature| feature.label() == label)
    }
}

/// Mean satisfaction per `YYYY-MM` bucket, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyAverages {
    entries: Vec<(String, f64)>,
}

// Serialized as a month -> average map in first-seen order.
impl Serialize for MonthlyAverages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (month, average) in &self.entries {
            map.serialize_entry(month, average)?;
        }
        map.end()
    }
}

impl MonthlyAverages {
    pub(crate) fn from_entries(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, month: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == month)
            .map(|(_, avg)| *avg)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, avg)| (key.as_str(), *avg))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Difference from the previous chronological month, keyed by month.
pub type MonthlyDifferences = BTreeMap<String, f64>;

/// Counts per declared feature, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTally {
    counts: Vec<(Feature, usize)>,
}

impl Default for FeatureTally {
    fn default() -> Self {
        Self {
            counts: Feature::ALL.iter().map(|feature| (*feature, 0)).collect(),
        }
    }
}

impl FeatureTally {
    pub fn increment(&mut self, feature: Feature) {
        if let Some(entry) = self.counts.iter_mut().find(|(f, _)| *f == feature) {
            entry.1 += 1;
        }
    }

    pub fn count(&self, feature: Feature) -> usize {
        self.counts
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// First feature in declaration order holding the highest non-zero count.
    pub fn top(&self) -> Option<Feature> {
        let mut best: Option<(Feature, usize)> = None;
        for (feature, count) in self.counts.iter().copied() {
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((feature, count)),
            }
        }
        best.map(|(feature, _)| feature)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisSummary {
    pub rows_read: usize,
    pub average: Option<f64>,
    pub monthly_averages: MonthlyAverages,
    pub monthly_differences: MonthlyDifferences,
    pub recommendation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_averages_serialize_as_ordered_map() {
        let averages = MonthlyAverages::from_entries(vec![
            ("2024-09".to_string(), 3.0),
            ("2024-08".to_string(), 4.5),
        ]);
        let json = serde_json::to_string(&averages).unwrap();
        assert_eq!(json, r#"{"2024-09":3.0,"2024-08":4.5}"#);
    }

    #[test]
    fn summary_json_exposes_months_directly() {
        let summary = AnalysisSummary {
            rows_read: 2,
            average: Some(4.5),
            monthly_averages: MonthlyAverages::from_entries(vec![("2024-08".to_string(), 4.5)]),
            monthly_differences: MonthlyDifferences::new(),
            recommendation: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["monthly_averages"]["2024-08"], 4.5);
        assert!(value["monthly_averages"].get("entries").is_none());
    }

    #[test]
    fn record_accessors_line_up_with_row() {
        let record = SurveyRecord::new(
            "01/08/2024".to_string(),
            "Female".to_string(),
            "45-54".to_string(),
            4,
            "Yes".to_string(),
            "Price".to_string(),
            "Fair price".to_string(),
        );
        let row = record.to_row();
        assert_eq!(row[TIMESTAMP_COL], record.timestamp());
        assert_eq!(row[1], record.gender());
        assert_eq!(row[2], record.age_group());
        assert_eq!(row[SATISFACTION_COL], record.satisfaction().to_string());
        assert_eq!(row[RECOMMEND_COL], record.recommend());
        assert_eq!(row[FAVORITE_FEATURE_COL], record.favorite_feature());
        assert_eq!(row[COMMENTS_COL], record.comments());
    }

    #[test]
    fn tally_ties_resolve_in_declaration_order() {
        let mut tally = FeatureTally::default();
        tally.increment(Feature::Design);
        tally.increment(Feature::Functionality);
        assert_eq!(tally.top(), Some(Feature::Functionality));
        assert_eq!(FeatureTally::default().top(), None);
    }
}
