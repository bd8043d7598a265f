use tracing::{debug, warn};

use crate::models::{Feature, FeatureTally, Row, FAVORITE_FEATURE_COL, RECOMMEND_COL};

const MIN_FIELDS: usize = FAVORITE_FEATURE_COL + 1;

/// "No" in any casing, ignoring surrounding whitespace.
pub fn is_dissatisfied(recommend: &str) -> bool {
    recommend.trim().eq_ignore_ascii_case("no")
}

pub fn tally_features(rows: &[Row]) -> FeatureTally {
    let mut tally = FeatureTally::default();

    for (idx, row) in rows.iter().enumerate() {
        if row.len() < MIN_FIELDS {
            warn!(row = idx, fields = row.len(), "skipping incomplete row");
            continue;
        }
        if !is_dissatisfied(&row[RECOMMEND_COL]) {
            continue;
        }
        match Feature::from_label(&row[FAVORITE_FEATURE_COL]) {
            Some(feature) => tally.increment(feature),
            None => debug!(
                row = idx,
                feature = %row[FAVORITE_FEATURE_COL],
                "feature not in declared set"
            ),
        }
    }

    tally
}

/// Feature most often picked by respondents who would not recommend the
/// product. Ties go to the feature declared first.
pub fn rank(rows: &[Row]) -> Option<Feature> {
    tally_features(rows).top()
}

pub fn recommendation_text(feature: Feature) -> String {
    format!("Improve {}", feature.label())
}
