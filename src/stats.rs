use chrono::NaiveDate;
use tracing::warn;

use crate::models::{MonthlyAverages, MonthlyDifferences, Row, SATISFACTION_COL, TIMESTAMP_COL};
use crate::validate::parse_satisfaction;

const TIMESTAMP_HEADER: &str = "timestamp";

fn satisfaction_of(row: &Row) -> Option<i64> {
    row.get(SATISFACTION_COL)
        .and_then(|value| parse_satisfaction(value))
}

/// Mean of every parseable satisfaction score, or `None` when there are none.
pub fn average_satisfaction(rows: &[Row]) -> Option<f64> {
    let mut total = 0i128;
    let mut count = 0usize;

    for row in rows {
        if let Some(score) = satisfaction_of(row) {
            total += i128::from(score);
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(total as f64 / count as f64)
    }
}

/// Parses `day/month/year`, ignoring any time of day after the date.
pub fn parse_timestamp(value: &str) -> Option<NaiveDate> {
    let date_part = value.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, "%d/%m/%Y").ok()
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn group_by_month(rows: &[Row]) -> MonthlyAverages {
    let mut buckets: Vec<(String, i128, usize)> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let timestamp = row.get(TIMESTAMP_COL).map(|value| value.trim()).unwrap_or("");
        if timestamp.is_empty() || timestamp.eq_ignore_ascii_case(TIMESTAMP_HEADER) {
            warn!(row = idx, "skipping row without a timestamp");
            continue;
        }
        let Some(date) = parse_timestamp(timestamp) else {
            warn!(row = idx, timestamp, "skipping row with unparseable timestamp");
            continue;
        };
        let Some(score) = satisfaction_of(row) else {
            warn!(row = idx, "skipping row with unparseable satisfaction");
            continue;
        };

        let key = month_key(date);
        match buckets.iter_mut().find(|(month, _, _)| *month == key) {
            Some(bucket) => {
                bucket.1 += i128::from(score);
                bucket.2 += 1;
            }
            None => buckets.push((key, i128::from(score), 1)),
        }
    }

    MonthlyAverages::from_entries(
        buckets
            .into_iter()
            .map(|(month, total, count)| (month, total as f64 / count as f64))
            .collect(),
    )
}

/// Change against the previous month in `YYYY-MM` order. Needs at least two months.
pub fn month_over_month_difference(averages: &MonthlyAverages) -> MonthlyDifferences {
    let mut months: Vec<(&str, f64)> = averages.iter().collect();
    months.sort_by(|a, b| a.0.cmp(b.0));

    months
        .windows(2)
        .map(|pair| (pair[1].0.to_string(), pair[1].1 - pair[0].1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(timestamp: &str, satisfaction: &str) -> Row {
        vec![
            timestamp.to_string(),
            "Female".to_string(),
            "25-34".to_string(),
            satisfaction.to_string(),
            "Yes".to_string(),
            "Price".to_string(),
            "fine".to_string(),
        ]
    }

    fn averages(entries: &[(&str, f64)]) -> MonthlyAverages {
        MonthlyAverages::from_entries(
            entries
                .iter()
                .map(|(month, avg)| (month.to_string(), *avg))
                .collect(),
        )
    }

    #[test]
    fn average_of_empty_dataset_is_none() {
        assert_eq!(average_satisfaction(&[]), None);
    }

    #[test]
    fn average_skips_unparseable_scores() {
        let rows = vec![
            row("01/08/2024", "4"),
            row("02/08/2024", "5"),
            row("03/08/2024", "3"),
            row("04/08/2024", "n/a"),
            vec!["05/08/2024".to_string()],
        ];
        let avg = average_satisfaction(&rows).unwrap();
        assert!((avg - 4.0).abs() < 1e-9);
    }

    #[test]
    fn average_of_only_invalid_scores_is_none() {
        let rows = vec![row("Timestamp", "Satisfaction"), row("01/08/2024", "")];
        assert_eq!(average_satisfaction(&rows), None);
    }

    #[test]
    fn extreme_scores_do_not_overflow() {
        let max = i64::MAX.to_string();
        let rows = vec![row("01/08/2024", &max), row("02/08/2024", &max)];
        let expected = i64::MAX as f64;

        let avg = average_satisfaction(&rows).unwrap();
        assert!((avg - expected).abs() / expected < 1e-12);

        let grouped = group_by_month(&rows);
        let bucket = grouped.get("2024-08").unwrap();
        assert!((bucket - expected).abs() / expected < 1e-12);

        let min = i64::MIN.to_string();
        let mixed = vec![row("01/08/2024", &min), row("02/08/2024", &min), row("03/08/2024", &max)];
        assert!(average_satisfaction(&mixed).unwrap() < 0.0);
    }

    #[test]
    fn groups_scores_into_month_buckets() {
        let rows = vec![row("01/08/2024", "4"), row("15/08/2024", "5")];
        let grouped = group_by_month(&rows);
        assert_eq!(grouped.len(), 1);
        assert!((grouped.get("2024-08").unwrap() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn keeps_first_seen_month_order() {
        let rows = vec![
            row("03/09/2024", "2"),
            row("01/08/2024", "4"),
            row("20/09/2024", "4"),
        ];
        let grouped = group_by_month(&rows);
        let months: Vec<&str> = grouped.iter().map(|(month, _)| month).collect();
        assert_eq!(months, vec!["2024-09", "2024-08"]);
        assert!((grouped.get("2024-09").unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn bad_rows_do_not_stop_grouping() {
        let rows = vec![
            row("Timestamp", "Satisfaction"),
            row("2024-08-01 10:50", "4"),
            row("", "4"),
            row("01/08/2024", "x"),
            row("31/02/2024", "1"),
            row("10/07/2024 09:15", "3"),
        ];
        let grouped = group_by_month(&rows);
        assert_eq!(grouped.len(), 1);
        assert!((grouped.get("2024-07").unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn difference_between_consecutive_months() {
        let diffs = month_over_month_difference(&averages(&[("2024-07", 3.0), ("2024-08", 4.5)]));
        assert_eq!(diffs.len(), 1);
        assert!((diffs["2024-08"] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn difference_sorts_months_before_subtracting() {
        let diffs = month_over_month_difference(&averages(&[
            ("2024-09", 2.0),
            ("2023-12", 5.0),
            ("2024-08", 4.0),
        ]));
        assert!((diffs["2024-08"] - -1.0).abs() < 1e-9);
        assert!((diffs["2024-09"] - -2.0).abs() < 1e-9);
        assert!(!diffs.contains_key("2023-12"));
    }

    #[test]
    fn single_month_has_no_difference() {
        assert!(month_over_month_difference(&averages(&[("2024-08", 4.0)])).is_empty());
        assert!(month_over_month_difference(&MonthlyAverages::default()).is_empty());
    }

    #[test]
    fn aggregation_is_repeatable() {
        let rows = vec![
            row("01/07/2024", "3"),
            row("01/08/2024", "4"),
            row("15/08/2024", "5"),
        ];
        let first = group_by_month(&rows);
        let second = group_by_month(&rows);
        assert_eq!(first, second);
        assert_eq!(
            month_over_month_difference(&first),
            month_over_month_difference(&second)
        );
    }
}
