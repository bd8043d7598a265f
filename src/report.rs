use std::fmt::Write;

use crate::models::{AnalysisSummary, Feature, FeatureTally};

pub fn build_report(
    summary: &AnalysisSummary,
    tally: &FeatureTally,
    recent_comments: &[String],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Survey Results Report");
    let _ = writeln!(output, "Based on {} stored responses", summary.rows_read);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Satisfaction");

    match summary.average {
        Some(average) => {
            let _ = writeln!(output, "{average:.2}");
        }
        None => {
            let _ = writeln!(output, "No valid satisfaction scores recorded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Averages");

    if summary.monthly_averages.is_empty() {
        let _ = writeln!(output, "No dated responses recorded.");
    } else {
        let mut months: Vec<(&str, f64)> = summary.monthly_averages.iter().collect();
        months.sort_by(|a, b| a.0.cmp(b.0));
        for (month, average) in months {
            let _ = writeln!(output, "- {month}: {average:.2}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Month-over-Month Change");

    if summary.monthly_differences.is_empty() {
        let _ = writeln!(output, "Need at least two months of responses.");
    } else {
        for (month, diff) in summary.monthly_differences.iter() {
            let _ = writeln!(output, "- {month}: {diff:+.2}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Dissatisfied Respondents by Feature");

    for feature in Feature::ALL {
        let _ = writeln!(output, "- {}: {}", feature.label(), tally.count(feature));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendation");

    match &summary.recommendation {
        Some(text) => {
            let _ = writeln!(output, "{text}");
        }
        None => {
            let _ = writeln!(output, "No dissatisfied responses; nothing to recommend.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");

    let comments: Vec<&String> = recent_comments.iter().filter(|c| !c.is_empty()).collect();
    if comments.is_empty() {
        let _ = writeln!(output, "No comments recorded.");
    } else {
        for comment in comments.iter().rev() {
            let _ = writeln!(output, "- {comment}");
        }
    }

    output
}
