use std::io::{BufRead, Write};

use anyhow::Context;
use tracing::debug;

use crate::models::SurveyRecord;
use crate::validate::{self, ValidationError};

pub const EXAMPLE_LINE: &str =
    "01/08/2024 10:50,Female,45-54,4,Yes,Price,Reasonably priced for what it offers.";

/// Splits a comma-separated submission, trimming each field.
pub fn split_line(line: &str) -> Vec<String> {
    line.trim_end_matches(['\r', '\n'])
        .split(',')
        .map(|field| field.trim().to_string())
        .collect()
}

pub fn parse_line(line: &str) -> Result<SurveyRecord, ValidationError> {
    validate::coerce(&split_line(line))
}

/// Prompts until a valid submission is entered. Returns `None` if input ends first.
pub fn prompt_for_record<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
) -> anyhow::Result<Option<SurveyRecord>> {
    loop {
        writeln!(output, "Please enter survey data.")?;
        writeln!(
            output,
            "Data should be 7 comma-separated values: timestamp (dd/mm/yyyy),gender,age group,satisfaction,recommend,favorite feature,comments"
        )?;
        writeln!(output, "Example: {EXAMPLE_LINE}")?;
        output.flush()?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("failed to read survey data")?;
        if read == 0 {
            return Ok(None);
        }

        match parse_line(&line) {
            Ok(record) => {
                writeln!(output, "Data is valid!")?;
                return Ok(Some(record));
            }
            Err(err) => {
                debug!(error = %err, "rejected submission");
                writeln!(output, "Invalid data: {err}, please try again.")?;
            }
        }
    }
}
