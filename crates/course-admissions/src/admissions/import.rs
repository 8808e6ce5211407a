use std::io::Read;

use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::{ApplicantRecord, Course};
use super::normalizer::{FieldError, FieldNormalizer};
use super::scoring::{ScoreSet, ScoringEngine};

/// Failure reading the CSV export itself (not an individual applicant row).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read application csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("application csv has no header row")]
    MissingHeader,
}

/// One CSV row turned into the same raw payload shape the HTTP intake receives.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: u64,
    pub payload: Map<String, Value>,
}

/// Read a form export whose header row names the form fields.
///
/// Empty cells are dropped so they behave like absent fields.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, ImportError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv
        .headers()?
        .iter()
        .map(|header| header.trim().to_ascii_lowercase())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(ImportError::MissingHeader);
    }

    let mut rows = Vec::new();
    for result in csv.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let payload = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        rows.push(RawRow { line, payload });
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedApplicant {
    pub rank: usize,
    pub line: u64,
    pub full_name: String,
    pub email: String,
    pub country: String,
    pub scores: ScoreSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub errors: Vec<FieldError>,
}

/// Offline ranking of a batch of rows against one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRanking {
    pub ranked: Vec<RankedApplicant>,
    pub rejected: Vec<RejectedRow>,
}

/// Normalize and score each row; rows failing validation are reported, not fatal.
/// Ties keep file order, mirroring first-come priority.
pub fn rank_rows(rows: Vec<RawRow>, course: &Course) -> BatchRanking {
    let normalizer = FieldNormalizer::new();
    let engine = ScoringEngine::new();

    let mut scored: Vec<(u64, ApplicantRecord, ScoreSet)> = Vec::new();
    let mut rejected = Vec::new();
    for row in rows {
        match normalizer.normalize(&row.payload) {
            Ok(record) => {
                let scores = engine.score(&record, course);
                scored.push((row.line, record, scores));
            }
            Err(err) => rejected.push(RejectedRow {
                line: row.line,
                errors: err.errors,
            }),
        }
    }

    scored.sort_by(|(left_line, _, left), (right_line, _, right)| {
        right
            .final_rank_score
            .total_cmp(&left.final_rank_score)
            .then_with(|| left_line.cmp(right_line))
    });

    let ranked = scored
        .into_iter()
        .enumerate()
        .map(|(index, (line, record, scores))| RankedApplicant {
            rank: index + 1,
            line,
            full_name: record.full_name,
            email: record.email,
            country: record.country,
            scores,
        })
        .collect();

    BatchRanking { ranked, rejected }
}
