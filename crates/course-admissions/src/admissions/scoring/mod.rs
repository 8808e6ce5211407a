mod rank;
mod rules;

pub use rank::{by_rank, final_rank_score, REGIONAL_BONUS};
pub use rules::{KNOWN_EXCEL_TASKS, KNOWN_TIME_SLOTS};

use serde::{Deserialize, Serialize};

use super::domain::{ApplicantRecord, Course};
use rules::HIGH_RISK_THRESHOLD;

/// Stateless scorer; every output is a pure function of the applicant record and course.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, record: &ApplicantRecord, course: &Course) -> ScoreSet {
        self.score_with_bonus(record, course.grants_regional_bonus(&record.country))
    }

    pub fn score_with_bonus(&self, record: &ApplicantRecord, regional_bonus: bool) -> ScoreSet {
        let (risk_score, mut components) = rules::risk(record).finish();
        let (readiness_score, readiness) = rules::readiness(record).finish();
        let (commitment_score, commitment) = rules::commitment(record).finish();
        let (application_score, quality) =
            rules::application_quality(risk_score, readiness_score, commitment_score);

        components.extend(readiness);
        components.extend(commitment);
        components.push(quality);

        ScoreSet {
            risk_score,
            is_high_risk: risk_score >= HIGH_RISK_THRESHOLD,
            readiness_score,
            commitment_score,
            application_score,
            final_rank_score: final_rank_score(
                application_score,
                readiness_score,
                commitment_score,
                risk_score,
                regional_bonus,
            ),
            regional_bonus_applied: regional_bonus,
            components,
        }
    }
}

/// Scores computed for one application in one recalculation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub risk_score: u8,
    pub is_high_risk: bool,
    pub readiness_score: u8,
    pub commitment_score: u8,
    pub application_score: u8,
    pub final_rank_score: f64,
    pub regional_bonus_applied: bool,
    #[serde(default)]
    pub components: Vec<ScoreComponent>,
}

impl ScoreSet {
    pub fn risk_category(&self) -> RiskCategory {
        RiskCategory::for_score(self.risk_score)
    }
}

/// Reporting bands for the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=25 => Self::Low,
            26..=49 => Self::Medium,
            _ => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Risk,
    Readiness,
    Commitment,
    Application,
}

/// Single contribution to a dimension, kept so reviewers can audit a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub dimension: ScoreDimension,
    pub points: u16,
    pub notes: String,
}
