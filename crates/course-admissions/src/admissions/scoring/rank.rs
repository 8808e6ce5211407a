use std::cmp::Ordering;

use super::super::domain::Application;

const APPLICATION_WEIGHT_TENTHS: i32 = 4;
const READINESS_WEIGHT_TENTHS: i32 = 3;
const COMMITMENT_WEIGHT_TENTHS: i32 = 2;
const RISK_WEIGHT_TENTHS: i32 = 1;
const REGIONAL_BONUS_TENTHS: i32 = 50;

/// Points added to the final rank for applicants from a configured region.
pub const REGIONAL_BONUS: f64 = REGIONAL_BONUS_TENTHS as f64 / 10.0;

/// Weighted composite used to order applicants. Deliberately unclamped.
pub fn final_rank_score(
    application: u8,
    readiness: u8,
    commitment: u8,
    risk: u8,
    regional_bonus: bool,
) -> f64 {
    let mut tenths = APPLICATION_WEIGHT_TENTHS * i32::from(application)
        + READINESS_WEIGHT_TENTHS * i32::from(readiness)
        + COMMITMENT_WEIGHT_TENTHS * i32::from(commitment)
        - RISK_WEIGHT_TENTHS * i32::from(risk);
    if regional_bonus {
        tenths += REGIONAL_BONUS_TENTHS;
    }
    f64::from(tenths) / 10.0
}

/// Highest final rank first; equal ranks keep first-come priority.
pub fn by_rank(left: &Application, right: &Application) -> Ordering {
    right
        .scores
        .final_rank_score
        .total_cmp(&left.scores.final_rank_score)
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}
