use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Application, ApplicationStatus, CourseId};
use super::scoring::{by_rank, RiskCategory};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// Row-level filters for admin listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub course_id: Option<CourseId>,
    pub status: Option<ApplicationStatus>,
    pub high_risk: Option<bool>,
    pub min_final_score: Option<f64>,
    pub max_final_score: Option<f64>,
    pub min_application_score: Option<u8>,
    pub max_application_score: Option<u8>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl ApplicationFilter {
    pub fn for_course(course_id: CourseId) -> Self {
        Self {
            course_id: Some(course_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, application: &Application) -> bool {
        let scores = &application.scores;

        if let Some(course_id) = &self.course_id {
            if &application.course_id != course_id {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != application.status) {
            return false;
        }
        if self.high_risk.is_some_and(|flag| flag != scores.is_high_risk) {
            return false;
        }
        if self.min_final_score.is_some_and(|min| scores.final_rank_score < min)
            || self.max_final_score.is_some_and(|max| scores.final_rank_score > max)
        {
            return false;
        }
        if self.min_application_score.is_some_and(|min| scores.application_score < min)
            || self.max_application_score.is_some_and(|max| scores.application_score > max)
        {
            return false;
        }
        if self.created_after.is_some_and(|after| application.created_at < after)
            || self.created_before.is_some_and(|before| application.created_at > before)
        {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let applicant = &application.applicant;
            if !applicant.full_name.to_lowercase().contains(&term)
                && !applicant.email.contains(&term)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    FinalRank,
    CreatedAt,
    ApplicationScore,
    ReadinessScore,
    CommitmentScore,
    RiskScore,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "final_rank_score" | "final_rank" | "rank" => Some(Self::FinalRank),
            "created_at" => Some(Self::CreatedAt),
            "application_score" => Some(Self::ApplicationScore),
            "readiness_score" => Some(Self::ReadinessScore),
            "commitment_score" => Some(Self::CommitmentScore),
            "risk_score" => Some(Self::RiskScore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => Some(Self::Descending),
            "asc" | "ascending" => Some(Self::Ascending),
            _ => None,
        }
    }
}

/// Filter plus ordering and 1-based pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationQuery {
    pub filter: ApplicationFilter,
    pub sort: SortKey,
    pub order: SortOrder,
    pub page: usize,
    pub per_page: usize,
}

impl Default for ApplicationQuery {
    fn default() -> Self {
        Self {
            filter: ApplicationFilter::default(),
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ApplicationQuery {
    pub fn sort(&self, rows: &mut [Application]) {
        if self.sort == SortKey::FinalRank && self.order == SortOrder::Descending {
            rows.sort_by(by_rank);
            return;
        }

        rows.sort_by(|left, right| {
            let primary = self.compare_key(left, right);
            let primary = match self.order {
                SortOrder::Ascending => primary,
                SortOrder::Descending => primary.reverse(),
            };
            primary
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.id.cmp(&right.id))
        });
    }

    fn compare_key(&self, left: &Application, right: &Application) -> Ordering {
        let (l, r) = (&left.scores, &right.scores);
        match self.sort {
            SortKey::FinalRank => l.final_rank_score.total_cmp(&r.final_rank_score),
            SortKey::CreatedAt => left.created_at.cmp(&right.created_at),
            SortKey::ApplicationScore => l.application_score.cmp(&r.application_score),
            SortKey::ReadinessScore => l.readiness_score.cmp(&r.readiness_score),
            SortKey::CommitmentScore => l.commitment_score.cmp(&r.commitment_score),
            SortKey::RiskScore => l.risk_score.cmp(&r.risk_score),
        }
    }

    /// Sort the already filtered rows and cut out the requested page.
    pub fn paginate(&self, mut rows: Vec<Application>) -> Page<Application> {
        self.sort(&mut rows);

        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        let page = self.page.max(1);
        let total = rows.len();
        let pages = total.div_ceil(per_page);
        let items = rows
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Page {
            items,
            total,
            page,
            per_page,
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub waitlisted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskBandCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreAverages {
    pub risk: f64,
    pub readiness: f64,
    pub commitment: f64,
    pub application: f64,
    pub final_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBucket {
    pub range: String,
    pub count: usize,
}

/// Aggregate counts and score distribution for a course (or all courses).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub total: usize,
    pub by_status: StatusCounts,
    pub high_risk: usize,
    pub risk_bands: RiskBandCounts,
    pub averages: ScoreAverages,
    pub application_score_histogram: Vec<ScoreBucket>,
}

const HISTOGRAM_BUCKETS: [(u8, u8); 5] = [(0, 19), (20, 39), (40, 59), (60, 79), (80, 100)];

impl ApplicationStatistics {
    pub fn from_applications(course_id: Option<CourseId>, applications: &[Application]) -> Self {
        let mut by_status = StatusCounts::default();
        let mut risk_bands = RiskBandCounts::default();
        let mut high_risk = 0;
        let mut sums = [0f64; 5];
        let mut histogram = [0usize; HISTOGRAM_BUCKETS.len()];

        for application in applications {
            match application.status {
                ApplicationStatus::Pending => by_status.pending += 1,
                ApplicationStatus::Approved => by_status.approved += 1,
                ApplicationStatus::Rejected => by_status.rejected += 1,
                ApplicationStatus::Waitlisted => by_status.waitlisted += 1,
            }

            let scores = &application.scores;
            if scores.is_high_risk {
                high_risk += 1;
            }
            match scores.risk_category() {
                RiskCategory::Low => risk_bands.low += 1,
                RiskCategory::Medium => risk_bands.medium += 1,
                RiskCategory::High => risk_bands.high += 1,
            }

            sums[0] += f64::from(scores.risk_score);
            sums[1] += f64::from(scores.readiness_score);
            sums[2] += f64::from(scores.commitment_score);
            sums[3] += f64::from(scores.application_score);
            sums[4] += scores.final_rank_score;

            if let Some(index) = HISTOGRAM_BUCKETS
                .iter()
                .position(|(low, high)| (*low..=*high).contains(&scores.application_score))
            {
                histogram[index] += 1;
            }
        }

        let total = applications.len();
        let mean = |sum: f64| {
            if total == 0 {
                0.0
            } else {
                (sum / total as f64 * 100.0).round() / 100.0
            }
        };

        Self {
            course_id,
            total,
            by_status,
            high_risk,
            risk_bands,
            averages: ScoreAverages {
                risk: mean(sums[0]),
                readiness: mean(sums[1]),
                commitment: mean(sums[2]),
                application: mean(sums[3]),
                final_rank: mean(sums[4]),
            },
            application_score_histogram: HISTOGRAM_BUCKETS
                .iter()
                .zip(histogram)
                .map(|((low, high), count)| ScoreBucket {
                    range: format!("{low}-{high}"),
                    count,
                })
                .collect(),
        }
    }
}
