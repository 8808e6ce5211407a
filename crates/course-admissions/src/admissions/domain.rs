use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::ScoreSet;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

/// Course offering an application targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

/// Admin or instructor acting on an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewerId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub String);

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    PreferNotToSay,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeRange {
    #[serde(rename = "under_18")]
    Under18,
    #[serde(rename = "18_24")]
    From18To24,
    #[serde(rename = "25_34")]
    From25To34,
    #[serde(rename = "35_44")]
    From35To44,
    #[serde(rename = "45_54")]
    From45To54,
    #[serde(rename = "55_plus")]
    From55,
    #[serde(rename = "other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    Diploma,
    Bachelors,
    Masters,
    Phd,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentStatus {
    Student,
    Employed,
    SelfEmployed,
    Unemployed,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternetAccessType {
    StableBroadband,
    MobileData,
    PublicWifi,
    Limited,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryDevice {
    Laptop,
    Desktop,
    Tablet,
    Smartphone,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcelSkillLevel {
    NeverUsed,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Other,
}

/// Normalized projection of a submitted application form.
///
/// Built only by the field normalizer, so downstream scoring never sees raw payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub city: String,
    pub gender: Gender,
    pub age_range: AgeRange,
    pub education_level: EducationLevel,
    pub current_status: CurrentStatus,
    pub field_of_study: String,
    pub has_computer: bool,
    pub has_internet: bool,
    pub internet_access_type: InternetAccessType,
    pub primary_device: PrimaryDevice,
    pub has_used_excel: bool,
    pub excel_skill_level: ExcelSkillLevel,
    pub excel_tasks_done: BTreeSet<String>,
    pub motivation: String,
    pub learning_outcomes: String,
    pub career_impact: String,
    pub committed_to_complete: bool,
    pub agrees_to_assessments: bool,
    pub available_for_live_sessions: bool,
    pub available_time: BTreeSet<String>,
    pub online_learning_experience: bool,
}

/// Lifecycle of a course application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Waitlisted,
}

impl ApplicationStatus {
    /// Statuses that block a second application for the same email and course.
    pub const ACTIVE: [ApplicationStatus; 3] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Waitlisted,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Waitlisted => "waitlisted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "waitlisted" => Some(Self::Waitlisted),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Application content before storage assigns an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub course_id: CourseId,
    pub applicant: ApplicantRecord,
    pub scores: ScoreSet,
    pub created_at: DateTime<Utc>,
}

/// Persisted application with its scores and review trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub course_id: CourseId,
    pub applicant: ApplicantRecord,
    pub scores: ScoreSet,
    pub status: ApplicationStatus,
    pub approved_by: Option<ReviewerId>,
    pub reviewed_by: Option<ReviewerId>,
    pub rejection_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub user_id: Option<UserId>,
    pub enrollment_id: Option<EnrollmentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Bumped by storage on every committed write; writes carrying an older value are refused.
    pub revision: u64,
}

impl Application {
    pub fn from_new(id: ApplicationId, new: NewApplication) -> Self {
        Self {
            id,
            course_id: new.course_id,
            applicant: new.applicant,
            scores: new.scores,
            status: ApplicationStatus::Pending,
            approved_by: None,
            reviewed_by: None,
            rejection_reason: None,
            admin_notes: None,
            user_id: None,
            enrollment_id: None,
            created_at: new.created_at,
            updated_at: new.created_at,
            reviewed_at: None,
            revision: 1,
        }
    }

    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            id: self.id.clone(),
            course_id: self.course_id.clone(),
            full_name: self.applicant.full_name.clone(),
            email: self.applicant.email.clone(),
            country: self.applicant.country.clone(),
            status: self.status,
            risk_score: self.scores.risk_score,
            is_high_risk: self.scores.is_high_risk,
            readiness_score: self.scores.readiness_score,
            commitment_score: self.scores.commitment_score,
            application_score: self.scores.application_score,
            final_rank_score: self.scores.final_rank_score,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
        }
    }
}

/// Flattened listing row for admin dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub course_id: CourseId,
    pub full_name: String,
    pub email: String,
    pub country: String,
    pub status: ApplicationStatus,
    pub risk_score: u8,
    pub is_high_risk: bool,
    pub readiness_score: u8,
    pub commitment_score: u8,
    pub application_score: u8,
    pub final_rank_score: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Course offering metadata consulted at submission and scoring time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub regional_bonus_countries: Vec<String>,
}

impl Course {
    pub fn grants_regional_bonus(&self, country: &str) -> bool {
        let country = country.trim();
        !country.is_empty()
            && self
                .regional_bonus_countries
                .iter()
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(country))
    }
}
