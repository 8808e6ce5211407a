use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::{
    AgeRange, ApplicantRecord, CurrentStatus, EducationLevel, ExcelSkillLevel, Gender,
    InternetAccessType, PrimaryDevice,
};

/// Field-level problem found while normalizing a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Missing or malformed required input. Raised before any scoring or storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid application: {}", join_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: &str, message: &str) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const GENDERS: &[(&str, Gender)] = &[
    ("male", Gender::Male),
    ("female", Gender::Female),
    ("prefer_not_to_say", Gender::PreferNotToSay),
];

const AGE_RANGES: &[(&str, AgeRange)] = &[
    ("under_18", AgeRange::Under18),
    ("18_24", AgeRange::From18To24),
    ("25_34", AgeRange::From25To34),
    ("35_44", AgeRange::From35To44),
    ("45_54", AgeRange::From45To54),
    ("55_plus", AgeRange::From55),
    ("55+", AgeRange::From55),
];

const EDUCATION_LEVELS: &[(&str, EducationLevel)] = &[
    ("high_school", EducationLevel::HighSchool),
    ("diploma", EducationLevel::Diploma),
    ("bachelors", EducationLevel::Bachelors),
    ("bachelor", EducationLevel::Bachelors),
    ("masters", EducationLevel::Masters),
    ("master", EducationLevel::Masters),
    ("phd", EducationLevel::Phd),
    ("doctorate", EducationLevel::Phd),
];

const CURRENT_STATUSES: &[(&str, CurrentStatus)] = &[
    ("student", CurrentStatus::Student),
    ("employed", CurrentStatus::Employed),
    ("self_employed", CurrentStatus::SelfEmployed),
    ("unemployed", CurrentStatus::Unemployed),
];

const INTERNET_ACCESS_TYPES: &[(&str, InternetAccessType)] = &[
    ("stable_broadband", InternetAccessType::StableBroadband),
    ("broadband", InternetAccessType::StableBroadband),
    ("mobile_data", InternetAccessType::MobileData),
    ("public_wifi", InternetAccessType::PublicWifi),
    ("limited", InternetAccessType::Limited),
];

const PRIMARY_DEVICES: &[(&str, PrimaryDevice)] = &[
    ("laptop", PrimaryDevice::Laptop),
    ("desktop", PrimaryDevice::Desktop),
    ("tablet", PrimaryDevice::Tablet),
    ("smartphone", PrimaryDevice::Smartphone),
    ("phone", PrimaryDevice::Smartphone),
];

const EXCEL_SKILL_LEVELS: &[(&str, ExcelSkillLevel)] = &[
    ("never_used", ExcelSkillLevel::NeverUsed),
    ("beginner", ExcelSkillLevel::Beginner),
    ("intermediate", ExcelSkillLevel::Intermediate),
    ("advanced", ExcelSkillLevel::Advanced),
    ("expert", ExcelSkillLevel::Expert),
];

/// Converts raw form payloads into typed [`ApplicantRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldNormalizer;

impl FieldNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize an arbitrary JSON value; anything other than an object is rejected.
    pub fn normalize_value(&self, payload: &Value) -> Result<ApplicantRecord, ValidationError> {
        match payload {
            Value::Object(map) => self.normalize(map),
            _ => Err(ValidationError::single(
                "payload",
                "application form must be a JSON object",
            )),
        }
    }

    pub fn normalize(&self, payload: &Map<String, Value>) -> Result<ApplicantRecord, ValidationError> {
        let mut errors = Vec::new();

        let email = text(payload, "email").to_lowercase();
        if email.is_empty() {
            errors.push(FieldError::new("email", "is required"));
        } else if !email.contains('@') {
            errors.push(FieldError::new("email", "must be an email address"));
        }

        let motivation = text(payload, "motivation");
        if motivation.is_empty() {
            errors.push(FieldError::new("motivation", "is required"));
        }

        let has_computer = flag(payload, "has_computer");
        if has_computer.is_none() {
            errors.push(FieldError::new("has_computer", "is required"));
        }
        let has_internet = flag(payload, "has_internet");
        if has_internet.is_none() {
            errors.push(FieldError::new("has_internet", "is required"));
        }

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        let has_used_excel = flag(payload, "has_used_excel").unwrap_or(false);
        let excel_fallback = if has_used_excel || payload_has(payload, "excel_skill_level") {
            ExcelSkillLevel::Other
        } else {
            ExcelSkillLevel::NeverUsed
        };

        Ok(ApplicantRecord {
            full_name: text(payload, "full_name"),
            email,
            phone: text(payload, "phone"),
            country: text(payload, "country"),
            city: text(payload, "city"),
            gender: choice(payload, "gender", GENDERS, Gender::Other),
            age_range: choice(payload, "age_range", AGE_RANGES, AgeRange::Other),
            education_level: choice(
                payload,
                "education_level",
                EDUCATION_LEVELS,
                EducationLevel::Other,
            ),
            current_status: choice(
                payload,
                "current_status",
                CURRENT_STATUSES,
                CurrentStatus::Other,
            ),
            field_of_study: text(payload, "field_of_study"),
            has_computer: has_computer.unwrap_or(false),
            has_internet: has_internet.unwrap_or(false),
            internet_access_type: choice(
                payload,
                "internet_access_type",
                INTERNET_ACCESS_TYPES,
                InternetAccessType::Other,
            ),
            primary_device: choice(
                payload,
                "primary_device",
                PRIMARY_DEVICES,
                PrimaryDevice::Other,
            ),
            has_used_excel,
            excel_skill_level: choice(
                payload,
                "excel_skill_level",
                EXCEL_SKILL_LEVELS,
                excel_fallback,
            ),
            excel_tasks_done: tags(payload, "excel_tasks_done"),
            motivation,
            learning_outcomes: text(payload, "learning_outcomes"),
            career_impact: text(payload, "career_impact"),
            committed_to_complete: flag(payload, "committed_to_complete").unwrap_or(false),
            agrees_to_assessments: flag(payload, "agrees_to_assessments").unwrap_or(false),
            available_for_live_sessions: flag(payload, "available_for_live_sessions")
                .unwrap_or(false),
            available_time: tags(payload, "available_time"),
            online_learning_experience: flag(payload, "online_learning_experience")
                .unwrap_or(false),
        })
    }
}

fn payload_has(payload: &Map<String, Value>, key: &str) -> bool {
    !matches!(payload.get(key), None | Some(Value::Null))
}

fn text(payload: &Map<String, Value>, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(value)) => value.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(value)) => value.to_string(),
        _ => String::new(),
    }
}

/// `None` when the field is absent, null, or blank text; unparseable values count as `false`.
fn flag(payload: &Map<String, Value>, key: &str) -> Option<bool> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::Bool(value) => Some(*value),
        Value::Number(number) => Some(number.as_f64().map(|n| n != 0.0).unwrap_or(false)),
        Value::String(raw) => Some(matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1" | "on"
        )),
        _ => Some(false),
    }
}

fn fold_token(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn choice<T: Copy>(
    payload: &Map<String, Value>,
    key: &str,
    allowed: &[(&str, T)],
    fallback: T,
) -> T {
    let raw = text(payload, key);
    if raw.is_empty() {
        return fallback;
    }
    let token = fold_token(&raw);
    // Unknown tokens collapse onto the fallback (`other`) instead of failing the submission.
    allowed
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, value)| *value)
        .unwrap_or(fallback)
}

fn tags(payload: &Map<String, Value>, key: &str) -> BTreeSet<String> {
    let raw: Vec<String> = match payload.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(list)) => list
            .split(|c| c == ',' || c == ';')
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    raw.iter()
        .map(|tag| fold_token(tag))
        .filter(|tag| !tag.is_empty())
        .collect()
}
