use super::super::domain::{
    ApplicantRecord, CurrentStatus, EducationLevel, ExcelSkillLevel, InternetAccessType,
};
use super::{ScoreComponent, ScoreDimension};

pub(crate) const SCORE_CAP: u16 = 100;
pub(crate) const HIGH_RISK_THRESHOLD: u8 = 50;

/// Excel task tags that earn readiness points; other tags are stored but ignored.
pub const KNOWN_EXCEL_TASKS: &[&str] = &[
    "data_entry",
    "formulas",
    "functions",
    "pivot_tables",
    "charts",
    "conditional_formatting",
    "vlookup",
    "data_validation",
    "macros",
    "data_analysis",
    "budgeting",
    "reporting",
];

pub const KNOWN_TIME_SLOTS: &[&str] = &[
    "weekday_mornings",
    "weekday_afternoons",
    "weekday_evenings",
    "weekends",
    "flexible",
];

const POINTS_PER_EXCEL_TASK: u16 = 2;
const EXCEL_TASK_CAP: u16 = 10;

/// Running total for one dimension, keeping every contribution for audits.
pub(crate) struct Tally {
    dimension: ScoreDimension,
    total: u16,
    components: Vec<ScoreComponent>,
}

impl Tally {
    fn new(dimension: ScoreDimension) -> Self {
        Self {
            dimension,
            total: 0,
            components: Vec::new(),
        }
    }

    fn add(&mut self, points: u16, notes: impl Into<String>) {
        if points == 0 {
            return;
        }
        self.total += points;
        self.components.push(ScoreComponent {
            dimension: self.dimension,
            points,
            notes: notes.into(),
        });
    }

    pub(crate) fn finish(self) -> (u8, Vec<ScoreComponent>) {
        (self.total.min(SCORE_CAP) as u8, self.components)
    }
}

/// Additive risk points; lower is better.
pub(crate) fn risk(record: &ApplicantRecord) -> Tally {
    let mut tally = Tally::new(ScoreDimension::Risk);

    if !record.has_computer {
        tally.add(30, "no computer access");
    }
    if !record.has_internet {
        tally.add(25, "no internet access");
    }
    match record.internet_access_type {
        InternetAccessType::Limited => tally.add(15, "limited internet access"),
        InternetAccessType::PublicWifi => tally.add(10, "relies on public wifi"),
        InternetAccessType::MobileData => tally.add(5, "relies on mobile data"),
        InternetAccessType::StableBroadband | InternetAccessType::Other => {}
    }
    match record.excel_skill_level {
        ExcelSkillLevel::NeverUsed => tally.add(20, "has never used excel"),
        ExcelSkillLevel::Beginner => tally.add(10, "beginner excel skills"),
        _ => {}
    }
    if !record.online_learning_experience {
        tally.add(15, "no prior online learning");
    }
    if !record.committed_to_complete {
        tally.add(5, "not committed to completing the course");
    }
    if !record.agrees_to_assessments {
        tally.add(5, "does not agree to assessments");
    }

    tally
}

pub(crate) fn readiness(record: &ApplicantRecord) -> Tally {
    let mut tally = Tally::new(ScoreDimension::Readiness);

    if record.has_computer {
        tally.add(15, "has a computer");
    }
    if record.has_internet {
        tally.add(10, "has internet access");
    }
    if record.internet_access_type == InternetAccessType::StableBroadband {
        tally.add(5, "stable broadband");
    }

    let (excel_points, label) = match record.excel_skill_level {
        ExcelSkillLevel::Expert => (30, "expert"),
        ExcelSkillLevel::Advanced => (25, "advanced"),
        ExcelSkillLevel::Intermediate => (18, "intermediate"),
        ExcelSkillLevel::Beginner => (10, "beginner"),
        ExcelSkillLevel::NeverUsed | ExcelSkillLevel::Other => (0, ""),
    };
    tally.add(excel_points, format!("{label} excel skills"));

    let known_tasks = record
        .excel_tasks_done
        .iter()
        .filter(|task| KNOWN_EXCEL_TASKS.contains(&task.as_str()))
        .count() as u16;
    let task_points = (known_tasks * POINTS_PER_EXCEL_TASK).min(EXCEL_TASK_CAP);
    tally.add(task_points, format!("{known_tasks} excel task(s) completed"));

    let education_points = match record.education_level {
        EducationLevel::Phd => 20,
        EducationLevel::Masters => 18,
        EducationLevel::Bachelors => 15,
        EducationLevel::Diploma => 12,
        EducationLevel::HighSchool => 8,
        EducationLevel::Other => 0,
    };
    tally.add(
        education_points,
        format!("education level {:?}", record.education_level),
    );

    if record.online_learning_experience {
        tally.add(10, "prior online learning");
    }

    match record.current_status {
        CurrentStatus::Employed | CurrentStatus::SelfEmployed => {
            tally.add(10, "currently working")
        }
        CurrentStatus::Student => tally.add(7, "currently studying"),
        CurrentStatus::Unemployed | CurrentStatus::Other => {}
    }

    tally
}

pub(crate) fn commitment(record: &ApplicantRecord) -> Tally {
    let mut tally = Tally::new(ScoreDimension::Commitment);

    if record.committed_to_complete {
        tally.add(10, "committed to completing the course");
    }
    if record.agrees_to_assessments {
        tally.add(10, "agrees to assessments");
    }

    let motivation = text_length(&record.motivation);
    tally.add(
        banded(motivation, &[(500, 30), (300, 25), (150, 18), (50, 10)]),
        format!("motivation of {motivation} characters"),
    );

    let outcomes = text_length(&record.learning_outcomes);
    tally.add(
        banded(outcomes, &[(200, 20), (100, 15), (50, 10)]),
        format!("learning outcomes of {outcomes} characters"),
    );

    let impact = text_length(&record.career_impact);
    tally.add(
        banded(impact, &[(200, 20), (100, 15), (50, 10)]),
        format!("career impact of {impact} characters"),
    );

    let slots = record
        .available_time
        .iter()
        .filter(|slot| KNOWN_TIME_SLOTS.contains(&slot.as_str()))
        .count();
    match slots {
        0 => {}
        1 => tally.add(5, "one available time slot"),
        n => tally.add(10, format!("{n} available time slots")),
    }

    tally
}

/// Blend of the three dimensions: 40% readiness, 30% commitment, 30% inverted risk.
pub(crate) fn application_quality(risk: u8, readiness: u8, commitment: u8) -> (u8, ScoreComponent) {
    // Weighted in tenths so the half-up rounding is exact.
    let tenths = 4 * u32::from(readiness.min(100))
        + 3 * u32::from(commitment.min(100))
        + 3 * u32::from(100 - risk.min(100));
    let score = ((tenths + 5) / 10).min(u32::from(SCORE_CAP)) as u8;

    let component = ScoreComponent {
        dimension: ScoreDimension::Application,
        points: u16::from(score),
        notes: format!(
            "blend of readiness {readiness}, commitment {commitment}, inverted risk {}",
            100 - risk.min(100)
        ),
    };
    (score, component)
}

fn text_length(text: &str) -> usize {
    text.trim().chars().count()
}

/// Highest matching band only; `bands` must be sorted by descending threshold.
fn banded(length: usize, bands: &[(usize, u16)]) -> u16 {
    bands
        .iter()
        .find(|(threshold, _)| length >= *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}
