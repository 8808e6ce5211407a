use clap::Args;
use course_admissions::admissions::import::{rank_rows, read_rows, BatchRanking};
use course_admissions::admissions::{Course, CourseId};
use course_admissions::config::{AdmissionsConfig, AppConfig};
use course_admissions::error::AppError;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    /// CSV export of application forms; the header row names the form fields
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Course to rank against (defaults to the first configured course)
    #[arg(long)]
    pub(crate) course: Option<String>,
    /// Countries earning the regional bonus, comma separated (overrides ADMISSIONS_REGIONAL_COUNTRIES)
    #[arg(long, value_delimiter = ',')]
    pub(crate) regional: Vec<String>,
    /// Only print the first N ranked applicants
    #[arg(long)]
    pub(crate) top: Option<usize>,
    /// Print the ranking as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let course = resolve_course(args.course, args.regional, &config.admissions);

    let reader = BufReader::new(File::open(&args.input)?);
    let mut ranking = rank_rows(read_rows(reader)?, &course);
    if let Some(top) = args.top {
        ranking.ranked.truncate(top);
    }

    if args.json {
        serde_json::to_writer_pretty(io::stdout().lock(), &ranking)?;
        println!();
    } else {
        render_ranking(&course, &ranking);
    }
    Ok(())
}

pub(crate) fn resolve_course(
    requested: Option<String>,
    regional: Vec<String>,
    config: &AdmissionsConfig,
) -> Course {
    let seed = match requested {
        Some(id) => match config.courses.iter().find(|seed| seed.id == id) {
            Some(seed) => (seed.id.clone(), seed.title.clone()),
            None => (id.clone(), id),
        },
        None => config
            .courses
            .first()
            .map(|seed| (seed.id.clone(), seed.title.clone()))
            .unwrap_or_else(|| ("adhoc".to_string(), "Ad hoc ranking".to_string())),
    };

    let regional_bonus_countries = if regional.is_empty() {
        config.regional_bonus_countries.clone()
    } else {
        regional
            .into_iter()
            .map(|country| country.trim().to_string())
            .filter(|country| !country.is_empty())
            .collect()
    };

    Course {
        id: CourseId(seed.0),
        title: seed.1,
        regional_bonus_countries,
    }
}

fn render_ranking(course: &Course, ranking: &BatchRanking) {
    println!("Applicant ranking for {} ({})", course.title, course.id);
    if !course.regional_bonus_countries.is_empty() {
        println!(
            "Regional bonus: {}",
            course.regional_bonus_countries.join(", ")
        );
    }

    println!(
        "\n{:>4}  {:<28} {:<14} {:>7} {:>5} {:>5} {:>6} {:>5}  flags",
        "rank", "applicant", "country", "final", "app", "ready", "commit", "risk"
    );
    for applicant in &ranking.ranked {
        let scores = &applicant.scores;
        let mut flags = Vec::new();
        if scores.is_high_risk {
            flags.push("high-risk");
        }
        if scores.regional_bonus_applied {
            flags.push("regional");
        }
        println!(
            "{:>4}  {:<28} {:<14} {:>7.1} {:>5} {:>5} {:>6} {:>5}  {}",
            applicant.rank,
            truncate(&applicant.full_name, 28),
            truncate(&applicant.country, 14),
            scores.final_rank_score,
            scores.application_score,
            scores.readiness_score,
            scores.commitment_score,
            scores.risk_score,
            flags.join(",")
        );
    }

    if !ranking.rejected.is_empty() {
        println!("\nRows skipped ({}):", ranking.rejected.len());
        for row in &ranking.rejected {
            let problems: Vec<String> = row.errors.iter().map(ToString::to_string).collect();
            println!("- line {}: {}", row.line, problems.join("; "));
        }
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}
