use crate::rank::{run_rank, RankArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use course_admissions::config::ServerConfig;
use course_admissions::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "course-admissions",
    about = "Applicant scoring, ranking, and admission review for course intakes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the admissions HTTP API (used when no subcommand is given)
    Serve(ServeArgs),
    /// Score and rank a CSV export of application forms offline
    Rank(RankArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind address; takes precedence over APP_HOST
    #[arg(long)]
    host: Option<String>,
    /// Bind port; takes precedence over APP_PORT
    #[arg(long)]
    port: Option<u16>,
}

impl ServeArgs {
    pub(crate) fn apply(self, server: &mut ServerConfig) {
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command {
        Some(Command::Rank(args)) => run_rank(args),
        Some(Command::Serve(args)) => server::run(args).await,
        None => server::run(ServeArgs::default()).await,
    }
}
