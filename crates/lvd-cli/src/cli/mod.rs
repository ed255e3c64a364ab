//! CLI for the LVD lecture video downloader.

mod commands;
mod control_socket;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lvd_core::config;
use lvd_core::model::{Credentials, Semester, Term};
use lvd_core::Engine;

use commands::{
    run_clear_cache, run_control, run_courses, run_download, run_login, run_materials, run_terms,
    ControlVerb,
};

/// Top-level CLI for LVD.
#[derive(Debug, Parser)]
#[command(name = "lvd")]
#[command(about = "LVD: log in to the learning platform, list courses and download lecture videos", long_about = None)]
pub struct Cli {
    /// Account id. Falls back to the last verified account.
    #[arg(long, global = true, env = "LVD_USERNAME")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Term selection; each part defaults to the term in session today.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct TermArgs {
    #[arg(long)]
    pub year: Option<i32>,

    /// Semester code (10, 11, 20, 21) or name (first, summer, second, winter).
    #[arg(long)]
    pub semester: Option<Semester>,
}

impl TermArgs {
    pub fn resolve(self) -> Term {
        let today = Term::today();
        Term::new(
            self.year.unwrap_or(today.year),
            self.semester.unwrap_or(today.semester),
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Verify credentials with the SSO handshake and remember the account id.
    Login,

    /// List courses and lectures for a term.
    Courses {
        #[command(flatten)]
        term: TermArgs,

        /// Ignore the discovery cache and scrape again.
        #[arg(long)]
        refresh: bool,
    },

    /// List recent terms that have courses.
    Terms {
        /// How many years back to probe (current year included).
        #[arg(long, default_value = "2", value_name = "N")]
        years: u32,
    },

    /// Download lectures by id (`<course>_<n>`) or fingerprint.
    Download {
        #[arg(required = true, value_name = "LECTURE")]
        lectures: Vec<String>,

        #[command(flatten)]
        term: TermArgs,
    },

    /// Download the file and folder materials of a course.
    Materials {
        #[arg(value_name = "COURSE")]
        course: String,

        #[command(flatten)]
        term: TermArgs,
    },

    /// Pause a running download task (takes effect between lectures).
    Pause { id: u64 },

    /// Resume a paused download task.
    Resume { id: u64 },

    /// Stop a download task.
    Stop { id: u64 },

    /// Drop cached discovery results.
    ClearCache {
        /// Scope key `{user}:{year}-{semester}`; all scopes when omitted.
        #[arg(long)]
        scope: Option<String>,
    },
}

/// Credentials from `--user`/`LVD_USERNAME` (or the last verified account)
/// and `LVD_PASSWORD`. The secret never comes from the config file.
async fn credentials(engine: &Engine, user: Option<String>) -> Result<Credentials> {
    let id = match user {
        Some(u) => u,
        None => engine
            .last_account()
            .await?
            .map(|a| a.user_id)
            .context("no account given; pass --user or set LVD_USERNAME")?,
    };
    let secret = std::env::var("LVD_PASSWORD").context("LVD_PASSWORD is not set")?;
    Ok(Credentials::new(id, secret))
}

/// Open the engine and log in.
async fn logged_in_engine(cfg: config::LvdConfig, user: Option<String>) -> Result<Engine> {
    let engine = Engine::open(cfg).await?;
    let creds = credentials(&engine, user).await?;
    engine.login(&creds).await.context("login failed")?;
    Ok(engine)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Task commands only talk to the control socket.
        match cli.command {
            CliCommand::Pause { id } => return run_control(ControlVerb::Pause, id).await,
            CliCommand::Resume { id } => return run_control(ControlVerb::Resume, id).await,
            CliCommand::Stop { id } => return run_control(ControlVerb::Stop, id).await,
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Login => {
                let engine = Engine::open(cfg).await?;
                let creds = credentials(&engine, cli.user).await?;
                run_login(&engine, &creds).await?;
            }
            CliCommand::Courses { term, refresh } => {
                let engine = logged_in_engine(cfg, cli.user).await?;
                run_courses(&engine, term.resolve(), refresh).await?;
            }
            CliCommand::Terms { years } => {
                let engine = logged_in_engine(cfg, cli.user).await?;
                run_terms(&engine, years).await?;
            }
            CliCommand::Download { lectures, term } => {
                let engine = logged_in_engine(cfg, cli.user).await?;
                run_download(engine, lectures, term.resolve()).await?;
            }
            CliCommand::Materials { course, term } => {
                let engine = logged_in_engine(cfg, cli.user).await?;
                run_materials(&engine, &course, term.resolve()).await?;
            }
            CliCommand::ClearCache { scope } => {
                let engine = Engine::open(cfg).await?;
                run_clear_cache(&engine, scope.as_deref()).await?;
            }
            CliCommand::Pause { .. } | CliCommand::Resume { .. } | CliCommand::Stop { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
