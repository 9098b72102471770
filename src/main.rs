pub mod models {
    pub mod monitor;
}

pub mod classify;
pub mod client;
pub mod config;
pub mod db {
    pub mod derived;
    pub mod models;
}
pub mod extract;
pub mod parse;
pub mod schema;
pub mod utils;
pub mod services {
    pub mod fetch;
    pub mod normalize;
    pub mod queries;
    pub mod raw;
    pub mod resolver;
}

#[cfg(test)]
mod test_support;

use crate::client::PortalClient;
use crate::config::{load_env_file, Config};
use crate::services::queries::{self, ReportView};
use crate::services::{fetch, normalize};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{error, info};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Rebuild the derived tables from the stored payloads.
    Normalize,
    /// Download the configured date range into the raw store.
    Fetch,
    /// Fetch, then normalize.
    Sync,
    /// Print a summary of the derived tables, or one of the teacher views.
    Report,
}

impl Command {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "normalize" => Some(Command::Normalize),
            "fetch" => Some(Command::Fetch),
            "sync" => Some(Command::Sync),
            "report" => Some(Command::Report),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    command: Command,
    report: ReportView,
}

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut SqliteConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

fn run_fetch(conn: &mut SqliteConnection, cfg: &Config) -> Result<(), String> {
    let client = PortalClient::new(
        &cfg.portal_url,
        &cfg.portal_school,
        &cfg.portal_format,
        cfg.fetch_timeout,
        cfg.max_request_retries,
    );
    fetch::run_range(conn, &client, cfg.fetch_from_date, cfg.fetch_to_date, cfg.fetch_sleep)?;
    Ok(())
}

fn run_normalize(conn: &mut SqliteConnection) -> Result<(), String> {
    let summary = normalize::run(conn).map_err(|e| format!("normalization failed: {}", e))?;
    info!(
        "Normalization complete: {}/{} day(s), {} skipped; {} entries, {} messages, {} class links",
        summary.days_normalized,
        summary.days_total,
        summary.days_skipped,
        summary.entries,
        summary.messages,
        summary.class_links
    );
    Ok(())
}

fn run(command: Command, report: &ReportView) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (command={:?}, database={}, fetch_range={}..={}, fetch_sleep={}ms, max_request_retries={})",
        command,
        cfg.database_url,
        cfg.fetch_from_date,
        cfg.fetch_to_date,
        cfg.fetch_sleep.as_millis(),
        cfg.max_request_retries.get()
    );

    // 2) Connect DB
    let mut conn =
        db::derived::establish(&cfg.database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Apply pending database migrations
    apply_database_migrations(&mut conn)?;

    // 4) Dispatch
    match command {
        Command::Normalize => run_normalize(&mut conn),
        Command::Fetch => run_fetch(&mut conn, &cfg),
        Command::Sync => {
            run_fetch(&mut conn, &cfg)?;
            run_normalize(&mut conn)
        }
        Command::Report => {
            let text = queries::render_report(&mut conn, report, cfg.report_limit)
                .map_err(|e| format!("report query failed: {}", e))?;
            print!("{}", text);
            Ok(())
        }
    }
}

/// Value of `--name VALUE` or `--name=VALUE`; `None` when `arg` is some other flag.
fn flag_value<I>(name: &str, arg: &str, rest: &mut I) -> Result<Option<String>, String>
where
    I: Iterator<Item = OsString>,
{
    if arg == name {
        let value = rest.next().ok_or_else(|| format!("`{}` requires a value", name))?;
        return value
            .into_string()
            .map(Some)
            .map_err(|_| format!("`{}` value contains invalid UTF-8", name));
    }
    match arg.strip_prefix(name).and_then(|s| s.strip_prefix('=')) {
        Some("") => Err(format!("`{}` requires a value", name)),
        Some(value) => Ok(Some(value.to_string())),
        None => Ok(None),
    }
}

fn parse_cli<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut env_file: Option<PathBuf> = None;
    let mut command: Option<Command> = None;
    let mut report: Option<ReportView> = None;

    while let Some(arg) = args.next() {
        let Some(arg) = arg.to_str() else {
            return Err("argument contains invalid UTF-8".to_string());
        };

        if let Some(path) = flag_value("--env-file", arg, &mut args)? {
            if env_file.replace(PathBuf::from(path)).is_some() {
                return Err("`--env-file` provided more than once".to_string());
            }
            continue;
        }

        let view = if arg == "--teachers" {
            Some(ReportView::AllTeachers)
        } else if let Some(query) = flag_value("--search", arg, &mut args)? {
            Some(ReportView::Search(query))
        } else if let Some(code) = flag_value("--teacher", arg, &mut args)? {
            Some(ReportView::Teacher(code))
        } else {
            None
        };
        if let Some(view) = view {
            if report.replace(view).is_some() {
                return Err("only one of `--teachers`, `--search`, `--teacher` may be given".to_string());
            }
            continue;
        }

        if arg.starts_with('-') {
            return Err(format!("unrecognised argument: {}", arg));
        }
        let parsed = Command::parse(arg).ok_or_else(|| format!("unknown command: {}", arg))?;
        if command.replace(parsed).is_some() {
            return Err("only one command may be given".to_string());
        }
    }

    let command = command.unwrap_or(Command::Normalize);
    if report.is_some() && command != Command::Report {
        return Err("`--teachers`, `--search` and `--teacher` only apply to `report`".to_string());
    }

    Ok(CliArgs {
        env_file,
        command,
        report: report.unwrap_or_default(),
    })
}

fn load_env(env_file: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: true }))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_env_file(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        } else {
            Ok(None)
        }
    }
}

fn main() {
    let (cli, loaded_env) = match parse_cli(std::env::args_os().skip(1))
        .and_then(|cli| load_env(cli.env_file.clone()).map(|loaded| (cli, loaded)))
    {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "untis-substitutions {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command, &cli.report) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Result<CliArgs, String> {
        parse_cli(args.iter().map(OsString::from))
    }

    #[test]
    fn defaults_to_normalize() {
        assert_eq!(
            cli(&[]).unwrap(),
            CliArgs {
                env_file: None,
                command: Command::Normalize,
                report: ReportView::Summary,
            }
        );
    }

    #[test]
    fn env_file_and_command_in_any_order() {
        let expected = CliArgs {
            env_file: Some(PathBuf::from("prod.env")),
            command: Command::Sync,
            report: ReportView::Summary,
        };
        assert_eq!(cli(&["--env-file", "prod.env", "sync"]).unwrap(), expected);
        assert_eq!(cli(&["sync", "--env-file=prod.env"]).unwrap(), expected);
    }

    #[test]
    fn report_views() {
        assert_eq!(cli(&["report"]).unwrap().report, ReportView::Summary);
        assert_eq!(cli(&["report", "--teachers"]).unwrap().report, ReportView::AllTeachers);
        assert_eq!(
            cli(&["report", "--teacher", "KEIL"]).unwrap().report,
            ReportView::Teacher("KEIL".into())
        );
        assert_eq!(
            cli(&["--search=ki", "report"]).unwrap().report,
            ReportView::Search("ki".into())
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(cli(&["--env-file"]).is_err());
        assert!(cli(&["--env-file="]).is_err());
        assert!(cli(&["--env-file", "a", "--env-file", "b"]).is_err());
        assert!(cli(&["import"]).is_err());
        assert!(cli(&["fetch", "report"]).is_err());
        assert!(cli(&["--verbose"]).is_err());
        assert!(cli(&["report", "--teacher"]).is_err());
        assert!(cli(&["report", "--teachers", "--search", "k"]).is_err());
        assert!(cli(&["normalize", "--teachers"]).is_err());
        assert!(cli(&["--teacher", "KEIL"]).is_err());
    }
}
