mod config;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use reading_core::Clock;
use reading_core::model::{
    ChapterDraft, ChapterId, ChapterKey, GoalSettingsDraft, SubjectDraft, SubjectId, UserId,
};
use reading_core::timer::ReadingTimer;
use services::{
    AdminPolicy, AnonymousIdentity, AppServices, IdentityProvider, RecordOutcome, TokenIdentity,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, normalize_sqlite_url, prepare_sqlite_file};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidChapter { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidChapter { raw } => {
                write!(f, "invalid --chapter value (expected <name>:<minutes>): {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

/// `#<id>` selects a chapter by id, anything else by name.
fn parse_chapter_key(raw: &str) -> ChapterKey {
    raw.strip_prefix('#')
        .and_then(|id| id.parse::<u64>().ok())
        .map_or_else(|| ChapterKey::from(raw), |id| ChapterKey::Id(ChapterId::new(id)))
}

/// `<name>:<minutes>`; a missing target means "no target".
fn parse_chapter_draft(raw: String) -> Result<ChapterDraft, ArgsError> {
    match raw.rsplit_once(':') {
        Some((name, minutes)) => {
            let total = minutes
                .trim()
                .parse::<u32>()
                .map_err(|_| ArgsError::InvalidChapter { raw: raw.clone() })?;
            Ok(ChapterDraft::new(name, total))
        }
        None => Ok(ChapterDraft::new(raw, 0)),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [global options] <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  subjects                                        list subjects and progress");
    eprintln!("  add-subject --name <n> [--chapter <n>:<min>]... create a subject");
    eprintln!("  record --subject <id> --chapter <n|#id> --seconds <s>");
    eprintln!("  read --subject <id> --chapter <n|#id>           time a session, Enter to stop");
    eprintln!("  stats                                           today/week/total and 7-day chart");
    eprintln!("  goals [--daily <min>] [--weekly <min>]          show or update goals");
    eprintln!("  report                                          admin report");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>   (default: sqlite://reading.sqlite3)");
    eprintln!("  --token <token>     sign in with a token instead of anonymously");
    eprintln!("  --admin <user_id>   user allowed to open the admin report");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  READING_DB_URL, READING_AUTH_TOKEN, READING_ADMIN_USER,");
    eprintln!("  READING_IDENTITY_FILE, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Subjects,
    AddSubject(SubjectDraft),
    Record {
        subject: SubjectId,
        chapter: ChapterKey,
        seconds: u64,
    },
    Read {
        subject: SubjectId,
        chapter: ChapterKey,
    },
    Stats,
    Goals(GoalSettingsDraft),
    Report,
}

/// Parse global flags and the command; global flags may appear anywhere.
fn parse_args(
    config: &mut Config,
    args: impl IntoIterator<Item = String>,
) -> Result<Option<Command>, ArgsError> {
    let mut args = args.into_iter();
    let mut name: Option<String> = None;
    let mut subject: Option<SubjectId> = None;
    let mut chapter: Option<ChapterKey> = None;
    let mut seconds: Option<u64> = None;
    let mut chapters = Vec::new();
    let mut goals = GoalSettingsDraft::new();
    let mut command: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                config.db_url = normalize_sqlite_url(value);
            }
            "--token" => config.auth_token = Some(require_value(&mut args, "--token")?),
            "--admin" => config.admin_user = Some(require_value(&mut args, "--admin")?),
            "--name" => name = Some(require_value(&mut args, "--name")?),
            "--subject" => {
                let raw = require_value(&mut args, "--subject")?;
                subject = Some(SubjectId::new(parse_number("--subject", raw)?));
            }
            "--chapter" => {
                let value = require_value(&mut args, "--chapter")?;
                chapter = Some(parse_chapter_key(&value));
                chapters.push(value);
            }
            "--seconds" => {
                seconds = Some(parse_number("--seconds", require_value(&mut args, "--seconds")?)?);
            }
            "--daily" => {
                goals.daily_goal_minutes =
                    Some(parse_number("--daily", require_value(&mut args, "--daily")?)?);
            }
            "--weekly" => {
                goals.weekly_goal_minutes =
                    Some(parse_number("--weekly", require_value(&mut args, "--weekly")?)?);
            }
            "--help" | "-h" => return Ok(None),
            other if other.starts_with("--") || command.is_some() => {
                return Err(ArgsError::UnknownArg(other.to_string()));
            }
            _ => command = Some(arg),
        }
    }

    let command = match command.as_deref() {
        None => return Ok(None),
        Some("subjects") => Command::Subjects,
        Some("add-subject") => {
            let name = name.ok_or(ArgsError::MissingFlag { flag: "--name" })?;
            let mut draft = SubjectDraft::new(name);
            for raw in chapters {
                draft.chapters.push(parse_chapter_draft(raw)?);
            }
            Command::AddSubject(draft)
        }
        Some("record") => Command::Record {
            subject: subject.ok_or(ArgsError::MissingFlag { flag: "--subject" })?,
            chapter: chapter.ok_or(ArgsError::MissingFlag { flag: "--chapter" })?,
            seconds: seconds.ok_or(ArgsError::MissingFlag { flag: "--seconds" })?,
        },
        Some("read") => Command::Read {
            subject: subject.ok_or(ArgsError::MissingFlag { flag: "--subject" })?,
            chapter: chapter.ok_or(ArgsError::MissingFlag { flag: "--chapter" })?,
        },
        Some("stats") => Command::Stats,
        Some("goals") => Command::Goals(goals),
        Some("report") => Command::Report,
        Some(other) => return Err(ArgsError::UnknownArg(other.to_string())),
    };
    Ok(Some(command))
}

/// Token sign-in when configured, otherwise an anonymous id kept on disk so
/// the same user comes back on the next run.
async fn resolve_identity(
    config: &Config,
) -> Result<Arc<dyn IdentityProvider>, Box<dyn std::error::Error>> {
    if let Some(token) = config.auth_token.as_ref() {
        return Ok(Arc::new(TokenIdentity::new(token.as_str())));
    }

    let identity = match read_identity_file(&config.identity_file) {
        Some(user) => AnonymousIdentity::resume(user),
        None => AnonymousIdentity::new(),
    };
    let user = identity.sign_in().await?;
    std::fs::write(&config.identity_file, user.as_str())?;
    Ok(Arc::new(identity))
}

fn read_identity_file(path: &Path) -> Option<UserId> {
    let raw = std::fs::read_to_string(path).ok()?;
    UserId::new(raw).ok()
}

fn format_minutes(minutes: f64) -> String {
    format!("{minutes:.2} min")
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    let command = match parse_args(&mut config, std::env::args().skip(1)) {
        Ok(Some(command)) => command,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            print_usage();
            return Err(e.into());
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // sqlx will not create a missing database file on its own.
    prepare_sqlite_file(&config.db_url)?;
    let identity = resolve_identity(&config).await?;
    let admin = config
        .admin_user
        .as_deref()
        .map(UserId::new)
        .transpose()?;
    let app = AppServices::new_sqlite(
        &config.db_url,
        identity,
        AdminPolicy::new(admin),
        Clock::default_clock(),
    )
    .await?;
    info!(db = %config.db_url, user = %app.user(), "ready");

    match command {
        Command::Subjects => {
            for subject in app.live().subjects().iter() {
                println!("[{}] {}", subject.id(), subject.name());
                for chapter in subject.chapters() {
                    let target = if chapter.total() == 0 {
                        "no target".to_string()
                    } else {
                        format!("{} min", chapter.total())
                    };
                    let done = if chapter.is_completed() { " done" } else { "" };
                    println!(
                        "    #{} {}: {} of {}{}",
                        chapter.id(),
                        chapter.name(),
                        format_minutes(chapter.read()),
                        target,
                        done
                    );
                }
            }
        }
        Command::AddSubject(draft) => {
            let id = app.subjects().create_subject(draft).await?;
            println!("created subject {id}");
        }
        Command::Record {
            subject,
            chapter,
            seconds,
        } => {
            record(&app, subject, chapter, seconds).await?;
        }
        Command::Read { subject, chapter } => {
            let mut timer = ReadingTimer::new(Clock::default_clock());
            timer.start()?;
            println!("reading {chapter}... press Enter to stop");
            let mut line = String::new();
            BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
            let seconds = timer.finish();
            record(&app, subject, chapter, seconds).await?;
        }
        Command::Stats => {
            let dashboard = app.reports().dashboard(&Local::now());
            let stats = &dashboard.stats;
            println!(
                "today: {} / {} min ({:.0}%)",
                format_minutes(stats.today_minutes),
                dashboard.goals.daily_goal_minutes(),
                dashboard.progress.daily_ratio * 100.0
            );
            println!(
                "week:  {} / {} min ({:.0}%)",
                format_minutes(stats.weekly_minutes),
                dashboard.goals.weekly_goal_minutes(),
                dashboard.progress.weekly_ratio * 100.0
            );
            println!("total: {}", format_minutes(stats.total_minutes));
            println!("chapters read: {}", stats.chapters_read);
            for day in &stats.chart {
                println!("  {} {} {}", day.weekday(), day.date, format_minutes(day.minutes));
            }
        }
        Command::Goals(draft) => {
            let goals = if draft.is_empty() {
                app.goals().load().await?
            } else {
                app.goals().save(draft).await?
            };
            println!(
                "daily goal: {} min, weekly goal: {} min",
                goals.daily_goal_minutes(),
                goals.weekly_goal_minutes()
            );
        }
        Command::Report => {
            let report = app.reports().admin_report()?;
            println!(
                "{} sessions, {}",
                report.sessions,
                format_minutes(report.total_minutes)
            );
            if let (Some(first), Some(last)) = (report.first_recorded_at, report.last_recorded_at) {
                println!("from {first} to {last}");
            }
            for entry in &report.subjects {
                println!(
                    "  [{}] {}: {} over {} sessions",
                    entry.subject_id,
                    entry.subject_name,
                    format_minutes(entry.minutes),
                    entry.sessions
                );
            }
        }
    }

    Ok(())
}

async fn record(
    app: &AppServices,
    subject: SubjectId,
    chapter: ChapterKey,
    seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    match app
        .recorder()
        .try_record_reading(subject, chapter.clone(), seconds)
        .await
    {
        Ok(RecordOutcome::Recorded(session)) => {
            match session.chapter {
                Some(chapter) => println!(
                    "recorded {seconds}s; {} now at {}{}",
                    chapter.name(),
                    format_minutes(chapter.read()),
                    if chapter.is_completed() { " (completed)" } else { "" }
                ),
                None => println!("recorded {seconds}s; no matching chapter to update"),
            }
            Ok(())
        }
        Ok(RecordOutcome::Skipped) => {
            println!("session shorter than a second, nothing recorded");
            Ok(())
        }
        Err(err) => {
            warn!(seconds, "keeping unsaved session");
            eprintln!(
                "not saved; retry with: record --subject {subject} --chapter {chapter} \
                 --seconds {seconds}"
            );
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
