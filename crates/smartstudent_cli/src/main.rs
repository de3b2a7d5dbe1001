//! Command-line host for the notification core.
//!
//! # Responsibility
//! - Open a store, resolve the acting user and run one operation.
//! - Print results as JSON on stdout; diagnostics go to the logger.

use anyhow::{anyhow, bail, Context, Result};
use smartstudent_core::db::{open_db, open_db_in_memory};
use smartstudent_core::service::classroom;
use smartstudent_core::settings::{load_language, save_language};
use smartstudent_core::{
    init_logging, init_stderr_logging, Actor, AppConfig, KvRepository, Language,
    NotificationService, RefreshTrigger, SqliteKvRepository,
};
use std::path::PathBuf;

const USAGE: &str = "usage: smartstudent [--config FILE] [--db FILE] <command>

commands:
  view <user>                 compute the notification view
  refresh <user> [trigger]    repair, persist and compute (storage_changed|visibility_changed|focus)
  mark-read <user>            mark everything dismissable as read
  review <teacher> <task>     acknowledge evaluation results
  delete-task <user> <task>   delete a task and every record referencing it
  import <file>               load a JSON object of storage entries
  export                      print every storage entry as JSON
  language [es|en]            show or set the display language";

struct Cli {
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli = parse_args(std::env::args().skip(1))?;
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    match &config.log_dir {
        Some(dir) => init_logging(&config.log_level, &dir.to_string_lossy()),
        None => init_stderr_logging(&config.log_level),
    }
    .map_err(|err| anyhow!(err))?;

    let conn = match cli.db.as_ref().or(config.db_path.as_ref()) {
        Some(path) => open_db(path),
        None if writes_store(&cli.command) => bail!(
            "`{}` changes the store; pass --db FILE or set db_path in the config",
            cli.command.join(" ")
        ),
        None => {
            log::warn!("event=store_open module=cli status=ephemeral reason=no_db_path");
            open_db_in_memory()
        }
    }
    .context("failed to open store")?;
    let repo = SqliteKvRepository::try_new(&conn)?;
    let service = NotificationService::with_options(repo, config.reconcile_options());

    run(&service, &config, &cli.command)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli> {
    let mut cli = Cli {
        config: None,
        db: None,
        command: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                cli.config = Some(args.next().context("--config needs a file")?.into());
            }
            "--db" => {
                cli.db = Some(args.next().context("--db needs a file")?.into());
            }
            "-h" | "--help" => bail!("{USAGE}"),
            _ => {
                cli.command.push(arg);
                cli.command.extend(args.by_ref());
            }
        }
    }
    if cli.command.is_empty() {
        bail!("{USAGE}");
    }
    Ok(cli)
}

/// Commands that persist changes; an in-memory store would silently drop them.
fn writes_store(command: &[String]) -> bool {
    match command.first().map(String::as_str) {
        Some("refresh" | "mark-read" | "review" | "delete-task" | "import") => true,
        Some("language") => command.len() > 1,
        _ => false,
    }
}

fn run<R: KvRepository>(
    service: &NotificationService<R>,
    config: &AppConfig,
    command: &[String],
) -> Result<()> {
    let language = match config.language {
        Some(language) => language,
        None => load_language(service.repo())?,
    };
    let args: Vec<&str> = command.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["view", user] => {
            let actor = resolve_actor(service, user)?;
            let view = service.view(&actor)?;
            log::info!("{}: {}", label(language, Label::Pending), view.total());
            print_json(&serde_json::to_value(&view)?)
        }
        ["refresh", user] => refresh(service, language, user, RefreshTrigger::Manual),
        ["refresh", user, trigger] => {
            let trigger = RefreshTrigger::parse(trigger)
                .ok_or_else(|| anyhow!("unknown trigger `{trigger}`"))?;
            refresh(service, language, user, trigger)
        }
        ["mark-read", user] => {
            let actor = resolve_actor(service, user)?;
            let report = service.mark_all_read(&actor)?;
            print_json(&serde_json::json!({
                "notifications_marked": report.notifications_marked,
                "comments_marked": report.comments_marked,
            }))
        }
        ["review", teacher, task_id] => {
            let actor = resolve_actor(service, teacher)?;
            let report = service.acknowledge_review(&actor, task_id, now_ms())?;
            print_json(&serde_json::json!({
                "results_reviewed": report.results_reviewed,
                "notifications_removed": report.notifications_removed,
            }))
        }
        ["delete-task", user, task_id] => {
            let actor = resolve_actor(service, user)?;
            let (report, commit) =
                service.apply(|snapshot| classroom::delete_task(snapshot, &actor, task_id))?;
            if !commit.is_complete() {
                log::warn!(
                    "{}: {:?}",
                    label(language, Label::PartialWrite),
                    commit.failed
                );
            }
            print_json(&serde_json::json!({
                "tasks": report.tasks,
                "user_copies": report.user_copies,
                "comments": report.comments,
                "notifications": report.notifications,
                "evaluation_records": report.evaluation_records,
                "failed_keys": commit.failed.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            }))
        }
        ["import", file] => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read `{file}`"))?;
            let entries: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&raw).context("import file must be a JSON object")?;
            for (key, value) in &entries {
                // Local storage dumps hold JSON strings; nested values are re-encoded.
                let value = match value {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                service.repo().set(key, &value)?;
            }
            print_json(&serde_json::json!({ "imported": entries.len() }))
        }
        ["export"] => print_json(&serde_json::to_value(service.repo().entries()?)?),
        ["language"] => {
            println!("{}", language.as_str());
            Ok(())
        }
        ["language", value] => {
            let language =
                Language::parse(value).ok_or_else(|| anyhow!("unsupported language `{value}`"))?;
            save_language(service.repo(), language)?;
            println!("{}", language.as_str());
            Ok(())
        }
        _ => bail!("{USAGE}"),
    }
}

fn refresh<R: KvRepository>(
    service: &NotificationService<R>,
    language: Language,
    user: &str,
    trigger: RefreshTrigger,
) -> Result<()> {
    let actor = resolve_actor(service, user)?;
    let outcome = service.refresh(trigger, &actor)?;
    if !outcome.commit.is_complete() {
        log::warn!(
            "{}: {:?}",
            label(language, Label::PartialWrite),
            outcome.commit.failed
        );
    }
    log::info!("{}: {}", label(language, Label::Pending), outcome.view.total());
    print_json(&serde_json::to_value(&outcome.view)?)
}

fn resolve_actor<R: KvRepository>(service: &NotificationService<R>, user: &str) -> Result<Actor> {
    let snapshot = service.snapshot()?;
    snapshot
        .directory()
        .lookup(user)
        .and_then(|id| snapshot.user(&id).map(|profile| profile.actor()))
        .ok_or_else(|| anyhow!("unknown user `{user}`"))
}

enum Label {
    Pending,
    PartialWrite,
}

fn label(language: Language, which: Label) -> &'static str {
    match (language, which) {
        (Language::Es, Label::Pending) => "elementos pendientes",
        (Language::En, Label::Pending) => "pending items",
        (Language::Es, Label::PartialWrite) => "escritura incompleta",
        (Language::En, Label::PartialWrite) => "incomplete write",
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
