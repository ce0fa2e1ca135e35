use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::convo::import::SourceKind;
use crate::convo::model::Sender;

#[derive(Debug, Parser)]
#[command(name = "convo-db", version, about = "Horse/Claw conversation transcript store")]
struct Cli {
    /// Print the full command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert one message.
    Insert(InsertArgs),
    /// Similarity search over message content.
    Search(SearchArgs),
    /// Messages within an inclusive time range.
    History(HistoryArgs),
    /// All messages of one session in conversational order.
    Session { session_key: String },
    /// Distinct session keys.
    Sessions,
    /// Fetch one message by id.
    Get { message_id: String },
    /// Delete one message by id.
    Delete { message_id: String },
    /// Store size and locations.
    Stats,
    /// Import OpenClaw transcripts.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct InsertArgs {
    #[arg(long, short = 'c')]
    content: String,
    #[arg(long, short = 's', value_parser = parse_sender)]
    sender: Sender,
    #[arg(long = "session", short = 'k')]
    session_key: String,
    #[arg(long, short = 'o', allow_negative_numbers = true)]
    order: i64,
    #[arg(long, default_value = "manual")]
    channel: String,
    /// RFC 3339 timestamp; defaults to now.
    #[arg(long, short = 't')]
    timestamp: Option<String>,
    /// Defaults to `{session}_{order:06}`.
    #[arg(long = "id")]
    message_id: Option<String>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: String,
    /// Number of results (defaults to the configured search limit).
    #[arg(short = 'n', long = "limit")]
    limit: Option<usize>,
    #[arg(long, short = 's', value_parser = parse_sender)]
    sender: Option<Sender>,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    #[arg(long, short = 's', value_parser = parse_sender)]
    sender: Option<Sender>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Which session files to take from the sessions directory.
    #[arg(long, short = 's', value_enum, default_value_t = SourceKind::Feishu)]
    source: SourceKind,
    /// Sessions directory (defaults to OPENCLAW_SESSIONS_DIR).
    #[arg(long, conflicts_with_all = ["file", "history"])]
    dir: Option<PathBuf>,
    /// Import a single transcript file instead of a directory.
    #[arg(long, conflicts_with = "history")]
    file: Option<PathBuf>,
    /// Import a history export document (`{"sessionKey", "messages"}`).
    #[arg(long)]
    history: Option<PathBuf>,
    /// Session key override for --file / --history.
    #[arg(long)]
    session: Option<String>,
    /// Channel label for imported records.
    #[arg(long)]
    channel: Option<String>,
    /// Canonicalize and count without writing.
    #[arg(long)]
    dry_run: bool,
}

fn parse_sender(raw: &str) -> std::result::Result<Sender, String> {
    raw.parse::<Sender>().map_err(|err| err.to_string())
}

impl ImportArgs {
    fn into_options(self) -> commands::import::ImportOptions {
        use commands::import::ImportTarget;
        let target = match (self.file, self.history) {
            (Some(path), _) => ImportTarget::File {
                path,
                session_key: self.session,
            },
            (None, Some(path)) => ImportTarget::History {
                path,
                session_key: self.session,
            },
            (None, None) => ImportTarget::Directory {
                source: self.source,
                dir: self.dir,
            },
        };
        commands::import::ImportOptions {
            target,
            channel: self.channel,
            dry_run: self.dry_run,
        }
    }
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    match &report.data {
        Some(data) if report.data_is_output => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        _ => {
            for line in &report.details {
                println!("{line}");
            }
        }
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Insert(args) => commands::insert::run(&commands::insert::InsertOptions {
            content: args.content,
            sender: args.sender,
            session_key: args.session_key,
            order: args.order,
            channel: args.channel,
            timestamp: args.timestamp,
            message_id: args.message_id,
        })?,
        Command::Search(args) => commands::query::run_search(&commands::query::SearchOptions {
            query: args.query,
            limit: args.limit,
            sender: args.sender,
        })?,
        Command::History(args) => commands::query::run_history(&commands::query::HistoryOptions {
            start: args.start,
            end: args.end,
            sender: args.sender,
        })?,
        Command::Session { session_key } => commands::query::run_session(&session_key)?,
        Command::Sessions => commands::query::run_sessions()?,
        Command::Get { message_id } => commands::query::run_get(&message_id)?,
        Command::Delete { message_id } => commands::delete::run(&message_id)?,
        Command::Stats => commands::stats::run()?,
        Command::Import(args) => commands::import::run(&args.into_options())?,
    };

    render(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
