//! CLI commands for Mission Control using clap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::api::{create_api, TaskApi};
use crate::config::{load_settings_or_default, validate_settings, Settings};
use crate::kanban::{commit_move, Board, DropOutcome, DropTarget};
use crate::listener::MessageListener;
use crate::mailbox::{InboundMessage, Mailbox};
use crate::notifier::create_notifier;
use crate::status::{parse_task_status_update, Reconciler};
use crate::task::{Bucket, TaskStatus};
use crate::web::{run_server, WebServerConfig};

/// Mission Control - task status reconciliation for agent dashboards.
#[derive(Parser)]
#[command(name = "mission-control")]
#[command(version)]
#[command(about = "Mission Control - keeps the task board in sync with agent chatter", long_about = None)]
pub struct Commands {
    /// Task API base URL (overrides settings)
    #[arg(long, global = true, env = "MISSION_CONTROL_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch the mailbox and apply status updates
    Listen {
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Poll only, ignore file-system change events
        #[arg(long)]
        no_watch: bool,
    },

    /// Serve the inbox ingest API (and the listener)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not run the mailbox listener alongside
        #[arg(long)]
        no_listener: bool,
    },

    /// Show what a message would be parsed into
    Parse {
        /// Message text
        message: String,
    },

    /// Apply one message right away
    Apply {
        /// Message text
        message: String,

        /// Agent credited in the audit trail
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Mailbox operations
    #[command(subcommand)]
    Inbox(InboxCommand),

    /// List tasks by board column
    Tasks {
        /// Only this column: inbox, todo, in_progress, done
        #[arg(short, long)]
        column: Option<Bucket>,
    },

    /// List agents known to the dashboard
    Agents,

    /// Move a task to another board column
    Move {
        /// Task ID
        task: String,

        /// Target column: inbox, todo, in_progress, done
        column: Bucket,
    },
}

#[derive(Subcommand)]
pub enum InboxCommand {
    /// Post a message to the mailbox
    Post {
        /// Message text
        message: String,

        /// Sending agent
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Show mailbox statistics
    Stats,

    /// Return unacknowledged messages to incoming
    Recover,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;

        match &self.command {
            Command::Listen {
                interval_ms,
                no_watch,
            } => cmd_listen(&settings, *interval_ms, *no_watch).await,
            Command::Serve { port, no_listener } => cmd_serve(&settings, *port, *no_listener).await,
            Command::Parse { message } => cmd_parse(message),
            Command::Apply { message, agent } => cmd_apply(&settings, message, agent.as_deref()).await,
            Command::Inbox(cmd) => cmd_inbox(&settings, cmd),
            Command::Tasks { column } => cmd_tasks(&settings, *column).await,
            Command::Agents => cmd_agents(&settings).await,
            Command::Move { task, column } => cmd_move(&settings, task, *column).await,
        }
    }

    fn settings(&self) -> Result<Settings> {
        let mut settings = load_settings_or_default()?;
        if let Some(url) = &self.api_url {
            settings.api.base_url = url.clone();
        }
        validate_settings(&settings)?;
        Ok(settings)
    }
}

fn open_mailbox(settings: &Settings) -> Result<Mailbox> {
    let dir = settings.listener.resolve_mailbox_dir()?;
    Mailbox::open(&dir).with_context(|| format!("Failed to open mailbox at {}", dir.display()))
}

fn build_reconciler(settings: &Settings, api: Arc<dyn TaskApi>) -> Reconciler {
    Reconciler::new(api, create_notifier(&settings.notifications))
        .notifications(settings.notifications.enabled)
        .on_status_change(|task, old, new| {
            println!("{}: {} -> {} ({})", task.id, old, new, task.title);
        })
}

fn build_listener(settings: &Settings, interval_ms: Option<u64>, no_watch: bool) -> Result<MessageListener> {
    let api = create_api(settings)?;
    let reconciler = Arc::new(build_reconciler(settings, api));
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.listener.poll_interval());

    Ok(MessageListener::new(open_mailbox(settings)?, reconciler)
        .poll_interval(interval)
        .watch(settings.listener.watch && !no_watch))
}

async fn cmd_listen(settings: &Settings, interval_ms: Option<u64>, no_watch: bool) -> Result<()> {
    if interval_ms == Some(0) {
        bail!("--interval-ms must be greater than 0");
    }
    let handle = build_listener(settings, interval_ms, no_watch)?.spawn()?;

    println!("Listening for agent messages. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    handle.stop().await;
    Ok(())
}

async fn cmd_serve(settings: &Settings, port: Option<u16>, no_listener: bool) -> Result<()> {
    let mailbox = open_mailbox(settings)?;
    let mut config = WebServerConfig::from(&settings.web);
    if let Some(port) = port {
        config.port = port;
    }

    let listener = if no_listener {
        None
    } else {
        Some(build_listener(settings, None, false)?.spawn()?)
    };

    let result = tokio::select! {
        r = run_server(config, mailbox) => r.map_err(anyhow::Error::from),
        r = tokio::signal::ctrl_c() => r.map_err(anyhow::Error::from),
    };

    if let Some(handle) = listener {
        handle.stop().await;
    }
    result
}

fn cmd_parse(message: &str) -> Result<()> {
    match parse_task_status_update(message) {
        Some(candidate) => {
            println!("Task suffix: {}", candidate.task_id_suffix);
            println!("New status:  {}", candidate.new_status);
            println!("Confidence:  {:?}", candidate.confidence);
        }
        None => println!("No status update found."),
    }
    Ok(())
}

async fn cmd_apply(settings: &Settings, message: &str, agent: Option<&str>) -> Result<()> {
    let api = create_api(settings)?;
    let reconciler = build_reconciler(settings, api);
    reconciler.refresh_tasks().await?;

    match reconciler.process_message(message, agent).await {
        Some(change) => println!(
            "Updated {} from {} to {} ({:?} confidence)",
            change.task.id, change.old_status, change.new_status, change.confidence
        ),
        None => println!("No change applied."),
    }
    Ok(())
}

fn cmd_inbox(settings: &Settings, action: &InboxCommand) -> Result<()> {
    let mailbox = open_mailbox(settings)?;

    match action {
        InboxCommand::Post { message, agent } => {
            let id = mailbox.post(InboundMessage::new(message.clone(), agent.clone()))?;
            println!("Posted message: {}", id);
        }
        InboxCommand::Stats => {
            println!("{}", mailbox.stats()?);
        }
        InboxCommand::Recover => {
            let recovered = mailbox.recover_orphaned()?;
            println!("Recovered {} unacknowledged messages", recovered);
        }
    }
    Ok(())
}

async fn cmd_tasks(settings: &Settings, column: Option<Bucket>) -> Result<()> {
    let api = create_api(settings)?;
    let board = Board::load(api.as_ref()).await?;

    let buckets: Vec<Bucket> = match column {
        Some(bucket) => vec![bucket],
        None => Bucket::ALL.to_vec(),
    };
    for bucket in buckets {
        let cards = board.column(bucket);
        println!("{} ({})", bucket.label(), cards.len());
        for task in cards {
            let marker = if task.status == TaskStatus::Review { " [review]" } else { "" };
            println!("  {}  {}{}", task.id, task.title, marker);
        }
    }
    Ok(())
}

async fn cmd_agents(settings: &Settings) -> Result<()> {
    let api = create_api(settings)?;
    let agents = api.list_agents().await?;

    if agents.is_empty() {
        println!("No agents registered.");
        return Ok(());
    }
    println!("Agents ({})", agents.len());
    for agent in agents {
        let role = agent.role.as_deref().unwrap_or("-");
        let status = agent.status.as_deref().unwrap_or("unknown");
        println!("  {}  {}  {}  [{}]", agent.id, agent.name, role, status);
    }
    Ok(())
}

async fn cmd_move(settings: &Settings, task_id: &str, column: Bucket) -> Result<()> {
    let api = create_api(settings)?;
    let notifier = create_notifier(&settings.notifications);
    let mut board = Board::load(api.as_ref()).await?;

    board.begin_drag(task_id)?;
    let target = DropTarget::Column(column);
    board.drag_over(&target)?;

    match board.drop_on(&target)? {
        DropOutcome::Reordered => println!("{} is already in {}", task_id, column.label()),
        DropOutcome::Commit(pending) => {
            commit_move(
                &mut board,
                api.as_ref(),
                notifier.as_ref(),
                &pending,
                settings.board.demo_mode,
            )
            .await?;
            println!("Moved {} from {} to {}", task_id, pending.from, pending.to);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Commands::command().debug_assert();
    }

    #[test]
    fn parses_move_arguments() {
        let args = Commands::parse_from(["mission-control", "move", "task-a1", "in_progress"]);
        match args.command {
            Command::Move { task, column } => {
                assert_eq!(task, "task-a1");
                assert_eq!(column, Bucket::InProgress);
            }
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn parses_agents() {
        let args = Commands::parse_from(["mission-control", "agents"]);
        assert!(matches!(args.command, Command::Agents));
    }

    #[test]
    fn parses_inbox_post() {
        let args = Commands::parse_from([
            "mission-control",
            "--api-url",
            "http://example.test/api",
            "inbox",
            "post",
            "[TASK #a1 DONE]",
            "--agent",
            "coder",
        ]);
        assert_eq!(args.api_url.as_deref(), Some("http://example.test/api"));
        match args.command {
            Command::Inbox(InboxCommand::Post { message, agent }) => {
                assert_eq!(message, "[TASK #a1 DONE]");
                assert_eq!(agent.as_deref(), Some("coder"));
            }
            _ => panic!("expected inbox post"),
        }
    }
}
