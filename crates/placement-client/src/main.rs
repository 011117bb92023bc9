use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use placement_client::chat::{LiveUpdate, SessionPhase};
use placement_client::logging;
use placement_client::view::{self, TranscriptCursor};
use placement_client::{ClientConfig, ClientState, Session};
use placement_shared::constants::MAX_NOTIFICATION_PAGE_SIZE;
use placement_shared::{ConversationId, NotificationId, SenderRole, SubjectId};

#[derive(Parser)]
#[command(name = "placement-cli")]
#[command(about = "Placement chat and notifications client", long_about = None)]
struct Cli {
    /// Backend base URL (overrides PLACEMENT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the session used by every other command
    Login {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value = "subject")]
        role: SenderRole,
    },
    /// Forget the stored session
    Logout,
    /// Open a conversation; stdin lines are sent, `/quit` leaves
    Chat { conversation: String },
    /// List the latest notifications
    Notifications {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Mark one notification read
    MarkRead { id: String },
    /// Mark every notification read
    MarkAllRead {
        #[arg(long)]
        yes: bool,
    },
    /// Print the unread badge at every poll tick
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    logging::init(logging::DEFAULT_FILTER);

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let mut config = ClientConfig::from_env();
    if let Some(ref url) = cli.api_url {
        config.api_url = ClientConfig::with_api_url(url)
            .context("Invalid --api-url")?
            .api_url;
    }
    if let Commands::Notifications { limit: Some(limit) } = &cli.command {
        config.page_size = (*limit).clamp(1, MAX_NOTIFICATION_PAGE_SIZE);
    }

    // -----------------------------------------------------------------------
    // 3. Initialize state
    // -----------------------------------------------------------------------
    let state = ClientState::with_persistent_session(config)
        .context("Failed to initialize client state")?;

    // -----------------------------------------------------------------------
    // 4. Run the command
    // -----------------------------------------------------------------------
    match cli.command {
        Commands::Login {
            subject,
            token,
            role,
        } => {
            state
                .session
                .login(Session::new(SubjectId::new(subject), role, token))?;
            println!("Logged in.");
        }
        Commands::Logout => {
            state.session.logout()?;
            println!("Logged out.");
        }
        Commands::Chat { conversation } => {
            run_chat(&state, ConversationId::new(conversation)).await?;
        }
        Commands::Notifications { .. } => {
            let mut center = state.notification_center().context("Not logged in")?;
            let timeout = state.config.request_timeout;
            if tokio::time::timeout(timeout, center.changed()).await.is_err() {
                warn!("Unread count not available yet");
            }

            let badge = view::badge(center.unread());
            let items = center.expand().await?;
            if items.is_empty() {
                println!("No notifications.");
            } else {
                println!("Notifications {badge}");
                for item in items {
                    println!("{}", view::notification_row(item));
                }
            }
        }
        Commands::MarkRead { id } => {
            let mut center = state.notification_center().context("Not logged in")?;
            center.mark_read(&NotificationId::new(id)).await?;
            println!("Marked read.");
        }
        Commands::MarkAllRead { yes } => {
            let mut center = state.notification_center().context("Not logged in")?;
            if !yes && !confirm("Mark every notification read?")? {
                println!("Cancelled.");
                return Ok(());
            }
            center.mark_all_read().await?;
            println!("All notifications marked read.");
        }
        Commands::Watch => {
            let mut center = state.notification_center().context("Not logged in")?;
            info!(subject = %center.subject(), "Watching unread count");
            loop {
                tokio::select! {
                    count = center.changed() => {
                        let Some(count) = count else { break };
                        let badge = view::badge(count);
                        println!("unread: {count} {badge}");
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

async fn run_chat(state: &ClientState, conversation: ConversationId) -> Result<()> {
    state.session.require().context("Not logged in")?;

    let mut chat = state.chat_session();
    chat.open_conversation(conversation.clone()).await?;
    chat.set_focused(true);

    println!("# {conversation} {}", view::connection_indicator(chat.connection_state()));
    let mut cursor = TranscriptCursor::default();
    print_rows(cursor.take_new(chat.messages(), chat.role()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "/quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                let receipt = chat.send_message(line).await?;
                print_rows(cursor.take_new(chat.messages(), chat.role()));
                if !receipt.delivered {
                    println!("  (not delivered)");
                }
            }
            update = chat.next_live_event(), if chat.has_live_connection() => {
                print_rows(cursor.take_new(chat.messages(), chat.role()));
                if matches!(update, Some(LiveUpdate::Disconnected) | None) {
                    println!("# {}", view::connection_indicator(chat.connection_state()));
                }
            }
        }
    }

    if chat.phase() != SessionPhase::Closed {
        chat.close_conversation().await;
    }
    Ok(())
}

fn print_rows(rows: Vec<String>) {
    for row in rows {
        println!("{row}");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
