//! Letmeask CLI
//!
//! Thin wrapper around letmeask-core for using Q&A rooms from a terminal.
//! State lives in a local database under the data directory. Invocations
//! run one at a time and see each other's rooms and the signed-in account;
//! a command started while another one (such as `room watch`) holds the
//! data directory fails instead of waiting.
//!
//! ## Usage
//!
//! ```bash
//! # Sign in (the local provider stands in for the Google consent prompt)
//! letmeask auth login --name "Ana" --avatar "https://example.com/ana.png"
//!
//! # Who is signed in?
//! letmeask auth whoami
//!
//! # Create a room and share its code
//! letmeask room create "Weekly Q&A"
//!
//! # Check a room code
//! letmeask room join <code>
//!
//! # Print a room once, or follow it and ask from stdin
//! letmeask room show <room_id>
//! letmeask room watch <room_id>
//!
//! # Ask a question
//! letmeask question ask <room_id> "What is X?"
//!
//! # Moderate
//! letmeask question highlight <room_id> <question_id>
//! letmeask question answer <room_id> <question_id>
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use letmeask_core::logging::{init_logging, LogConfig};
use letmeask_core::{
    AuthEvent, AuthSession, Consent, Identity, LetmeaskError, LocalIdentityProvider, MemoryStore,
    RealtimeStore, Room, RoomDirectory, RoomId, RoomSync, Storage, StorePath,
};
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;

/// How long to wait for a store or provider push before giving up
const PUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Letmeask - live Q&A rooms
#[derive(Parser)]
#[command(name = "letmeask")]
#[command(version = "0.1.0")]
#[command(about = "Letmeask - live Q&A rooms")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: platform data dir/letmeask)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Session name used for the log file
    #[arg(long, global = true, default_value = "cli")]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign-in management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Room management
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Questions in a room
    Question {
        #[command(subcommand)]
        action: QuestionAction,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Sign in with Google
    Login {
        /// Display name shared by the provider
        #[arg(long)]
        name: Option<String>,
        /// Photo URL shared by the provider
        #[arg(long)]
        avatar: Option<String>,
        /// Simulate closing the consent prompt
        #[arg(long)]
        dismiss: bool,
    },
    /// Forget the signed-in account
    Logout,
    /// Show the signed-in identity
    Whoami,
}

#[derive(Subcommand)]
enum RoomAction {
    /// Create a new room
    Create {
        /// Room title
        title: String,
    },
    /// Check that a room code names an existing room
    Join {
        /// Room code
        code: String,
    },
    /// Print a room and its questions
    Show {
        /// Room ID
        room_id: String,
    },
    /// Follow a room live; each stdin line is submitted as a question.
    ///
    /// Holds the data directory until it exits.
    Watch {
        /// Room ID
        room_id: String,
    },
}

#[derive(Subcommand)]
enum QuestionAction {
    /// Submit a question to a room
    Ask {
        /// Room ID
        room_id: String,
        /// Question text
        content: String,
    },
    /// Mark a question as highlighted
    Highlight {
        /// Room ID
        room_id: String,
        /// Question ID
        question_id: String,
    },
    /// Mark a question as answered
    Answer {
        /// Room ID
        room_id: String,
        /// Question ID
        question_id: String,
    },
}

/// Everything a command needs, opened from the data directory
struct App {
    store: MemoryStore,
    provider: LocalIdentityProvider,
    auth: AuthSession,
}

impl App {
    /// Open the database and restore the previous session.
    ///
    /// The auth session is started and, when the provider remembers an
    /// account, the first auth-state report is awaited so that commands see
    /// the restored identity.
    async fn open(data_dir: &Path, consent: Consent) -> Result<Self> {
        let storage = match Storage::new(data_dir.join("letmeask.redb")) {
            Err(LetmeaskError::DatabaseInUse(_)) => anyhow::bail!(
                "Another letmeask process is using the data directory {}",
                data_dir.display()
            ),
            result => result?,
        };
        let store = MemoryStore::open(storage.clone())?;
        let provider = LocalIdentityProvider::open(storage, consent)?;

        let auth = AuthSession::start(Arc::new(provider.clone()));
        let mut events = auth.subscribe_events();
        if provider.account().is_some() {
            match tokio::time::timeout(PUSH_TIMEOUT, events.recv()).await {
                Ok(Ok(AuthEvent::ProfileRejected { uid })) => {
                    tracing::warn!(%uid, "Stored account was rejected");
                }
                Ok(_) => {}
                Err(_) => tracing::warn!("Timed out restoring the previous session"),
            }
        }

        Ok(Self {
            store,
            provider,
            auth,
        })
    }

    fn store(&self) -> Arc<dyn RealtimeStore> {
        Arc::new(self.store.clone())
    }

    fn identity(&self) -> Option<Identity> {
        self.auth.current_identity()
    }

    async fn close(self) {
        self.auth.shutdown().await;
    }
}

/// Get the default data directory (platform data dir/letmeask)
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("letmeask")
}

/// Resolve a room code to an existing room
async fn existing_room(app: &App, code: &str) -> Result<RoomId> {
    Ok(RoomDirectory::new(app.store()).join_room(code).await?)
}

/// Wait for the next projection after the last one seen
async fn next_projection(rx: &mut watch::Receiver<Room>) -> Result<Room> {
    tokio::time::timeout(PUSH_TIMEOUT, rx.changed())
        .await
        .map_err(|_| anyhow::anyhow!("Timed out waiting for the room snapshot"))??;
    Ok(rx.borrow_and_update().clone())
}

fn print_room(room: &Room) {
    let title = if room.title.is_empty() {
        "(untitled)"
    } else {
        room.title.as_str()
    };
    println!("Room: {}", title);
    println!("  ID: {}", room.id);
    println!("  Questions: {}", room.questions.len());

    if room.questions.is_empty() {
        println!();
        println!("No questions yet.");
        return;
    }

    println!();
    for question in &room.questions {
        let mut flags = String::new();
        if question.is_highlighted {
            flags.push_str(" [highlighted]");
        }
        if question.is_answered {
            flags.push_str(" [answered]");
        }
        println!("  [{}]{} {}", question.id, flags, question.content);
        println!("      by {}", question.author.name);
    }
}

/// Set one flag on an existing question
async fn moderate(app: &App, room_id: &str, question_id: &str, flag: &str) -> Result<()> {
    let room_id = existing_room(app, room_id).await?;
    let question = StorePath::room_questions(&room_id).child(question_id);

    match app.store.get(&question).await? {
        Some(value) if !value.is_null() => {}
        _ => anyhow::bail!("Question not found: {}", question_id),
    }

    app.store.set(&question.child(flag), Value::Bool(true))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    init_logging(&LogConfig {
        logs_dir: Some(data_dir.join("logs")),
        session: cli.session,
        default_filter: LogConfig::filter_for_verbosity(cli.verbose).to_string(),
        console: true,
    })?;

    let consent = match &cli.command {
        Commands::Auth {
            action:
                AuthAction::Login {
                    name,
                    avatar,
                    dismiss,
                },
        } if !dismiss => Consent::Grant {
            display_name: name.clone(),
            photo_url: avatar.clone(),
        },
        _ => Consent::Dismiss,
    };
    let app = App::open(&data_dir, consent).await?;

    match cli.command {
        Commands::Auth { action } => match action {
            AuthAction::Login { .. } => {
                app.auth.sign_in_with_google().await?;
                match app.identity() {
                    Some(identity) => {
                        println!("Signed in as {}", identity.display_name());
                        println!("  ID: {}", identity.id());
                    }
                    None => println!("Sign-in finished without an account."),
                }
            }

            AuthAction::Logout => {
                app.provider.sign_out()?;
                println!("Signed out.");
            }

            AuthAction::Whoami => match app.identity() {
                Some(identity) => {
                    println!("Signed in as {}", identity.display_name());
                    println!("  ID: {}", identity.id());
                    println!("  Avatar: {}", identity.avatar_url());
                }
                None => println!("Not signed in."),
            },
        },

        Commands::Room { action } => match action {
            RoomAction::Create { title } => {
                let directory = RoomDirectory::new(app.store());
                match directory.create_room(&title, app.identity().as_ref()).await? {
                    Some(room_id) => {
                        println!("Created room: {}", title.trim());
                        println!("  ID: {}", room_id);
                    }
                    None => println!("Room title is empty, nothing created."),
                }
            }

            RoomAction::Join { code } => {
                let room_id = existing_room(&app, &code).await?;
                println!("Joined room: {}", room_id);
            }

            RoomAction::Show { room_id } => {
                let room_id = existing_room(&app, &room_id).await?;
                let mut sync = RoomSync::new(app.store(), room_id);
                let mut rx = sync.watch();
                sync.open();

                let room = next_projection(&mut rx).await?;
                print_room(&room);
                sync.close().await;
            }

            RoomAction::Watch { room_id } => {
                let room_id = existing_room(&app, &room_id).await?;
                let mut sync = RoomSync::new(app.store(), room_id);
                let mut rx = sync.watch();
                sync.open();

                print_room(&next_projection(&mut rx).await?);
                println!();
                println!("Type a question and press Enter to submit (Ctrl+C to exit).");

                let reader = tokio::io::BufReader::new(tokio::io::stdin());
                let mut lines = reader.lines();
                let mut stdin_open = true;
                let mut awaiting_echo = false;

                loop {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let room = rx.borrow_and_update().clone();
                            println!("{}", "─".repeat(50));
                            print_room(&room);
                            awaiting_echo = false;
                            if !stdin_open {
                                break;
                            }
                        }
                        line = lines.next_line(), if stdin_open => {
                            match line {
                                Ok(Some(text)) => {
                                    match sync.submit_question(&text, app.identity().as_ref()).await {
                                        Ok(Some(key)) => {
                                            println!("Submitted question {}", key);
                                            awaiting_echo = true;
                                        }
                                        Ok(None) => {}
                                        Err(e) => eprintln!("Failed to submit: {}", e),
                                    }
                                }
                                Ok(None) => {
                                    // EOF: leave once the last submission is echoed back
                                    stdin_open = false;
                                    if !awaiting_echo {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    eprintln!("Read error: {}", e);
                                    stdin_open = false;
                                }
                            }
                        }
                        _ = tokio::signal::ctrl_c() => {
                            println!();
                            println!("Leaving room...");
                            break;
                        }
                    }
                }

                sync.close().await;
            }
        },

        Commands::Question { action } => match action {
            QuestionAction::Ask { room_id, content } => {
                let room_id = existing_room(&app, &room_id).await?;
                let sync = RoomSync::new(app.store(), room_id);
                match sync.submit_question(&content, app.identity().as_ref()).await? {
                    Some(key) => {
                        println!("Question submitted.");
                        println!("  ID: {}", key);
                    }
                    None => println!("Question is empty, nothing submitted."),
                }
            }

            QuestionAction::Highlight {
                room_id,
                question_id,
            } => {
                moderate(&app, &room_id, &question_id, "isHighlighted").await?;
                println!("Highlighted question {}", question_id);
            }

            QuestionAction::Answer {
                room_id,
                question_id,
            } => {
                moderate(&app, &room_id, &question_id, "isAnswered").await?;
                println!("Marked question {} as answered", question_id);
            }
        },
    }

    app.close().await;
    Ok(())
}
