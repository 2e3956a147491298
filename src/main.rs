//! # Clarify Harness CLI (`clarify`)
//!
//! The `clarify` binary initializes the database, loads project records,
//! manages prompt templates, runs the clarify/suggest/chat workflows
//! from the terminal, and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! clarify --config ./config/clarify.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clarify init` | Create the SQLite database and run schema migrations |
//! | `clarify ingest <file.json>` | Insert or merge a project record |
//! | `clarify projects list` | List project names |
//! | `clarify projects epics <project>` | List a project's epics |
//! | `clarify projects tickets <project> <epic>` | List an epic's tickets |
//! | `clarify projects links <project>` | Links for a project, epic or ticket |
//! | `clarify prompt set <role>` | Create or overwrite a prompt template |
//! | `clarify prompt get <role>` | Print a prompt template |
//! | `clarify ask <project> <epic>` | Generate clarifying questions |
//! | `clarify suggest <session> <project> <epic>` | Suggest answers for a question |
//! | `clarify chat <session> <project> <epic> "<msg>"` | One chat turn |
//! | `clarify history <session>` | Print a session's messages |
//! | `clarify session delete <session>` | Delete a session |
//! | `clarify question status <session>` | Set or clear a question's status |
//! | `clarify serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! clarify init
//! clarify ingest ./payments.json
//! clarify prompt set clarify --contextualize "..." --qa "Ask about gaps in the ticket."
//! clarify ask Payments PAY-1 --ticket PAY-7
//! clarify chat 3f2a... Payments PAY-1 "Which currencies?" --ticket PAY-7
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use clarify_harness::config;
use clarify_harness::db;
use clarify_harness::harness::Harness;
use clarify_harness::migrate;
use clarify_harness::server;
use clarify_harness::telemetry;
use clarify_harness_core::models::{ContextKey, Project, QuestionStatus, Role};
use clarify_harness_core::workflow::ClarifyOutcome;

#[derive(Parser)]
#[command(
    name = "clarify",
    about = "Retrieval-grounded clarifying questions, suggestions and chat over project tickets",
    version,
    long_about = "Clarify Harness grounds an LLM in a project's epics, tickets and linked \
    pages to generate clarifying questions, suggest answers, and hold \
    history-aware conversations about them."
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/clarify.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies the grounding corpus for a workflow command.
#[derive(Args)]
struct KeyArgs {
    /// Project name.
    project: String,
    /// Epic key within the project.
    epic: String,
    /// Ticket key under the epic. Takes precedence over `--url`.
    #[arg(long)]
    ticket: Option<String>,
    /// URL of a page linked from the epic.
    #[arg(long)]
    url: Option<String>,
}

impl KeyArgs {
    fn into_key(self) -> ContextKey {
        ContextKey {
            project_name: self.project,
            epic_key: self.epic,
            ticket_key: self.ticket,
            source_url: self.url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file (if it doesn't exist) and runs
    /// all schema migrations. Safe to run multiple times.
    Init,

    /// Insert or merge a project record from a JSON file.
    ///
    /// Link lists are appended to any stored record of the same name;
    /// epics and tickets are replaced.
    Ingest {
        /// Path to a JSON project record (`-` for stdin).
        file: PathBuf,
    },

    /// Browse stored projects, epics, tickets and links.
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },

    /// Manage per-role prompt templates.
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },

    /// Generate clarifying questions for a context.
    ///
    /// Does nothing if questions were already generated for the same
    /// project, epic, ticket and URL.
    Ask {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Suggest candidate answers for a stored question.
    Suggest {
        /// Question session ID (as printed by `ask`).
        session: String,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Send one chat message on a session and print the reply.
    Chat {
        /// Session ID. A clarify question's session ID seeds the chat with it.
        session: String,
        #[command(flatten)]
        key: KeyArgs,
        /// The message to send.
        message: String,
    },

    /// Print a session's messages in order.
    History {
        /// Session ID.
        session: String,
    },

    /// Session management.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Clarify question management.
    Question {
        #[command(subcommand)]
        action: QuestionAction,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the workflow, prompt, session
    /// and catalog endpoints.
    Serve,
}

#[derive(Subcommand)]
enum ProjectsAction {
    /// List project names.
    List,
    /// List a project's epics.
    Epics { project: String },
    /// List an epic's tickets.
    Tickets { project: String, epic: String },
    /// Links for a project, or an epic with `--epic`, or a ticket with both.
    Links {
        project: String,
        #[arg(long)]
        epic: Option<String>,
        #[arg(long)]
        ticket: Option<String>,
    },
}

#[derive(Subcommand)]
enum PromptAction {
    /// Create or overwrite the template for a role.
    Set {
        /// CLARIFY, CHAT or SUGGESTION (case-insensitive).
        role: String,
        /// System prompt that rewrites the input into a standalone query.
        #[arg(long)]
        contextualize: String,
        /// Answering system prompt, stored verbatim. Retrieved context is
        /// appended after it at run time.
        #[arg(long)]
        qa: String,
    },
    /// Print the template for a role as JSON.
    Get { role: String },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Delete every message of a session.
    Delete { session: String },
}

#[derive(Subcommand)]
enum QuestionAction {
    /// Set (`resolved` or `dismissed`) or clear a question's status.
    Status {
        session: String,
        /// New status. Omit to reopen the question.
        status: Option<String>,
    },
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(anyhow::Error::msg)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_project(file: &Path) -> Result<Project> {
    let raw = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read project file: {}", file.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("Invalid project JSON in {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&cfg).await?;
        migrate::run_migrations(&pool).await?;
        pool.close().await;
        println!("Database initialized successfully.");
        return Ok(());
    }
    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let harness = Harness::open(&cfg).await?;
    let engine = harness.engine();

    match cli.command {
        Commands::Init | Commands::Serve => {}
        Commands::Ingest { file } => {
            let project = read_project(&file)?;
            engine.catalog().ingest(&project).await?;
            println!(
                "Project {} saved ({} epics).",
                project.project_name,
                project.issues.len()
            );
        }
        Commands::Projects { action } => match action {
            ProjectsAction::List => {
                for name in engine.catalog().list_projects().await? {
                    println!("{}", name);
                }
            }
            ProjectsAction::Epics { project } => {
                for epic in engine.catalog().list_epics(&project).await? {
                    println!("{}\t{}", epic.key, epic.summary);
                }
            }
            ProjectsAction::Tickets { project, epic } => {
                for ticket in engine.catalog().list_tickets(&project, &epic).await? {
                    println!("{}\t{}\t{}", ticket.key, ticket.issue_type, ticket.summary);
                }
            }
            ProjectsAction::Links {
                project,
                epic,
                ticket,
            } => {
                let links = engine
                    .catalog()
                    .links(&project, epic.as_deref(), ticket.as_deref())
                    .await?;
                print_json(&links)?;
            }
        },
        Commands::Prompt { action } => match action {
            PromptAction::Set {
                role,
                contextualize,
                qa,
            } => {
                let role = parse_role(&role)?;
                engine.set_prompt_template(role, &contextualize, &qa).await?;
                println!("Prompt for {} saved.", role);
            }
            PromptAction::Get { role } => {
                let template = engine.get_prompt_template(parse_role(&role)?).await?;
                print_json(&template)?;
            }
        },
        Commands::Ask { key } => match engine.generate_clarify_questions(key.into_key()).await? {
            ClarifyOutcome::Generated { questions, .. } => {
                for q in &questions {
                    println!("{}\t{}", q.session_id, q.question);
                }
            }
            outcome @ ClarifyOutcome::AlreadyExists => println!("{}.", outcome.message()),
        },
        Commands::Suggest { session, key } => {
            match engine.generate_suggestion(&session, key.into_key()).await? {
                Some(suggestion) => {
                    println!("{}", suggestion.question);
                    for candidate in &suggestion.candidates {
                        println!("  - {}", candidate);
                    }
                }
                None => println!("No suggestions."),
            }
        }
        Commands::Chat {
            session,
            key,
            message,
        } => {
            let reply = engine.chat(&session, &message, key.into_key()).await?;
            println!("{}", reply.response);
        }
        Commands::History { session } => {
            for m in engine.session_history(&session).await? {
                println!(
                    "[{}] {}: {}",
                    m.timestamp.to_rfc3339(),
                    m.sender.as_str(),
                    m.content
                );
            }
        }
        Commands::Session {
            action: SessionAction::Delete { session },
        } => {
            engine.delete_session(&session).await?;
            println!("Session {} deleted.", session);
        }
        Commands::Question {
            action: QuestionAction::Status { session, status },
        } => {
            let status = status
                .map(|s| s.parse::<QuestionStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            engine.mark_question_status(&session, status).await?;
            println!(
                "Question {} status: {}",
                session,
                status.map(|s| s.as_str()).unwrap_or("open")
            );
        }
    }

    harness.close().await;
    Ok(())
}
