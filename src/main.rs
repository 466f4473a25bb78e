//! `finagent` command line: chat with the finance assistant.
//!
//! ```bash
//! GOOGLE_API_KEY=... finagent send "How much can I save each month?"
//! GOOGLE_API_KEY=... finagent run
//! finagent agents investment_plan_agent
//! RUST_LOG=finagent=debug finagent run
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use finagent::agents::{find_agent, root_agent};
use finagent::session::{MemorySessionStore, SqliteSessionStore};
use finagent::types::AgentOutput;
use finagent::{GeminiCaller, LlmAgent, RetryingLlmCaller, Runner, SessionStore, Settings};

/// Finance assistant agents on Gemini.
#[derive(Parser, Debug)]
#[command(name = "finagent", version, about = "Finance assistant agents on Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model for every agent (overrides FINAGENT_MODEL).
    #[arg(long, global = true)]
    model: Option<String>,

    /// SQLite file for sessions (overrides FINAGENT_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User the session belongs to.
    #[arg(long, global = true, default_value = "user")]
    user: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive chat.
    Run,
    /// Send one message and print the answer.
    Send {
        /// Message content.
        content: String,

        /// Print the state trace, sub-agents included, after the answer.
        #[arg(long)]
        trace: bool,
    },
    /// List the agent tree, or show one agent.
    Agents {
        /// Agent name.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finagent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if cli.model.is_some() {
        settings.model_override = cli.model.clone();
    }
    if cli.db.is_some() {
        settings.db_path = cli.db.clone();
    }

    match cli.command {
        Command::Agents { name } => show_agents(name.as_deref()),
        Command::Send { content, trace } => {
            let runner = build_runner(&settings)?;
            let session = runner.create_session(&cli.user).await?;
            let (answer, turn_trace) = runner.send_traced(&session.id, &content).await?;
            println!("{}", answer);
            if trace {
                turn_trace.print();
            }
            Ok(())
        }
        Command::Run => {
            let runner = build_runner(&settings)?;
            chat(&runner, &cli.user).await
        }
    }
}

fn build_runner(settings: &Settings) -> anyhow::Result<Runner> {
    let gemini = GeminiCaller::new(settings.require_api_key()?)
        .with_base_url(settings.api_base.clone());
    let llm = Arc::new(RetryingLlmCaller::new(Arc::new(gemini), settings.max_retries));

    let store: Arc<dyn SessionStore> = match &settings.db_path {
        Some(path) => Arc::new(
            SqliteSessionStore::new(path.clone())
                .with_context(|| format!("opening session database {}", path.display()))?,
        ),
        None => Arc::new(MemorySessionStore::new()),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(print_progress(rx));

    Ok(Runner::new(root_agent()?, llm, store)
        .with_config(settings.agent_config())
        .with_output(tx))
}

/// Prints tool activity so delegation to sub-agents is visible.
async fn print_progress(mut rx: mpsc::UnboundedReceiver<AgentOutput>) {
    while let Some(output) = rx.recv().await {
        match output {
            AgentOutput::ToolCallStarted { agent, name, args } => {
                let args = serde_json::to_string(&args).unwrap_or_default();
                eprintln!("  [{}] -> {} {}", agent, name, args);
            }
            AgentOutput::ToolCallFinished { agent, name, success, .. } => {
                let status = if success { "ok" } else { "failed" };
                eprintln!("  [{}] <- {} ({})", agent, name, status);
            }
            AgentOutput::Error { agent, message } => {
                eprintln!("  [{}] error: {}", agent, message);
            }
            AgentOutput::StateStarted { .. } | AgentOutput::FinalAnswer { .. } => {}
        }
    }
}

async fn chat(runner: &Runner, user: &str) -> anyhow::Result<()> {
    let session = runner.create_session(user).await?;
    println!("Chatting with {} (session {}). Type 'exit' to quit.", runner.app_name(), session.id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match runner.send(&session.id, line).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

fn show_agents(name: Option<&str>) -> anyhow::Result<()> {
    match name {
        None => print_tree(&root_agent()?, 0),
        Some(name) => {
            let agent = find_agent(name)?
                .with_context(|| format!("no agent named '{}'", name))?;
            println!("name:        {}", agent.name);
            println!("model:       {}", agent.model);
            println!("description: {}", agent.description);
            println!("tools:       {}", agent.tool_names().join(", "));
            println!("\n{}", agent.instruction);
        }
    }
    Ok(())
}

fn print_tree(agent: &Arc<LlmAgent>, depth: usize) {
    println!("{}{} [{}]", "  ".repeat(depth), agent.name, agent.tool_names().join(", "));
    for sub in agent.sub_agents() {
        print_tree(&sub, depth + 1);
    }
}
