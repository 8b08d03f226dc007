//! Ikigai — terminal entrypoint wiring config, provider, tool registry,
//! session sink, and the event loop together, grounded on `arawn`'s
//! `main.rs` (tracing setup, config load, dispatch) collapsed to a single
//! TUI command since this workspace has no server/client split.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ikigai_agent::{Agent, AgentConfig, AgentContext, ToolRegistry};
use ikigai_llm::{GeminiConfig, GeminiProvider};
use ikigai_session::SqliteSink;
use ikigai_tui::EventLoop;
use uuid::Uuid;

/// Ikigai — a terminal agent core.
#[derive(Parser)]
#[command(name = "ikigai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Override the model configured in ikigai.toml / the user config.
    #[arg(long)]
    model: Option<String>,

    /// System prompt for the initial agent.
    #[arg(long)]
    system_prompt: Option<String>,

    /// Tail the debug-pipe scrollback prefix into logs instead of hiding it.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing(cli.verbose)?;

    let mut resolved = ikigai_config::load(None).context("failed to load configuration")?;
    if let Some(model) = cli.model {
        resolved.model = model;
    }

    let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY environment variable not set")?;
    let mut gemini_config = GeminiConfig::new(api_key);
    if let Some(base_url) = resolved.base_url.clone() {
        gemini_config = gemini_config.with_base_url(base_url);
    }
    let provider = Arc::new(GeminiProvider::new(gemini_config).context("failed to build Gemini provider")?);

    let mut tools = ToolRegistry::new();
    for path in &resolved.tool_paths {
        if let Err(err) = tools.register(path).await {
            tracing::warn!(tool = %path.display(), error = %err, "failed to register tool");
        }
    }

    if let Some(parent) = resolved.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory '{}'", parent.display()))?;
    }
    let sink = Arc::new(SqliteSink::open(&resolved.database_path)?);

    let context = Arc::new(AgentContext {
        provider,
        model: resolved.model.clone(),
        tools: Arc::new(tools),
        db_sink: Some(sink),
        session_id: Some(Uuid::new_v4().to_string()),
        config: AgentConfig {
            max_tool_iterations: resolved.max_tool_iterations,
            sigterm_grace: resolved.sigterm_grace,
            scrollback_capacity: resolved.scrollback_capacity,
        },
    });

    let agent = Agent::new(context, cli.system_prompt);

    ikigai_tui::install_panic_hook();
    let mut terminal = ikigai_tui::init_terminal()?;

    let mut event_loop = EventLoop::new();
    event_loop.add_agent(agent);
    event_loop.set_debug_enabled(cli.debug || resolved.debug_pipes_enabled);

    let result = event_loop.run(tokio::io::stdin(), &mut terminal).await;

    ikigai_tui::restore_terminal(&mut terminal)?;
    result
}

fn install_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "ikigai=debug,ikigai_agent=debug,ikigai_llm=debug,ikigai_tui=debug,ikigai_session=debug,ikigai_config=debug,info"
    } else {
        "ikigai=info,ikigai_agent=info,ikigai_llm=info,ikigai_tui=info,warn"
    };

    let log_dir = dirs::config_dir().map(|d| d.join("ikigai").join("logs")).unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ikigai.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked intentionally: the guard must outlive `main`, and main never
    // returns early before the event loop finishes.
    Box::leak(Box::new(guard));

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    Ok(())
}
