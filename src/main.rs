//! EVANA - post-accident vehicle assistant
//!
//! Main entry point for the CLI application.

use clap::Parser;
use evana::core::EntryMode;
use evana::{select_from_env, Config, Repl, Session};
use tracing_subscriber::EnvFilter;

/// EVANA - guides vehicle occupants after an accident or breakdown
#[derive(Parser, Debug)]
#[command(name = "evana")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the full agent trace
    #[arg(long, short = 'd')]
    debug: bool,

    /// Talk and listen instead of typing
    #[arg(long, short = 's')]
    speech: bool,

    /// Persist the conversation after every turn
    #[arg(long, short = 'c')]
    checkpoint: bool,

    /// Resume or name a checkpointed thread (implies --checkpoint)
    #[arg(long, short = 't')]
    thread: Option<String>,

    /// When the support script starts
    #[arg(long, value_enum)]
    entry: Option<EntryMode>,

    /// Override the model identifier
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Check that the backend is reachable before the first prompt
    #[arg(long)]
    preflight: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Write a default config file if none exists, then exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if args.debug {
        config.agent.debug = true;
    }

    if args.speech {
        config.speech.enabled = true;
    }

    if args.checkpoint || args.thread.is_some() {
        config.session.checkpoint = true;
    }

    if let Some(entry) = args.entry {
        config.script.entry = entry;
    }

    if args.preflight {
        config.agent.preflight = true;
    }

    config.validate()?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if args.init_config {
        let path = Config::config_file();
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
        return Ok(());
    }

    let mut model = select_from_env(&config)?;
    if let Some(name) = args.model {
        model.set_model(name);
    }

    if config.agent.preflight {
        model.preflight().await?;
    }

    let session = Session::from_config(&config, args.thread)?;
    tracing::info!(thread = %session.thread_id(), backend = %model.backend(), "starting");

    let mut repl = Repl::new(&config, model, session)?;

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        repl.run_once(&prompt).await?;
        return Ok(());
    }

    // Interactive mode
    repl.run().await?;

    Ok(())
}
