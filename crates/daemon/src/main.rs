//! PolyRun Daemon
//!
//! Interactive multi-language code execution attached to pseudo-terminals.

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::lang::{CommandResolver, Language};
use daemon::session::Engine;
use daemon::sink::ChannelSink;
use protocol::events::Event;

/// PolyRun Daemon - interactive multi-language code execution.
#[derive(Parser, Debug)]
#[command(name = "polyrun")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a source file attached to this terminal
    Run {
        /// Language to run the source as (python, javascript, php, perl,
        /// java, c, c++)
        #[arg(long, short)]
        language: String,

        /// Source file to execute; reads from stdin when omitted
        file: Option<PathBuf>,
    },

    /// List supported languages and toolchain availability
    Languages {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Run { language, file } => run_local(config, &language, file).await,
        Commands::Languages { json } => list_languages(&config, json),
    }
}

/// Drives the engine end-to-end on the local terminal: one session, source
/// from a file or stdin, output to stdout, local stdin forwarded as input.
async fn run_local(config: Config, language: &str, file: Option<PathBuf>) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let source = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let (sink, mut events) = ChannelSink::new();
    let engine = Arc::new(Engine::new(&config, Arc::new(sink)));
    let session_id = uuid::Uuid::new_v4().to_string();

    // Print output chunks as they arrive.
    let printer = tokio::spawn(async move {
        use std::io::Write as _;
        let mut stdout = std::io::stdout();
        while let Some((_, event)) = events.recv().await {
            if let Event::Output(chunk) = event {
                let _ = stdout.write_all(chunk.text.as_bytes());
                let _ = stdout.flush();
            }
        }
    });

    let launched = engine.run(&session_id, language, &source).await.is_ok();

    if launched {
        // Forward local stdin to the child until it exits.
        let input_engine = Arc::clone(&engine);
        let input_session = session_id.clone();
        let stdin_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt as _;
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => input_engine.input(&input_session, &buf[..n]).await,
                }
            }
        });

        while engine.is_running(&session_id).await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        stdin_task.abort();
    }

    engine.disconnect(&session_id).await;
    // The pump stopped before disconnect returned, so everything it produced
    // is already queued; give the printer a moment to drain, then stop it
    // rather than waiting on a stdin read that may never return.
    tokio::time::sleep(Duration::from_millis(100)).await;
    printer.abort();
    let _ = printer.await;

    Ok(())
}

/// Prints the language table with toolchain availability.
fn list_languages(config: &Config, json: bool) -> anyhow::Result<()> {
    let resolver = CommandResolver::new(config.languages.clone());

    if json {
        let entries: Vec<_> = Language::ALL
            .iter()
            .map(|lang| {
                serde_json::json!({
                    "language": lang.name(),
                    "available": resolver.toolchain_available(*lang),
                    "requires": resolver.required_binaries(*lang),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for lang in Language::ALL {
            let status = if resolver.toolchain_available(lang) {
                "available"
            } else {
                "missing toolchain"
            };
            println!("{:<12} {}", lang.name(), status);
        }
    }

    Ok(())
}
