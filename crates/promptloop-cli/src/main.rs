//! promptloop CLI — run prompt workflows against AI coding editors.
//!
//! The binary is a headless front end over promptloop-core: it loads a
//! workflow, wires the editor bridge into the engine and prints progress.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use promptloop_cli::commands;
use promptloop_cli::commands::workflow::RunOptions;

/// promptloop — sequenced prompt automation for AI coding editors
#[derive(Parser)]
#[command(name = "promptloop", version, about = "promptloop — sequenced prompt automation for AI coding editors")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "PROMPTLOOP_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file, a saved workflow, or a built-in preset
    Run {
        /// Workflow JSON file or saved workflow name
        #[arg(conflicts_with = "builtin")]
        file: Option<String>,
        /// Run a built-in preset by name (e.g. "Bug Fix & Test")
        #[arg(long)]
        builtin: Option<String>,
        /// Set a template variable, e.g. --var feature_name=login
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Repeat the workflow until cancelled
        #[arg(long = "loop")]
        loop_mode: bool,
        /// Seconds between passes in loop mode
        #[arg(long)]
        loop_interval: Option<f64>,
        /// Wait for the editor's assistant to finish each step
        #[arg(long)]
        wait: bool,
        /// Delivery mode: clipboard | file_drop | terminal | auto_interact
        #[arg(long)]
        mode: Option<String>,
        /// Editor: antigravity | windsurf | cursor | clipboard
        #[arg(long)]
        editor: Option<String>,
        /// Resolve and log prompts without sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a workflow JSON file without running it
    Validate {
        /// Workflow JSON file
        file: PathBuf,
    },

    /// List saved and built-in workflows
    List,

    /// Save the built-in presets as workflow files
    ExportBuiltins {
        /// Target directory (defaults to the configured workflow directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Send a single prompt to the editor
    Send {
        /// Prompt text
        prompt: String,
        /// Wait for the assistant to finish responding
        #[arg(long)]
        wait: bool,
        /// Delivery mode override
        #[arg(long)]
        mode: Option<String>,
        /// Editor override
        #[arg(long)]
        editor: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promptloop_core=info,promptloop_cli=info".into()),
        )
        .init();

    let result = if let Some(command) = cli.command {
        match commands::load_config(cli.config.as_deref()) {
            Err(e) => Err(e),
            Ok(config) => match command {
                Commands::Run {
                    file,
                    builtin,
                    vars,
                    loop_mode,
                    loop_interval,
                    wait,
                    mode,
                    editor,
                    dry_run,
                } => {
                    let options = RunOptions {
                        file,
                        builtin,
                        vars,
                        loop_mode,
                        loop_interval,
                        wait,
                        mode,
                        editor,
                        dry_run,
                    };
                    commands::workflow::run(&config, options).await.map(|_| ())
                }

                Commands::Validate { file } => commands::workflow::validate(&file).map(|_| ()),

                Commands::List => commands::workflow::list(&config),

                Commands::ExportBuiltins { dir } => {
                    commands::workflow::export_builtins(&config, dir.as_deref()).map(|_| ())
                }

                Commands::Send {
                    prompt,
                    wait,
                    mode,
                    editor,
                } => commands::send::send(&config, &prompt, wait, mode.as_deref(), editor.as_deref())
                    .await
                    .map(|_| ()),
            },
        }
    } else {
        // No subcommand: show help
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
