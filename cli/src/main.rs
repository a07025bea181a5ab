//! steward binary: composition root and the thin CLI surface.
//!
//! Everything long-lived is built exactly once in [`App::build`]: resolved
//! config, permissions, capabilities, registry, router, executor, and the
//! agent set. This is the only place system-trust agents are minted.

mod app;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use steward_types::Intent;

#[derive(Debug, Parser)]
#[command(name = "steward", about = "Local-first conversational command dispatcher")]
struct Cli {
    /// Emit one machine-readable JSON object instead of human output.
    #[arg(long, global = true)]
    json: bool,

    /// Agent context: a configured agent name, "system", or "none".
    #[arg(long, global = true, default_value = "system")]
    agent: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IntentArg {
    Chat,
    Plan,
    Spike,
}

impl From<IntentArg> for Intent {
    fn from(value: IntentArg) -> Self {
        match value {
            IntentArg::Chat => Intent::Chat,
            IntentArg::Plan => Intent::Plan,
            IntentArg::Spike => Intent::Spike,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Route an input line; a resulting tool call is executed.
    Route {
        /// The input text (joined with spaces).
        input: Vec<String>,
        #[arg(long, value_enum, default_value = "chat")]
        intent: IntentArg,
        /// Stop after routing; print the route result without executing.
        #[arg(long)]
        dry_run: bool,
        /// Attach a confirmation token to the executed call.
        #[arg(long)]
        confirm: bool,
    },
    /// Execute one tool directly with a JSON argument object.
    Exec {
        tool: String,
        /// JSON argument object; defaults to {}.
        args: Option<String>,
        /// Attach a confirmation token to the call.
        #[arg(long)]
        confirm: bool,
    },
    /// List registered tools.
    Tools,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("steward: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let app = app::App::build()?;
        let agent = app.agent_named(&cli.agent)?;

        match cli.command {
            Command::Route {
                input,
                intent,
                dry_run,
                confirm,
            } => {
                let input = input.join(" ");
                app.route_and_execute(&input, intent.into(), agent, dry_run, confirm, cli.json)
                    .await
            }
            Command::Exec {
                tool,
                args,
                confirm,
            } => {
                app.exec(&tool, args.as_deref(), agent, confirm, cli.json)
                    .await
            }
            Command::Tools => {
                app.list_tools(cli.json);
                Ok(0)
            }
        }
    })
}
