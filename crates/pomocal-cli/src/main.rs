use clap::{Parser, Subcommand};
use pomocal_core::{Actor, Config};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pomocal", version, about = "Pomocal CLI: calendar events and Pomodoro sessions")]
struct Cli {
    /// Act as this user ID instead of [user].id from the config
    #[arg(long, global = true)]
    user: Option<String>,
    /// Act with this email instead of [user].email from the config
    #[arg(long, global = true)]
    email: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calendar events and deadlines
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Pomodoro sessions
    Pomodoro {
        #[command(subcommand)]
        action: commands::pomodoro::PomodoroAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so JSON on stdout stays parseable. `RUST_LOG` wins over
/// the `[log] filter` setting.
fn init_tracing(config_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config.log.filter);

    let actor = Actor::new(
        cli.user.unwrap_or_else(|| config.user.id.clone()),
        cli.email.unwrap_or_else(|| config.user.email.clone()),
    );
    let ctx = commands::Context { actor, config };

    let result = match cli.command {
        Commands::Event { action } => commands::event::run(&ctx, action),
        Commands::Pomodoro { action } => commands::pomodoro::run(&ctx, action),
        Commands::Config { action } => commands::config::run(&ctx, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
