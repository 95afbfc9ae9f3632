mod credential_commands;
mod key_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::credential_commands::CredentialAction;

#[derive(Parser)]
#[command(name = "strongbox", about = "Strongbox: encrypted integration credential vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./strongbox.toml and ~/.config/strongbox/).
    #[arg(long, global = true, env = "STRONGBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Principal the operation runs as.
    #[arg(long, global = true, env = "STRONGBOX_OWNER")]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Credential(CredentialAction),
    /// Generate a random encryption key and passphrase salt.
    Keygen,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Stdout carries command output, so logs go to stderr.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "strongbox starting");

    match cli.command {
        Commands::Keygen => print_json(&key_commands::keygen()),
        Commands::Credential(action) => {
            let owner = cli
                .owner
                .as_deref()
                .filter(|o| !o.trim().is_empty())
                .context("an owner is required (pass --owner or set STRONGBOX_OWNER)")?;

            let config = strongbox_config::load_or_discover(cli.config.as_deref())?;
            config.validate()?;

            let vault = credential_commands::open_vault(&config).await?;
            let output = credential_commands::handle_credential(&vault, owner, action).await?;
            print_json(&output)
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "create",
            "--type",
            "slack",
            "--label",
            "Team",
            "--credentials",
            r#"{"token":"xoxb-1"}"#,
            "--owner",
            "u1",
        ])
        .unwrap();
        assert_eq!(cli.owner.as_deref(), Some("u1"));
        assert!(matches!(
            cli.command,
            Commands::Credential(CredentialAction::Create { .. })
        ));
    }

    #[test]
    fn parses_keygen() {
        let cli = Cli::try_parse_from(["strongbox", "keygen"]).unwrap();
        assert!(matches!(cli.command, Commands::Keygen));
    }
}
