//! Avatar Registry Command Line Interface
//!
//! Runs registry operations against a JSON state file. Each invocation
//! loads the state, applies one operation and writes the result back.

use anyhow::{Context, Result};
use avatar_registry::{AvatarRegistration, AvatarUpdate, Identity, MemoryContentStore, Registry};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings;
mod state;

use settings::AppConfig;
use state::StateFile;

#[derive(Parser)]
#[command(name = "avatar-registry")]
#[command(about = "Avatar Registry Command Line Interface", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Registry state file; overrides the configured path
    #[arg(long, global = true, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Identity the operation runs as (64 hex characters)
    #[arg(long, global = true, env = "AVATAR_REGISTRY_CALLER")]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new avatar owned by the caller
    Create(CreateCommand),
    /// Update an avatar owned by the caller
    Update(UpdateCommand),
    /// Transfer an avatar to another identity
    Transfer {
        /// Avatar id
        id: u64,
        /// Recipient identity
        to: String,
    },
    /// Deactivate an avatar
    Deactivate {
        /// Avatar id
        id: u64,
    },
    /// Reactivate a deactivated avatar
    Reactivate {
        /// Avatar id
        id: u64,
    },
    /// Show an avatar
    Show {
        /// Avatar id
        id: u64,
    },
    /// List avatar ids owned by an identity (defaults to the caller)
    Owned {
        identity: Option<String>,
    },
    /// Show registry totals
    Total,
    /// Emergency pause (admin only, currently no effect)
    Pause,
    /// Print the event log
    Events,
    /// Print the content hash for a file without registering anything
    HashContent {
        file: PathBuf,
    },
}

impl Commands {
    /// Commands that never write the state file back.
    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Commands::Show { .. }
                | Commands::Owned { .. }
                | Commands::Total
                | Commands::Pause
                | Commands::Events
                | Commands::HashContent { .. }
        )
    }
}

#[derive(Args)]
struct CreateCommand {
    /// Display name
    name: String,
    /// Content hash in external storage
    content_hash: String,
    /// Initial attribute; repeat for several
    #[arg(long = "attr", value_name = "ATTRIBUTE")]
    attributes: Vec<String>,
}

#[derive(Args)]
struct UpdateCommand {
    /// Avatar id
    id: u64,
    /// New name; empty leaves it unchanged
    #[arg(long, default_value = "")]
    name: String,
    /// New content hash; empty leaves it unchanged
    #[arg(long, default_value = "")]
    content_hash: String,
    /// Amount to add to the level
    #[arg(long, default_value_t = 0)]
    level_increase: u64,
    /// Attribute to append; repeat for several
    #[arg(long = "attr", value_name = "ATTRIBUTE")]
    attributes: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(state) = &cli.state {
        config.state_path = state.clone();
    }
    init_logging(&config);

    if let Commands::HashContent { file } = &cli.command {
        let bytes =
            fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let hash = MemoryContentStore::hash_of(&bytes);
        return print_json(&json!({ "content_hash": hash }));
    }

    let caller = cli.caller.as_deref().map(parse_identity).transpose()?;
    let state = if cli.command.is_read_only() {
        StateFile::acquire_shared(&config.state_path)?
    } else {
        StateFile::acquire(&config.state_path)?
    };
    let registry = state.load(config.registry_config())?;

    let mutated = run(&registry, cli.command, caller.as_ref())?;
    if mutated {
        state.save(&registry)?;
    }

    Ok(())
}

/// Execute one command. Returns whether registry state changed.
fn run(registry: &Registry, command: Commands, caller: Option<&Identity>) -> Result<bool> {
    match command {
        Commands::Create(cmd) => {
            let caller = require_caller(caller)?;
            let id = registry.create(
                AvatarRegistration::new(cmd.name, cmd.content_hash, cmd.attributes),
                caller,
            )?;
            info!(id, "create complete");
            print_json(&registry.get_avatar(id)?)?;
            Ok(true)
        }
        Commands::Update(cmd) => {
            let caller = require_caller(caller)?;
            registry.update(
                AvatarUpdate {
                    id: cmd.id,
                    name: cmd.name,
                    content_hash: cmd.content_hash,
                    level_increase: cmd.level_increase,
                    attributes: cmd.attributes,
                },
                caller,
            )?;
            print_json(&registry.get_avatar(cmd.id)?)?;
            Ok(true)
        }
        Commands::Transfer { id, to } => {
            let caller = require_caller(caller)?;
            let to = parse_identity(&to)?;
            registry.transfer(id, &to, caller)?;
            print_json(&registry.get_avatar(id)?)?;
            Ok(true)
        }
        Commands::Deactivate { id } => {
            registry.deactivate(id, require_caller(caller)?)?;
            print_json(&registry.get_avatar(id)?)?;
            Ok(true)
        }
        Commands::Reactivate { id } => {
            registry.reactivate(id, require_caller(caller)?)?;
            print_json(&registry.get_avatar(id)?)?;
            Ok(true)
        }
        Commands::Show { id } => {
            print_json(&registry.get_avatar(id)?)?;
            Ok(false)
        }
        Commands::Owned { identity } => {
            let owner = match identity {
                Some(value) => parse_identity(&value)?,
                None => *require_caller(caller)?,
            };
            print_json(&json!({
                "owner": owner,
                "avatar_ids": registry.owned_ids(&owner),
                "registered": registry.is_registered(&owner),
            }))?;
            Ok(false)
        }
        Commands::Total => {
            print_json(&json!({
                "total_records": registry.total_records(),
                "next_id": registry.next_id(),
                "registered_identities": registry.registered_count(),
            }))?;
            Ok(false)
        }
        Commands::Pause => {
            registry.emergency_pause(require_caller(caller)?)?;
            print_json(&json!({ "paused": false, "reason": "emergency pause is reserved" }))?;
            Ok(false)
        }
        Commands::Events => {
            print_json(&registry.events())?;
            Ok(false)
        }
        Commands::HashContent { .. } => Ok(false),
    }
}

fn require_caller(caller: Option<&Identity>) -> Result<&Identity> {
    caller.context("--caller is required for this command")
}

fn parse_identity(value: &str) -> Result<Identity> {
    value
        .parse::<Identity>()
        .with_context(|| format!("Invalid identity {value:?}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_registry::RegistryConfig;

    fn caller() -> Identity {
        Identity([0xC0; 32])
    }

    #[test]
    fn cli_parses_update_flags() {
        let caller_hex = "c0".repeat(32);
        let cli = Cli::try_parse_from([
            "avatar-registry",
            "--caller",
            caller_hex.as_str(),
            "update",
            "1",
            "--level-increase",
            "3",
            "--attr",
            "Agi:5",
            "--attr",
            "Dex:2",
        ])
        .unwrap();

        match cli.command {
            Commands::Update(cmd) => {
                assert_eq!(cmd.id, 1);
                assert!(cmd.name.is_empty());
                assert_eq!(cmd.level_increase, 3);
                assert_eq!(cmd.attributes, vec!["Agi:5", "Dex:2"]);
            }
            _ => panic!("expected update command"),
        }
    }

    #[test]
    fn mutating_commands_report_state_change() {
        let registry = Registry::new(RegistryConfig::default());
        let create = Commands::Create(CreateCommand {
            name: "Hero".into(),
            content_hash: "Qm123".into(),
            attributes: vec!["Str:10".into()],
        });

        assert!(run(&registry, create, Some(&caller())).unwrap());
        assert!(!run(&registry, Commands::Show { id: 1 }, None).unwrap());
        assert!(!run(&registry, Commands::Total, None).unwrap());
        assert_eq!(registry.owned_ids(&caller()), vec![1]);
    }

    #[test]
    fn read_only_commands_match_reported_state_change() {
        let registry = Registry::new(RegistryConfig::with_admin(caller()));
        let commands = vec![
            Commands::Create(CreateCommand {
                name: "Hero".into(),
                content_hash: "Qm123".into(),
                attributes: vec![],
            }),
            Commands::Show { id: 1 },
            Commands::Owned { identity: None },
            Commands::Total,
            Commands::Pause,
            Commands::Events,
            Commands::Deactivate { id: 1 },
            Commands::Reactivate { id: 1 },
        ];

        for command in commands {
            let read_only = command.is_read_only();
            let mutated = run(&registry, command, Some(&caller())).unwrap();
            assert_eq!(read_only, !mutated);
        }
    }

    #[test]
    fn mutating_commands_require_caller() {
        let registry = Registry::new(RegistryConfig::default());
        let err = run(&registry, Commands::Deactivate { id: 1 }, None).unwrap_err();
        assert!(err.to_string().contains("--caller"));
    }

    #[test]
    fn pause_is_admin_only() {
        let registry = Registry::new(RegistryConfig::with_admin(caller()));
        assert!(run(&registry, Commands::Pause, Some(&Identity([1u8; 32]))).is_err());
        assert!(!run(&registry, Commands::Pause, Some(&caller())).unwrap());
    }
}
