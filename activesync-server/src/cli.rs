use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "activesync-server",
    about = "ActiveSync Gateway - protocol front end for mobile mail clients",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "ACTIVESYNC_CONFIG", help = "Path to gateway_config.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the ActiveSync server (default if no command specified)")]
    Serve {
        #[arg(long, env = "ACTIVESYNC_HOST", help = "Listen address (overrides config)")]
        host: Option<String>,

        #[arg(short, long, env = "ACTIVESYNC_PORT", help = "Listen port (overrides config)")]
        port: Option<u16>,
    },

    #[command(subcommand, about = "Inspect and manage device state")]
    Devices(DeviceCommands),

    #[command(about = "Force every device to provision again")]
    ResetPolicyKeys,

    #[command(about = "Add a user to the config file, or change their password")]
    SetUser {
        #[arg(help = "Login name")]
        username: String,

        #[arg(help = "Clear-text password (stored hashed)")]
        password: String,
    },

    #[command(about = "Print the SHA-256 hash to put in users[].password_sha256")]
    HashPassword {
        #[arg(help = "Clear-text password")]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum DeviceCommands {
    #[command(about = "List known devices")]
    List {
        #[arg(short, long, help = "Only devices of this user")]
        user: Option<String>,

        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Block a device for every user")]
    Block {
        #[arg(help = "Device id")]
        id: String,
    },

    #[command(about = "Unblock a device")]
    Unblock {
        #[arg(help = "Device id")]
        id: String,
    },

    #[command(about = "Request a remote wipe on the next sync")]
    Wipe {
        #[arg(help = "Device id")]
        id: String,
    },

    #[command(about = "Remove device state")]
    Remove {
        #[arg(help = "Device id")]
        id: String,

        #[arg(short, long, help = "Only remove this user's binding")]
        user: Option<String>,
    },
}
