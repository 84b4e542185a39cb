//! Clap derive structures for the `trackline` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// trackline -- follow One2Track GPS watches from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "trackline",
    version,
    about = "Track One2Track GPS watches from the command line",
    long_about = "Polls the One2Track web portal for the watches on your account,\n\
        shows their last known position and battery, and sends commands\n\
        such as an immediate GPS fix or a text message.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "TRACKLINE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Portal login (overrides profile)
    #[arg(long, short = 'u', env = "TRACKLINE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Expected account id (overrides profile)
    #[arg(long, short = 'a', env = "TRACKLINE_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Portal origin (overrides profile)
    #[arg(long, env = "TRACKLINE_BASE_URL", global = true, hide = true)]
    pub base_url: Option<String>,

    /// Extra CA certificate (PEM) to trust (overrides profile)
    #[arg(long, env = "TRACKLINE_CA_CERT", global = true, value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TRACKLINE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TRACKLINE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and print the account id
    Install(InstallArgs),

    /// Show watches and their sensors
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Ask a watch for an immediate GPS fix
    Locate {
        /// Device uuid or name
        device: String,
    },

    /// Switch a watch off
    PowerOff {
        /// Device uuid or name
        device: String,
    },

    /// Show a text message on a watch
    #[command(alias = "msg")]
    Message {
        /// Device uuid or name
        device: String,

        /// Message text
        text: String,
    },

    /// Invoke a raw portal function code
    Command(FunctionArgs),

    /// Poll continuously and print position changes
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Install ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Store the discovered account id in the active profile
    #[arg(long)]
    pub save: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List watches on the account
    #[command(alias = "ls")]
    List,

    /// Show one watch in detail
    Get {
        /// Device uuid or name
        device: String,
    },

    /// List sensor readings (battery, signal, satellites, ...)
    Sensors {
        /// Limit to one device (uuid or name)
        device: Option<String>,
    },
}

// ── Raw function ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FunctionArgs {
    /// Device uuid or name
    pub device: String,

    /// Portal function code (e.g. 0039)
    pub code: String,

    /// Optional value sent with the function
    pub value: Option<String>,

    /// Form field for the value (default: function[cmd_value][])
    #[arg(long, requires = "value")]
    pub param: Option<String>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between polls (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<u32>,

    /// Print every device on every poll, not only the ones that moved
    #[arg(long)]
    pub all: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (e.g. username, account_id, update_interval)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
