//! Clap derive structures for the `pppwatch` CLI.
//!
//! Defines the command tree, global flags, and shared argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pppwatch_core::RouterId;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pppwatch -- PPPoE subscriber monitor for MikroTik routers
#[derive(Debug, Parser)]
#[command(
    name = "pppwatch",
    version,
    about = "Monitor PPPoE subscribers and their usage on MikroTik routers",
    long_about = "Polls registered MikroTik routers over the RouterOS REST API,\n\
        keeps per-subscriber usage that survives counter resets, and\n\
        isolates or restores subscribers by swapping their PPP profile.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PPPWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, or `memory` for a throwaway in-memory store
    #[arg(long, short = 'd', global = true)]
    pub database: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PPPWATCH_OUTPUT",
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
    /// Run the sync scheduler until interrupted
    Run,

    /// Manage registered routers
    #[command(alias = "r")]
    Routers(RoutersArgs),

    /// Inspect and control PPP subscribers
    #[command(alias = "subs", alias = "s")]
    Subscribers(SubscribersArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Router IDs are UUIDs; anything else is a usage error.
fn parse_router_id(s: &str) -> Result<RouterId, String> {
    s.parse()
        .map_err(|_| format!("'{s}' is not a router ID (expected a UUID, see `routers list`)"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ROUTERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RoutersArgs {
    #[command(subcommand)]
    pub command: RoutersCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoutersCommand {
    /// List registered routers
    #[command(alias = "ls")]
    List,

    /// Show one router
    Show {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
    },

    /// Register a router
    Add(AddRouterArgs),

    /// Change a router's settings
    Update(UpdateRouterArgs),

    /// Unregister a router and drop its subscribers
    #[command(alias = "rm")]
    Remove {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
    },

    /// Check that the router answers with the stored credentials
    Test {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
    },

    /// Refresh the router's identity and reconcile it now
    Sync {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
    },

    /// List the router's PPP profiles
    Profiles {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
    },
}

#[derive(Debug, Args)]
pub struct AddRouterArgs {
    /// Display name (replaced by the router identity on sync)
    #[arg(long)]
    pub name: String,

    /// Hostname or IP address
    #[arg(long)]
    pub host: String,

    /// REST port (defaults to 443)
    #[arg(long)]
    pub port: Option<u16>,

    /// API username
    #[arg(long, short = 'u')]
    pub username: String,

    /// API password (prompted when omitted)
    #[arg(long, env = "PPPWATCH_ROUTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Talk plain HTTP instead of HTTPS
    #[arg(long)]
    pub no_tls: bool,

    /// Register without scheduling syncs
    #[arg(long)]
    pub inactive: bool,

    /// PPP profile applied when isolating a subscriber
    #[arg(long)]
    pub quarantine_profile: Option<String>,

    /// Telegram bot token for sync reports
    #[arg(long, env = "PPPWATCH_TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Telegram chat ID for sync reports (group IDs are negative)
    #[arg(long, allow_hyphen_values = true)]
    pub telegram_chat: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateRouterArgs {
    #[arg(value_parser = parse_router_id)]
    pub router: RouterId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Prompt for a new API password
    #[arg(long)]
    pub password: bool,

    /// Use HTTPS (true) or plain HTTP (false)
    #[arg(long)]
    pub tls: Option<bool>,

    /// Include (true) or skip (false) the router in scheduled syncs
    #[arg(long)]
    pub active: Option<bool>,

    #[arg(long, conflicts_with = "clear_quarantine_profile")]
    pub quarantine_profile: Option<String>,

    /// Remove the quarantine profile; isolation is refused afterwards
    #[arg(long)]
    pub clear_quarantine_profile: bool,

    /// Telegram bot token (requires --telegram-chat)
    #[arg(long, requires = "telegram_chat")]
    pub telegram_token: Option<String>,

    #[arg(
        long,
        allow_hyphen_values = true,
        requires = "telegram_token",
        conflicts_with = "clear_telegram"
    )]
    pub telegram_chat: Option<String>,

    /// Stop sending sync reports for this router
    #[arg(long)]
    pub clear_telegram: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SUBSCRIBERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SubscribersArgs {
    #[command(subcommand)]
    pub command: SubscribersCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubscribersCommand {
    /// List a router's subscribers with live counters
    #[command(alias = "ls")]
    List {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,

        /// Only subscribers with an active session
        #[arg(long, conflicts_with = "offline")]
        online: bool,

        /// Only subscribers without an active session
        #[arg(long)]
        offline: bool,

        /// Only isolated subscribers
        #[arg(long)]
        isolated: bool,
    },

    /// Set a subscriber's comment (empty clears it)
    Comment {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
        name: String,
        comment: String,
    },

    /// Store or clear a subscriber's coordinates
    Locate {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
        name: String,

        #[arg(long, allow_hyphen_values = true, requires = "longitude", conflicts_with = "clear")]
        latitude: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "latitude")]
        longitude: Option<f64>,

        /// Forget the stored coordinates
        #[arg(long)]
        clear: bool,
    },

    /// Isolate a subscriber, or restore one that is isolated
    Isolate {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
        name: String,

        /// Profile to restore to instead of the remembered one
        #[arg(long)]
        restore_to: Option<String>,
    },

    /// Create a PPP secret on the router
    Create {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
        name: String,

        #[arg(long)]
        profile: String,

        /// PPP service (defaults to pppoe)
        #[arg(long)]
        service: Option<String>,

        #[arg(long)]
        comment: Option<String>,

        /// Secret password (prompted when omitted)
        #[arg(long, env = "PPPWATCH_SECRET_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Usage totals for one subscriber, or the whole router
    Usage {
        #[arg(value_parser = parse_router_id)]
        router: RouterId,
        name: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG & COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration
    Show,

    /// Write a config file with the default settings
    Init,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }
}
