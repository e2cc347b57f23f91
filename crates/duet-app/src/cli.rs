use std::path::PathBuf;

use clap::{Parser, Subcommand};
use duet_call::Role;

/// Duet: one-to-one voice calls between matched participants.
#[derive(Parser, Debug)]
#[command(name = "duet", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error) or a full
    /// filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an initiator and a responder against each other in-process.
    Loopback {
        /// Call length in seconds, overriding `call.max_duration_secs`.
        #[arg(long)]
        duration_secs: Option<u32>,

        /// Hang up from the initiator side after this many seconds.
        #[arg(long)]
        hangup_after: Option<u64>,

        /// Deny microphone access on the initiator side.
        #[arg(long)]
        deny_microphone: bool,
    },

    /// Join a match through the signaling relay.
    Join {
        /// Match identifier handed out by the matcher.
        #[arg(long)]
        match_id: String,

        /// `initiator` or `responder`.
        #[arg(long)]
        role: Role,

        /// Relay URL, overriding `signaling.url`.
        #[arg(long)]
        url: Option<String>,

        /// Hang up after this many seconds.
        #[arg(long)]
        hangup_after: Option<u64>,
    },

    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
