//! Subcommand definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use chatsync_core::ParticipantRole;

/// Connection options shared by the commands that talk to a backend.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Base URL of the chat API
    #[arg(long, env = "CHATSYNC_API_URL", default_value = "http://localhost:8000/api")]
    pub base_url: String,

    /// Bearer token
    #[arg(long, env = "CHATSYNC_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, env = "CHATSYNC_USER_ID")]
    pub user: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,
}

/// Role filter accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Buyer,
    Seller,
    Admin,
}

impl From<RoleArg> for ParticipantRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Buyer => Self::Buyer,
            RoleArg::Seller => Self::Seller,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted session against in-memory ports and print the result
    Replay {
        /// Path to the session script (JSON)
        script: PathBuf,

        /// Print compact JSON instead of pretty JSON
        #[arg(long)]
        compact: bool,
    },

    /// Load a conversation's history from the backend
    History {
        /// Participant whose conversation to load
        participant: String,

        /// Number of pages to load, newest first
        #[arg(long, default_value_t = 1)]
        pages: u32,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List conversations
    Conversations {
        #[arg(long, value_enum)]
        role: Option<RoleArg>,

        /// Match participant names containing this text
        #[arg(long)]
        search: Option<String>,

        /// Only conversations with unread messages
        #[arg(long)]
        unread_only: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Send a message over the REST fallback
    Send {
        participant: String,
        body: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}
