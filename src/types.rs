//! Core data structures for the cloudkeep application.
//!
//! This module contains the shared types used throughout the application,
//! including the collection change events and the CLI command surface.

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::{CkError, Note};

/// A specialized Result type for cloudkeep operations.
pub type Result<T> = std::result::Result<T, CkError>;

/// Identifier of the signed-in user that scopes the note collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positional change reported by the note collection to its subscribers.
///
/// Positions refer to the ordered view of one user's collection at the time
/// the event was produced. Consumers apply events in delivery order; a stale
/// update for the same note id simply overwrites the earlier one
/// (last-applied-wins, no merge logic).
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// A note appeared at `index`.
    Added { index: usize, note: Note },
    /// The note at `index` was replaced with a new revision.
    Changed { index: usize, note: Note },
    /// The note at `index` was removed.
    Removed { index: usize, id: String },
    /// The note at `from` moved to `to` without changing content.
    Moved { from: usize, to: usize },
}

/// Available subcommands for the cloudkeep application
#[derive(Subcommand)]
pub enum Commands {
    /// List the signed-in user's notes
    List {
        /// Keep the subscription open and print each change as it arrives
        #[clap(short, long)]
        watch: bool,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Create a new note
    New {
        /// Text of the note; opens the editor when omitted
        #[clap(short, long)]
        text: Option<String>,

        /// Color tag for the note (requires the color picker flag)
        #[clap(short, long)]
        color: Option<String>,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New text for the note; opens the editor when omitted
        #[clap(short, long)]
        text: Option<String>,

        /// New color tag for the note (requires the color picker flag)
        #[clap(short, long)]
        color: Option<String>,
    },

    /// Sign in as the given user
    Signin {
        /// User identifier to sign in as
        user: String,
    },

    /// Sign out the current user
    Signout,

    /// Fetch and activate the latest remote feature flags
    RefreshConfig,
}
