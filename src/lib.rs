//! Cloud-backed note keeping client library
//!
//! This library provides a note-taking client: sign in, a live-updating
//! list of personal notes, create/edit with an optional color tag, and the
//! backend service handles (auth, document collection, feature flags,
//! analytics) the screens are bound to.

mod analytics;
mod auth;
mod binder;
mod cli;
mod collection;
mod color;
mod config;
mod editor;
mod errors;
mod helper;
mod note;
mod remote_config;
mod types;

// Re-export key components
pub use analytics::*;
pub use auth::*;
pub use binder::*;
pub use cli::*;
pub use collection::*;
pub use color::*;
pub use config::*;
pub use editor::*;
pub use errors::*;
pub use helper::*;
pub use note::*;
pub use remote_config::*;
pub use types::*;
