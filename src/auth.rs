//! Local session handling standing in for the hosted auth service.
//!
//! The client only ever asks three things of auth: who is signed in, sign a
//! user in, sign the user out. The session is persisted as a small JSON
//! document so the signed-in user survives restarts.

use std::{fs, path::PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{CkError, Config, Result, UserId};

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    user_id: String,
    signed_in_at: DateTime<Utc>,
}

/// The auth service handle.
pub struct Auth {
    session_path: PathBuf,

    /// User signed in on demand when no session exists
    auto_sign_in: Option<String>,
}

impl Auth {
    pub fn new(config: &Config) -> Self {
        Self {
            session_path: config.session_path(),
            auto_sign_in: config.auto_sign_in.clone(),
        }
    }

    /// Returns the currently signed-in user, if any.
    ///
    /// An unreadable or corrupt session document is treated as signed out.
    pub fn current_user(&self) -> Option<UserId> {
        if !self.session_path.exists() {
            return None;
        }

        match fs::read_to_string(&self.session_path) {
            Ok(content) => match serde_json::from_str::<Session>(&content) {
                Ok(session) => Some(UserId(session.user_id)),
                Err(e) => {
                    warn!("Ignoring corrupt session document: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Could not read session document: {}", e);
                None
            }
        }
    }

    /// Returns the signed-in user, signing in the configured `auto_sign_in`
    /// user first when no session exists.
    pub fn ensure_signed_in(&self) -> Result<UserId> {
        if let Some(user) = self.current_user() {
            return Ok(user);
        }

        match &self.auto_sign_in {
            Some(user) => {
                info!("No session found, auto-signing in as {}", user);
                self.sign_in(user)
            }
            None => Err(CkError::NotSignedIn),
        }
    }

    /// Signs in as the given user, replacing any existing session.
    pub fn sign_in(&self, user: &str) -> Result<UserId> {
        if user.trim().is_empty() {
            return Err(CkError::ApplicationError {
                message: "User id must not be empty".to_string(),
            });
        }

        let session = Session {
            user_id: user.trim().to_string(),
            signed_in_at: Utc::now(),
        };

        // Atomic replace so a crash never leaves a half-written session
        let dir = self
            .session_path
            .parent()
            .ok_or_else(|| CkError::DirectoryError {
                path: self.session_path.clone(),
            })?;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|_| CkError::DirectoryError {
                path: dir.to_path_buf(),
            })?;
        }

        let temp_file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(temp_file.as_file(), &session)?;
        temp_file.persist(&self.session_path).map_err(|e| {
            error!("Failed to persist session document: {}", e.error);
            CkError::Io(e.error)
        })?;

        info!("Signed in as {}", session.user_id);
        Ok(UserId(session.user_id))
    }

    /// Signs the current user out. Signing out twice is not an error.
    pub fn sign_out(&self) -> Result<()> {
        if self.session_path.exists() {
            fs::remove_file(&self.session_path)?;
            info!("Signed out");
        } else {
            debug!("Sign out requested with no active session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_in(dir: &std::path::Path) -> Auth {
        let config = Config {
            data_dir: dir.to_path_buf(),
            developer_mode: true,
            flags_source: None,
            editor_command: None,
            auto_sign_in: None,
        };
        Auth::new(&config)
    }

    #[test]
    fn sign_in_then_current_user_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = auth_in(tmp.path());

        assert!(auth.current_user().is_none());
        auth.sign_in("alice").unwrap();
        assert_eq!(auth.current_user().unwrap().as_str(), "alice");
    }

    #[test]
    fn sign_out_clears_the_session_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = auth_in(tmp.path());

        auth.sign_in("bob").unwrap();
        auth.sign_out().unwrap();
        assert!(auth.current_user().is_none());
        auth.sign_out().unwrap();
    }

    #[test]
    fn blank_user_id_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = auth_in(tmp.path());
        assert!(auth.sign_in("   ").is_err());
    }

    #[test]
    fn ensure_signed_in_uses_the_configured_default_user() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            developer_mode: true,
            flags_source: None,
            editor_command: None,
            auto_sign_in: Some("guest".to_string()),
        };
        let auth = Auth::new(&config);

        assert!(auth.current_user().is_none());
        assert_eq!(auth.ensure_signed_in().unwrap().as_str(), "guest");
        // The auto sign-in persists a real session
        assert_eq!(auth.current_user().unwrap().as_str(), "guest");

        // An existing session always wins over the configured default
        auth.sign_in("alice").unwrap();
        assert_eq!(auth.ensure_signed_in().unwrap().as_str(), "alice");
    }

    #[test]
    fn ensure_signed_in_without_a_default_requires_a_session() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = auth_in(tmp.path());
        assert!(matches!(auth.ensure_signed_in(), Err(CkError::NotSignedIn)));
    }

    #[test]
    fn corrupt_session_reads_as_signed_out() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = auth_in(tmp.path());
        fs::write(tmp.path().join("session.json"), "not json").unwrap();
        assert!(auth.current_user().is_none());
    }
}
