//! Fire-and-forget analytics: events and user properties are pushed onto a
//! bounded channel and appended as JSON lines by a background task. Nothing
//! is ever read back; a full channel drops the record with a warning.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{io::AsyncWriteExt, sync::mpsc, task::JoinHandle};

use crate::Config;

/// Capacity of the record channel; records beyond it are dropped.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Event {
        name: String,
        params: Value,
        at: DateTime<Utc>,
    },
    UserProperty {
        name: String,
        value: String,
        at: DateTime<Utc>,
    },
}

/// The analytics service handle.
pub struct Analytics {
    tx: mpsc::Sender<Record>,
    writer_task: JoinHandle<()>,
}

impl Analytics {
    /// Creates the service and spawns its writer task.
    pub fn new(config: &Config) -> Self {
        let path = config.analytics_path();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(write_records(path, rx));

        Self { tx, writer_task }
    }

    /// Logs an event with free-form parameters. Fire-and-forget.
    pub fn log_event(&self, name: &str, params: Value) {
        self.send(Record::Event {
            name: name.to_string(),
            params,
            at: Utc::now(),
        });
    }

    /// Sets a user property. Fire-and-forget.
    pub fn set_user_property(&self, name: &str, value: &str) {
        self.send(Record::UserProperty {
            name: name.to_string(),
            value: value.to_string(),
            at: Utc::now(),
        });
    }

    /// Sets the user properties reported once at startup.
    pub fn set_startup_user_properties(&self) {
        self.set_user_property("BUILD_DEBUG", &cfg!(debug_assertions).to_string());
        self.set_user_property("OS", std::env::consts::OS);

        // Set version name, if we can get it
        match option_env!("CARGO_PKG_VERSION") {
            Some(version) => self.set_user_property("BUILD_VERSION_NAME", version),
            None => warn!("Could not get package version, omitting from analytics"),
        }

        if let Ok(locale) = std::env::var("LANG").or_else(|_| std::env::var("LC_ALL")) {
            self.set_user_property("LOCALE", &locale);
        }
    }

    /// Closes the channel and waits for pending records to hit disk.
    pub async fn shutdown(self) {
        // Dropping the sender lets the writer drain and exit
        let Self { tx, writer_task } = self;
        drop(tx);

        if let Err(e) = writer_task.await {
            warn!("Analytics writer task ended abnormally: {}", e);
        }
    }

    fn send(&self, record: Record) {
        if let Err(e) = self.tx.try_send(record) {
            warn!("Dropping analytics record: {}", e);
        }
    }
}

/// Writer task: drains the channel, appending one JSON line per record.
async fn write_records(path: PathBuf, mut rx: mpsc::Receiver<Record>) {
    debug!("Analytics writer started for {}", path.display());

    while let Some(record) = rx.recv().await {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize analytics record: {}", e);
                continue;
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("Failed to create analytics directory: {}", e);
                    continue;
                }
            }
        }

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            // Analytics must never take the app down
            error!("Failed to append analytics record: {}", e);
        }
    }

    debug!("Analytics writer stopped");
}
