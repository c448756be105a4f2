//! CLI module for the cloudkeep application
//!
//! This module handles the command-line interface: it wires the backend
//! service handles into the list and editor screens and drives them from
//! subcommands.
use std::{
    fs::read_to_string,
    io::Write,
    path::Path,
    process::Command,
    sync::{Arc, Mutex},
};

use chrono::{TimeZone, Utc};
use log::{info, warn};
use serde_json::json;
use shell_words::split;
use tempfile::Builder;

use crate::{
    Analytics, Auth, CkError, CollectionEvent, Commands, Config, Note, NoteCollection,
    NoteEditor, NoteListBinder, RemoteConfig, Result, UserId,
};

/// CLI application handler - binds the service handles to the two screens
pub struct App {
    /// The note document collection
    collection: NoteCollection,

    /// Auth service
    auth: Auth,

    /// Feature flags, shared with the binder and editor
    flags: Arc<Mutex<RemoteConfig>>,

    /// Analytics sink
    analytics: Analytics,

    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Builds the application: constructs the service handles, initializes
    /// the collection, and kicks off the startup config fetch.
    pub async fn new(config: Config, verbose: bool) -> Result<Self> {
        config.ensure_data_dir()?;

        let auth = Auth::new(&config);
        let mut collection = NoteCollection::new(&config);
        collection.initialize().await?;

        let mut flags = RemoteConfig::new(&config);
        // Startup fetch: throttling and failures leave the previously
        // activated values in effect
        match flags.fetch(config.config_cache_ttl()) {
            Ok(()) => {
                flags.activate();
            }
            Err(CkError::FetchThrottled { throttle_end }) => {
                warn!("Startup config fetch throttled until {}", throttle_end);
            }
            Err(e) => warn!("Startup config fetch failed: {}", e),
        }

        let analytics = Analytics::new(&config);
        analytics.set_startup_user_properties();

        Ok(Self {
            collection,
            auth,
            flags: Arc::new(Mutex::new(flags)),
            analytics,
            config,
            verbose,
        })
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::List { watch, json } => self.handle_list(watch, json).await?,

            Commands::New { text, color } => self.handle_new(text, color)?,

            Commands::Edit { id, text, color } => self.handle_edit(id, text, color)?,

            Commands::Signin { user } => self.handle_signin(&user)?,

            Commands::Signout => self.handle_signout()?,

            Commands::RefreshConfig => self.refresh_config()?,
        }

        Ok(())
    }

    /// Flushes the analytics sink. Call once after the command finishes.
    pub async fn shutdown(self) {
        self.analytics.shutdown().await;
    }

    fn require_user(&self) -> Result<UserId> {
        self.auth.ensure_signed_in()
    }

    async fn handle_list(&self, watch: bool, json: bool) -> Result<()> {
        let user = self.require_user()?;
        let mut binder = NoteListBinder::bind(&self.collection, &user, Arc::clone(&self.flags))?;

        if json {
            self.display_rows_json(binder.rows())?;
        } else {
            self.display_rows(&binder);
        }

        if watch {
            println!("\nWatching for changes, Ctrl-C to stop...");
            loop {
                tokio::select! {
                    change = binder.next_change() => {
                        if let Some(event) = change {
                            self.display_change(&binder, &event);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            binder.detach();
            info!("Stopped watching note list");
        }

        Ok(())
    }

    fn handle_new(&self, text: Option<String>, color: Option<String>) -> Result<()> {
        let user = self.require_user()?;
        self.analytics.log_event("click_create_button", json!({}));

        let mut editor = NoteEditor::create(&self.collection, user, Arc::clone(&self.flags));
        self.apply_color_choice(&mut editor, color)?;

        let text = match text {
            Some(t) => t,
            None => self.open_editor_for_text("")?,
        };
        editor.set_text(text.trim_end().to_string());

        let note = editor.save()?;
        println!("Note created with ID: {}", note.id());
        Ok(())
    }

    fn handle_edit(&self, id: String, text: Option<String>, color: Option<String>) -> Result<()> {
        let user = self.require_user()?;

        let mut editor =
            NoteEditor::edit(&self.collection, user, &id, Arc::clone(&self.flags))?;
        self.apply_color_choice(&mut editor, color)?;

        let text = match text {
            Some(t) => t,
            None => self.open_editor_for_text(editor.text())?,
        };
        editor.set_text(text.trim_end().to_string());

        let note = editor.save()?;
        println!("Note {} updated", note.id());
        Ok(())
    }

    /// Feeds a `--color` choice into the editor, honoring the feature flag.
    fn apply_color_choice(&self, editor: &mut NoteEditor<'_>, color: Option<String>) -> Result<()> {
        let Some(name) = color else { return Ok(()) };

        if !editor.color_picker_enabled() {
            return Err(CkError::ApplicationError {
                message: "Color selection requires the color_picker_enabled flag".to_string(),
            });
        }

        let tint = editor.set_color(&name)?;
        if self.verbose {
            println!("Color preview: {}", tint.hex());
        }
        Ok(())
    }

    fn handle_signin(&self, user: &str) -> Result<()> {
        let user = self.auth.sign_in(user)?;
        println!("Signed in as {}", user);
        Ok(())
    }

    fn handle_signout(&self) -> Result<()> {
        self.analytics.log_event("sign_out", json!({}));
        self.auth.sign_out()?;
        println!("Signed out.");
        Ok(())
    }

    /// Forces a flag fetch+activate. Throttling is a transient, user-visible
    /// notice; other failures are logged and the stale values stay active.
    fn refresh_config(&self) -> Result<()> {
        let ttl = self.config.config_cache_ttl();
        let mut flags = self
            .flags
            .lock()
            .map_err(|_| CkError::LockAcquisitionFailed {
                message: "Failed to acquire lock on remote config".to_string(),
            })?;

        match flags.fetch(ttl) {
            Ok(()) => {
                if flags.activate() {
                    println!("Config refreshed.");
                } else {
                    println!("Config already up to date.");
                }
            }
            Err(CkError::FetchThrottled { throttle_end }) => {
                println!(
                    "Config fetch throttled, try again in {}s.",
                    (throttle_end - Utc::now()).num_seconds().max(0)
                );
            }
            Err(e) => warn!("Config fetch failed: {}", e),
        }

        Ok(())
    }

    /// Display the bound rows in text format
    fn display_rows(&self, binder: &NoteListBinder) {
        if binder.is_empty() {
            println!("No notes yet.");
            return;
        }

        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in binder.rows().iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let created = Utc
                .timestamp_millis_opt(note.date_created)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("ID: {} | Created: {}", note.id(), created);
            if let Some(row) = binder.render_row(i) {
                println!("{}", row);
            }
        }

        println!(
            "\nFound {} note{}",
            binder.len(),
            if binder.len() == 1 { "" } else { "s" }
        );
    }

    /// Display the bound rows in JSON format
    fn display_rows_json(&self, rows: &[Note]) -> Result<()> {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|note| {
                json!({
                    "id": note.id(),
                    "text": note.text,
                    "date_created": note.date_created,
                    "color": note.color,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&values)?);
        Ok(())
    }

    /// Prints one line per applied change in watch mode.
    fn display_change(&self, binder: &NoteListBinder, event: &CollectionEvent) {
        match event {
            CollectionEvent::Added { index, .. } => {
                println!("+ {}", binder.render_row(*index).unwrap_or_default());
            }
            CollectionEvent::Changed { index, .. } => {
                println!("~ {}", binder.render_row(*index).unwrap_or_default());
            }
            CollectionEvent::Removed { id, .. } => {
                println!("- note {} removed", id);
            }
            CollectionEvent::Moved { from, to } => {
                println!("> row {} moved to {}", from, to);
            }
        }
    }

    /// Opens the configured editor over a temp file seeded with the given
    /// text and returns what the user saved.
    fn open_editor_for_text(&self, initial: &str) -> Result<String> {
        let mut temp_file = Builder::new().suffix(".txt").tempfile()?;
        if !initial.is_empty() {
            temp_file.write_all(initial.as_bytes())?;
            temp_file.flush()?;
        }
        let temp_path = temp_file.path().to_path_buf();

        let editor_cmd = self.config.get_editor_command();
        info!("Opening editor to write note text. Save and exit when done...");
        self.launch_editor(&editor_cmd, &temp_path)?;

        Ok(read_to_string(&temp_path)?)
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        let path_str = file_path.to_string_lossy();

        // Handle shell-like command parsing
        let args = split(editor_cmd).map_err(|e| CkError::EditorError {
            message: format!("Failed to parse editor command: {}", e),
        })?;

        if args.is_empty() {
            return Err(CkError::EditorError {
                message: "Empty editor command".to_string(),
            });
        }

        // First word is the program name, rest are arguments
        let program = &args[0];
        let mut command = Command::new(program);
        if args.len() > 1 {
            command.args(&args[1..]);
        }
        command.arg(path_str.as_ref());

        let status = command.status()?;
        if !status.success() {
            return Err(CkError::EditorError {
                message: "Editor exited with non-zero status".to_string(),
            });
        }

        Ok(())
    }
}
