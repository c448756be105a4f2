//! Binds a visual note list to a live collection subscription.
//!
//! The binder keeps an ordered row model in one-to-one correspondence with
//! the subscribed collection, applying each change event to just the
//! affected rows. Detaching releases the subscription; events received
//! after detach are discarded rather than applied.

use std::sync::{Arc, Mutex};

use console::Style;
use log::{debug, warn};

use crate::{
    CollectionEvent, Note, NoteCollection, NoteColor, RemoteConfig, Result, Subscription, UserId,
    COLOR_PICKER_ENABLED,
};

/// Live list binder for one user's notes.
pub struct NoteListBinder {
    /// Ordered rows mirroring the remote collection
    rows: Vec<Note>,

    /// The live subscription; None once detached
    subscription: Option<Subscription>,

    /// Feature flags, consulted per render for the color tint
    flags: Arc<Mutex<RemoteConfig>>,

    /// Cleared on detach so stale events become no-ops
    attached: bool,
}

impl NoteListBinder {
    /// Subscribes to the user's collection and seeds the rows from the
    /// initial snapshot.
    pub fn bind(
        collection: &NoteCollection,
        user: &UserId,
        flags: Arc<Mutex<RemoteConfig>>,
    ) -> Result<Self> {
        let mut subscription = collection.subscribe(user)?;
        let rows = subscription.take_snapshot();
        debug!("List binder attached with {} rows", rows.len());

        Ok(Self {
            rows,
            subscription: Some(subscription),
            flags,
            attached: true,
        })
    }

    /// The current row model, in collection order.
    pub fn rows(&self) -> &[Note] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The note backing a row; a row tap opens the editor with its id.
    pub fn note_at(&self, index: usize) -> Option<&Note> {
        self.rows.get(index)
    }

    /// Waits for the next collection event and applies it.
    ///
    /// Returns the applied event so the caller can re-render the affected
    /// row(s), or None once the subscription is gone or the event was
    /// discarded.
    pub async fn next_change(&mut self) -> Option<CollectionEvent> {
        let subscription = self.subscription.as_mut()?;
        let event = subscription.next_event().await?;
        if self.apply(&event) {
            Some(event)
        } else {
            None
        }
    }

    /// Applies one change event to the row model.
    ///
    /// Events are applied in delivery order; a stale update for a row simply
    /// overwrites the earlier one (last-applied-wins, no merge logic).
    /// Returns false when the event was discarded (detached binder or a
    /// position that no longer exists).
    pub fn apply(&mut self, event: &CollectionEvent) -> bool {
        if !self.attached {
            debug!("Discarding event for detached list binder");
            return false;
        }

        match event {
            CollectionEvent::Added { index, note } => {
                let index = (*index).min(self.rows.len());
                self.rows.insert(index, note.clone());
                true
            }
            CollectionEvent::Changed { index, note } => match self.rows.get_mut(*index) {
                Some(row) => {
                    *row = note.clone();
                    true
                }
                None => {
                    warn!("Change event for missing row {}", index);
                    false
                }
            },
            CollectionEvent::Removed { index, id } => {
                if *index < self.rows.len() {
                    self.rows.remove(*index);
                    true
                } else {
                    warn!("Remove event for missing row {} ({})", index, id);
                    false
                }
            }
            CollectionEvent::Moved { from, to } => {
                if *from < self.rows.len() && *to < self.rows.len() {
                    let note = self.rows.remove(*from);
                    self.rows.insert(*to, note);
                    true
                } else {
                    warn!("Move event outside the row range: {} -> {}", from, to);
                    false
                }
            }
        }
    }

    /// Renders one row: text verbatim, tinted only when the flag is on.
    pub fn render_row(&self, index: usize) -> Option<String> {
        let note = self.rows.get(index)?;
        Some(render_note_row(note, self.color_enabled()))
    }

    /// Renders every row in order.
    pub fn render_all(&self) -> Vec<String> {
        let color_enabled = self.color_enabled();
        self.rows
            .iter()
            .map(|note| render_note_row(note, color_enabled))
            .collect()
    }

    /// Releases the subscription. Further events are discarded.
    pub fn detach(&mut self) {
        self.attached = false;
        if self.subscription.take().is_some() {
            debug!("List binder detached, subscription released");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn color_enabled(&self) -> bool {
        self.flags
            .lock()
            .map(|flags| flags.get_boolean(COLOR_PICKER_ENABLED))
            .unwrap_or(false)
    }
}

impl Drop for NoteListBinder {
    fn drop(&mut self) {
        self.detach();
    }
}

/// The tint for a note's row, falling back to the default for records whose
/// color name does not resolve.
pub fn tint_for(note: &Note) -> NoteColor {
    match NoteColor::resolve(note.color.as_deref()) {
        Ok(color) => color,
        Err(e) => {
            warn!("Falling back to default tint: {}", e);
            NoteColor::Default
        }
    }
}

/// Renders a single note row for the terminal.
fn render_note_row(note: &Note, color_enabled: bool) -> String {
    let width = terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80);
    let text = &note.text;

    if color_enabled {
        let style: Style = tint_for(note).row_style();
        let padded = format!(" {:<width$}", text, width = width.saturating_sub(2).max(text.len()));
        style.apply_to(padded).to_string()
    } else {
        text.clone()
    }
}
