use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, error, trace};
use notify::EventKind;

use crate::{CkError, Note, Result};

/// What a file system event means for the note collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// A note document was created or rewritten
    Upsert { user_id: String, note_id: String, path: PathBuf },
    /// A note document disappeared
    Remove { user_id: String, note_id: String },
}

/// Translates a watcher event into collection change intents.
///
/// The collection lays documents out as `<root>/<user_id>/<note_id>.json`;
/// anything outside that shape is ignored.
pub fn changes_from_fs_event(root: &Path, event: &notify::Event) -> Vec<FsChange> {
    let mut changes = Vec::new();

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                if let Some((user_id, note_id)) = note_key_from_path(root, path) {
                    changes.push(FsChange::Upsert {
                        user_id,
                        note_id,
                        path: path.clone(),
                    });
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if let Some((user_id, note_id)) = note_key_from_path(root, path) {
                    changes.push(FsChange::Remove { user_id, note_id });
                }
            }
        }
        _ => {
            // Ignore other events
        }
    }

    changes
}

/// Extracts the `(user_id, note_id)` key from a note document path.
///
/// Returns None for paths that are not `<root>/<user_id>/<note_id>.json`.
pub fn note_key_from_path(root: &Path, path: &Path) -> Option<(String, String)> {
    if !path.extension().is_some_and(|ext| ext == "json") {
        return None;
    }

    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let user_id = components.next()?.as_os_str().to_string_lossy().to_string();
    let file = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None; // Nested deeper than the collection layout
    }

    let note_id = Path::new(file).file_stem()?.to_string_lossy().to_string();
    Some((user_id, note_id))
}

/// Helper method to load a single note document from file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    debug!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        CkError::Io(e)
    })?;

    let note: Note = serde_json::from_str(&content)?;

    // Validate note
    if !Note::text_is_valid(&note.text) {
        let error_msg = format!("Note from {} has empty text", path.display());
        error!("{}", error_msg);
        return Err(CkError::InvalidNote { message: error_msg });
    }

    trace!("Successfully loaded note: {}", note.id());
    Ok(note)
}
