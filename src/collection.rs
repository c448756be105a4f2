//! The note document collection: per-user JSON documents on disk with live
//! change notifications pushed to subscribers.
//!
//! Documents are laid out as `<notes_dir>/<user_id>/<note_id>.json` and every
//! write is a full replace of one document. Change events originate from a
//! file system watcher on the collection root, are bridged onto the async
//! runtime, translated into positional [`CollectionEvent`]s against a shared
//! ordered index, and fanned out to the subscribers of the affected user.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc as std_mpsc, Arc, Mutex,
    },
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::{
    changes_from_fs_event, load_note_from_file, CkError, CollectionEvent, Config, FsChange, Note,
    Result, UserId,
};

/// Capacity of each subscriber's event channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 100;

type NoteCache = Arc<Mutex<HashMap<(String, String), Note>>>;
type OrderIndex = Arc<Mutex<HashMap<String, Vec<String>>>>;
type SubscriberMap = Arc<Mutex<HashMap<u64, Subscriber>>>;

struct Subscriber {
    user_id: String,
    tx: mpsc::Sender<CollectionEvent>,
}

/// Manages the note document collection and its live subscriptions.
pub struct NoteCollection {
    /// Root directory of the collection documents
    notes_root: PathBuf,

    /// In-memory cache of documents, keyed by (user id, note id)
    cache: NoteCache,

    /// Ordered note ids per user, the subscriber-visible ordering
    order: OrderIndex,

    /// Live subscriptions, keyed by handle id
    subscribers: SubscriberMap,

    /// Handle id generator for subscriptions
    next_handle: AtomicU64,

    /// File system watcher feeding the change pump
    watcher: Option<RecommendedWatcher>,

    /// Flag indicating if the collection is ready
    initialized: bool,
}

impl NoteCollection {
    /// Creates a new collection rooted at the configured notes directory.
    pub fn new(config: &Config) -> Self {
        Self {
            notes_root: config.notes_dir(),
            cache: Arc::new(Mutex::new(HashMap::new())),
            order: Arc::new(Mutex::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_handle: AtomicU64::new(1),
            watcher: None,
            initialized: false,
        }
    }

    /// Initializes the collection: ensures the root directory exists, loads
    /// the existing documents, and starts the change pump.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!(
            "Initializing note collection at {}",
            self.notes_root.display()
        );

        if !self.notes_root.exists() {
            debug!(
                "Notes directory does not exist, creating: {}",
                self.notes_root.display()
            );
            fs::create_dir_all(&self.notes_root).map_err(|e| {
                error!("Failed to create notes directory: {}", e);
                CkError::DirectoryError {
                    path: self.notes_root.clone(),
                }
            })?;
        }

        let loaded = self.load_snapshot()?;
        info!("Loaded {} note documents", loaded);

        self.init_watcher_with_background_task()?;

        self.initialized = true;
        info!("Note collection initialization complete");
        Ok(())
    }

    /// Loads all existing documents into the cache and order index.
    fn load_snapshot(&self) -> Result<usize> {
        let mut buffer: HashMap<(String, String), Note> = HashMap::new();
        let mut load_errors = 0usize;

        for entry in WalkDir::new(&self.notes_root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some((user_id, note_id)) = crate::note_key_from_path(&self.notes_root, path)
            else {
                continue;
            };

            match load_note_from_file(path) {
                Ok(note) => {
                    buffer.insert((user_id, note_id), note);
                }
                Err(e) => {
                    // Malformed documents are skipped, not fatal
                    warn!("Skipping note document {}: {}", path.display(), e);
                    load_errors += 1;
                }
            }
        }

        let count = buffer.len();

        {
            let mut order = self.lock_order()?;
            order.clear();
            for (user_id, note_id) in buffer.keys() {
                let ids = order.entry(user_id.clone()).or_default();
                sorted_insert(ids, note_id);
            }
        }
        {
            let mut cache = self.lock_cache()?;
            cache.clear();
            cache.extend(buffer);
        }

        if load_errors > 0 {
            warn!("Skipped {} unreadable note documents", load_errors);
        }
        Ok(count)
    }

    /// Writes a full-replace revision of the note, keyed by its derived id.
    ///
    /// The write is atomic (temp file + rename) so the watcher and other
    /// readers never observe a half-written document. The cache is updated
    /// immediately so this client reads its own write; subscribers are
    /// notified through the watcher like any other change.
    pub fn set(&self, user: &UserId, note: &Note) -> Result<()> {
        let file_path = self.note_path(user.as_str(), &note.id());
        info!("Writing note {} for {}", note.id(), user);
        debug!("Document path: {}", file_path.display());

        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        if !dir.exists() {
            debug!("Creating user directory: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create directory {}: {}", dir.display(), e);
                CkError::Io(e)
            })?;
        }

        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            CkError::Io(e)
        })?;

        trace!("Serializing note to JSON");
        let json = serde_json::to_string_pretty(note)?;
        temp_file.write_all(json.as_bytes()).map_err(CkError::Io)?;
        temp_file.flush().map_err(CkError::Io)?;

        debug!("Performing atomic move of temporary file to final location");
        temp_file.persist(&file_path).map_err(|e| {
            error!("Failed to persist {}: {}", file_path.display(), e.error);
            CkError::Io(e.error)
        })?;

        {
            let mut cache = self.lock_cache()?;
            cache.insert((user.as_str().to_string(), note.id()), note.clone());
        }

        info!("Note {} written", note.id());
        Ok(())
    }

    /// Retrieves one note by id, from cache or disk.
    pub fn get_once(&self, user: &UserId, note_id: &str) -> Result<Note> {
        debug!("Retrieving note {} for {}", note_id, user);

        {
            let cache = self.lock_cache()?;
            if let Some(note) = cache.get(&(user.as_str().to_string(), note_id.to_string())) {
                trace!("Note found in cache: {}", note_id);
                return Ok(note.clone());
            }
        }

        let file_path = self.note_path(user.as_str(), note_id);
        if file_path.exists() {
            debug!("Note not in cache, loading file: {}", file_path.display());
            let note = load_note_from_file(&file_path)?;
            let mut cache = self.lock_cache()?;
            cache.insert((user.as_str().to_string(), note_id.to_string()), note.clone());
            return Ok(note);
        }

        debug!("Note not found: {}", note_id);
        Err(CkError::NoteNotFound {
            id: note_id.to_string(),
        })
    }

    /// Opens a live subscription to one user's notes.
    ///
    /// The returned [`Subscription`] carries the ordered snapshot taken at
    /// subscribe time plus a stream of subsequent [`CollectionEvent`]s.
    /// Dropping the subscription releases it.
    pub fn subscribe(&self, user: &UserId) -> Result<Subscription> {
        let snapshot = {
            let order = self.lock_order()?;
            let cache = self.lock_cache()?;
            order
                .get(user.as_str())
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| {
                            let note =
                                cache.get(&(user.as_str().to_string(), id.clone())).cloned();
                            if note.is_none() {
                                warn!("Ordered id {} missing from cache", id);
                            }
                            note
                        })
                        .collect::<Vec<Note>>()
                })
                .unwrap_or_default()
        };

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);

        {
            let mut subscribers = self.subscribers.lock().map_err(|_| {
                CkError::LockAcquisitionFailed {
                    message: "Failed to acquire lock on subscriber table".to_string(),
                }
            })?;
            subscribers.insert(
                handle,
                Subscriber {
                    user_id: user.as_str().to_string(),
                    tx,
                },
            );
        }

        info!(
            "Subscription {} opened for {} ({} notes in snapshot)",
            handle,
            user,
            snapshot.len()
        );

        Ok(Subscription {
            id: handle,
            user: user.clone(),
            snapshot,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        })
    }

    /// Starts the watcher and the event pump in background tasks.
    fn init_watcher_with_background_task(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            debug!("File system watcher already initialized");
            return Ok(());
        }

        // Standard channel for the notify crate, tokio channel for the pump
        let (std_tx, std_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher: RecommendedWatcher = Watcher::new(
            std_tx,
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| CkError::ApplicationError {
            message: format!("Failed to create file watcher: {}", e),
        })?;

        watcher
            .watch(self.notes_root.as_ref(), RecursiveMode::Recursive)
            .map_err(|e| CkError::ApplicationError {
                message: format!("Failed to watch notes directory: {}", e),
            })?;

        self.watcher = Some(watcher);

        // Bridge the blocking std channel onto the runtime without tying up
        // an async worker
        tokio::task::spawn_blocking(move || {
            while let Ok(event) = std_rx.recv() {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            debug!("File system event bridge task stopped");
        });

        let notes_root = self.notes_root.clone();
        let cache = Arc::clone(&self.cache);
        let order = Arc::clone(&self.order);
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            debug!("Collection change pump started");
            while let Some(event) = rx.recv().await {
                match event {
                    Ok(event) => {
                        trace!("File system event: {:?}", event.kind);
                        for change in changes_from_fs_event(&notes_root, &event) {
                            Self::apply_change(change, &cache, &order, &subscribers);
                        }
                    }
                    Err(e) => error!("File system watcher error: {}", e),
                }
            }
            debug!("Collection change pump stopped");
        });

        info!(
            "File system watcher initialized for directory: {}",
            self.notes_root.display()
        );
        Ok(())
    }

    /// Applies one file system change to the shared state and notifies the
    /// affected user's subscribers.
    fn apply_change(
        change: FsChange,
        cache: &NoteCache,
        order: &OrderIndex,
        subscribers: &SubscriberMap,
    ) {
        match change {
            FsChange::Upsert {
                user_id,
                note_id,
                path,
            } => {
                let note = match load_note_from_file(&path) {
                    Ok(note) => note,
                    Err(e) => {
                        warn!("Ignoring unreadable document {}: {}", path.display(), e);
                        return;
                    }
                };

                if let Ok(mut cache) = cache.lock() {
                    cache.insert((user_id.clone(), note_id.clone()), note.clone());
                } else {
                    error!("Failed to acquire cache lock for {}", note_id);
                }

                let event = match order.lock() {
                    Ok(mut order) => {
                        let ids = order.entry(user_id.clone()).or_default();
                        match ids.iter().position(|id| *id == note_id) {
                            Some(index) => CollectionEvent::Changed { index, note },
                            None => {
                                let index = sorted_insert(ids, &note_id);
                                CollectionEvent::Added { index, note }
                            }
                        }
                    }
                    Err(_) => {
                        error!("Failed to acquire order lock for {}", note_id);
                        return;
                    }
                };

                Self::dispatch(subscribers, &user_id, event);
            }
            FsChange::Remove { user_id, note_id } => {
                if let Ok(mut cache) = cache.lock() {
                    cache.remove(&(user_id.clone(), note_id.clone()));
                }

                let removed_at = match order.lock() {
                    Ok(mut order) => order.get_mut(&user_id).and_then(|ids| {
                        ids.iter().position(|id| *id == note_id).map(|pos| {
                            ids.remove(pos);
                            pos
                        })
                    }),
                    Err(_) => {
                        error!("Failed to acquire order lock for {}", note_id);
                        return;
                    }
                };

                if let Some(index) = removed_at {
                    debug!("Note {} removed from collection", note_id);
                    Self::dispatch(
                        subscribers,
                        &user_id,
                        CollectionEvent::Removed { index, id: note_id },
                    );
                }
            }
        }
    }

    /// Fans one event out to every subscriber of the given user.
    ///
    /// Delivery is fire-and-forget: a full channel drops the event with a
    /// warning, a closed channel removes the subscriber.
    fn dispatch(subscribers: &SubscriberMap, user_id: &str, event: CollectionEvent) {
        let Ok(mut subscribers) = subscribers.lock() else {
            error!("Failed to acquire subscriber table lock");
            return;
        };

        let mut closed = Vec::new();
        for (handle, subscriber) in subscribers.iter() {
            if subscriber.user_id != user_id {
                continue;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => trace!("Event delivered to subscription {}", handle),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Subscription {} is lagging, dropping event", handle);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*handle);
                }
            }
        }

        for handle in closed {
            debug!("Removing closed subscription {}", handle);
            subscribers.remove(&handle);
        }
    }

    /// Helper method to get the document path for a note
    fn note_path(&self, user_id: &str, note_id: &str) -> PathBuf {
        self.notes_root
            .join(user_id)
            .join(format!("{}.json", note_id))
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), Note>>> {
        self.cache.lock().map_err(|_| CkError::LockAcquisitionFailed {
            message: "Failed to acquire lock on note cache".to_string(),
        })
    }

    fn lock_order(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<String>>>> {
        self.order.lock().map_err(|_| CkError::LockAcquisitionFailed {
            message: "Failed to acquire lock on order index".to_string(),
        })
    }
}

/// A live subscription to one user's ordered note collection.
///
/// Holds the snapshot taken at subscribe time and yields subsequent change
/// events. Dropping the subscription unsubscribes; events already in flight
/// are discarded with the channel.
pub struct Subscription {
    id: u64,
    user: UserId,
    snapshot: Vec<Note>,
    rx: mpsc::Receiver<CollectionEvent>,
    subscribers: SubscriberMap,
}

impl Subscription {
    /// The ordered snapshot taken when the subscription was opened.
    pub fn snapshot(&self) -> &[Note] {
        &self.snapshot
    }

    /// Consumes the initial snapshot, leaving it empty.
    pub fn take_snapshot(&mut self) -> Vec<Note> {
        std::mem::take(&mut self.snapshot)
    }

    /// The user this subscription is scoped to.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Waits for the next change event. Returns None once unsubscribed.
    pub async fn next_event(&mut self) -> Option<CollectionEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&self.id);
            debug!("Subscription {} released", self.id);
        }
    }
}

/// Inserts a note id into an ordered id list, keeping creation-time order.
/// Returns the insertion index.
fn sorted_insert(ids: &mut Vec<String>, note_id: &str) -> usize {
    let key = |id: &str| id.parse::<i64>().unwrap_or(0);
    let new_key = key(note_id);
    let index = ids
        .iter()
        .position(|existing| key(existing) > new_key)
        .unwrap_or(ids.len());
    ids.insert(index, note_id.to_string());
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection_in(dir: &Path) -> NoteCollection {
        let config = Config {
            data_dir: dir.to_path_buf(),
            developer_mode: true,
            flags_source: None,
            editor_command: None,
            auto_sign_in: None,
        };
        NoteCollection::new(&config)
    }

    fn note(text: &str, date_created: i64, color: Option<&str>) -> Note {
        Note {
            text: text.to_string(),
            date_created,
            color: color.map(str::to_string),
        }
    }

    #[test]
    fn set_then_get_once_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        let written = note("Buy milk", 1000, None);
        collection.set(&user, &written).unwrap();

        let read = collection.get_once(&user, "1000").unwrap();
        assert_eq!(read.text, "Buy milk");
        assert_eq!(read.date_created, 1000);
        assert_eq!(read.color, None);

        // The document is really on disk at notes/<uid>/<id>.json
        assert!(tmp.path().join("notes/alice/1000.json").exists());
    }

    #[test]
    fn get_once_for_missing_note_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        assert!(matches!(
            collection.get_once(&user, "404"),
            Err(CkError::NoteNotFound { id }) if id == "404"
        ));
    }

    #[test]
    fn set_is_a_full_replace() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        collection.set(&user, &note("v1", 7, Some("red"))).unwrap();
        collection.set(&user, &note("v2", 7, None)).unwrap();

        let read = collection.get_once(&user, "7").unwrap();
        assert_eq!(read.text, "v2");
        assert_eq!(read.color, None);
    }

    #[tokio::test]
    async fn snapshot_is_ordered_and_scoped_to_the_user() {
        let tmp = tempfile::tempdir().unwrap();
        let mut collection = collection_in(tmp.path());
        let alice = UserId("alice".to_string());
        let bob = UserId("bob".to_string());

        collection.set(&alice, &note("second", 2000, None)).unwrap();
        collection.set(&alice, &note("first", 1000, None)).unwrap();
        collection.set(&bob, &note("other", 1500, None)).unwrap();

        collection.initialize().await.unwrap();

        let subscription = collection.subscribe(&alice).unwrap();
        let texts: Vec<&str> = subscription
            .snapshot()
            .iter()
            .map(|n| n.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn apply_change_emits_added_then_changed() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        let mut subscription = collection.subscribe(&user).unwrap();

        // First revision appears as Added at its sorted position
        collection.set(&user, &note("v1", 5, None)).unwrap();
        let path = tmp.path().join("notes/alice/5.json");
        NoteCollection::apply_change(
            FsChange::Upsert {
                user_id: "alice".to_string(),
                note_id: "5".to_string(),
                path: path.clone(),
            },
            &collection.cache,
            &collection.order,
            &collection.subscribers,
        );
        match subscription.rx.try_recv().unwrap() {
            CollectionEvent::Added { index, note } => {
                assert_eq!(index, 0);
                assert_eq!(note.text, "v1");
            }
            other => panic!("expected Added, got {:?}", other),
        }

        // A rewrite of the same id appears as Changed at the same position
        collection.set(&user, &note("v2", 5, None)).unwrap();
        NoteCollection::apply_change(
            FsChange::Upsert {
                user_id: "alice".to_string(),
                note_id: "5".to_string(),
                path,
            },
            &collection.cache,
            &collection.order,
            &collection.subscribers,
        );
        match subscription.rx.try_recv().unwrap() {
            CollectionEvent::Changed { index, note } => {
                assert_eq!(index, 0);
                assert_eq!(note.text, "v2");
            }
            other => panic!("expected Changed, got {:?}", other),
        }
    }

    #[test]
    fn apply_change_routes_events_by_user() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let alice = UserId("alice".to_string());
        let bob = UserId("bob".to_string());

        let mut alice_sub = collection.subscribe(&alice).unwrap();
        let mut bob_sub = collection.subscribe(&bob).unwrap();

        collection.set(&alice, &note("mine", 9, None)).unwrap();
        NoteCollection::apply_change(
            FsChange::Upsert {
                user_id: "alice".to_string(),
                note_id: "9".to_string(),
                path: tmp.path().join("notes/alice/9.json"),
            },
            &collection.cache,
            &collection.order,
            &collection.subscribers,
        );

        assert!(alice_sub.rx.try_recv().is_ok());
        assert!(bob_sub.rx.try_recv().is_err());
    }

    #[test]
    fn removal_emits_removed_at_the_right_position() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        for (text, created) in [("a", 1), ("b", 2), ("c", 3)] {
            collection.set(&user, &note(text, created, None)).unwrap();
            NoteCollection::apply_change(
                FsChange::Upsert {
                    user_id: "alice".to_string(),
                    note_id: created.to_string(),
                    path: tmp.path().join(format!("notes/alice/{}.json", created)),
                },
                &collection.cache,
                &collection.order,
                &collection.subscribers,
            );
        }

        let mut subscription = collection.subscribe(&user).unwrap();
        NoteCollection::apply_change(
            FsChange::Remove {
                user_id: "alice".to_string(),
                note_id: "2".to_string(),
            },
            &collection.cache,
            &collection.order,
            &collection.subscribers,
        );

        match subscription.rx.try_recv().unwrap() {
            CollectionEvent::Removed { index, id } => {
                assert_eq!(index, 1);
                assert_eq!(id, "2");
            }
            other => panic!("expected Removed, got {:?}", other),
        }
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let tmp = tempfile::tempdir().unwrap();
        let collection = collection_in(tmp.path());
        let user = UserId("alice".to_string());

        let subscription = collection.subscribe(&user).unwrap();
        assert_eq!(collection.subscribers.lock().unwrap().len(), 1);
        drop(subscription);
        assert_eq!(collection.subscribers.lock().unwrap().len(), 0);
    }

    #[test]
    fn sorted_insert_keeps_creation_order() {
        let mut ids = Vec::new();
        assert_eq!(sorted_insert(&mut ids, "200"), 0);
        assert_eq!(sorted_insert(&mut ids, "100"), 0);
        assert_eq!(sorted_insert(&mut ids, "300"), 2);
        assert_eq!(ids, vec!["100", "200", "300"]);
    }
}
