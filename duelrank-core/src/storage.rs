/// Versioned persistence for ratings and appearance counts.
///
/// One JSON document lives under `STORAGE_KEY` in a string key/value
/// backend. The store never reports failures to its caller: unreadable,
/// unparsable or wrong-version documents load as absent, and failed writes
/// are logged and dropped. The in-memory engine stays the source of truth
/// until the next successful save.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{SCHEMA_VERSION, STORAGE_KEY};
use crate::error::StorageError;
use crate::types::ItemId;

/// Stored rating for one item. The id is the map key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedRating {
    pub rating: f64,
    pub games: u64,
}

/// The persisted document: `{ "version": 1, "ratings": {..}, "appear": {..} }`.
///
/// Map keys are item ids written as JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub ratings: BTreeMap<ItemId, PersistedRating>,
    pub appear: BTreeMap<ItemId, u64>,
}

impl PersistedState {
    /// A valid document with no data.
    pub fn empty() -> Self {
        PersistedState {
            version: SCHEMA_VERSION,
            ratings: BTreeMap::new(),
            appear: BTreeMap::new(),
        }
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Body of a document once its version tag has been checked.
#[derive(Deserialize)]
struct DocumentBody {
    #[serde(default)]
    ratings: BTreeMap<ItemId, PersistedRating>,
    #[serde(default)]
    appear: BTreeMap<ItemId, u64>,
}

/// Parse and validate a persisted document.
///
/// The text must be a JSON object whose `version` equals [`SCHEMA_VERSION`],
/// and every rating and count must have the right shape. Anything else is
/// rejected as a whole.
pub fn parse_document(text: &str) -> Result<PersistedState, StorageError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StorageError::MalformedDocument(format!("not valid JSON: {e}")))?;

    let Value::Object(ref fields) = value else {
        return Err(StorageError::MalformedDocument("document is not a JSON object".into()));
    };

    let version = fields.get("version").and_then(Value::as_f64);
    if version != Some(f64::from(SCHEMA_VERSION)) {
        return Err(StorageError::MalformedDocument(format!(
            "unsupported version {}, expected {SCHEMA_VERSION}",
            fields.get("version").map(Value::to_string).unwrap_or_else(|| "<missing>".into()),
        )));
    }

    let body: DocumentBody = serde_json::from_value(value)
        .map_err(|e| StorageError::MalformedDocument(e.to_string()))?;

    Ok(PersistedState {
        version: SCHEMA_VERSION,
        ratings: body.ratings,
        appear: body.appear,
    })
}

/// String key/value storage, modelled on browser local storage.
pub trait StorageBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-process backend. Optionally enforces a byte quota per value to mimic a full store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any value longer than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        MemoryStorage { items: HashMap::new(), quota: Some(bytes) }
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(StorageError::Io(std::io::Error::new(
                    ErrorKind::Other,
                    format!("value of {} bytes exceeds quota of {quota}", value.len()),
                )));
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Load/save/reset/export/import of the single persisted document.
#[derive(Debug, Clone)]
pub struct PersistenceStore<B> {
    backend: B,
}

impl<B: StorageBackend> PersistenceStore<B> {
    pub fn new(backend: B) -> Self {
        PersistenceStore { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// The stored document, or `None` if missing, unreadable or invalid.
    pub fn load(&self) -> Option<PersistedState> {
        let raw = match self.backend.get_item(STORAGE_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => {
                debug!("No stored state under {STORAGE_KEY}");
                return None;
            }
            Err(e) => {
                warn!("Failed to read stored state: {e}");
                return None;
            }
        };

        match parse_document(&raw) {
            Ok(state) => {
                debug!(ratings = state.ratings.len(), appear = state.appear.len(), "Loaded stored state");
                Some(state)
            }
            Err(e) => {
                warn!("Ignoring stored state: {e}");
                None
            }
        }
    }

    /// Write `state`, replacing whatever was stored. Failures are logged and dropped.
    pub fn save(&mut self, state: &PersistedState) {
        if let Err(e) = self.try_write(state) {
            warn!("Failed to persist state: {e}");
        }
    }

    /// Delete the stored document.
    pub fn reset(&mut self) {
        if let Err(e) = self.backend.remove_item(STORAGE_KEY) {
            warn!("Failed to remove stored state: {e}");
        }
    }

    /// The stored document text verbatim, or an empty valid document if nothing is stored.
    pub fn export_text(&self) -> String {
        match self.backend.get_item(STORAGE_KEY) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => empty_document_text(),
            Err(e) => {
                warn!("Failed to read stored state for export: {e}");
                empty_document_text()
            }
        }
    }

    /// Replace the stored document with `text` if it is a valid document.
    ///
    /// Returns `false` and leaves storage untouched when it is not, or when the write fails.
    pub fn import_text(&mut self, text: &str) -> bool {
        self.import_document(text).is_some()
    }

    /// Like [`import_text`](Self::import_text), but hands back the state that
    /// was stored so callers don't have to read it back.
    pub fn import_document(&mut self, text: &str) -> Option<PersistedState> {
        let state = match parse_document(text) {
            Ok(state) => state,
            Err(e) => {
                warn!("Rejected import: {e}");
                return None;
            }
        };

        match self.try_write(&state) {
            Ok(()) => Some(state),
            Err(e) => {
                warn!("Failed to store imported state: {e}");
                None
            }
        }
    }

    fn try_write(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        let text = serde_json::to_string(state)?;
        self.backend.set_item(STORAGE_KEY, &text)?;
        debug!(bytes = text.len(), "Saved state");
        Ok(())
    }
}

fn empty_document_text() -> String {
    format!(r#"{{"version":{SCHEMA_VERSION},"ratings":{{}},"appear":{{}}}}"#)
}
