//! Durable client-side storage.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The key under which the bearer credential is kept.
pub const CREDENTIAL_KEY: &str = "google_id_token";

/// The key under which the active conversation id is kept.
pub const CONVERSATION_ID_KEY: &str = "codegen_conversation_id";

/// A string key-value store that outlives the process.
///
/// Writes are best effort. An implementation that fails to persist a
/// value should log and carry on, the in-memory state stays authoritative
/// for the running session.
pub trait Store: Send + Sync + 'static {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str);

    /// Removes a value. Removing a missing key is not an error.
    fn remove(&self, key: &str);
}

/// A store that lives in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        lock(&self.values).remove(key);
    }
}

/// A store backed by a JSON object on disk.
///
/// The whole file is read once when the store is opened. Every write
/// rewrites it through a temporary file that is then renamed over the
/// original, so readers never observe a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or malformed file is
    /// logged and treated as empty too; it is replaced on the next write.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let values = match load(&path) {
            Ok(values) => values,
            Err(err) => {
                warn!("ignoring state file {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        debug!("opened state file {} ({} keys)", path.display(), values.len());
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Returns the path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) {
        if let Err(err) = save(&self.path, values) {
            error!("failed to write state file {}: {err}", self.path.display());
        }
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = lock(&self.values);
        if values.get(key).map(String::as_str) == Some(value) {
            return;
        }
        values.insert(key.to_owned(), value.to_owned());
        self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.persist(&values);
        }
    }
}

fn load(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(BTreeMap::new());
        }
        Err(err) => return Err(err),
    };
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&content)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn save(path: &Path, values: &BTreeMap<String, String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(values)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(json.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
