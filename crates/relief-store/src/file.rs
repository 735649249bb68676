//! Directory-backed key-value store shared between processes.
//!
//! Each key is one `<encoded-key>.json` file under the root directory. Writes
//! go to a process-unique temporary file that is synced and then renamed over
//! the target, so a reader in any process sees either the old value or the
//! new one.
//!
//! # Change detection
//!
//! Every handle remembers the last value it wrote or observed per key.
//! [`take_external_changes`](KeyValueStore::take_external_changes) rescans
//! the directory and reports keys whose value differs. The remembered value
//! doubles as the event's `old_value`. Because the handle's own writes update
//! it, they are never reported back to it.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Root missing | Fresh install | Created on `open` |
//! | File vanishes mid-scan | Concurrent `remove` | Reported as removal |
//! | Rename fails | Permissions, full disk | `StoreError::Io`, target untouched |
//! | Two processes write one key | No locking | Last rename wins |

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use relief_core::StoreError;
use tracing::{debug, warn};

use crate::kv::{KeyValueStore, StorageEvent};

const EXTENSION: &str = "json";

pub struct FileStore {
    root: PathBuf,
    seen: RefCell<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Values already on disk are treated as seen, so they are not reported
    /// as external changes.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        let store = Self {
            root,
            seen: RefCell::new(BTreeMap::new()),
        };
        let snapshot = store.snapshot()?;
        *store.seen.borrow_mut() = snapshot;
        debug!(root = %store.root.display(), keys = store.seen.borrow().len(), "opened file store");
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", encode_key(key)))
    }

    fn read_path(path: &Path, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn snapshot(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut out = BTreeMap::new();
        for key in self.keys()? {
            if let Some(value) = Self::read_path(&self.path_for(&key), &key)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("root", &self.root)
            .field("tracked_keys", &self.seen.borrow().len())
            .finish()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::read_path(&self.path_for(key), key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        write_atomic(&self.path_for(key), value.as_bytes()).map_err(|source| StoreError::Io {
            key: key.to_owned(),
            source,
        })?;
        self.seen.borrow_mut().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_owned(),
                    source,
                });
            }
        }
        self.seen.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source| StoreError::Io {
            key: self.root.display().to_string(),
            source,
        };
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(&format!(".{EXTENSION}")) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => warn!(file = name, "skipping file with undecodable key"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn take_external_changes(&self) -> Result<Vec<StorageEvent>, StoreError> {
        let current = self.snapshot()?;
        let mut seen = self.seen.borrow_mut();
        let mut events = Vec::new();

        for (key, value) in &current {
            let old = seen.get(key);
            if old == Some(value) {
                continue;
            }
            events.push(StorageEvent {
                key: key.clone(),
                old_value: old.cloned(),
                new_value: Some(value.clone()),
            });
        }
        for (key, old) in seen.iter() {
            if !current.contains_key(key) {
                events.push(StorageEvent {
                    key: key.clone(),
                    old_value: Some(old.clone()),
                    new_value: None,
                });
            }
        }

        *seen = current;
        if !events.is_empty() {
            debug!(count = events.len(), "detected external store changes");
        }
        Ok(events)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("value");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let raw = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(bytes).ok()
}
