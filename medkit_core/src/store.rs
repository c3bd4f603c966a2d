//! File-backed document store.
//!
//! Each collection is a JSON Lines file (one document per line) in the data
//! directory. Access is serialized through `fs2` advisory locks on a sidecar
//! `<collection>.lock` file: readers take a shared lock, writers an exclusive
//! one. Appends go straight to the end of the file; updates and deletes
//! rewrite the whole collection through a temp file that is fsynced and
//! renamed over the original, so a crash never leaves a half-written file.

use crate::{Category, Error, Medicine, Result, UsageLog};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Name of the manifest listing collections and their indexes
pub const CATALOG_FILE: &str = "catalog.json";

/// An index declared on a document field
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: &'static str,
    pub unique: bool,
}

impl IndexSpec {
    pub const fn unique(field: &'static str) -> Self {
        Self { field, unique: true }
    }

    pub const fn non_unique(field: &'static str) -> Self {
        Self {
            field,
            unique: false,
        }
    }
}

/// A record that lives in a collection
pub trait Document: Clone + Serialize + DeserializeOwned {
    /// Collection (and file stem) name
    const COLLECTION: &'static str;

    /// Indexes declared on this collection
    const INDEXES: &'static [IndexSpec] = &[];

    fn id(&self) -> &str;

    /// Value of an indexed field, as a string
    fn index_value(&self, _field: &str) -> Option<String> {
        None
    }
}

/// Generate a fresh document id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Canonical form of a caller-supplied id, or `None` if it is malformed
pub fn normalize_id(id: &str) -> Option<String> {
    Uuid::parse_str(id.trim()).ok().map(|u| u.to_string())
}

#[derive(Serialize)]
struct CollectionManifest {
    name: &'static str,
    indexes: &'static [IndexSpec],
}

/// Handle on the data directory holding all collections
#[derive(Clone, Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open the store, creating the directory, the medicines, categories
    /// and usage_logs collections, and the index manifest as needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::StoreUnavailable(format!("cannot create data directory {:?}: {}", dir, e))
        })?;

        let store = Self { dir };
        let manifest = vec![
            store.ensure_collection::<Medicine>()?,
            store.ensure_collection::<Category>()?,
            store.ensure_collection::<UsageLog>()?,
        ];

        let contents = serde_json::to_string_pretty(&manifest)?;
        let catalog_path = store.dir.join(CATALOG_FILE);
        if std::fs::read_to_string(&catalog_path).ok().as_deref() != Some(contents.as_str()) {
            write_atomically(&catalog_path, contents.as_bytes())?;
            tracing::debug!("Wrote index manifest {:?}", catalog_path);
        }

        tracing::debug!("Opened document store at {:?}", store.dir);
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collection<T: Document>(&self) -> Collection<T> {
        Collection::new(&self.dir)
    }

    fn ensure_collection<T: Document>(&self) -> Result<CollectionManifest> {
        let collection = self.collection::<T>();
        if !collection.path.exists() {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&collection.path)
                .map_err(|e| {
                    Error::StoreUnavailable(format!(
                        "cannot create collection {:?}: {}",
                        collection.path, e
                    ))
                })?;
            tracing::info!(
                "Created '{}' collection with {} indexes",
                T::COLLECTION,
                T::INDEXES.len()
            );
        }
        Ok(CollectionManifest {
            name: T::COLLECTION,
            indexes: T::INDEXES,
        })
    }
}

/// Held advisory lock on a collection; released on drop
struct CollectionLock {
    file: File,
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Typed view of one collection file
#[derive(Clone, Debug)]
pub struct Collection<T> {
    path: PathBuf,
    lock_path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Document> Collection<T> {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.jsonl", T::COLLECTION)),
            lock_path: dir.join(format!("{}.lock", T::COLLECTION)),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All documents matching `filter`, in store order
    pub fn find<F>(&self, filter: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let _lock = self.lock(false)?;
        let docs = self.read_unlocked()?;
        Ok(docs.into_iter().filter(|d| filter(d)).collect())
    }

    /// Documents matching `filter`, stably sorted by `order`, optionally capped
    pub fn find_sorted<F, C>(&self, filter: F, order: C, limit: Option<usize>) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
        C: FnMut(&T, &T) -> Ordering,
    {
        let mut docs = self.find(filter)?;
        docs.sort_by(order);
        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    /// First document matching `filter`
    pub fn find_one<F>(&self, filter: F) -> Result<Option<T>>
    where
        F: Fn(&T) -> bool,
    {
        let _lock = self.lock(false)?;
        let docs = self.read_unlocked()?;
        Ok(docs.into_iter().find(|d| filter(d)))
    }

    /// Documents whose indexed `field` equals `value`
    pub fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>> {
        if !T::INDEXES.iter().any(|ix| ix.field == field) {
            return Err(Error::Validation(format!(
                "no index on '{}' in collection '{}'",
                field,
                T::COLLECTION
            )));
        }
        self.find(|doc| doc.index_value(field).as_deref() == Some(value))
    }

    /// Insert a document, enforcing unique indexes
    pub fn insert(&self, doc: T) -> Result<T> {
        let _lock = self.lock(true)?;

        if T::INDEXES.iter().any(|ix| ix.unique) {
            let existing = self.read_unlocked()?;
            check_unique(&existing, &doc, None)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let torn = ends_without_newline(&file)?;
        let mut writer = BufWriter::new(&file);
        if torn {
            // A crash mid-append left a partial line; keep it on its own line
            writer.write_all(b"\n")?;
        }
        let line = serde_json::to_string(&doc)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::debug!("Inserted {} into '{}'", doc.id(), T::COLLECTION);
        Ok(doc)
    }

    /// Atomic find-and-update.
    ///
    /// Applies `mutate` to the first document matching `filter` while the
    /// exclusive lock is held and returns the document as written. Returns
    /// `None` and writes nothing if no document matches.
    pub fn update_one<F, M>(&self, filter: F, mutate: M) -> Result<Option<T>>
    where
        F: Fn(&T) -> bool,
        M: FnOnce(&mut T),
    {
        let _lock = self.lock(true)?;
        let mut docs = self.read_unlocked()?;

        let Some(pos) = docs.iter().position(|d| filter(d)) else {
            return Ok(None);
        };

        mutate(&mut docs[pos]);
        check_unique(&docs, &docs[pos], Some(pos))?;
        self.write_unlocked(&docs)?;

        tracing::debug!("Updated {} in '{}'", docs[pos].id(), T::COLLECTION);
        Ok(Some(docs.swap_remove(pos)))
    }

    /// Remove the first document matching `filter`
    pub fn delete_one<F>(&self, filter: F) -> Result<bool>
    where
        F: Fn(&T) -> bool,
    {
        let _lock = self.lock(true)?;
        let mut docs = self.read_unlocked()?;

        let Some(pos) = docs.iter().position(|d| filter(d)) else {
            return Ok(false);
        };

        let removed = docs.remove(pos);
        self.write_unlocked(&docs)?;

        tracing::debug!("Deleted {} from '{}'", removed.id(), T::COLLECTION);
        Ok(true)
    }

    fn lock(&self, exclusive: bool) -> Result<CollectionLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| {
                Error::StoreUnavailable(format!("cannot open {:?}: {}", self.lock_path, e))
            })?;

        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|e| {
            Error::StoreUnavailable(format!("cannot lock {:?}: {}", self.lock_path, e))
        })?;

        Ok(CollectionLock { file })
    }

    fn read_unlocked(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut docs = Vec::new();

        // Raw bytes: a torn multi-byte character must not fail the whole read
        for (line_num, line_result) in reader.split(b'\n').enumerate() {
            let line = line_result?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<T>(&line) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable document in '{}' at line {}: {}",
                        T::COLLECTION,
                        line_num + 1,
                        e
                    );
                }
            }
        }

        Ok(docs)
    }

    fn write_unlocked(&self, docs: &[T]) -> Result<()> {
        let mut contents = Vec::new();
        for doc in docs {
            serde_json::to_writer(&mut contents, doc)?;
            contents.push(b'\n');
        }
        write_atomically(&self.path, &contents)
    }
}

fn check_unique<T: Document>(docs: &[T], candidate: &T, skip: Option<usize>) -> Result<()> {
    for index in T::INDEXES.iter().filter(|ix| ix.unique) {
        let Some(value) = candidate.index_value(index.field) else {
            continue;
        };
        let clash = docs
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, d)| d.index_value(index.field).as_deref() == Some(value.as_str()));
        if clash {
            return Err(Error::DuplicateName(format!(
                "{}.{} = {:?}",
                T::COLLECTION,
                index.field,
                value
            )));
        }
    }
    Ok(())
}

fn ends_without_newline(file: &File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut reader = file;
    reader.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    reader.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Write `contents` to `path` via temp file, fsync and rename
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "target path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        writer.write_all(contents)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
