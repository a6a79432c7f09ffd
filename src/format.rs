//! # format
//!
//! Format-independent loading: the [`DatabaseFormat`] plug-in trait, a
//! facade trying every registered format, and an optional parser cache.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::types::{
    database::{Database, LoadOptions},
    errors::Error,
};

/// A textual database format.
pub trait DatabaseFormat {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Lower-case file extensions (without dot) this format claims.
    fn extensions(&self) -> &'static [&'static str];

    fn load_string(&self, text: &str, options: &LoadOptions) -> Result<Database, Error>;

    /// Reads `path` as UTF-8 and parses it.
    fn load_file(&self, path: &Path, options: &LoadOptions) -> Result<Database, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.load_string(&text, options)
    }
}

/// The Vector DBC format.
#[cfg(feature = "dbc")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Dbc;

#[cfg(feature = "dbc")]
impl DatabaseFormat for Dbc {
    fn name(&self) -> &'static str {
        "dbc"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dbc"]
    }

    fn load_string(&self, text: &str, options: &LoadOptions) -> Result<Database, Error> {
        crate::dbc::load_string(text, options)
    }

    fn load_file(&self, path: &Path, options: &LoadOptions) -> Result<Database, Error> {
        crate::dbc::load_file(path, options)
    }
}

/// Formats compiled into this build, in the order they are tried.
pub fn formats() -> Vec<Box<dyn DatabaseFormat>> {
    #[allow(unused_mut)]
    let mut formats: Vec<Box<dyn DatabaseFormat>> = Vec::new();
    #[cfg(feature = "dbc")]
    formats.push(Box::new(Dbc));
    formats
}

/// Parses `text` with the first format that accepts it.
///
/// A format rejecting the text with a parse error passes it on to the
/// next one; any other error is returned as is. Returns
/// [`Error::UnsupportedFormat`] when no format accepts the text.
pub fn load_string(text: &str, options: &LoadOptions) -> Result<Database, Error> {
    for format in formats() {
        match format.load_string(text, options) {
            Ok(db) => return Ok(db),
            Err(Error::Parse(err)) => {
                log::debug!("{} rejected input: {err}", format.name());
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::UnsupportedFormat)
}

/// Loads `path` with the format registered for its extension.
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Database, Error> {
    let path = path.as_ref();
    let format = format_for_path(path).ok_or(Error::UnsupportedFormat)?;
    format.load_file(path, options)
}

fn format_for_path(path: &Path) -> Option<Box<dyn DatabaseFormat>> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    formats()
        .into_iter()
        .find(|f| f.extensions().contains(&extension.as_str()))
}

/// Identifies one parse result: the file, its modification time and the
/// options that shaped the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub mtime: Option<SystemTime>,
    pub flags: LoadOptions,
}

impl CacheKey {
    /// Key of `path` as it is on disk now.
    pub fn for_file(path: impl AsRef<Path>, flags: &LoadOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(CacheKey {
            path: path.to_path_buf(),
            // not every platform reports it; such entries never go stale
            mtime: metadata.modified().ok(),
            flags: *flags,
        })
    }
}

/// Key/value store of parsed databases.
pub trait ParserCache {
    fn get(&self, key: &CacheKey) -> Option<Database>;
    fn put(&mut self, key: CacheKey, db: Database);
}

/// [`ParserCache`] kept in memory for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, Database>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ParserCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Database> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: CacheKey, db: Database) {
        // a newer mtime of the same file replaces the stale entry
        self.entries
            .retain(|k, _| !(k.path == key.path && k.flags == key.flags));
        self.entries.insert(key, db);
    }
}

/// Like [`load_file`], answering from `cache` while the file is unchanged.
pub fn load_file_cached(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    cache: &mut impl ParserCache,
) -> Result<Database, Error> {
    let path = path.as_ref();
    let key = CacheKey::for_file(path, options)?;
    if let Some(db) = cache.get(&key) {
        log::debug!("cache hit for '{}'", path.display());
        return Ok(db);
    }
    let db = load_file(path, options)?;
    cache.put(key, db.clone());
    Ok(db)
}
