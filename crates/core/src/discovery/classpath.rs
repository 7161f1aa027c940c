//! Classpath entry accumulator.

use crate::concurrency::SingletonMap;
use crate::config::ScanSpec;
use indexmap::IndexMap;
use loaderscope_api::{ObjRef, Value, describe_object};
use loaderscope_plugin::{ClasspathSink, ReflectionUtils};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};
use url::Url;

/// A discovered classpath entry and the loader that contributed it.
#[derive(Clone)]
pub struct ClasspathEntry {
    pub path: PathBuf,
    pub loader: ObjRef,
}

impl fmt::Debug for ClasspathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathEntry")
            .field("path", &self.path)
            .field("loader", &describe_object(&self.loader))
            .finish()
    }
}

/// Collects classpath entries in discovery order, keeping the first loader
/// that contributed each path. Safe to feed from several threads.
pub struct ClasspathOrder {
    reflection: ReflectionUtils,
    spec: ScanSpec,
    entries: Mutex<IndexMap<PathBuf, ObjRef>>,
    canonical_paths: SingletonMap<PathBuf, Arc<PathBuf>>,
}

impl ClasspathOrder {
    pub fn new(reflection: ReflectionUtils, spec: ScanSpec) -> Self {
        Self {
            reflection,
            spec,
            entries: Mutex::new(IndexMap::new()),
            canonical_paths: SingletonMap::new(|path: &PathBuf| {
                Ok(Some(Arc::new(std::fs::canonicalize(path)?)))
            }),
        }
    }

    pub fn entries(&self) -> Vec<ClasspathEntry> {
        self.lock()
            .iter()
            .map(|(path, loader)| ClasspathEntry {
                path: path.clone(),
                loader: loader.clone(),
            })
            .collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn into_entries(self) -> Vec<ClasspathEntry> {
        self.entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|(path, loader)| ClasspathEntry { path, loader })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<PathBuf, ObjRef>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn a discovered value into a filesystem path, if it denotes one.
    fn to_path(&self, value: &Value) -> Option<PathBuf> {
        match value {
            Value::File(path) => Some(path.clone()),
            Value::Str(s) => path_from_str(s),
            // Unknown handle types usually render as their path.
            Value::Object(obj) => self
                .reflection
                .invoke_method(obj, "toString", &[])
                .and_then(|rendered| rendered.as_str().and_then(path_from_str)),
            _ => None,
        }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if !self.spec.canonicalize_entries {
            return path;
        }
        match self.canonical_paths.get(&path) {
            Ok(canonical) => canonical.as_ref().clone(),
            Err(_) => path,
        }
    }
}

/// URL schemes a loader's classpath is commonly reported in.
const URL_SCHEMES: &[&str] = &["file", "jar", "vfs", "vfsfile", "vfszip", "http", "https"];

/// True if `s` starts with a known URL scheme. Plain path lists and Windows
/// drive letters are not URLs.
pub(crate) fn is_url(s: &str) -> bool {
    s.trim_start().split_once(':').is_some_and(|(scheme, _)| {
        URL_SCHEMES
            .iter()
            .any(|known| scheme.eq_ignore_ascii_case(known))
    })
}

/// Accepts plain paths, `file:` URLs and `jar:<url>!/...` archive URLs. URLs
/// of other schemes do not name a local path.
fn path_from_str(s: &str) -> Option<PathBuf> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if !is_url(s) {
        return Some(PathBuf::from(s));
    }

    // jar:file:/x.war!/WEB-INF/lib/y.jar names the outer archive
    let url = match s.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("jar:") => {
            let inner = &s[4..];
            inner.split_once("!/").map_or(inner, |(archive, _)| archive)
        }
        _ => s,
    };
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok(),
        Ok(parsed) => {
            trace!("Not a local classpath URL: {}", parsed);
            None
        }
        Err(e) => {
            trace!("Malformed classpath URL {}: {}", url, e);
            None
        }
    }
}

impl ClasspathSink for ClasspathOrder {
    fn add_entry(&self, entry: Option<Value>, loader: &ObjRef) -> bool {
        let Some(entry) = entry else {
            return false;
        };
        let Some(path) = self.to_path(&entry) else {
            trace!("Not a classpath entry: {}", entry.describe());
            return false;
        };
        if self.spec.skip_unreadable_entries && !Path::new(&path).exists() {
            debug!("Skipping unreadable classpath entry {}", path.display());
            return false;
        }
        let path = self.resolve(path);

        let mut entries = self.lock();
        if entries.contains_key(&path) {
            return false;
        }
        debug!(
            "Found classpath entry {} from {}",
            path.display(),
            describe_object(loader)
        );
        entries.insert(path, loader.clone());
        true
    }

    fn reflection(&self) -> &ReflectionUtils {
        &self.reflection
    }
}
