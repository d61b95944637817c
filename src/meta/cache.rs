//! Loader and single-writer cache for per-class meta files.

use crate::compiler::OutputLayout;
use crate::error::AnalyserError;
use crate::meta::Meta;
use indexmap::IndexSet;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;
use tracing::{debug, warn};

/// Meta objects are shared between the class being merged and the ancestors
/// referencing it; the run is single-threaded so interior mutability is safe.
pub type SharedMeta = Rc<RefCell<Meta>>;

/// Language roots with no meta of their own.
const SYNTHETIC_ROOTS: [&str; 3] = ["Object", "Array", "Error"];

/// Caches meta for the duration of one `analyse_classes` run. Live meta from
/// freshly compiled classes shadows any on-disk copy; ancestors that were not
/// recompiled are read from disk once.
#[derive(Debug, Default)]
pub struct MetaCache {
    cache: HashMap<String, Option<SharedMeta>>,
    dirty: IndexSet<String>,
}

impl MetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all cached and staged state. Called at the start of a run.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.dirty.clear();
    }

    /// Seed the cache with the live meta of a freshly compiled class.
    pub fn seed_live(&mut self, class_name: &str, meta: Meta) -> SharedMeta {
        let shared = Rc::new(RefCell::new(meta));
        self.cache
            .insert(class_name.to_string(), Some(shared.clone()));
        shared
    }

    /// Load a class's meta, reading from disk on first touch. Returns `None`
    /// for the synthetic roots and for unreadable files ("ancestor not
    /// visible"); both results are cached for the run.
    pub fn load(&mut self, class_name: &str, layout: &dyn OutputLayout) -> Option<SharedMeta> {
        if SYNTHETIC_ROOTS.contains(&class_name) {
            return None;
        }
        if let Some(cached) = self.cache.get(class_name) {
            return cached.clone();
        }
        let path = layout.meta_path(class_name);
        let loaded = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Meta>(&text) {
                Ok(meta) => {
                    debug!(class = %class_name, path = %path.display(), "loaded meta");
                    Some(Rc::new(RefCell::new(meta)))
                }
                Err(err) => {
                    warn!(class = %class_name, path = %path.display(), %err, "unparsable meta, ancestor not visible");
                    None
                }
            },
            Err(err) => {
                warn!(class = %class_name, path = %path.display(), %err, "unreadable meta, ancestor not visible");
                None
            }
        };
        self.cache.insert(class_name.to_string(), loaded.clone());
        loaded
    }

    /// Stage a class's meta for the end-of-run flush. Staging the same class
    /// twice in one run is a programmer error and fails loudly.
    pub fn save_meta(&mut self, class_name: &str, meta: SharedMeta) -> Result<(), AnalyserError> {
        if !self.dirty.insert(class_name.to_string()) {
            return Err(AnalyserError::MetaWriteDuplicate {
                class: class_name.to_string(),
            });
        }
        self.cache.insert(class_name.to_string(), Some(meta));
        Ok(())
    }

    /// Write every staged meta to disk. Returns the number of files written.
    pub fn flush(&mut self, layout: &dyn OutputLayout) -> Result<usize, AnalyserError> {
        let staged: Vec<String> = self.dirty.iter().cloned().collect();
        for class_name in &staged {
            let Some(Some(meta)) = self.cache.get(class_name) else {
                continue;
            };
            let path = layout.meta_path(class_name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let text = serde_json::to_string_pretty(&*meta.borrow())?;
            fs::write(&path, text)?;
            debug!(class = %class_name, path = %path.display(), "wrote meta");
        }
        self.dirty.clear();
        Ok(staged.len())
    }
}
