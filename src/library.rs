use crate::error::AnalyserError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Classification of a dotted symbol name against the known class set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Class,
    Member,
    Package,
}

/// Result of `get_symbol_type`: what the name denotes, and the owning class
/// when one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub symbol_type: SymbolType,
    pub class_name: Option<String>,
}

/// One registered library: a namespace rooted at a source directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub namespace: String,
    pub root_dir: PathBuf,
    pub source_path: String,
    pub version: String,
    /// Class names discovered by `scan_for_classes`.
    #[serde(skip)]
    classes: BTreeSet<String>,
}

impl Library {
    pub fn new(
        namespace: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        source_path: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            root_dir: root_dir.into(),
            source_path: source_path.into(),
            version: version.into(),
            classes: BTreeSet::new(),
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root_dir.join(&self.source_path)
    }

    /// Absolute path of the source file for a class in this library.
    pub fn source_file(&self, class_name: &str) -> PathBuf {
        let mut path = self.source_dir();
        for segment in class_name.split('.') {
            path.push(segment);
        }
        path.set_extension("js");
        path
    }

    /// Enumerate the class files under the source directory, recording the
    /// dotted class names. Returns the names found in this scan.
    pub fn scan_for_classes(&mut self) -> Result<Vec<String>, AnalyserError> {
        let source_dir = self.source_dir();
        let mut found = Vec::new();
        if !source_dir.is_dir() {
            debug!(namespace = %self.namespace, dir = %source_dir.display(), "no source directory to scan");
            return Ok(found);
        }
        for entry in WalkDir::new(&source_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                AnalyserError::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir loop")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("js") {
                continue;
            }
            if let Some(name) = class_name_for(&source_dir, entry.path()) {
                self.classes.insert(name.clone());
                found.push(name);
            }
        }
        debug!(namespace = %self.namespace, count = found.len(), "scanned library");
        Ok(found)
    }

    pub fn knows_class(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Classify a dotted name against this library's class set.
    pub fn get_symbol_type(&self, name: &str) -> Option<SymbolInfo> {
        if self.classes.contains(name) {
            return Some(SymbolInfo {
                symbol_type: SymbolType::Class,
                class_name: Some(name.to_string()),
            });
        }
        // A member is a dotted suffix of a known class; the longest class
        // prefix wins.
        let mut prefix = name;
        while let Some(pos) = prefix.rfind('.') {
            prefix = &prefix[..pos];
            if self.classes.contains(prefix) {
                return Some(SymbolInfo {
                    symbol_type: SymbolType::Member,
                    class_name: Some(prefix.to_string()),
                });
            }
        }
        // A package is a proper prefix of at least one known class.
        let package_prefix = format!("{name}.");
        if self
            .classes
            .iter()
            .any(|class| class.starts_with(&package_prefix))
        {
            return Some(SymbolInfo {
                symbol_type: SymbolType::Package,
                class_name: None,
            });
        }
        None
    }
}

fn class_name_for(source_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(source_dir).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        segments.push(component.as_os_str().to_str()?.to_string());
    }
    let last = segments.last_mut()?;
    *last = last.strip_suffix(".js")?.to_string();
    Some(segments.join("."))
}

/// Registry of libraries keyed by namespace, with a class-name resolution
/// cache populated as classes are parsed.
#[derive(Debug, Default)]
pub struct LibraryIndex {
    libraries: IndexMap<String, Library>,
    /// class name -> namespace; append-only, takes precedence over the
    /// per-library scan (private-class override).
    class_to_library: HashMap<String, String>,
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library. At most one library per namespace; a second
    /// registration for the same namespace replaces the first.
    pub fn add_library(&mut self, library: Library) {
        self.libraries.insert(library.namespace.clone(), library);
    }

    pub fn find_library(&self, namespace: &str) -> Option<&Library> {
        self.libraries.get(namespace)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    /// Record that a class belongs to a library, as discovered during
    /// parsing. Existing entries are never overwritten.
    pub fn register_class(&mut self, class_name: &str, namespace: &str) {
        self.class_to_library
            .entry(class_name.to_string())
            .or_insert_with(|| namespace.to_string());
    }

    /// Scan every library for class files.
    pub fn scan_all(&mut self) -> Result<(), AnalyserError> {
        for library in self.libraries.values_mut() {
            let namespace = library.namespace.clone();
            for class_name in library.scan_for_classes()? {
                self.class_to_library
                    .entry(class_name)
                    .or_insert_with(|| namespace.clone());
            }
        }
        Ok(())
    }

    /// Resolve the library that owns a class name: the internal cache first,
    /// then a linear scan accepting the first library whose classification is
    /// `class` or `member`.
    pub fn library_for_class(&self, class_name: &str) -> Option<&Library> {
        if let Some(namespace) = self.class_to_library.get(class_name) {
            return self.libraries.get(namespace);
        }
        for library in self.libraries.values() {
            if let Some(info) = library.get_symbol_type(class_name) {
                if matches!(info.symbol_type, SymbolType::Class | SymbolType::Member) {
                    return Some(library);
                }
            }
        }
        None
    }

    /// Classify a dotted name across all libraries.
    pub fn get_symbol_type(&self, name: &str) -> Option<SymbolInfo> {
        let mut package_hit = None;
        for library in self.libraries.values() {
            match library.get_symbol_type(name) {
                Some(info) if info.symbol_type != SymbolType::Package => return Some(info),
                Some(info) => package_hit = Some(info),
                None => {}
            }
        }
        package_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library_with(classes: &[&str]) -> Library {
        let mut library = Library::new("app", "/tmp/app", "source", "1.0.0");
        for class in classes {
            library.classes.insert((*class).to_string());
        }
        library
    }

    #[test]
    fn symbol_classification() {
        let library = library_with(&["app.ui.Button", "app.core.Object"]);

        let class = library.get_symbol_type("app.ui.Button").unwrap();
        assert_eq!(class.symbol_type, SymbolType::Class);
        assert_eq!(class.class_name.as_deref(), Some("app.ui.Button"));

        let member = library.get_symbol_type("app.ui.Button.execute").unwrap();
        assert_eq!(member.symbol_type, SymbolType::Member);
        assert_eq!(member.class_name.as_deref(), Some("app.ui.Button"));

        let package = library.get_symbol_type("app.ui").unwrap();
        assert_eq!(package.symbol_type, SymbolType::Package);
        assert_eq!(package.class_name, None);

        assert!(library.get_symbol_type("other.Thing").is_none());
    }

    #[test]
    fn scan_discovers_nested_classes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("app/ui")).unwrap();
        fs::write(source.join("app/ui/Button.js"), "{}").unwrap();
        fs::write(source.join("app/Boot.js"), "{}").unwrap();
        fs::write(source.join("app/notes.txt"), "ignored").unwrap();

        let mut library = Library::new("app", dir.path(), "source", "1.0.0");
        let mut found = library.scan_for_classes().unwrap();
        found.sort();
        assert_eq!(found, vec!["app.Boot", "app.ui.Button"]);
        assert!(library.knows_class("app.ui.Button"));
    }

    #[test]
    fn cached_resolution_takes_precedence() {
        let mut index = LibraryIndex::new();
        index.add_library(library_with(&["app.ui.Button"]));
        let mut other = Library::new("vendor", "/tmp/vendor", "source", "0.1.0");
        other.classes.insert("vendor.Private".to_string());
        index.add_library(other);

        index.register_class("vendor.Private", "app");
        let library = index.library_for_class("vendor.Private").unwrap();
        assert_eq!(library.namespace, "app");

        // Uncached names fall back to the linear scan.
        let library = index.library_for_class("app.ui.Button").unwrap();
        assert_eq!(library.namespace, "app");
    }
}
