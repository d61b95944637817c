//! Environment, locale, CLDR and translation registries.

use crate::db::DbData;
use crate::error::AnalyserError;
use crate::library::Library;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Environment keys classes have checked, with the values seen at compile
/// time.
#[derive(Debug, Default)]
pub struct EnvironmentTracker {
    checks: IndexMap<String, serde_json::Value>,
}

impl EnvironmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one key; `None` deletes it.
    pub fn set(&mut self, key: &str, value: Option<serde_json::Value>) {
        match value {
            Some(value) => {
                self.checks.insert(key.to_string(), value);
            }
            None => {
                self.checks.shift_remove(key);
            }
        }
    }

    /// Merge a whole map.
    pub fn set_all(&mut self, values: IndexMap<String, serde_json::Value>) {
        for (key, value) in values {
            self.checks.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.checks.get(key)
    }

    /// Record keys a compiled class checked without supplying values.
    pub fn record_checks<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.checks
                .entry(key.to_string())
                .or_insert(serde_json::Value::Null);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}

/// Ordered set of requested locales; `en` is always present and first.
#[derive(Debug)]
pub struct LocaleRegistry {
    locales: IndexSet<String>,
}

impl Default for LocaleRegistry {
    fn default() -> Self {
        let mut locales = IndexSet::new();
        locales.insert("en".to_string());
        Self { locales }
    }
}

impl LocaleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, locale: &str) {
        self.locales.insert(locale.to_string());
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.iter().map(String::as_str)
    }

    pub fn contains(&self, locale: &str) -> bool {
        self.locales.contains(locale)
    }
}

/// Loads CLDR data for a locale; an external collaborator.
pub trait CldrLoader {
    fn load_cldr(&self, locale: &str) -> Result<serde_json::Value, AnalyserError>;
}

/// Lazy per-locale CLDR cache.
#[derive(Debug, Default)]
pub struct CldrCache {
    cache: HashMap<String, serde_json::Value>,
}

impl CldrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &mut self,
        locale: &str,
        loader: &dyn CldrLoader,
    ) -> Result<&serde_json::Value, AnalyserError> {
        if !self.cache.contains_key(locale) {
            let cldr = loader.load_cldr(locale)?;
            debug!(%locale, "loaded CLDR");
            self.cache.insert(locale.to_string(), cldr);
        }
        Ok(&self.cache[locale])
    }
}

/// Comments attached to one translation entry. `reference` maps a source file
/// to the line numbers using the string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationComments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub reference: IndexMap<String, Vec<u32>>,
}

impl TranslationComments {
    pub fn is_empty(&self) -> bool {
        self.extracted.is_none() && self.reference.is_empty()
    }
}

/// One translatable message in a locale file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationEntry {
    pub msgid: String,
    #[serde(
        rename = "msgid_plural",
        skip_serializing_if = "Option::is_none"
    )]
    pub msgid_plural: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msgstr: Option<String>,
    #[serde(skip_serializing_if = "TranslationComments::is_empty")]
    pub comments: TranslationComments,
}

/// One locale's translation file for one library namespace. `check_read`
/// must complete before the object is handed to a caller.
#[derive(Debug)]
pub struct Translation {
    locale: String,
    namespace: String,
    path: PathBuf,
    read: bool,
    pub entries: IndexMap<String, TranslationEntry>,
}

impl Translation {
    pub fn new(library: &Library, locale: &str) -> Self {
        let path = library
            .root_dir
            .join("translation")
            .join(format!("{locale}.json"));
        Self {
            locale: locale.to_string(),
            namespace: library.namespace.clone(),
            path,
            read: false,
            entries: IndexMap::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read the backing file once; absent files yield an empty table.
    pub fn check_read(&mut self) -> Result<(), AnalyserError> {
        if self.read {
            return Ok(());
        }
        match fs::read_to_string(&self.path) {
            Ok(text) if !text.trim().is_empty() => {
                self.entries = serde_json::from_str(&text)?;
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.read = true;
        Ok(())
    }

    pub fn entry_mut(&mut self, msgid: &str) -> &mut TranslationEntry {
        self.entries
            .entry(msgid.to_string())
            .or_insert_with(|| TranslationEntry {
                msgid: msgid.to_string(),
                ..Default::default()
            })
    }

    /// Serialized final write; per-locale work funnels through this one
    /// point.
    pub fn write(&self) -> Result<(), AnalyserError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Cache of translation objects keyed by `"<locale>:<namespace>"`.
#[derive(Debug, Default)]
pub struct TranslationRegistry {
    cache: HashMap<String, Translation>,
}

impl TranslationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translation_for(
        &mut self,
        library: &Library,
        locale: &str,
    ) -> Result<&mut Translation, AnalyserError> {
        let key = format!("{locale}:{}", library.namespace);
        let translation = self
            .cache
            .entry(key)
            .or_insert_with(|| Translation::new(library, locale));
        translation.check_read()?;
        Ok(translation)
    }

    /// Re-extract translations for a library: for every known class in its
    /// namespace, copy the per-source uses into the locale files, merging
    /// source references with de-duplicated line numbers.
    pub fn update_translations(
        &mut self,
        library: &Library,
        locales: &[String],
        db: &DbData,
    ) -> Result<(), AnalyserError> {
        for locale in locales {
            let translation = self.translation_for(library, locale)?;
            for (class_name, info) in &db.class_info {
                if info.library_name != library.namespace {
                    continue;
                }
                let reference_file = format!("{}.js", class_name.replace('.', "/"));
                for usage in &info.translations {
                    let entry = translation.entry_mut(&usage.msgid);
                    if entry.msgid_plural.is_none() {
                        entry.msgid_plural = usage.msgid_plural.clone();
                    }
                    if entry.comments.extracted.is_none() {
                        entry.comments.extracted = usage.comment.clone();
                    }
                    let lines = entry
                        .comments
                        .reference
                        .entry(reference_file.clone())
                        .or_default();
                    for line in usage.line_no.to_vec() {
                        if !lines.contains(&line) {
                            lines.push(line);
                        }
                    }
                }
            }
            translation.write()?;
            debug!(locale = %locale, namespace = %library.namespace, "updated translations");
        }
        Ok(())
    }
}
