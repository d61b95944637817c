//! The analyser itself: owns the library index, the class database, the meta
//! cache and the registries, and drives the per-run pipeline of dependency
//! closure, meta merge, descendant fixup and persistence.

use crate::closure::{self, Worklist};
use crate::compiler::{Compiler, DefaultLayout, OutputLayout};
use crate::config::AnalyserConfig;
use crate::db::{ClassDb, ClassInfo, ResourceDb};
use crate::descendants;
use crate::error::AnalyserError;
use crate::events::{AnalyserObserver, ClassCompileEvent};
use crate::library::{Library, LibraryIndex, SymbolInfo};
use crate::meta::{merger, MetaCache};
use crate::registries::{
    CldrCache, CldrLoader, EnvironmentTracker, LocaleRegistry, TranslationRegistry,
};
use crate::staleness::{self, ClassStats};
use indexmap::IndexSet;
use std::fs;
use tracing::{debug, info, warn};

struct CompileOutcome {
    info: ClassInfo,
    old: Option<ClassInfo>,
    recompiled: bool,
}

/// One analyser instance owns its database and meta cache for its lifetime;
/// multiple instances must be kept disjoint by distinct `db_filename`s.
pub struct Analyser {
    config: AnalyserConfig,
    compiler: Box<dyn Compiler>,
    layout: Box<dyn OutputLayout>,
    libraries: LibraryIndex,
    db: ClassDb,
    resource_db: Option<ResourceDb>,
    observers: Vec<Box<dyn AnalyserObserver>>,
    meta_cache: MetaCache,
    environment: EnvironmentTracker,
    locales: LocaleRegistry,
    cldr: CldrCache,
    translations: TranslationRegistry,
    opened: bool,
}

impl Analyser {
    pub fn new(config: AnalyserConfig, compiler: Box<dyn Compiler>) -> Self {
        let layout = Box::new(DefaultLayout::new(config.output_root()));
        let db = ClassDb::new(&config.db_filename);
        let mut environment = EnvironmentTracker::new();
        if let Some(values) = &config.environment {
            environment.set_all(values.clone());
        }
        Self {
            config,
            compiler,
            layout,
            libraries: LibraryIndex::new(),
            db,
            resource_db: None,
            observers: Vec::new(),
            meta_cache: MetaCache::new(),
            environment,
            locales: LocaleRegistry::new(),
            cldr: CldrCache::new(),
            translations: TranslationRegistry::new(),
            opened: false,
        }
    }

    /// Replace the default output layout.
    pub fn with_layout(mut self, layout: Box<dyn OutputLayout>) -> Self {
        self.layout = layout;
        self
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    pub fn add_library(&mut self, library: Library) {
        self.libraries.add_library(library);
    }

    pub fn find_library(&self, namespace: &str) -> Option<&Library> {
        self.libraries.find_library(namespace)
    }

    pub fn get_symbol_type(&self, name: &str) -> Option<SymbolInfo> {
        self.libraries.get_symbol_type(name)
    }

    pub fn add_observer(&mut self, observer: Box<dyn AnalyserObserver>) {
        self.observers.push(observer);
    }

    pub fn database(&self) -> &ClassDb {
        &self.db
    }

    pub fn environment(&mut self) -> &mut EnvironmentTracker {
        &mut self.environment
    }

    pub fn locales(&mut self) -> &mut LocaleRegistry {
        &mut self.locales
    }

    /// Lazily loaded CLDR data for a locale.
    pub fn cldr(
        &mut self,
        locale: &str,
        loader: &dyn CldrLoader,
    ) -> Result<&serde_json::Value, AnalyserError> {
        self.cldr.get_or_load(locale, loader)
    }

    /// Hydrate the database and the resource sub-db, then scan every
    /// registered library for class files.
    pub fn open(&mut self) -> Result<(), AnalyserError> {
        if self.opened {
            return Ok(());
        }
        self.db.load()?;
        if self.config.process_resources {
            let mut resource_db = ResourceDb::new(self.db.resource_db_path());
            resource_db.load()?;
            self.resource_db = Some(resource_db);
        }
        self.libraries.scan_all()?;
        self.opened = true;
        info!(classes = self.db.data.class_info.len(), "analyser opened");
        Ok(())
    }

    /// Compile one class if it is cold or stale and return its database row.
    pub fn get_class_info(
        &mut self,
        class_name: &str,
        force_scan: bool,
    ) -> Result<ClassInfo, AnalyserError> {
        Ok(self.dispatch(class_name, force_scan)?.info)
    }

    /// Analyse the transitive dependency closure of `seed`: compile every
    /// cold or stale class, lift indirect load dependencies, merge meta,
    /// fix up descendants, then persist meta and the database. Returns the
    /// classes compiled in this run, in compile order.
    pub fn analyse_classes<S: AsRef<str>>(
        &mut self,
        seed: &[S],
    ) -> Result<Vec<String>, AnalyserError> {
        self.meta_cache.reset();
        let mut worklist = Worklist::from_seed(seed.iter().map(|name| name.as_ref().to_string()));
        let mut compiled: IndexSet<String> = IndexSet::new();
        let mut touched: IndexSet<String> = IndexSet::new();

        while let Some(class_name) = worklist.next() {
            match self.dispatch(&class_name, false) {
                Ok(outcome) => {
                    if outcome.recompiled {
                        compiled.insert(class_name.clone());
                        if let Some(old) = &outcome.old {
                            touched.extend(old.ancestor_names().map(str::to_string));
                        }
                        touched.extend(outcome.info.ancestor_names().map(str::to_string));
                    }
                    for dependency in outcome.info.depends_on.keys() {
                        worklist.add(dependency.clone());
                    }
                }
                Err(err) if err.is_no_class_file() => {
                    warn!(class = %class_name, "no class file, skipping dependency");
                }
                Err(err) => return Err(err),
            }
        }

        closure::lift_load_dependencies(&mut self.db.data, worklist.visited());

        for class_name in &compiled {
            merger::update_meta_data(
                class_name,
                &self.db.data,
                &mut self.meta_cache,
                self.layout.as_ref(),
            )?;
        }
        descendants::fixup_descendants(
            &self.db.data,
            &touched,
            &compiled,
            &mut self.meta_cache,
            self.layout.as_ref(),
        )?;
        self.meta_cache.flush(self.layout.as_ref())?;
        self.save_database()?;

        info!(
            compiled = compiled.len(),
            visited = worklist.visited().len(),
            "analyse run complete"
        );
        Ok(compiled.into_iter().collect())
    }

    /// Fire `saveDatabase` and persist the database (and the resource sub-db
    /// when resources are processed). The on-disk file is only ever
    /// overwritten here.
    pub fn save_database(&mut self) -> Result<(), AnalyserError> {
        for observer in &mut self.observers {
            observer.save_database(&mut self.db.data);
        }
        self.db.save()?;
        if let Some(resource_db) = &self.resource_db {
            resource_db.save()?;
        }
        Ok(())
    }

    /// Re-extract the translation files of one library for the given
    /// locales.
    pub fn update_translations(
        &mut self,
        library: &Library,
        locales: &[String],
    ) -> Result<(), AnalyserError> {
        self.translations
            .update_translations(library, locales, &self.db.data)
    }

    fn dispatch(
        &mut self,
        class_name: &str,
        force_scan: bool,
    ) -> Result<CompileOutcome, AnalyserError> {
        let library = self
            .libraries
            .library_for_class(class_name)
            .cloned()
            .ok_or_else(|| AnalyserError::NoClassFile {
                class: class_name.to_string(),
            })?;

        let source_path = library.source_file(class_name);
        let source_meta = match fs::metadata(&source_path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyserError::NoClassFile {
                    class: class_name.to_string(),
                });
            }
            Err(err) => {
                return Err(AnalyserError::SourceIo {
                    path: source_path,
                    source: err,
                });
            }
        };
        let stats = ClassStats {
            source_mtime: staleness::mtime_millis(&source_meta),
            output_mtime: fs::metadata(self.layout.class_output_path(class_name))
                .ok()
                .map(|meta| staleness::mtime_millis(&meta)),
            meta_exists: self.layout.meta_path(class_name).exists(),
        };

        let freshness = staleness::classify(self.db.get(class_name), stats, force_scan);
        if freshness.is_fresh() {
            let info = self
                .db
                .get(class_name)
                .cloned()
                .unwrap_or_default();
            return Ok(CompileOutcome {
                info,
                old: None,
                recompiled: false,
            });
        }
        debug!(class = %class_name, reason = ?freshness, "class is stale");

        let old = self.db.get(class_name).cloned();
        let mut info = ClassInfo::minimal(stats.source_mtime, &library.namespace);
        self.libraries.register_class(class_name, &library.namespace);
        self.db.put(class_name, info.clone());

        let mut class_file = self
            .compiler
            .open_class_file(class_name, &library, &self.config);
        {
            let mut event = ClassCompileEvent {
                class_name,
                old: old.as_ref(),
                info: &mut info,
                class_file: &*class_file,
            };
            for observer in &mut self.observers {
                observer.compiling_class(&mut event);
            }
        }

        class_file.load()?;
        class_file.write_db_info(&mut info)?;
        self.meta_cache
            .seed_live(class_name, class_file.outer_class_meta());

        {
            let mut event = ClassCompileEvent {
                class_name,
                old: old.as_ref(),
                info: &mut info,
                class_file: &*class_file,
            };
            for observer in &mut self.observers {
                observer.compiled_class(&mut event);
            }
        }

        self.environment
            .record_checks(info.environment_checks.iter().map(String::as_str));
        self.db.put(class_name, info.clone());
        Ok(CompileOutcome {
            info,
            old,
            recompiled: true,
        })
    }
}
