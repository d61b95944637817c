// vela-analyser - Incremental class database and meta-model analyser
//
// Builds and maintains a persistent database describing every class in a set
// of libraries: what each class extends, implements or mixes in, which other
// classes, resources, locales and environment keys it depends on, and the
// merged class-entity meta model resolved across the full inheritance graph.

pub mod analyser;
pub mod closure;
pub mod compiler;
pub mod config;
pub mod db;
pub mod descendants;
pub mod error;
pub mod events;
pub mod library;
pub mod meta;
pub mod registries;
pub mod staleness;

pub use analyser::Analyser;
pub use compiler::{ClassFile, Compiler, DefaultLayout, OutputLayout};
pub use config::AnalyserConfig;
pub use db::{ClassDb, ClassInfo, DbData, DependencyInfo, LineRefs, TranslationUse};
pub use error::AnalyserError;
pub use events::{AnalyserObserver, ClassCompileEvent};
pub use library::{Library, LibraryIndex, SymbolInfo, SymbolType};
pub use meta::{Access, AccessorKind, ClassKind, JsDoc, MemberKind, Meta, MetaCache};
pub use registries::{
    CldrLoader, EnvironmentTracker, LocaleRegistry, Translation, TranslationEntry,
    TranslationRegistry,
};
pub use staleness::{Freshness, StaleReason};
