use crate::compiler::ClassFile;
use crate::db::{ClassInfo, DbData};

/// Payload of the `compilingClass` and `compiledClass` events. Listeners may
/// mutate `info` before the row is saved.
pub struct ClassCompileEvent<'a> {
    pub class_name: &'a str,
    pub old: Option<&'a ClassInfo>,
    pub info: &'a mut ClassInfo,
    pub class_file: &'a dyn ClassFile,
}

/// Synchronous observer of analyser lifecycle events.
///
/// `compiling_class` strictly precedes `compiled_class` for the same class,
/// both fire exactly once per (re)compile, and `compiled_class` never fires
/// for a class whose compile failed. `save_database` fires before every
/// database write and may mutate the data about to be persisted.
pub trait AnalyserObserver {
    fn compiling_class(&mut self, _event: &mut ClassCompileEvent<'_>) {}

    fn compiled_class(&mut self, _event: &mut ClassCompileEvent<'_>) {}

    fn save_database(&mut self, _db: &mut DbData) {}
}
