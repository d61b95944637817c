//! Post-merge descendant fixup: ancestors named by a recompiled class whose
//! own meta was not rebuilt in this run get their `descendants` list
//! recomputed from the database.

use crate::compiler::OutputLayout;
use crate::db::DbData;
use crate::error::AnalyserError;
use crate::meta::MetaCache;
use indexmap::IndexSet;
use tracing::debug;

/// `touched` is every class named as `extends`, `implement` or `include` in
/// the old or new row of a just-compiled class; `compiled` is the set the
/// merger already handled.
pub fn fixup_descendants(
    db: &DbData,
    touched: &IndexSet<String>,
    compiled: &IndexSet<String>,
    cache: &mut MetaCache,
    layout: &dyn OutputLayout,
) -> Result<(), AnalyserError> {
    for class_name in touched {
        if compiled.contains(class_name) || !db.class_info.contains_key(class_name) {
            continue;
        }
        let Some(meta_rc) = cache.load(class_name, layout) else {
            continue;
        };
        let descendants: Vec<String> = db
            .class_info
            .iter()
            .filter(|(_, info)| info.extends.as_deref() == Some(class_name.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        debug!(class = %class_name, count = descendants.len(), "refreshed descendants");
        meta_rc.borrow_mut().descendants = descendants;
        cache.save_meta(class_name, meta_rc)?;
    }
    Ok(())
}
