use crate::db::ClassInfo;
use std::fs;
use std::time::UNIX_EPOCH;

/// Why a class needs recompiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    NeverCompiled,
    SourceChanged,
    MissingOutput,
    MissingMeta,
    OutdatedOutput,
    Forced,
}

/// Verdict of the staleness oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// File stats the oracle consumes. `output_mtime` is `None` when the compiled
/// output file does not exist.
#[derive(Debug, Clone, Copy)]
pub struct ClassStats {
    pub source_mtime: u64,
    pub output_mtime: Option<u64>,
    pub meta_exists: bool,
}

/// A class is fresh iff a database row exists, its recorded mtime equals the
/// source mtime exactly, both output and meta files exist, and the output is
/// not older than the source.
pub fn classify(info: Option<&ClassInfo>, stats: ClassStats, force_scan: bool) -> Freshness {
    if force_scan {
        return Freshness::Stale(StaleReason::Forced);
    }
    let Some(info) = info else {
        return Freshness::Stale(StaleReason::NeverCompiled);
    };
    if info.mtime != stats.source_mtime {
        return Freshness::Stale(StaleReason::SourceChanged);
    }
    let Some(output_mtime) = stats.output_mtime else {
        return Freshness::Stale(StaleReason::MissingOutput);
    };
    if !stats.meta_exists {
        return Freshness::Stale(StaleReason::MissingMeta);
    }
    if output_mtime < stats.source_mtime {
        return Freshness::Stale(StaleReason::OutdatedOutput);
    }
    Freshness::Fresh
}

/// File mtime as milliseconds since the epoch.
pub fn mtime_millis(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
