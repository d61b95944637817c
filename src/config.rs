use indexmap::IndexMap;
use std::path::PathBuf;

/// Top-level configuration owned by the analyser.
#[derive(Debug, Clone)]
pub struct AnalyserConfig {
    /// Where compiled class files and their meta files land. `None` means the
    /// current directory.
    pub output_dir: Option<PathBuf>,
    /// Preserve line-number mapping during compilation.
    pub track_line_numbers: bool,
    /// When false the resource manager is not created and the resource sub-db
    /// is neither loaded nor saved.
    pub process_resources: bool,
    /// Forwarded to the compiler; stamps generated output with a timestamp.
    pub add_created_at: bool,
    /// Compile-time environment values consumed during compilation.
    pub environment: Option<IndexMap<String, serde_json::Value>>,
    /// Forwarded verbatim to the source transformer.
    pub babel_options: Option<serde_json::Value>,
    /// Primary database path.
    pub db_filename: PathBuf,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            track_line_numbers: false,
            process_resources: true,
            add_created_at: false,
            environment: None,
            babel_options: None,
            db_filename: PathBuf::from("db.json"),
        }
    }
}

impl AnalyserConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_db_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_filename = path.into();
        self
    }

    /// Effective output root for the default layout.
    pub fn output_root(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_default()
    }
}
