use crate::config::AnalyserConfig;
use crate::db::ClassInfo;
use crate::error::AnalyserError;
use crate::library::Library;
use crate::meta::Meta;
use std::path::PathBuf;

/// One class going through the external compiler. The analyser drives the
/// capability set `{load, write_db_info, outer_class_meta, class_name}` and
/// nothing else.
pub trait ClassFile {
    fn class_name(&self) -> &str;

    /// Parse and compile the class. A failure here is fatal for the run.
    fn load(&mut self) -> Result<(), AnalyserError>;

    /// Populate the database row from the compiled class.
    fn write_db_info(&self, info: &mut ClassInfo) -> Result<(), AnalyserError>;

    /// The live meta of the freshly compiled class. Consumed once per
    /// compile; the meta cache owns it afterwards.
    fn outer_class_meta(&self) -> Meta;
}

/// Factory for `ClassFile` handles. The compiler itself is an external
/// collaborator; the analyser only hands it the class identity, the owning
/// library and its own configuration.
pub trait Compiler {
    fn open_class_file(
        &self,
        class_name: &str,
        library: &Library,
        config: &AnalyserConfig,
    ) -> Box<dyn ClassFile>;
}

/// Maps class names to output locations. Embedders supply their own layout to
/// relocate compiled files; meta always lands next to the output with a
/// `.meta.json` suffix.
pub trait OutputLayout {
    fn class_output_path(&self, class_name: &str) -> PathBuf;

    fn meta_path(&self, class_name: &str) -> PathBuf {
        let mut output = self.class_output_path(class_name).into_os_string();
        output.push(".meta.json");
        PathBuf::from(output)
    }
}

/// Default layout: `a.b.C` compiles to `<root>/a/b/C.js`.
#[derive(Debug, Clone)]
pub struct DefaultLayout {
    output_root: PathBuf,
}

impl DefaultLayout {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }
}

impl OutputLayout for DefaultLayout {
    fn class_output_path(&self, class_name: &str) -> PathBuf {
        let mut path = self.output_root.clone();
        for segment in class_name.split('.') {
            path.push(segment);
        }
        path.set_extension("js");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_maps_dots_to_directories() {
        let layout = DefaultLayout::new("out");
        assert_eq!(
            layout.class_output_path("app.ui.Button"),
            PathBuf::from("out/app/ui/Button.js")
        );
        assert_eq!(
            layout.meta_path("app.ui.Button"),
            PathBuf::from("out/app/ui/Button.js.meta.json")
        );
    }
}
