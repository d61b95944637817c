//! Shared fixture: a scripted compiler that reads JSON class descriptors
//! from the library source tree, plus a temp-dir project builder.

use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use vela_analyser::meta::{ClassKind, Meta, MemberMeta, PropertyMeta, SuperRef};
use vela_analyser::{
    Analyser, AnalyserConfig, AnalyserError, ClassFile, ClassInfo, Compiler, DefaultLayout,
    DependencyInfo, Library, OutputLayout, TranslationUse,
};

/// The source format the scripted compiler understands: one JSON object per
/// class file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub extends: Option<String>,
    pub implement: Vec<String>,
    pub include: Vec<String>,
    pub depends_on: IndexMap<String, DependencyInfo>,
    pub properties: IndexMap<String, serde_json::Value>,
    pub members: IndexMap<String, serde_json::Value>,
    pub translations: Vec<TranslationUse>,
    pub environment_checks: Vec<String>,
}

pub struct ScriptedClassFile {
    class_name: String,
    source_path: PathBuf,
    output_path: PathBuf,
    descriptor: Option<Descriptor>,
}

impl ClassFile for ScriptedClassFile {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn load(&mut self) -> Result<(), AnalyserError> {
        let text = fs::read_to_string(&self.source_path)?;
        let descriptor: Descriptor =
            serde_json::from_str(&text).map_err(|err| AnalyserError::Parse {
                class: self.class_name.clone(),
                message: err.to_string(),
            })?;
        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.output_path, &text)?;
        self.descriptor = Some(descriptor);
        Ok(())
    }

    fn write_db_info(&self, info: &mut ClassInfo) -> Result<(), AnalyserError> {
        let Some(descriptor) = &self.descriptor else {
            return Err(AnalyserError::Parse {
                class: self.class_name.clone(),
                message: "write_db_info before load".to_string(),
            });
        };
        info.extends = descriptor.extends.clone();
        info.implement = descriptor.implement.clone();
        info.include = descriptor.include.clone();
        info.depends_on = descriptor.depends_on.clone();
        for ancestor in descriptor
            .extends
            .iter()
            .chain(&descriptor.implement)
            .chain(&descriptor.include)
        {
            info.depends_on.entry(ancestor.clone()).or_default().load = true;
        }
        info.translations = descriptor.translations.clone();
        info.environment_checks = descriptor.environment_checks.clone();
        Ok(())
    }

    fn outer_class_meta(&self) -> Meta {
        let descriptor = self.descriptor.clone().unwrap_or_default();
        let kind = match descriptor.kind.as_deref() {
            Some("interface") => ClassKind::Interface,
            Some("mixin") => ClassKind::Mixin,
            _ => ClassKind::Class,
        };
        let mut meta = Meta::new(self.class_name.clone(), kind);
        meta.super_class = descriptor.extends.clone().map(SuperRef::One);
        meta.interfaces = descriptor.implement.clone();
        meta.mixins = descriptor.include.clone();
        for (name, value) in &descriptor.properties {
            let property: PropertyMeta =
                serde_json::from_value(value.clone()).unwrap_or_default();
            meta.properties.insert(name.clone(), property);
        }
        for (name, value) in &descriptor.members {
            let member: MemberMeta = serde_json::from_value(value.clone()).unwrap_or_default();
            meta.members.insert(name.clone(), member);
        }
        meta
    }
}

pub struct ScriptedCompiler;

impl Compiler for ScriptedCompiler {
    fn open_class_file(
        &self,
        class_name: &str,
        library: &Library,
        config: &AnalyserConfig,
    ) -> Box<dyn ClassFile> {
        let layout = DefaultLayout::new(config.output_root());
        Box::new(ScriptedClassFile {
            class_name: class_name.to_string(),
            source_path: library.source_file(class_name),
            output_path: layout.class_output_path(class_name),
            descriptor: None,
        })
    }
}

/// A throwaway project: one library named `app` under a temp dir.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("lib/source")).expect("source dir");
        Self { dir }
    }

    pub fn write_class(&self, class_name: &str, descriptor: serde_json::Value) {
        let mut path = self.dir.path().join("lib/source");
        for segment in class_name.split('.') {
            path.push(segment);
        }
        path.set_extension("js");
        fs::create_dir_all(path.parent().expect("class parent dir")).expect("class dirs");
        fs::write(path, serde_json::to_string_pretty(&descriptor).expect("descriptor"))
            .expect("class file");
    }

    /// Rewrite a class source so its mtime moves forward.
    pub fn touch_class(&self, class_name: &str, descriptor: serde_json::Value) {
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.write_class(class_name, descriptor);
    }

    pub fn library(&self) -> Library {
        Library::new("app", self.dir.path().join("lib"), "source", "1.0.0")
    }

    pub fn open_analyser(&self) -> Analyser {
        let config = AnalyserConfig::default()
            .with_output_dir(self.dir.path().join("out"))
            .with_db_filename(self.dir.path().join("db.json"));
        let mut analyser = Analyser::new(config, Box::new(ScriptedCompiler));
        analyser.add_library(self.library());
        analyser.open().expect("open analyser");
        analyser
    }

    pub fn meta(&self, class_name: &str) -> serde_json::Value {
        let layout = DefaultLayout::new(self.dir.path().join("out"));
        let text = fs::read_to_string(layout.meta_path(class_name)).expect("meta file");
        serde_json::from_str(&text).expect("meta json")
    }

    pub fn db_bytes(&self) -> String {
        fs::read_to_string(self.dir.path().join("db.json")).expect("db file")
    }

    pub fn meta_bytes(&self, class_name: &str) -> String {
        let layout = DefaultLayout::new(self.dir.path().join("out"));
        fs::read_to_string(layout.meta_path(class_name)).expect("meta file")
    }
}
