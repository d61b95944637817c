use crate::error::AnalyserError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk database format version. Files without a `version` key are treated
/// as current; files written by a newer analyser abort the run.
pub const DB_VERSION: u32 = 1;

/// Per-dependency flags recorded by the compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyInfo {
    #[serde(skip_serializing_if = "is_false")]
    pub load: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub construct: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub runtime: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub defer: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Line references in a translation use: scalar and array forms are both
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineRefs {
    One(u32),
    Many(Vec<u32>),
}

impl LineRefs {
    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            LineRefs::One(line) => vec![*line],
            LineRefs::Many(lines) => lines.clone(),
        }
    }
}

/// One translatable string extracted from a class source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUse {
    pub msgid: String,
    #[serde(
        rename = "msgid_plural",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub msgid_plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub line_no: LineRefs,
}

/// The database row for one class. Created on first compile, updated on every
/// recompile, never deleted by the analyser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassInfo {
    /// Source file mtime (milliseconds since the epoch) at the time of the
    /// last successful compile.
    pub mtime: u64,
    pub library_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implement: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub depends_on: IndexMap<String, DependencyInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<TranslationUse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment_checks: Vec<String>,
}

impl ClassInfo {
    /// The minimal row written before the compiler runs.
    pub fn minimal(mtime: u64, library_name: impl Into<String>) -> Self {
        Self {
            mtime,
            library_name: library_name.into(),
            ..Self::default()
        }
    }

    /// Names this class references through its inheritance declarations.
    pub fn ancestor_names(&self) -> impl Iterator<Item = &str> {
        self.extends
            .iter()
            .map(String::as_str)
            .chain(self.implement.iter().map(String::as_str))
            .chain(self.include.iter().map(String::as_str))
    }
}

/// Top-level contents of `db.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub class_info: IndexMap<String, ClassInfo>,
}

/// The persistent class database: an in-memory map hydrated from and written
/// back to a JSON file.
#[derive(Debug)]
pub struct ClassDb {
    path: PathBuf,
    pub data: DbData,
}

impl ClassDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: DbData::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The resource sub-db lives next to the primary DB.
    pub fn resource_db_path(&self) -> PathBuf {
        self.path.with_file_name("resource-db.json")
    }

    /// Hydrate from disk. Absent and empty files yield an empty database;
    /// the parser tolerates comments and trailing commas.
    pub fn load(&mut self) -> Result<(), AnalyserError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.data = DbData::default();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            self.data = DbData::default();
            return Ok(());
        }
        let data: DbData =
            serde_json::from_str(&strip_lenient_json(&text)).map_err(|err| {
                AnalyserError::DbParse {
                    path: self.path.clone(),
                    message: err.to_string(),
                }
            })?;
        if let Some(version) = data.version {
            if version > DB_VERSION {
                return Err(AnalyserError::DbParse {
                    path: self.path.clone(),
                    message: format!("unsupported database version {version}"),
                });
            }
        }
        debug!(classes = data.class_info.len(), path = %self.path.display(), "loaded class database");
        self.data = data;
        Ok(())
    }

    /// Write the database as pretty JSON. Callers fire the `saveDatabase`
    /// event before this so observers can mutate the data first.
    pub fn save(&mut self) -> Result<(), AnalyserError> {
        self.data.version = Some(DB_VERSION);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassInfo> {
        self.data.class_info.get(class_name)
    }

    pub fn put(&mut self, class_name: impl Into<String>, info: ClassInfo) {
        self.data.class_info.insert(class_name.into(), info);
    }
}

/// The resource sub-db is owned by the resource manager; the analyser only
/// hydrates and persists it alongside the primary DB.
#[derive(Debug)]
pub struct ResourceDb {
    path: PathBuf,
    pub data: serde_json::Value,
}

impl ResourceDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn load(&mut self) -> Result<(), AnalyserError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if !text.trim().is_empty() => {
                self.data = serde_json::from_str(&strip_lenient_json(&text))?;
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), AnalyserError> {
        let text = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Strip `//` and `/* */` comments and trailing commas so hand-edited
/// database files parse. String contents are preserved verbatim.
pub fn strip_lenient_json(text: &str) -> String {
    enum State {
        Normal,
        InString,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Normal;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                '"' => {
                    state = State::InString;
                    out.push(ch);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                ',' => {
                    // Drop the comma if the next significant character closes
                    // the containing object or array.
                    let mut lookahead = chars.clone();
                    let mut closes = false;
                    while let Some(next) = lookahead.next() {
                        match next {
                            c if c.is_whitespace() => continue,
                            '/' if lookahead.peek() == Some(&'/') => {
                                for skipped in lookahead.by_ref() {
                                    if skipped == '\n' {
                                        break;
                                    }
                                }
                            }
                            '/' if lookahead.peek() == Some(&'*') => {
                                lookahead.next();
                                let mut prev = ' ';
                                for skipped in lookahead.by_ref() {
                                    if prev == '*' && skipped == '/' {
                                        break;
                                    }
                                    prev = skipped;
                                }
                            }
                            '}' | ']' => {
                                closes = true;
                                break;
                            }
                            _ => break,
                        }
                    }
                    if !closes {
                        out.push(ch);
                    }
                }
                _ => out.push(ch),
            },
            State::InString => {
                out.push(ch);
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if ch == '"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if ch == '\n' {
                    out.push(ch);
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
        }
    }
    out
}
