//! The per-class meta model: the class descriptor produced by the compiler,
//! augmented by the merger with resolved inheritance, merged entities and
//! synthesized property accessors.

pub mod cache;
pub mod jsdoc;
pub mod merger;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use cache::MetaCache;
pub use jsdoc::JsDoc;
pub use merger::update_meta_data;

/// Member access, derived deterministically from the member name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    /// Leading `__` is private, leading `_` protected, anything else public.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("__") {
            Access::Private
        } else if name.starts_with('_') {
            Access::Protected
        } else {
            Access::Public
        }
    }
}

/// What kind of slot a member occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Function,
    Variable,
}

impl Default for MemberKind {
    fn default() -> Self {
        MemberKind::Function
    }
}

/// Kind of the class itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Mixin,
}

impl Default for ClassKind {
    fn default() -> Self {
        ClassKind::Class
    }
}

/// Which property accessor a synthesized member implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessorKind {
    Get,
    Is,
    Set,
    Reset,
    GetAsync,
    SetAsync,
    IsAsync,
}

/// An interface may extend several supers; classes and mixins have one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuperRef {
    One(String),
    Many(Vec<String>),
}

impl SuperRef {
    pub fn names(&self) -> &[String] {
        match self {
            SuperRef::One(name) => std::slice::from_ref(name),
            SuperRef::Many(names) => names,
        }
    }
}

/// A member or static entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberMeta {
    #[serde(rename = "type")]
    pub kind: MemberKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub mixin: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub inherited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<AccessorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub appears_in: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridden_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsdoc: Option<JsDoc>,
}

/// A declared property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(rename = "async", skip_serializing_if = "is_false")]
    pub is_async: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub refine: bool,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub mixin: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub inherited: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub appears_in: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridden_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsdoc: Option<JsDoc>,
}

/// A declared event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventMeta {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsdoc: Option<JsDoc>,
}

/// Documentation slot for the class itself and its lifecycle functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsdoc: Option<JsDoc>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The full per-class descriptor, persisted as `<output path>.meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    pub class_name: String,
    #[serde(rename = "type")]
    pub kind: ClassKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub super_class: Option<SuperRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, PropertyMeta>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub members: IndexMap<String, MemberMeta>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub statics: IndexMap<String, MemberMeta>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub events: IndexMap<String, EventMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub descendants: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clazz: Option<SlotMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construct: Option<SlotMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destruct: Option<SlotMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defer: Option<SlotMeta>,
}

impl Meta {
    pub fn new(class_name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            class_name: class_name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Super classes in walk order; empty when the class has none.
    pub fn super_classes(&self) -> &[String] {
        self.super_class.as_ref().map(SuperRef::names).unwrap_or(&[])
    }
}
