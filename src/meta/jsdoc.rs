//! Structured JSDoc carried by meta entries, plus the canonical texts for
//! synthesized property accessors.

use serde::{Deserialize, Serialize};

/// One `@param` tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamDoc {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// The `@return` tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnDoc {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Parsed documentation of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDoc>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnDoc>,
}

impl JsDoc {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Whether this doc carries a callable signature.
    pub fn has_signature(&self) -> bool {
        !self.params.is_empty() || self.returns.is_some()
    }
}

/// Resolve bare `{@link #member}` references against the owning class, so a
/// link written inside `app.ui.Button` points at `app.ui.Button#member`.
pub fn resolve_links(jsdoc: &mut JsDoc, class_name: &str) {
    if let Some(description) = jsdoc.description.take() {
        jsdoc.description = Some(resolve_links_in(&description, class_name));
    }
    for param in &mut jsdoc.params {
        if let Some(desc) = param.desc.take() {
            param.desc = Some(resolve_links_in(&desc, class_name));
        }
    }
    if let Some(returns) = &mut jsdoc.returns {
        if let Some(desc) = returns.desc.take() {
            returns.desc = Some(resolve_links_in(&desc, class_name));
        }
    }
}

fn resolve_links_in(text: &str, class_name: &str) -> String {
    const MARKER: &str = "{@link #";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        out.push_str(&rest[..pos]);
        out.push_str("{@link ");
        out.push_str(class_name);
        out.push('#');
        rest = &rest[pos + MARKER.len()..];
    }
    out.push_str(rest);
    out
}

/// Copy the `@param`/`@return` signature from `src` only if `src` has one and
/// `dst` does not; an existing destination signature is never overwritten.
pub fn merge_signature(dst: &mut JsDoc, src: &JsDoc) {
    if !src.has_signature() || dst.has_signature() {
        return;
    }
    dst.params = src.params.clone();
    dst.returns = src.returns.clone();
}

/// Same contract, lifted over optional docs: a destination is created when
/// the source would contribute a signature.
pub fn merge_signature_opt(dst: &mut Option<JsDoc>, src: Option<&JsDoc>) {
    let Some(src) = src else { return };
    if !src.has_signature() {
        return;
    }
    merge_signature(dst.get_or_insert_with(JsDoc::default), src);
}

pub fn getter_description(property: &str) -> String {
    format!(
        "Gets the (computed) value of the property `{property}`.\n\nFor further details take a look at the property definition: {{@link #{property}}}."
    )
}

pub fn setter_description(property: &str) -> String {
    format!(
        "Sets the user value of the property `{property}`.\n\nFor further details take a look at the property definition: {{@link #{property}}}."
    )
}

pub fn reset_description(property: &str) -> String {
    format!(
        "Resets the user value of the property `{property}`.\n\nThe computed value falls back to the next available value e.g. appearance, init or inheritance value depending on the property configuration and value availability.\n\nFor further details take a look at the property definition: {{@link #{property}}}."
    )
}

pub fn async_getter_description(property: &str) -> String {
    format!(
        "Returns a {{@link Promise}} which resolves to the (computed) value of the property `{property}`.\nFor further details take a look at the property definition: {{@link #{property}}}."
    )
}

pub fn async_setter_description(property: &str) -> String {
    format!(
        "Sets the user value of the property `{property}`, returns a {{@link Promise}} which resolves when the value change has fully completed (in the case where there are asynchronous apply methods or events).\n\nFor further details take a look at the property definition: {{@link #{property}}}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed() -> JsDoc {
        JsDoc {
            description: Some("src".to_string()),
            params: vec![ParamDoc {
                name: "value".to_string(),
                check: Some("String".to_string()),
                desc: None,
            }],
            returns: Some(ReturnDoc {
                check: Some("String".to_string()),
                desc: None,
            }),
        }
    }

    #[test]
    fn merge_copies_only_into_unsigned_destination() {
        let mut dst = JsDoc::with_description("dst");
        merge_signature(&mut dst, &signed());
        assert_eq!(dst.params.len(), 1);
        assert_eq!(dst.description.as_deref(), Some("dst"));
    }

    #[test]
    fn merge_never_overwrites_existing_signature() {
        let mut dst = JsDoc {
            returns: Some(ReturnDoc {
                check: Some("Number".to_string()),
                desc: None,
            }),
            ..JsDoc::default()
        };
        merge_signature(&mut dst, &signed());
        assert!(dst.params.is_empty());
        assert_eq!(dst.returns.as_ref().unwrap().check.as_deref(), Some("Number"));
    }

    #[test]
    fn merge_ignores_unsigned_source() {
        let mut dst = JsDoc::default();
        merge_signature(&mut dst, &JsDoc::with_description("only text"));
        assert!(!dst.has_signature());
    }

    #[test]
    fn links_resolve_against_owning_class() {
        let mut jsdoc = JsDoc::with_description("See {@link #getValue} and {@link other.Class#x}.");
        resolve_links(&mut jsdoc, "app.ui.Button");
        assert_eq!(
            jsdoc.description.as_deref(),
            Some("See {@link app.ui.Button#getValue} and {@link other.Class#x}.")
        );
    }

    #[test]
    fn canonical_texts_substitute_property_name() {
        assert_eq!(
            getter_description("enabled"),
            "Gets the (computed) value of the property `enabled`.\n\nFor further details take a look at the property definition: {@link #enabled}."
        );
        assert!(reset_description("enabled").contains("appearance, init or inheritance value"));
        assert!(async_setter_description("data").starts_with("Sets the user value of the property `data`, returns a {@link Promise}"));
    }
}
