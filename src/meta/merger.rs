//! The meta merger: walks the inheritance graph of a freshly compiled class,
//! computes the merged entity table and synthesizes property accessors.

use crate::compiler::OutputLayout;
use crate::db::DbData;
use crate::error::AnalyserError;
use crate::meta::cache::MetaCache;
use crate::meta::jsdoc::{self, JsDoc, ParamDoc, ReturnDoc};
use crate::meta::{Access, AccessorKind, ClassKind, MemberKind, MemberMeta, Meta, PropertyMeta};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One row of the working entity table.
#[derive(Debug, Clone)]
struct EntityRow {
    /// Ancestor name -> ancestor kind; never contains the declaring class.
    appears_in: IndexMap<String, ClassKind>,
    /// Nearest ancestor in walk order that defines the entity.
    overridden_from: Option<String>,
    is_abstract: bool,
    from_interface: bool,
    mixin: bool,
    inherited: bool,
    access: Access,
    property: Option<AccessorKind>,
    jsdoc: JsDoc,
    check: Option<String>,
    is_async: bool,
}

impl EntityRow {
    fn new(name: &str, supplier_kind: ClassKind, first: bool) -> Self {
        Self {
            appears_in: IndexMap::new(),
            overridden_from: None,
            is_abstract: supplier_kind == ClassKind::Interface,
            from_interface: false,
            mixin: supplier_kind == ClassKind::Mixin,
            inherited: !first,
            access: Access::from_name(name),
            property: None,
            jsdoc: JsDoc::default(),
            check: None,
            is_async: false,
        }
    }

    fn appears_in_names(&self) -> Vec<String> {
        self.appears_in.keys().cloned().collect()
    }
}

#[derive(Debug, Default)]
struct ClassEntities {
    members: IndexMap<String, EntityRow>,
    properties: IndexMap<String, EntityRow>,
}

/// What one visited ancestor contributes; snapshotted so no meta borrow is
/// held across recursion.
struct AncestorSnapshot {
    kind: ClassKind,
    members: Vec<(String, SrcEntity)>,
    properties: Vec<(String, SrcEntity)>,
    interfaces: Vec<String>,
    mixins: Vec<String>,
    supers: Vec<String>,
}

struct SrcEntity {
    jsdoc: Option<JsDoc>,
    check: Option<String>,
    is_async: bool,
}

/// Merge one freshly compiled class: JSDoc fixup, entity merge over the
/// ancestor graph, accessor synthesis, write-back, and descendant recompute.
/// The result is staged in the meta cache for the end-of-run flush.
pub fn update_meta_data(
    class_name: &str,
    db: &DbData,
    cache: &mut MetaCache,
    layout: &dyn OutputLayout,
) -> Result<(), AnalyserError> {
    let Some(meta_rc) = cache.load(class_name, layout) else {
        warn!(class = %class_name, "no meta to merge");
        return Ok(());
    };

    fixup_jsdoc(&mut meta_rc.borrow_mut());

    let mut entities = ClassEntities::default();
    let mut visited = HashSet::new();
    walk(class_name, true, &mut entities, &mut visited, cache, layout);
    synthesize_accessors(&mut entities);

    {
        let mut meta = meta_rc.borrow_mut();
        write_back(&mut meta, &entities);
        meta.descendants = db
            .class_info
            .iter()
            .filter(|(_, info)| info.extends.as_deref() == Some(class_name))
            .map(|(name, _)| name.clone())
            .collect();
    }
    debug!(class = %class_name, members = entities.members.len(), "merged class entities");

    cache.save_meta(class_name, meta_rc)
}

/// Pass 1: parse every entity's JSDoc against the owning class name so
/// `{@link #member}` references resolve.
fn fixup_jsdoc(meta: &mut Meta) {
    let class_name = meta.class_name.clone();
    let resolve = |doc: &mut Option<JsDoc>| {
        if let Some(doc) = doc {
            jsdoc::resolve_links(doc, &class_name);
        }
    };
    for property in meta.properties.values_mut() {
        resolve(&mut property.jsdoc);
    }
    for event in meta.events.values_mut() {
        resolve(&mut event.jsdoc);
    }
    for member in meta.members.values_mut() {
        resolve(&mut member.jsdoc);
    }
    for static_member in meta.statics.values_mut() {
        resolve(&mut static_member.jsdoc);
    }
    for slot in [
        &mut meta.clazz,
        &mut meta.construct,
        &mut meta.destruct,
        &mut meta.defer,
    ] {
        if let Some(slot) = slot {
            resolve(&mut slot.jsdoc);
        }
    }
}

/// Pass 2: recursive ancestor walk. Order at every level: own entities, then
/// interfaces, then mixins, then super(s). Reentry into an already-visited
/// class terminates the branch, so cyclic input cannot loop.
fn walk(
    class_name: &str,
    first: bool,
    entities: &mut ClassEntities,
    visited: &mut HashSet<String>,
    cache: &mut MetaCache,
    layout: &dyn OutputLayout,
) {
    if !visited.insert(class_name.to_string()) {
        return;
    }
    let Some(meta_rc) = cache.load(class_name, layout) else {
        return;
    };
    let snapshot = snapshot_of(&meta_rc.borrow());

    for (name, src) in &snapshot.members {
        record(&mut entities.members, name, class_name, snapshot.kind, first, src);
    }
    for (name, src) in &snapshot.properties {
        record(
            &mut entities.properties,
            name,
            class_name,
            snapshot.kind,
            first,
            src,
        );
    }

    for interface in &snapshot.interfaces {
        walk(interface, false, entities, visited, cache, layout);
    }
    for mixin in &snapshot.mixins {
        walk(mixin, false, entities, visited, cache, layout);
    }
    for super_class in &snapshot.supers {
        walk(super_class, false, entities, visited, cache, layout);
    }
}

fn snapshot_of(meta: &Meta) -> AncestorSnapshot {
    AncestorSnapshot {
        kind: meta.kind,
        members: meta
            .members
            .iter()
            .filter(|(_, member)| member.kind == MemberKind::Function)
            .map(|(name, member)| {
                (
                    name.clone(),
                    SrcEntity {
                        jsdoc: member.jsdoc.clone(),
                        check: None,
                        is_async: false,
                    },
                )
            })
            .collect(),
        properties: meta
            .properties
            .iter()
            .map(|(name, property)| {
                (
                    name.clone(),
                    SrcEntity {
                        jsdoc: property.jsdoc.clone(),
                        check: property.check.clone(),
                        is_async: property.is_async,
                    },
                )
            })
            .collect(),
        interfaces: meta.interfaces.clone(),
        mixins: meta.mixins.clone(),
        supers: meta.super_classes().to_vec(),
    }
}

fn record(
    table: &mut IndexMap<String, EntityRow>,
    name: &str,
    supplier: &str,
    supplier_kind: ClassKind,
    first: bool,
    src: &SrcEntity,
) {
    let row = table
        .entry(name.to_string())
        .or_insert_with(|| EntityRow::new(name, supplier_kind, first));

    // Any mixin supplier marks the entity, no matter where the walk saw it.
    if supplier_kind == ClassKind::Mixin {
        row.mixin = true;
    }
    if supplier_kind == ClassKind::Interface {
        row.from_interface = true;
    } else {
        row.is_abstract = false;
    }
    if !first {
        row.appears_in
            .entry(supplier.to_string())
            .or_insert(supplier_kind);
        if row.overridden_from.is_none() {
            row.overridden_from = Some(supplier.to_string());
        }
    }
    if row.check.is_none() {
        row.check = src.check.clone();
    }
    if src.is_async {
        row.is_async = true;
    }
    if let Some(src_jsdoc) = &src.jsdoc {
        jsdoc::merge_signature(&mut row.jsdoc, src_jsdoc);
    }
}

/// Every property must end up with its full accessor family. A synthesized
/// accessor never replaces a concrete user-supplied member, but does replace
/// an inherited abstract one.
fn synthesize_accessors(entities: &mut ClassEntities) {
    let properties: Vec<(String, EntityRow)> = entities
        .properties
        .iter()
        .map(|(name, row)| (name.clone(), row.clone()))
        .collect();

    for (property_name, property) in properties {
        let boolean = property.check.as_deref() == Some("Boolean");
        let upper = upname(&property_name);

        let mut accessors: Vec<(AccessorKind, String)> =
            vec![(AccessorKind::Get, format!("get{upper}"))];
        if boolean {
            accessors.push((AccessorKind::Is, format!("is{upper}")));
        }
        accessors.push((AccessorKind::Set, format!("set{upper}")));
        accessors.push((AccessorKind::Reset, format!("reset{upper}")));
        if property.is_async {
            accessors.push((AccessorKind::GetAsync, format!("get{upper}Async")));
            accessors.push((AccessorKind::SetAsync, format!("set{upper}Async")));
            if boolean {
                accessors.push((AccessorKind::IsAsync, format!("is{upper}Async")));
            }
        }

        for (kind, member_name) in accessors {
            if let Some(existing) = entities.members.get(&member_name) {
                if !existing.is_abstract {
                    continue;
                }
            }
            let row = EntityRow {
                appears_in: IndexMap::new(),
                overridden_from: None,
                is_abstract: false,
                from_interface: false,
                mixin: property.mixin,
                inherited: property.inherited,
                access: Access::Public,
                property: Some(kind),
                jsdoc: accessor_jsdoc(kind, &property_name, property.check.as_deref()),
                check: None,
                is_async: false,
            };
            entities.members.insert(member_name, row);
        }
    }
}

fn accessor_jsdoc(kind: AccessorKind, property: &str, check: Option<&str>) -> JsDoc {
    let value_param = |check: Option<&str>| ParamDoc {
        name: "value".to_string(),
        check: check.map(str::to_string),
        desc: None,
    };
    match kind {
        AccessorKind::Get => JsDoc {
            description: Some(jsdoc::getter_description(property)),
            params: Vec::new(),
            returns: Some(ReturnDoc {
                check: check.map(str::to_string),
                desc: None,
            }),
        },
        AccessorKind::Is => JsDoc {
            description: Some(jsdoc::getter_description(property)),
            params: Vec::new(),
            returns: Some(ReturnDoc {
                check: Some("Boolean".to_string()),
                desc: None,
            }),
        },
        AccessorKind::Set => JsDoc {
            description: Some(jsdoc::setter_description(property)),
            params: vec![value_param(check)],
            returns: None,
        },
        AccessorKind::Reset => JsDoc {
            description: Some(jsdoc::reset_description(property)),
            params: Vec::new(),
            returns: None,
        },
        AccessorKind::GetAsync | AccessorKind::IsAsync => JsDoc {
            description: Some(jsdoc::async_getter_description(property)),
            params: Vec::new(),
            returns: Some(ReturnDoc {
                check: Some("Promise".to_string()),
                desc: None,
            }),
        },
        AccessorKind::SetAsync => JsDoc {
            description: Some(jsdoc::async_setter_description(property)),
            params: vec![value_param(check)],
            returns: Some(ReturnDoc {
                check: Some("Promise".to_string()),
                desc: None,
            }),
        },
    }
}

fn write_back(meta: &mut Meta, entities: &ClassEntities) {
    // Refined properties take their resolution from the table.
    for (name, property) in meta.properties.iter_mut() {
        if !property.refine {
            continue;
        }
        if let Some(row) = entities.properties.get(name) {
            property.overridden_from = row.overridden_from.clone();
            property.appears_in = row.appears_in_names();
            jsdoc::merge_signature_opt(&mut property.jsdoc, Some(&row.jsdoc));
        }
    }

    // Abstract- or mixin-originated properties the class does not declare.
    for (name, row) in &entities.properties {
        if !(row.is_abstract || row.mixin) || meta.properties.contains_key(name) {
            continue;
        }
        meta.properties.insert(
            name.clone(),
            PropertyMeta {
                check: row.check.clone(),
                is_async: row.is_async,
                refine: false,
                is_abstract: row.is_abstract,
                mixin: row.mixin,
                inherited: true,
                appears_in: row.appears_in_names(),
                overridden_from: row.overridden_from.clone(),
                jsdoc: None,
            },
        );
    }

    let mut became_abstract = false;
    for (name, row) in &entities.members {
        if let Some(member) = meta.members.get_mut(name) {
            if member.kind == MemberKind::Variable {
                member.kind = MemberKind::Function;
            }
            if row.property.is_some() && member.is_abstract {
                *member = materialize_member(row);
                continue;
            }
            member.appears_in = row.appears_in_names();
            member.overridden_from = row.overridden_from.clone();
            member.access = Some(row.access);
            if row.mixin {
                member.mixin = true;
            }
            if row.is_abstract {
                member.is_abstract = true;
            }
            jsdoc::merge_signature_opt(&mut member.jsdoc, Some(&row.jsdoc));
            continue;
        }
        if !(row.is_abstract || row.mixin || row.property.is_some()) {
            continue;
        }
        if row.is_abstract {
            became_abstract = true;
        }
        meta.members.insert(name.clone(), materialize_member(row));
    }
    if became_abstract {
        meta.is_abstract = true;
    }
}

fn materialize_member(row: &EntityRow) -> MemberMeta {
    MemberMeta {
        kind: MemberKind::Function,
        access: Some(row.access),
        is_abstract: row.is_abstract,
        mixin: row.mixin,
        inherited: row.inherited,
        property: row.property,
        appears_in: row.appears_in_names(),
        overridden_from: row.overridden_from.clone(),
        jsdoc: if row.jsdoc == JsDoc::default() {
            None
        } else {
            Some(row.jsdoc.clone())
        },
    }
}

fn upname(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::DefaultLayout;
    use crate::db::ClassInfo;

    fn function_member() -> MemberMeta {
        MemberMeta::default()
    }

    fn merge(cache: &mut MetaCache, db: &DbData, class_name: &str) -> Meta {
        let layout = DefaultLayout::new("unused");
        update_meta_data(class_name, db, cache, &layout).unwrap();
        let meta = cache.load(class_name, &layout).unwrap();
        let cloned = meta.borrow().clone();
        cloned
    }

    fn seed(cache: &mut MetaCache, meta: Meta) {
        let name = meta.class_name.clone();
        cache.seed_live(&name, meta);
    }

    #[test]
    fn override_resolves_to_nearest_ancestor() {
        let mut cache = MetaCache::new();
        let mut base = Meta::new("app.A", ClassKind::Class);
        base.members.insert("foo".to_string(), function_member());
        seed(&mut cache, base);

        let mut derived = Meta::new("app.B", ClassKind::Class);
        derived.super_class = Some(crate::meta::SuperRef::One("app.A".to_string()));
        derived.members.insert("foo".to_string(), function_member());
        seed(&mut cache, derived);

        let mut db = DbData::default();
        db.class_info.insert("app.A".to_string(), ClassInfo::minimal(1, "app"));
        let mut b_info = ClassInfo::minimal(1, "app");
        b_info.extends = Some("app.A".to_string());
        db.class_info.insert("app.B".to_string(), b_info);

        let merged = merge(&mut cache, &db, "app.B");
        let foo = &merged.members["foo"];
        assert_eq!(foo.overridden_from.as_deref(), Some("app.A"));
        assert_eq!(foo.appears_in, vec!["app.A".to_string()]);
        assert!(!foo.inherited);

        let merged_base = merge(&mut cache, &db, "app.A");
        assert_eq!(merged_base.descendants, vec!["app.B".to_string()]);
        assert!(merged_base.members["foo"].appears_in.is_empty());
        assert_eq!(merged_base.members["foo"].overridden_from, None);
    }

    #[test]
    fn interface_member_stays_abstract_unless_defined() {
        let mut cache = MetaCache::new();
        let mut interface = Meta::new("app.IRunnable", ClassKind::Interface);
        interface.members.insert("bar".to_string(), function_member());
        seed(&mut cache, interface.clone());

        // Implementing class without a definition: abstract propagates.
        let mut lazy = Meta::new("app.Lazy", ClassKind::Class);
        lazy.interfaces = vec!["app.IRunnable".to_string()];
        seed(&mut cache, lazy);

        let db = DbData::default();
        let merged = merge(&mut cache, &db, "app.Lazy");
        assert!(merged.members["bar"].is_abstract);
        assert!(merged.is_abstract);
        assert_eq!(
            merged.members["bar"].overridden_from.as_deref(),
            Some("app.IRunnable")
        );

        // Defining class: the concrete source clears abstract.
        let mut cache = MetaCache::new();
        seed(&mut cache, interface);
        let mut eager = Meta::new("app.Eager", ClassKind::Class);
        eager.interfaces = vec!["app.IRunnable".to_string()];
        eager.members.insert("bar".to_string(), function_member());
        seed(&mut cache, eager);

        let merged = merge(&mut cache, &db, "app.Eager");
        assert!(!merged.members["bar"].is_abstract);
        assert!(!merged.is_abstract);
    }

    #[test]
    fn mixin_supplier_sets_mixin_flag() {
        let mut cache = MetaCache::new();
        let mut mixin = Meta::new("app.MColor", ClassKind::Mixin);
        mixin.members.insert("tint".to_string(), function_member());
        seed(&mut cache, mixin);

        let mut class = Meta::new("app.Shape", ClassKind::Class);
        class.mixins = vec!["app.MColor".to_string()];
        seed(&mut cache, class);

        let merged = merge(&mut cache, &DbData::default(), "app.Shape");
        let tint = &merged.members["tint"];
        assert!(tint.mixin);
        assert!(!tint.is_abstract);
        assert!(tint.inherited);
    }

    #[test]
    fn own_override_of_mixin_member_keeps_mixin_flag() {
        let mut cache = MetaCache::new();
        let mut mixin = Meta::new("app.MColor", ClassKind::Mixin);
        mixin.members.insert("tint".to_string(), function_member());
        seed(&mut cache, mixin);

        // The class declares its own concrete tint and mixes MColor in, so
        // the row is non-abstract before the walk reaches the mixin.
        let mut class = Meta::new("app.Shape", ClassKind::Class);
        class.mixins = vec!["app.MColor".to_string()];
        class.members.insert("tint".to_string(), function_member());
        seed(&mut cache, class);

        let merged = merge(&mut cache, &DbData::default(), "app.Shape");
        let tint = &merged.members["tint"];
        assert!(tint.mixin);
        assert!(!tint.is_abstract);
        assert!(!tint.inherited);
        assert_eq!(tint.appears_in, vec!["app.MColor".to_string()]);
        assert_eq!(tint.overridden_from.as_deref(), Some("app.MColor"));
    }

    #[test]
    fn boolean_property_gets_full_accessor_family() {
        let mut cache = MetaCache::new();
        let mut class = Meta::new("app.Widget", ClassKind::Class);
        class.properties.insert(
            "enabled".to_string(),
            PropertyMeta {
                check: Some("Boolean".to_string()),
                ..Default::default()
            },
        );
        seed(&mut cache, class);

        let merged = merge(&mut cache, &DbData::default(), "app.Widget");
        for (name, kind) in [
            ("getEnabled", AccessorKind::Get),
            ("isEnabled", AccessorKind::Is),
            ("setEnabled", AccessorKind::Set),
            ("resetEnabled", AccessorKind::Reset),
        ] {
            let member = &merged.members[name];
            assert_eq!(member.property, Some(kind), "{name}");
            assert_eq!(member.access, Some(Access::Public));
        }
        assert!(!merged.members.contains_key("getEnabledAsync"));

        let getter = merged.members["getEnabled"].jsdoc.as_ref().unwrap();
        assert_eq!(
            getter.description.as_deref(),
            Some(jsdoc::getter_description("enabled").as_str())
        );
        assert_eq!(
            getter.returns.as_ref().unwrap().check.as_deref(),
            Some("Boolean")
        );
    }

    #[test]
    fn async_property_gets_promise_typed_async_accessors() {
        let mut cache = MetaCache::new();
        let mut class = Meta::new("app.Feed", ClassKind::Class);
        class.properties.insert(
            "data".to_string(),
            PropertyMeta {
                check: Some("String".to_string()),
                is_async: true,
                ..Default::default()
            },
        );
        seed(&mut cache, class);

        let merged = merge(&mut cache, &DbData::default(), "app.Feed");
        for name in ["getData", "getDataAsync", "setData", "setDataAsync", "resetData"] {
            assert!(merged.members.contains_key(name), "{name}");
        }
        for name in ["getDataAsync", "setDataAsync"] {
            let returns = merged.members[name]
                .jsdoc
                .as_ref()
                .unwrap()
                .returns
                .as_ref()
                .unwrap();
            assert_eq!(returns.check.as_deref(), Some("Promise"));
        }
        assert!(!merged.members.contains_key("isData"));
    }

    #[test]
    fn concrete_member_survives_synthesis_but_abstract_is_replaced() {
        let mut cache = MetaCache::new();
        let mut interface = Meta::new("app.IValue", ClassKind::Interface);
        interface
            .members
            .insert("getValue".to_string(), function_member());
        seed(&mut cache, interface);

        let mut class = Meta::new("app.Field", ClassKind::Class);
        class.interfaces = vec!["app.IValue".to_string()];
        class.properties.insert(
            "value".to_string(),
            PropertyMeta {
                check: Some("String".to_string()),
                ..Default::default()
            },
        );
        class
            .members
            .insert("setValue".to_string(), function_member());
        seed(&mut cache, class);

        let merged = merge(&mut cache, &DbData::default(), "app.Field");
        // The inherited abstract getValue was replaced by the synthesized one.
        let getter = &merged.members["getValue"];
        assert_eq!(getter.property, Some(AccessorKind::Get));
        assert!(!getter.is_abstract);
        // The concrete user-supplied setValue was kept.
        assert_eq!(merged.members["setValue"].property, None);
        assert!(!merged.is_abstract);
    }

    #[test]
    fn refined_property_copies_resolution_from_table() {
        let mut cache = MetaCache::new();
        let mut base = Meta::new("app.Base", ClassKind::Class);
        base.properties.insert(
            "width".to_string(),
            PropertyMeta {
                check: Some("Number".to_string()),
                ..Default::default()
            },
        );
        seed(&mut cache, base);

        let mut derived = Meta::new("app.Narrow", ClassKind::Class);
        derived.super_class = Some(crate::meta::SuperRef::One("app.Base".to_string()));
        derived.properties.insert(
            "width".to_string(),
            PropertyMeta {
                refine: true,
                ..Default::default()
            },
        );
        seed(&mut cache, derived);

        let merged = merge(&mut cache, &DbData::default(), "app.Narrow");
        let width = &merged.properties["width"];
        assert_eq!(width.overridden_from.as_deref(), Some("app.Base"));
        assert_eq!(width.appears_in, vec!["app.Base".to_string()]);
    }

    #[test]
    fn variable_member_discovered_as_function_is_upgraded() {
        let mut cache = MetaCache::new();
        let mut base = Meta::new("app.Base", ClassKind::Class);
        base.members.insert("handler".to_string(), function_member());
        seed(&mut cache, base);

        let mut derived = Meta::new("app.Sub", ClassKind::Class);
        derived.super_class = Some(crate::meta::SuperRef::One("app.Base".to_string()));
        derived.members.insert(
            "handler".to_string(),
            MemberMeta {
                kind: MemberKind::Variable,
                ..Default::default()
            },
        );
        seed(&mut cache, derived);

        let merged = merge(&mut cache, &DbData::default(), "app.Sub");
        assert_eq!(merged.members["handler"].kind, MemberKind::Function);
    }

    #[test]
    fn cyclic_inheritance_terminates() {
        let mut cache = MetaCache::new();
        let mut first = Meta::new("app.Ping", ClassKind::Class);
        first.super_class = Some(crate::meta::SuperRef::One("app.Pong".to_string()));
        first.members.insert("serve".to_string(), function_member());
        seed(&mut cache, first);

        let mut second = Meta::new("app.Pong", ClassKind::Class);
        second.super_class = Some(crate::meta::SuperRef::One("app.Ping".to_string()));
        seed(&mut cache, second);

        let merged = merge(&mut cache, &DbData::default(), "app.Ping");
        assert!(merged.members.contains_key("serve"));
    }
}
