use crate::db::DbData;
use indexmap::IndexSet;
use tracing::debug;

/// Insertion-ordered worklist with de-duplication: a class is enqueued at
/// most once, and entries are processed in the order they were first seen.
#[derive(Debug, Default)]
pub struct Worklist {
    seen: IndexSet<String>,
    cursor: usize,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut worklist = Self::new();
        for name in seed {
            worklist.add(name.into());
        }
        worklist
    }

    /// Enqueue a class; returns false if it was already known.
    pub fn add(&mut self, class_name: impl Into<String>) -> bool {
        self.seen.insert(class_name.into())
    }

    /// Next unprocessed entry in insertion order.
    pub fn next(&mut self) -> Option<String> {
        let name = self.seen.get_index(self.cursor)?.clone();
        self.cursor += 1;
        Some(name)
    }

    /// Every class ever enqueued, in insertion order.
    pub fn visited(&self) -> &IndexSet<String> {
        &self.seen
    }
}

/// Lift indirect construct-time dependencies: a class that triggers load of
/// another class also pays the load-time cost of that class's construct-time
/// references. Runs once, after the worklist drains.
pub fn lift_load_dependencies(db: &mut DbData, closure: &IndexSet<String>) {
    for class_name in closure {
        let load_deps: Vec<String> = match db.class_info.get(class_name) {
            Some(info) => info
                .depends_on
                .iter()
                .filter(|(_, dep)| dep.load)
                .map(|(name, _)| name.clone())
                .collect(),
            None => continue,
        };

        let mut lifted: Vec<String> = Vec::new();
        for dep_name in &load_deps {
            if let Some(dep_info) = db.class_info.get(dep_name) {
                lifted.extend(
                    dep_info
                        .depends_on
                        .iter()
                        .filter(|(_, dep)| dep.construct)
                        .map(|(name, _)| name.clone()),
                );
            }
        }

        if lifted.is_empty() {
            continue;
        }
        let Some(info) = db.class_info.get_mut(class_name) else {
            continue;
        };
        for name in lifted {
            if name == *class_name {
                continue;
            }
            let entry = info.depends_on.entry(name.clone()).or_default();
            if !entry.load {
                debug!(class = %class_name, dependency = %name, "lifted construct dependency to load");
                entry.load = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ClassInfo, DependencyInfo};

    #[test]
    fn worklist_dedupes_and_keeps_insertion_order() {
        let mut worklist = Worklist::from_seed(["app.B", "app.A"]);
        assert!(!worklist.add("app.B"));
        assert!(worklist.add("app.C"));

        assert_eq!(worklist.next().as_deref(), Some("app.B"));
        assert_eq!(worklist.next().as_deref(), Some("app.A"));
        // Entries enqueued mid-drain are processed after the seed.
        assert!(worklist.add("app.D"));
        assert_eq!(worklist.next().as_deref(), Some("app.C"));
        assert_eq!(worklist.next().as_deref(), Some("app.D"));
        assert_eq!(worklist.next(), None);
    }

    fn info_with_deps(deps: &[(&str, bool, bool)]) -> ClassInfo {
        let mut info = ClassInfo::minimal(1, "app");
        for (name, load, construct) in deps {
            info.depends_on.insert(
                (*name).to_string(),
                DependencyInfo {
                    load: *load,
                    construct: *construct,
                    ..Default::default()
                },
            );
        }
        info
    }

    #[test]
    fn construct_deps_of_load_deps_become_load_deps() {
        let mut db = DbData::default();
        db.class_info
            .insert("app.F".to_string(), info_with_deps(&[("app.G", true, false)]));
        db.class_info
            .insert("app.G".to_string(), info_with_deps(&[("app.H", false, true)]));
        db.class_info.insert("app.H".to_string(), ClassInfo::minimal(1, "app"));

        let closure: IndexSet<String> =
            ["app.F", "app.G", "app.H"].iter().map(|s| s.to_string()).collect();
        lift_load_dependencies(&mut db, &closure);

        assert!(db.class_info["app.F"].depends_on["app.H"].load);
        // The lift does not invent load flags elsewhere.
        assert!(!db.class_info["app.G"].depends_on["app.H"].load);
    }

    #[test]
    fn lift_skips_missing_rows_and_self_references() {
        let mut db = DbData::default();
        db.class_info.insert(
            "app.F".to_string(),
            info_with_deps(&[("app.Gone", true, false)]),
        );
        db.class_info.insert(
            "app.Loop".to_string(),
            info_with_deps(&[("app.Back", true, false)]),
        );
        db.class_info.insert(
            "app.Back".to_string(),
            info_with_deps(&[("app.Loop", false, true)]),
        );

        let closure: IndexSet<String> = ["app.F", "app.Loop", "app.Back"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        lift_load_dependencies(&mut db, &closure);

        assert!(!db.class_info["app.F"].depends_on.contains_key("app.H"));
        assert!(!db.class_info["app.Loop"].depends_on.contains_key("app.Loop"));
    }
}
