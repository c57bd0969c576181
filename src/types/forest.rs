//! Type forests.
//!
//! One [`TypeForest`] holds every type of one [`TypeVariant`]. Types whose
//! definition names no parent hang off the (implicit) forest root.

use crate::arena::{Id, NamedArena};
use crate::presentation::TypeDefinition;
use crate::validation::{Level, Locator, ValidationSink};
use serde::Serialize;

/// Type category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeVariant {
    Node,
    Group,
    Policy,
    Relationship,
    Capability,
    Interface,
    Artifact,
}

impl TypeVariant {
    /// Every variant, in catalog order.
    pub const ALL: [TypeVariant; 7] = [
        TypeVariant::Node,
        TypeVariant::Group,
        TypeVariant::Policy,
        TypeVariant::Relationship,
        TypeVariant::Capability,
        TypeVariant::Interface,
        TypeVariant::Artifact,
    ];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeVariant::Node => "node",
            TypeVariant::Group => "group",
            TypeVariant::Policy => "policy",
            TypeVariant::Relationship => "relationship",
            TypeVariant::Capability => "capability",
            TypeVariant::Interface => "interface",
            TypeVariant::Artifact => "artifact",
        }
    }

    /// Document key of this variant's catalog.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            TypeVariant::Node => "node_types",
            TypeVariant::Group => "group_types",
            TypeVariant::Policy => "policy_types",
            TypeVariant::Relationship => "relationship_types",
            TypeVariant::Capability => "capability_types",
            TypeVariant::Interface => "interface_types",
            TypeVariant::Artifact => "artifact_types",
        }
    }
}

impl std::fmt::Display for TypeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a type inside its forest.
pub type TypeId = Id<TypeNode>;

/// A materialized type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub name: String,
    /// Free-form classification (`plugin`, `workflow`, ...)
    pub role: Option<String>,
    pub description: Option<String>,
    /// `None` for types directly under the forest root
    pub parent: Option<TypeId>,
    /// Sorted by name once the forest is built
    pub children: Vec<TypeId>,
    pub variant: TypeVariant,
}

/// All types of one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeForest {
    variant: TypeVariant,
    nodes: NamedArena<TypeNode>,
    roots: Vec<TypeId>,
}

impl TypeForest {
    /// Create an empty forest.
    pub fn new(variant: TypeVariant) -> Self {
        Self {
            variant,
            nodes: NamedArena::new(),
            roots: Vec::new(),
        }
    }

    pub fn variant(&self) -> TypeVariant {
        self.variant
    }

    /// Find a type anywhere in the forest.
    pub fn get_descendant(&self, name: &str) -> Option<TypeId> {
        self.nodes.lookup(name)
    }

    /// Find a type by name and return its record.
    pub fn find(&self, name: &str) -> Option<&TypeNode> {
        self.nodes.by_name(name)
    }

    pub fn get(&self, id: TypeId) -> &TypeNode {
        self.nodes.get(id)
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.nodes.get(id).name
    }

    /// Types directly under the forest root.
    pub fn roots(&self) -> &[TypeId] {
        &self.roots
    }

    /// `id` followed by each of its ancestors, up to a root.
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut current = self.get(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.get(parent).parent;
        }
        chain
    }

    /// Whether `name` is `ancestor` or derives from it.
    pub fn is_descendant_of(&self, name: &str, ancestor: &str) -> bool {
        let (Some(id), Some(ancestor)) = (self.get_descendant(name), self.get_descendant(ancestor))
        else {
            return false;
        };
        self.ancestors(id).contains(&ancestor)
    }

    /// Depth-first walk from the roots, yielding `(depth, id)`.
    pub fn walk(&self) -> Vec<(usize, TypeId)> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(usize, TypeId)> = self.roots.iter().rev().map(|&id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            for &child in self.get(id).children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, name: &str, definition: &TypeDefinition, parent: Option<TypeId>) -> Option<TypeId> {
        let node = TypeNode {
            name: name.to_string(),
            role: definition.role().map(str::to_string),
            description: definition.description.clone(),
            parent,
            children: Vec::new(),
            variant: self.variant,
        };
        let id = self.nodes.alloc(name, node)?;
        match parent {
            Some(parent) => self.nodes.get_mut(parent).children.push(id),
            None => self.roots.push(id),
        }
        Some(id)
    }

    fn sort_children(&mut self) {
        let ids: Vec<TypeId> = self.nodes.ids().collect();
        for id in ids {
            let mut children = std::mem::take(&mut self.nodes.get_mut(id).children);
            children.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
            self.nodes.get_mut(id).children = children;
        }
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        self.roots = roots;
    }
}

/// Materialize `definitions` into `forest`.
///
/// Repeated passes add every pending type whose parent is absent or
/// already in the forest, until all are added or a pass adds nothing.
/// Types left over have a dangling or circular parent; each is reported
/// at [`Level::BetweenTypes`] and stays out of the forest.
pub fn create_types<'a, I>(
    forest: &mut TypeForest,
    definitions: I,
    locator: &Locator,
    sink: &mut dyn ValidationSink,
) where
    I: IntoIterator<Item = (&'a String, &'a TypeDefinition)>,
{
    let mut pending: Vec<(&String, &TypeDefinition)> = definitions
        .into_iter()
        .filter(|(name, _)| !forest.nodes.contains(name))
        .collect();
    // Insertion order decides ids; sorting makes them permutation independent.
    pending.sort_by(|a, b| a.0.cmp(b.0));

    let mut passes = 0;
    while !pending.is_empty() {
        passes += 1;
        let before = pending.len();
        let mut deferred = Vec::with_capacity(before);

        for (name, definition) in pending {
            match definition.derived_from.as_deref() {
                None => {
                    forest.insert(name, definition, None);
                }
                Some(parent) => match forest.get_descendant(parent) {
                    Some(parent_id) => {
                        forest.insert(name, definition, Some(parent_id));
                    }
                    None => deferred.push((name, definition)),
                },
            }
        }

        pending = deferred;
        if pending.len() == before {
            break;
        }
    }

    for (name, definition) in &pending {
        sink.report_at(
            Level::BetweenTypes,
            format!(
                "{} type \"{}\" has unknown or circular parent \"{}\"",
                forest.variant,
                name,
                definition.derived_from.as_deref().unwrap_or_default()
            ),
            Some(locator.child(name)),
        );
    }

    forest.sort_children();
    tracing::debug!(
        "{} types: {} materialized, {} unresolved, {} passes",
        forest.variant,
        forest.len(),
        pending.len(),
        passes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::IssueCollector;
    use std::collections::BTreeMap;

    fn def(parent: Option<&str>) -> TypeDefinition {
        TypeDefinition {
            derived_from: parent.map(str::to_string),
            ..Default::default()
        }
    }

    fn build(entries: &[(&str, Option<&str>)]) -> (TypeForest, IssueCollector) {
        let owned: Vec<(String, TypeDefinition)> = entries
            .iter()
            .map(|(name, parent)| (name.to_string(), def(*parent)))
            .collect();
        let mut forest = TypeForest::new(TypeVariant::Node);
        let mut sink = IssueCollector::new();
        create_types(
            &mut forest,
            owned.iter().map(|(n, d)| (n, d)),
            &Locator::new("node_types"),
            &mut sink,
        );
        (forest, sink)
    }

    fn outline(forest: &TypeForest) -> Vec<(usize, String)> {
        forest
            .walk()
            .into_iter()
            .map(|(depth, id)| (depth, forest.name(id).to_string()))
            .collect()
    }

    #[test]
    fn parents_declared_after_children_resolve() {
        let (forest, sink) = build(&[
            ("WebServer", Some("SoftwareComponent")),
            ("SoftwareComponent", Some("Root")),
            ("Root", None),
        ]);

        assert!(sink.is_empty());
        assert_eq!(forest.len(), 3);
        assert_eq!(
            outline(&forest),
            vec![
                (0, "Root".to_string()),
                (1, "SoftwareComponent".to_string()),
                (2, "WebServer".to_string()),
            ]
        );
    }

    #[test]
    fn every_permutation_builds_the_same_forest() {
        let entries = [
            ("Root", None),
            ("Compute", Some("Root")),
            ("Database", Some("Root")),
            ("MySQL", Some("Database")),
            ("Postgres", Some("Database")),
        ];
        let (reference, _) = build(&entries);

        // All rotations and their reversals.
        for shift in 0..entries.len() {
            let mut rotated = entries.to_vec();
            rotated.rotate_left(shift);
            let (forest, _) = build(&rotated);
            assert_eq!(forest, reference);

            rotated.reverse();
            let (forest, _) = build(&rotated);
            assert_eq!(forest, reference);
        }
    }

    #[test]
    fn cycle_terminates_and_is_absent() {
        let (forest, sink) = build(&[("Root", None), ("A", Some("B")), ("B", Some("A"))]);

        assert_eq!(forest.len(), 1);
        assert!(forest.get_descendant("A").is_none());
        assert!(forest.get_descendant("B").is_none());
        assert_eq!(sink.len(), 2);
        assert!(sink.at_level(Level::BetweenTypes).all(|i| i.message.contains("circular")));
    }

    #[test]
    fn self_parent_terminates() {
        let (forest, sink) = build(&[("Loop", Some("Loop"))]);
        assert!(forest.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn dangling_parent_and_its_children_are_absent() {
        let (forest, sink) = build(&[
            ("Root", None),
            ("Orphan", Some("Missing")),
            ("OrphanChild", Some("Orphan")),
        ]);

        assert_eq!(forest.len(), 1);
        assert!(forest.get_descendant("OrphanChild").is_none());
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.issues()[0].locator,
            Some(Locator::new("node_types.Orphan"))
        );
    }

    #[test]
    fn get_descendant_finds_deep_nodes() {
        let mut entries: Vec<(String, Option<String>)> = vec![("T0".to_string(), None)];
        for depth in 1..20 {
            entries.push((format!("T{depth}"), Some(format!("T{}", depth - 1))));
        }
        let catalog: BTreeMap<String, TypeDefinition> = entries
            .iter()
            .map(|(name, parent)| (name.clone(), def(parent.as_deref())))
            .collect();

        let mut forest = TypeForest::new(TypeVariant::Capability);
        let mut sink = IssueCollector::new();
        create_types(&mut forest, &catalog, &Locator::new("capability_types"), &mut sink);

        let deepest = forest.get_descendant("T19").unwrap();
        assert_eq!(forest.get(deepest).name, "T19");
        assert_eq!(forest.ancestors(deepest).len(), 20);
        assert_eq!(forest.get_descendant("T0"), Some(forest.roots()[0]));
        assert!(forest.get_descendant("T20").is_none());
    }

    #[test]
    fn descendant_relation() {
        let (forest, _) = build(&[
            ("Root", None),
            ("Database", Some("Root")),
            ("MySQL", Some("Database")),
        ]);

        assert!(forest.is_descendant_of("MySQL", "Root"));
        assert!(forest.is_descendant_of("MySQL", "MySQL"));
        assert!(!forest.is_descendant_of("Database", "MySQL"));
        assert!(!forest.is_descendant_of("Unknown", "Root"));
    }

    #[test]
    fn role_and_description_are_kept() {
        let mut catalog = BTreeMap::new();
        let mut plugin = def(None);
        plugin
            .extensions
            .insert("role".to_string(), serde_json::json!("plugin"));
        plugin.description = Some("plugin policy".to_string());
        catalog.insert("aria.Plugin".to_string(), plugin);

        let mut forest = TypeForest::new(TypeVariant::Policy);
        let mut sink = IssueCollector::new();
        create_types(&mut forest, &catalog, &Locator::new("policy_types"), &mut sink);

        let node = forest.find("aria.Plugin").unwrap();
        assert_eq!(node.role.as_deref(), Some("plugin"));
        assert_eq!(node.description.as_deref(), Some("plugin policy"));
        assert_eq!(node.variant, TypeVariant::Policy);
    }
}
