//! Template model builder.
//!
//! [`create_service_template_model`] walks a service template document and
//! produces the linked [`ServiceTemplate`]. The pass is ordered:
//!
//! 1. metadata
//! 2. type forests, one per catalog
//! 3. topology inputs and outputs
//! 4. plugin specifications and workflows (policies by type role)
//! 5. node templates, then their requirements (which may name node
//!    templates declared later)
//! 6. group templates, then their members
//! 7. policy templates
//! 8. substitution template
//!
//! Names that do not resolve are reported and the reference is left empty;
//! the build always runs to the end.

use crate::modeling::coerce::{Coercer, DefaultCoercer};
use crate::modeling::constraints::{compile_node_filter, UNBOUNDED};
use crate::modeling::implementation::parse_implementation;
use crate::modeling::parameter::{materialize, materialize_assignments, Parameter, Parameters};
use crate::modeling::templates::{
    ArtifactTemplate, CapabilityTemplate, GroupTemplate, InterfaceTemplate, NodeTemplate,
    OperationTemplate, PluginSpecification, PolicyTemplate, RelationshipTemplate,
    RequirementTemplate, ServiceTemplate, SubstitutionTemplate, SubstitutionTemplateMapping,
};
use crate::presentation::{
    ArtifactDefinition, InterfaceAssignment, NodeTemplateDefinition, OperationDefinition,
    PolicyDefinition, RelationshipAssignmentRef, ResolvedCapability, ResolvedInterface,
    ResolvedRequirement, ResolvedValue, ServiceTemplateDocument, SubstitutionMappingsDefinition,
    TopologyTemplate, ValueResolver,
};
use crate::types::{TypeId, TypeRegistry, TypeVariant};
use crate::validation::{Level, Locator, ValidationSink};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

/// Role of policy types whose policies declare plugins.
pub const PLUGIN_ROLE: &str = "plugin";
/// Role of policy types whose policies declare workflows.
pub const WORKFLOW_ROLE: &str = "workflow";
/// Capability carrying instance counts of a node template.
pub const SCALABLE_CAPABILITY: &str = "scalable";

/// What the builder reads from and reports to.
pub struct ModelingContext<'a> {
    pub document: &'a ServiceTemplateDocument,
    pub coercer: &'a dyn Coercer,
    pub sink: &'a mut dyn ValidationSink,
}

impl<'a> ModelingContext<'a> {
    /// Context using the [`DefaultCoercer`].
    pub fn new(document: &'a ServiceTemplateDocument, sink: &'a mut dyn ValidationSink) -> Self {
        Self {
            document,
            coercer: &DefaultCoercer,
            sink,
        }
    }

    /// Replace the coercer.
    pub fn with_coercer(mut self, coercer: &'a dyn Coercer) -> Self {
        self.coercer = coercer;
        self
    }
}

/// Build the template model of a document.
pub fn create_service_template_model(ctx: &mut ModelingContext<'_>) -> ServiceTemplate {
    let builder = Builder {
        document: ctx.document,
        resolver: ValueResolver::new(ctx.document, ctx.coercer),
        sink: &mut *ctx.sink,
        model: ServiceTemplate::default(),
    };
    builder.build()
}

struct Builder<'a, 's> {
    document: &'a ServiceTemplateDocument,
    resolver: ValueResolver<'a>,
    sink: &'s mut dyn ValidationSink,
    model: ServiceTemplate,
}

impl Builder<'_, '_> {
    fn build(mut self) -> ServiceTemplate {
        let document = self.document;
        self.metadata();
        self.model.types = TypeRegistry::from_document(document, self.sink);

        let topology = document.topology();
        let root = Locator::new("topology_template");

        let inputs = self
            .resolver
            .parameters(&topology.inputs, &root.child("inputs"), self.sink);
        materialize(&mut self.model.inputs, &inputs);
        let outputs = self
            .resolver
            .parameters(&topology.outputs, &root.child("outputs"), self.sink);
        materialize(&mut self.model.outputs, &outputs);

        // Policy properties feed both workflows and policy templates.
        let policy_properties: BTreeMap<&str, BTreeMap<String, ResolvedValue>> = topology
            .policies
            .iter()
            .map(|(name, policy)| {
                let properties = self.resolver.properties(
                    TypeVariant::Policy,
                    &policy.type_name,
                    &policy.properties,
                    &root.child("policies").child(name).child("properties"),
                    self.sink,
                );
                (name.as_str(), properties)
            })
            .collect();

        self.plugins_and_workflows(&topology, &policy_properties, &root.child("policies"));
        self.node_templates(&topology, &root);
        self.group_templates(&topology, &root.child("groups"));
        self.policy_templates(&topology, &policy_properties, &root.child("policies"));
        if let Some(mappings) = &topology.substitution_mappings {
            self.substitution_template(mappings, &root.child("substitution_mappings"));
        }

        tracing::debug!(
            "built service template: {} types, {} node templates, {} groups, {} policies",
            self.model.types.len(),
            self.model.node_templates.len(),
            self.model.group_templates.len(),
            self.model.policy_templates.len()
        );
        self.model
    }

    fn metadata(&mut self) {
        let document = self.document;
        self.model.description = document.description.clone();
        self.model.metadata = document.metadata.clone();
        self.model.template_name = document.metadata_str("template_name");
        self.model.template_author = document.metadata_str("template_author");
        self.model.template_version = document.metadata_str("template_version");
        self.model.main_file_name = document
            .location
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned());
        self.model.created_at = Utc::now();
    }

    /// Resolve a type name, reporting `owner` when it is unknown.
    fn lookup_type(
        &mut self,
        variant: TypeVariant,
        name: &str,
        owner: &str,
        locator: &Locator,
    ) -> Option<TypeId> {
        let found = self.model.types.forest(variant).get_descendant(name);
        if found.is_none() {
            self.sink.report_at(
                Level::BetweenTypes,
                format!("{} has unknown {} type \"{}\"", owner, variant, name),
                Some(locator.clone()),
            );
        }
        found
    }

    fn policy_role(&self, type_name: &str) -> Option<&str> {
        self.model
            .types
            .policy_types
            .find(type_name)?
            .role
            .as_deref()
    }

    fn plugins_and_workflows(
        &mut self,
        topology: &TopologyTemplate,
        policy_properties: &BTreeMap<&str, BTreeMap<String, ResolvedValue>>,
        locator: &Locator,
    ) {
        // Plugins first: workflow implementations may name them.
        for (name, policy) in &topology.policies {
            if self.policy_role(&policy.type_name) == Some(PLUGIN_ROLE) {
                let specification = plugin_specification(name, policy);
                self.model
                    .plugin_specifications
                    .insert(name.clone(), specification);
            }
        }

        for (name, policy) in &topology.policies {
            if self.policy_role(&policy.type_name) != Some(WORKFLOW_ROLE) {
                continue;
            }
            let properties = policy_properties
                .get(name.as_str())
                .cloned()
                .unwrap_or_default();
            let workflow = self.workflow_template(name, policy, properties, &locator.child(name));
            self.model.workflow_templates.insert(name.clone(), workflow);
        }
    }

    fn workflow_template(
        &mut self,
        name: &str,
        policy: &PolicyDefinition,
        properties: BTreeMap<String, ResolvedValue>,
        locator: &Locator,
    ) -> OperationTemplate {
        let mut operation = OperationTemplate {
            name: name.to_string(),
            description: policy.description.clone(),
            ..Default::default()
        };
        let properties_locator = locator.child("properties");

        for (property, resolved) in properties {
            match property.as_str() {
                "implementation" => match resolved.value.as_str() {
                    Some(implementation) => self.apply_implementation(
                        &mut operation,
                        implementation,
                        &[],
                        &properties_locator.child("implementation"),
                    ),
                    None => self.sink.report_at(
                        Level::Field,
                        format!("workflow \"{}\" implementation is not a string", name),
                        Some(properties_locator.child("implementation")),
                    ),
                },
                "dependencies" => {
                    operation.dependencies = resolved
                        .value
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|item| item.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                }
                _ => {
                    operation.inputs.insert(
                        property.clone(),
                        Parameter::new(
                            property.clone(),
                            resolved.type_name,
                            resolved.value,
                            resolved.description,
                        ),
                    );
                }
            }
        }
        operation
    }

    fn apply_implementation(
        &mut self,
        operation: &mut OperationTemplate,
        primary: &str,
        dependencies: &[String],
        locator: &Locator,
    ) {
        let parsed = parse_implementation(primary, dependencies);
        operation.plugin = match parsed.plugin {
            Some(plugin) if self.model.plugin_specifications.contains_key(&plugin) => Some(plugin),
            Some(plugin) => {
                self.sink.report_at(
                    Level::BetweenTypes,
                    format!(
                        "no policy for plugin \"{}\" specified in operation implementation: {}",
                        plugin, primary
                    ),
                    Some(locator.clone()),
                );
                None
            }
            None => None,
        };
        operation.implementation = parsed.implementation;
        operation.dependencies.extend(parsed.dependencies);
        operation.configuration = parsed.configuration;
    }

    fn node_templates(&mut self, topology: &TopologyTemplate, root: &Locator) {
        let relationships_locator = root.child("relationship_templates");
        for (name, definition) in &topology.relationship_templates {
            let locator = relationships_locator.child(name);
            let type_id = self.lookup_type(
                TypeVariant::Relationship,
                &definition.type_name,
                &format!("relationship template \"{}\"", name),
                &locator.child("type"),
            );
            let properties = self.resolver.properties(
                TypeVariant::Relationship,
                &definition.type_name,
                &definition.properties,
                &locator.child("properties"),
                self.sink,
            );
            let interfaces = self.resolver.interfaces(
                TypeVariant::Relationship,
                Some(&definition.type_name),
                &definition.interfaces,
                &locator.child("interfaces"),
                self.sink,
            );
            let mut template = RelationshipTemplate {
                name: Some(name.clone()),
                description: definition.description.clone(),
                type_name: Some(definition.type_name.clone()),
                type_id,
                interface_templates: self.interface_templates(interfaces, &locator.child("interfaces")),
                ..Default::default()
            };
            materialize(&mut template.properties, &properties);
            self.model.relationship_templates.alloc(name.clone(), template);
        }

        let locator = root.child("node_templates");
        for (name, definition) in &topology.node_templates {
            let template = self.node_template(name, definition, &locator.child(name));
            self.model.node_templates.alloc(name.clone(), template);
        }

        // Every node template exists now, so requirements can name any of them.
        for (name, definition) in &topology.node_templates {
            let requirements = self.requirement_templates(
                name,
                definition,
                topology,
                &locator.child(name).child("requirements"),
            );
            if let Some(id) = self.model.node_templates.lookup(name) {
                self.model.node_templates.get_mut(id).requirement_templates = requirements;
            }
        }
    }

    fn node_template(
        &mut self,
        name: &str,
        definition: &NodeTemplateDefinition,
        locator: &Locator,
    ) -> NodeTemplate {
        let mut template = NodeTemplate::new(name, definition.type_name.as_str());
        template.description = definition.description.clone();
        template.type_id = self.lookup_type(
            TypeVariant::Node,
            &definition.type_name,
            &format!("node template \"{}\"", name),
            &locator.child("type"),
        );

        let properties = self.resolver.properties(
            TypeVariant::Node,
            &definition.type_name,
            &definition.properties,
            &locator.child("properties"),
            self.sink,
        );
        materialize(&mut template.properties, &properties);

        let interfaces = self.resolver.interfaces(
            TypeVariant::Node,
            Some(&definition.type_name),
            &definition.interfaces,
            &locator.child("interfaces"),
            self.sink,
        );
        template.interface_templates = self.interface_templates(interfaces, &locator.child("interfaces"));

        for (artifact_name, artifact) in &definition.artifacts {
            let artifact_template = self.artifact_template(
                artifact_name,
                artifact,
                &locator.child("artifacts").child(artifact_name),
            );
            template
                .artifact_templates
                .insert(artifact_name.clone(), artifact_template);
        }

        let capabilities = self.resolver.capabilities(
            &definition.type_name,
            &definition.capabilities,
            &locator.child("capabilities"),
            self.sink,
        );
        for (capability_name, capability) in capabilities {
            let capability_locator = locator.child("capabilities").child(&capability_name);
            let capability_template =
                self.capability_template(&capability_name, capability, &capability_locator);
            template
                .capability_templates
                .insert(capability_name, capability_template);
        }

        if let Some(filter) = &definition.node_filter {
            template.target_node_template_constraints =
                compile_node_filter(filter, &locator.child("node_filter"), self.sink);
        }

        self.apply_scaling(&mut template, locator);
        template
    }

    /// Instance counts from the `scalable` capability.
    fn apply_scaling(&mut self, template: &mut NodeTemplate, locator: &Locator) {
        let Some(scalable) = template.capability_templates.get(SCALABLE_CAPABILITY) else {
            return;
        };
        let scalable_locator = locator
            .child("capabilities")
            .child(SCALABLE_CAPABILITY)
            .child("properties");

        let read = |key: &str, sink: &mut dyn ValidationSink| -> Option<Option<u32>> {
            let value = &scalable.properties.get(key)?.value;
            match value {
                Value::String(s) if s == UNBOUNDED => Some(None),
                other => match other.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(count) => Some(Some(count)),
                    None => {
                        sink.report_at(
                            Level::Field,
                            format!("\"{}\" is not a valid instance count: {}", key, other),
                            Some(scalable_locator.child(key)),
                        );
                        None
                    }
                },
            }
        };

        let default_instances = read("default_instances", &mut *self.sink).flatten();
        let min_instances = read("min_instances", &mut *self.sink).flatten();
        let max_instances = read("max_instances", &mut *self.sink);

        if let Some(count) = default_instances {
            template.default_instances = count;
        }
        if let Some(count) = min_instances {
            template.min_instances = count;
        }
        if let Some(max) = max_instances {
            template.max_instances = max;
        }

        let above_max = template
            .max_instances
            .is_some_and(|max| template.default_instances > max);
        if template.default_instances < template.min_instances || above_max {
            self.sink.report_at(
                Level::BetweenFields,
                format!(
                    "node template \"{}\" has default_instances {} outside [{}, {}]",
                    template.name,
                    template.default_instances,
                    template.min_instances,
                    template
                        .max_instances
                        .map_or_else(|| UNBOUNDED.to_string(), |max| max.to_string())
                ),
                Some(scalable_locator),
            );
        }
    }

    fn capability_template(
        &mut self,
        name: &str,
        capability: ResolvedCapability,
        locator: &Locator,
    ) -> CapabilityTemplate {
        let type_id = self.lookup_type(
            TypeVariant::Capability,
            &capability.type_name,
            &format!("capability \"{}\"", name),
            &locator.child("type"),
        );
        let (min_occurrences, max_occurrences) =
            self.occurrences(capability.occurrences.as_deref(), &locator.child("occurrences"));

        let mut valid_source_node_types = Vec::new();
        for source_type in &capability.valid_source_types {
            if let Some(id) = self.lookup_type(
                TypeVariant::Node,
                source_type,
                &format!("valid source of capability \"{}\"", name),
                &locator.child("valid_source_types"),
            ) {
                valid_source_node_types.push(id);
            }
        }

        let mut properties = Parameters::new();
        materialize(&mut properties, &capability.properties);

        CapabilityTemplate {
            name: name.to_string(),
            description: capability.description,
            type_name: capability.type_name,
            type_id,
            min_occurrences,
            max_occurrences,
            valid_source_node_types,
            properties,
        }
    }

    /// `[min, max]` with max possibly `UNBOUNDED`; absent means `[0, UNBOUNDED]`.
    fn occurrences(&mut self, occurrences: Option<&[Value]>, locator: &Locator) -> (u32, Option<u32>) {
        let Some(occurrences) = occurrences else {
            return (0, None);
        };
        let count = |value: &Value| value.as_u64().and_then(|n| u32::try_from(n).ok());
        let parsed = match occurrences {
            [min, Value::String(max)] if max == UNBOUNDED => count(min).map(|min| (min, None)),
            [min, max] => count(min).zip(count(max)).map(|(min, max)| (min, Some(max))),
            _ => None,
        };
        match parsed {
            Some((min, Some(max))) if min > max => {
                self.sink.report_at(
                    Level::Field,
                    format!("occurrences lower bound {} exceeds upper bound {}", min, max),
                    Some(locator.clone()),
                );
                (min, Some(min))
            }
            Some(parsed) => parsed,
            None => {
                self.sink.report_at(
                    Level::Field,
                    "occurrences must be [min, max] with max an integer or UNBOUNDED".to_string(),
                    Some(locator.clone()),
                );
                (0, None)
            }
        }
    }

    fn artifact_template(
        &mut self,
        name: &str,
        artifact: &ArtifactDefinition,
        locator: &Locator,
    ) -> ArtifactTemplate {
        let type_id = self.lookup_type(
            TypeVariant::Artifact,
            &artifact.type_name,
            &format!("artifact \"{}\"", name),
            &locator.child("type"),
        );

        let document = self.document;
        let repository = match &artifact.repository {
            Some(repository_name) => {
                let repository = document.repositories.get(repository_name);
                if repository.is_none() {
                    self.sink.report_at(
                        Level::BetweenTypes,
                        format!(
                            "artifact \"{}\" refers to unknown repository \"{}\"",
                            name, repository_name
                        ),
                        Some(locator.child("repository")),
                    );
                }
                repository
            }
            None => None,
        };

        let properties = self.resolver.properties(
            TypeVariant::Artifact,
            &artifact.type_name,
            &artifact.properties,
            &locator.child("properties"),
            self.sink,
        );
        let mut template = ArtifactTemplate {
            name: name.to_string(),
            description: artifact.description.clone(),
            type_name: artifact.type_name.clone(),
            type_id,
            source_path: artifact.file.clone(),
            target_path: artifact.deploy_path.clone(),
            repository_url: repository.map(|r| r.url.clone()),
            repository_credential: repository.map(|r| r.credential.clone()).unwrap_or_default(),
            properties: Parameters::new(),
        };
        materialize(&mut template.properties, &properties);
        template
    }

    /// Interface templates; interfaces without operations are dropped.
    fn interface_templates(
        &mut self,
        interfaces: BTreeMap<String, ResolvedInterface>,
        locator: &Locator,
    ) -> BTreeMap<String, InterfaceTemplate> {
        let mut templates = BTreeMap::new();
        for (name, interface) in interfaces {
            let interface_locator = locator.child(&name);
            let type_id = match interface.type_name.as_deref() {
                Some(type_name) => self.lookup_type(
                    TypeVariant::Interface,
                    type_name,
                    &format!("interface \"{}\"", name),
                    &interface_locator.child("type"),
                ),
                None => None,
            };

            let mut operation_templates = BTreeMap::new();
            for (operation_name, operation) in &interface.operations {
                let template = self.operation_template(
                    operation_name,
                    operation,
                    &interface_locator.child("operations").child(operation_name),
                );
                operation_templates.insert(operation_name.clone(), template);
            }
            if operation_templates.is_empty() {
                tracing::debug!("dropping interface {} without operations", name);
                continue;
            }

            let mut inputs = Parameters::new();
            materialize(&mut inputs, &interface.inputs);
            templates.insert(
                name.clone(),
                InterfaceTemplate {
                    name,
                    description: interface.description,
                    type_name: interface.type_name,
                    type_id,
                    inputs,
                    operation_templates,
                },
            );
        }
        templates
    }

    fn operation_template(
        &mut self,
        name: &str,
        operation: &OperationDefinition,
        locator: &Locator,
    ) -> OperationTemplate {
        let mut template = OperationTemplate {
            name: name.to_string(),
            description: operation.description.clone(),
            executor: operation.executor.clone(),
            max_retries: operation.max_retries,
            retry_interval: operation.retry_interval,
            ..Default::default()
        };

        if let Some(implementation) = &operation.implementation {
            self.apply_implementation(
                &mut template,
                implementation.primary(),
                implementation.dependencies(),
                &locator.child("implementation"),
            );
            template.relationship_edge = match operation
                .extensions
                .get("relationship_edge")
                .and_then(Value::as_str)
            {
                Some("source") => Some(false),
                Some("target") => Some(true),
                _ => None,
            };
        }

        materialize_assignments(&mut template.inputs, &operation.inputs);
        template
    }

    fn requirement_templates(
        &mut self,
        node_name: &str,
        definition: &NodeTemplateDefinition,
        topology: &TopologyTemplate,
        locator: &Locator,
    ) -> Vec<RequirementTemplate> {
        let resolved = self.resolver.requirements(
            &definition.type_name,
            &definition.requirements,
            locator,
            self.sink,
        );
        resolved
            .into_iter()
            .enumerate()
            .map(|(index, requirement)| {
                let requirement_locator = locator.index(index).child(&requirement.name);
                self.requirement_template(node_name, requirement, topology, &requirement_locator)
            })
            .collect()
    }

    fn requirement_template(
        &mut self,
        node_name: &str,
        requirement: ResolvedRequirement,
        topology: &TopologyTemplate,
        locator: &Locator,
    ) -> RequirementTemplate {
        let mut template = RequirementTemplate {
            name: requirement.name.clone(),
            ..Default::default()
        };

        if let Some(node) = &requirement.node {
            if let Some(id) = self.model.node_templates.lookup(node) {
                template.target_node_template = Some(id);
            } else if let Some(type_id) = self.model.types.node_types.get_descendant(node) {
                template.target_node_type = Some(type_id);
                template.target_node_type_name = Some(node.clone());
            } else {
                self.sink.report_at(
                    Level::BetweenTypes,
                    format!(
                        "requirement \"{}\" of node template \"{}\" refers to unknown node template or node type \"{}\"",
                        requirement.name, node_name, node
                    ),
                    Some(locator.child("node")),
                );
            }
        }

        if let Some(capability) = &requirement.capability {
            match self.model.types.capability_types.get_descendant(capability) {
                Some(type_id) => {
                    template.target_capability_type = Some(type_id);
                    template.target_capability_type_name = Some(capability.clone());
                }
                None => template.target_capability_name = Some(capability.clone()),
            }
        }

        if let Some(filter) = &requirement.node_filter {
            template.target_node_template_constraints =
                compile_node_filter(filter, &locator.child("node_filter"), self.sink);
        }

        if let Some(relationship) = &requirement.relationship {
            template.relationship_template =
                self.relationship_template(relationship, topology, &locator.child("relationship"));
        }

        template
    }

    /// Relationship of a requirement: a relationship type, or a shared
    /// relationship template with the inline values overlaid.
    fn relationship_template(
        &mut self,
        relationship: &RelationshipAssignmentRef,
        topology: &TopologyTemplate,
        locator: &Locator,
    ) -> Option<RelationshipTemplate> {
        let no_properties = BTreeMap::new();
        let no_interfaces = BTreeMap::new();
        let (reference, inline_properties, inline_interfaces) = match relationship {
            RelationshipAssignmentRef::Named(name) => (name, &no_properties, &no_interfaces),
            RelationshipAssignmentRef::Inline {
                type_name,
                properties,
                interfaces,
            } => (type_name, properties, interfaces),
        };

        let (name, description, type_name, properties, interfaces) =
            if self.model.types.relationship_types.get_descendant(reference).is_some() {
                (
                    None,
                    None,
                    reference.clone(),
                    inline_properties.clone(),
                    inline_interfaces.clone(),
                )
            } else if let Some(shared) = topology.relationship_templates.get(reference) {
                let mut properties = shared.properties.clone();
                properties.extend(inline_properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                let mut interfaces: BTreeMap<String, InterfaceAssignment> = shared.interfaces.clone();
                interfaces.extend(inline_interfaces.iter().map(|(k, v)| (k.clone(), v.clone())));
                (
                    Some(reference.clone()),
                    shared.description.clone(),
                    shared.type_name.clone(),
                    properties,
                    interfaces,
                )
            } else {
                self.sink.report_at(
                    Level::BetweenTypes,
                    format!(
                        "unknown relationship type or relationship template \"{}\"",
                        reference
                    ),
                    Some(locator.clone()),
                );
                return None;
            };

        let type_id = self.lookup_type(
            TypeVariant::Relationship,
            &type_name,
            &format!("relationship \"{}\"", reference),
            locator,
        );
        let resolved_properties = self.resolver.properties(
            TypeVariant::Relationship,
            &type_name,
            &properties,
            &locator.child("properties"),
            self.sink,
        );
        let resolved_interfaces = self.resolver.interfaces(
            TypeVariant::Relationship,
            Some(&type_name),
            &interfaces,
            &locator.child("interfaces"),
            self.sink,
        );

        let mut template = RelationshipTemplate {
            name,
            description,
            type_name: Some(type_name),
            type_id,
            interface_templates: self
                .interface_templates(resolved_interfaces, &locator.child("interfaces")),
            ..Default::default()
        };
        materialize(&mut template.properties, &resolved_properties);
        Some(template)
    }

    fn group_templates(&mut self, topology: &TopologyTemplate, locator: &Locator) {
        for (name, definition) in &topology.groups {
            let group_locator = locator.child(name);
            let type_id = self.lookup_type(
                TypeVariant::Group,
                &definition.type_name,
                &format!("group \"{}\"", name),
                &group_locator.child("type"),
            );
            let properties = self.resolver.properties(
                TypeVariant::Group,
                &definition.type_name,
                &definition.properties,
                &group_locator.child("properties"),
                self.sink,
            );
            let interfaces = self.resolver.interfaces(
                TypeVariant::Group,
                Some(&definition.type_name),
                &definition.interfaces,
                &group_locator.child("interfaces"),
                self.sink,
            );
            let mut template = GroupTemplate {
                name: name.clone(),
                description: definition.description.clone(),
                type_name: definition.type_name.clone(),
                type_id,
                properties: Parameters::new(),
                interface_templates: self
                    .interface_templates(interfaces, &group_locator.child("interfaces")),
                member_node_templates: Vec::new(),
                member_group_templates: Vec::new(),
            };
            materialize(&mut template.properties, &properties);
            self.model.group_templates.alloc(name.clone(), template);
        }

        // Members may be groups declared later.
        for (name, definition) in &topology.groups {
            let Some(group_id) = self.model.group_templates.lookup(name) else {
                continue;
            };
            let mut member_nodes = Vec::new();
            let mut member_groups = Vec::new();
            for (index, member) in definition.members.iter().enumerate() {
                let member_locator = locator.child(name).child("members").index(index);
                if let Some(node_id) = self.model.node_templates.lookup(member) {
                    member_nodes.push(node_id);
                } else if member == name {
                    self.sink.report_at(
                        Level::BetweenFields,
                        format!("group \"{}\" lists itself as a member", name),
                        Some(member_locator),
                    );
                } else if let Some(member_group) = self.model.group_templates.lookup(member) {
                    member_groups.push(member_group);
                } else {
                    self.sink.report_at(
                        Level::BetweenTypes,
                        format!(
                            "group \"{}\" member \"{}\" is not a node template or group",
                            name, member
                        ),
                        Some(member_locator),
                    );
                }
            }
            let group = self.model.group_templates.get_mut(group_id);
            group.member_node_templates = member_nodes;
            group.member_group_templates = member_groups;
        }
    }

    fn policy_templates(
        &mut self,
        topology: &TopologyTemplate,
        policy_properties: &BTreeMap<&str, BTreeMap<String, ResolvedValue>>,
        locator: &Locator,
    ) {
        for (name, definition) in &topology.policies {
            let policy_locator = locator.child(name);
            let type_id = self.lookup_type(
                TypeVariant::Policy,
                &definition.type_name,
                &format!("policy \"{}\"", name),
                &policy_locator.child("type"),
            );

            let mut target_node_templates = Vec::new();
            let mut target_group_templates = Vec::new();
            for (index, target) in definition.targets.iter().enumerate() {
                if let Some(node_id) = self.model.node_templates.lookup(target) {
                    target_node_templates.push(node_id);
                } else if let Some(group_id) = self.model.group_templates.lookup(target) {
                    target_group_templates.push(group_id);
                } else {
                    self.sink.report_at(
                        Level::BetweenTypes,
                        format!(
                            "policy \"{}\" target \"{}\" is not a node template or group",
                            name, target
                        ),
                        Some(policy_locator.child("targets").index(index)),
                    );
                }
            }

            let mut properties = Parameters::new();
            if let Some(resolved) = policy_properties.get(name.as_str()) {
                materialize(&mut properties, resolved);
            }

            let template = PolicyTemplate {
                name: name.clone(),
                description: definition.description.clone(),
                type_name: definition.type_name.clone(),
                type_id,
                properties,
                target_node_templates,
                target_group_templates,
            };
            self.model.policy_templates.alloc(name.clone(), template);
        }
    }

    fn substitution_template(&mut self, mappings: &SubstitutionMappingsDefinition, locator: &Locator) {
        let node_type = self.lookup_type(
            TypeVariant::Node,
            &mappings.node_type,
            "substitution mappings",
            &locator.child("node_type"),
        );
        let mut template = SubstitutionTemplate {
            node_type_name: mappings.node_type.clone(),
            node_type,
            mappings: BTreeMap::new(),
        };

        for (mapped_name, target) in &mappings.capabilities {
            let mapping_locator = locator.child("capabilities").child(mapped_name);
            if let Some(mapping) = self.substitution_mapping(mapped_name, target, true, &mapping_locator) {
                template
                    .mappings
                    .insert(format!("capability.{}", mapped_name), mapping);
            }
        }
        for (mapped_name, target) in &mappings.requirements {
            let mapping_locator = locator.child("requirements").child(mapped_name);
            if let Some(mapping) = self.substitution_mapping(mapped_name, target, false, &mapping_locator) {
                template
                    .mappings
                    .insert(format!("requirement.{}", mapped_name), mapping);
            }
        }

        self.model.substitution_template = Some(template);
    }

    fn substitution_mapping(
        &mut self,
        mapped_name: &str,
        target: &[String],
        is_capability: bool,
        locator: &Locator,
    ) -> Option<SubstitutionTemplateMapping> {
        let kind = if is_capability { "capability" } else { "requirement" };
        let [node_name, target_name] = target else {
            self.sink.report_at(
                Level::Field,
                format!(
                    "substitution mapping \"{}\" must be [node_template, {}]",
                    mapped_name, kind
                ),
                Some(locator.clone()),
            );
            return None;
        };

        let Some(node_id) = self.model.node_templates.lookup(node_name) else {
            self.sink.report_at(
                Level::BetweenTypes,
                format!(
                    "substitution mapping \"{}\" refers to unknown node template \"{}\"",
                    mapped_name, node_name
                ),
                Some(locator.clone()),
            );
            return None;
        };

        let node = self.model.node_templates.get(node_id);
        let found = if is_capability {
            node.capability_templates.contains_key(target_name)
        } else {
            node.requirement_templates.iter().any(|r| &r.name == target_name)
        };
        if !found {
            self.sink.report_at(
                Level::BetweenTypes,
                format!(
                    "substitution mapping \"{}\" refers to unknown {} \"{}\" of node template \"{}\"",
                    mapped_name, kind, target_name, node_name
                ),
                Some(locator.clone()),
            );
            return None;
        }

        Some(SubstitutionTemplateMapping {
            mapped_name: mapped_name.to_string(),
            node_template: node_id,
            capability_name: is_capability.then(|| target_name.clone()),
            requirement_name: (!is_capability).then(|| target_name.clone()),
        })
    }
}

fn plugin_specification(name: &str, policy: &PolicyDefinition) -> PluginSpecification {
    PluginSpecification {
        name: name.to_string(),
        version: policy.properties.get("version").map(|version| match version {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        enabled: policy
            .properties
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true),
    }
}
