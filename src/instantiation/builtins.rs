//! Built-in instantiators, one per template kind.

use crate::instantiation::protocol::{Instantiable, InstantiationContext, InstantiatorTable};
use crate::instantiation::relationships::satisfy_requirements;
use crate::modeling::coerce::{is_function, Container};
use crate::modeling::instances::{
    Artifact, Capability, Group, Interface, Mapping, Node, Operation, Policy, Relationship,
    Service, Substitution,
};
use crate::modeling::parameter::{Parameter, Parameters};
use crate::modeling::scope::Scope;
use crate::modeling::templates::{
    ArtifactTemplate, CapabilityTemplate, GroupTemplate, InterfaceTemplate, NodeTemplate,
    OperationTemplate, PolicyTemplate, RequirementTemplate, ServiceTemplate, SubstitutionTemplate,
    SubstitutionTemplateMapping,
};
use crate::validation::{Level, Locator};
use chrono::Utc;
use std::collections::BTreeMap;

impl Instantiable for ServiceTemplate {
    type Instance = Service;
    const KIND: &'static str = "service template";
}

impl Instantiable for NodeTemplate {
    type Instance = Node;
    const KIND: &'static str = "node template";
}

impl Instantiable for CapabilityTemplate {
    type Instance = Capability;
    const KIND: &'static str = "capability template";
}

impl Instantiable for InterfaceTemplate {
    type Instance = Interface;
    const KIND: &'static str = "interface template";
}

impl Instantiable for OperationTemplate {
    type Instance = Operation;
    const KIND: &'static str = "operation template";
}

impl Instantiable for ArtifactTemplate {
    type Instance = Artifact;
    const KIND: &'static str = "artifact template";
}

impl Instantiable for RequirementTemplate {
    type Instance = Relationship;
    const KIND: &'static str = "requirement template";
}

impl Instantiable for GroupTemplate {
    type Instance = Group;
    const KIND: &'static str = "group template";
}

impl Instantiable for PolicyTemplate {
    type Instance = Policy;
    const KIND: &'static str = "policy template";
}

impl Instantiable for SubstitutionTemplate {
    type Instance = Substitution;
    const KIND: &'static str = "substitution template";
}

impl Instantiable for SubstitutionTemplateMapping {
    type Instance = Mapping;
    const KIND: &'static str = "substitution mapping";
}

impl Instantiable for Parameter {
    type Instance = Parameter;
    const KIND: &'static str = "parameter";
}

/// Install every built-in instantiator into `table`.
pub fn install(table: &mut InstantiatorTable) {
    table.replace::<ServiceTemplate>(instantiate_service_template);
    table.replace::<NodeTemplate>(instantiate_node_template);
    table.replace::<CapabilityTemplate>(instantiate_capability_template);
    table.replace::<InterfaceTemplate>(instantiate_interface_template);
    table.replace::<OperationTemplate>(instantiate_operation_template);
    table.replace::<ArtifactTemplate>(instantiate_artifact_template);
    table.replace::<RequirementTemplate>(instantiate_requirement_template);
    table.replace::<GroupTemplate>(instantiate_group_template);
    table.replace::<PolicyTemplate>(instantiate_policy_template);
    table.replace::<SubstitutionTemplate>(instantiate_substitution_template);
    table.replace::<SubstitutionTemplateMapping>(instantiate_substitution_mapping);
    table.replace::<Parameter>(instantiate_parameter);
}

/// Instantiate each parameter of a map; parameters whose instantiator
/// yields nothing are left out.
pub fn instantiate_parameters(
    parameters: &Parameters,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Parameters {
    let mut instantiated = Parameters::new();
    for (name, parameter) in parameters {
        if let Some(parameter) = parameter.instantiate(ctx, container) {
            instantiated.insert(name.clone(), parameter);
        }
    }
    instantiated
}

fn instantiate_interfaces(
    interfaces: &BTreeMap<String, InterfaceTemplate>,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> BTreeMap<String, Interface> {
    let mut instantiated = BTreeMap::new();
    for (name, interface) in interfaces {
        if let Some(interface) = interface.instantiate(ctx, container) {
            instantiated.insert(name.clone(), interface);
        }
    }
    instantiated
}

/// Service inputs with user values applied.
fn effective_inputs(template: &ServiceTemplate, ctx: &mut InstantiationContext<'_>) -> Parameters {
    let locator = Locator::new("inputs");
    let mut inputs = template.inputs.clone();
    let user_inputs = ctx.inputs().clone();

    for (name, value) in user_inputs {
        let Some(parameter) = inputs.get_mut(&name) else {
            ctx.report(
                Level::Field,
                format!("input \"{}\" is not supported", name),
                Some(locator.child(&name)),
            );
            continue;
        };
        match ctx
            .coercer()
            .coerce(None, parameter.type_name.as_deref(), &value, &name)
        {
            Ok(value) => parameter.value = value,
            Err(message) => ctx.report(Level::Field, message, Some(locator.child(&name))),
        }
    }

    for (name, parameter) in &inputs {
        if parameter.required && parameter.value.is_null() {
            ctx.report(
                Level::Field,
                format!("required input \"{}\" has no value", name),
                Some(locator.child(name)),
            );
        }
    }
    inputs
}

fn instantiate_service_template(
    template: &ServiceTemplate,
    ctx: &mut InstantiationContext<'_>,
    _container: &dyn Container,
) -> Option<Service> {
    let inputs = effective_inputs(template, ctx);
    let scope = Scope::with_inputs(template, &inputs);

    {
        let service = ctx.service_mut();
        service.description = template.description.clone();
        service.metadata = template.metadata.clone();
        service.created_at = Utc::now();
    }
    let service_inputs = instantiate_parameters(&inputs, ctx, &scope);
    ctx.service_mut().inputs = service_inputs;

    for (node_template_id, node_template) in template.node_templates.iter() {
        let node_scope = scope.with_self(node_template_id);
        for _ in 0..node_template.default_instances {
            if let Some(node) = node_template.instantiate(ctx, &node_scope) {
                ctx.service_mut().nodes.insert(node.id.clone(), node);
            }
        }
    }

    satisfy_requirements(template, ctx, &scope);

    for (_, group_template) in template.group_templates.iter() {
        if let Some(group) = group_template.instantiate(ctx, &scope) {
            ctx.service_mut().groups.insert(group.id.clone(), group);
        }
    }
    link_member_groups(template, ctx);

    for (_, policy_template) in template.policy_templates.iter() {
        if let Some(policy) = policy_template.instantiate(ctx, &scope) {
            ctx.service_mut().policies.insert(policy.id.clone(), policy);
        }
    }

    for (name, workflow) in &template.workflow_templates {
        if let Some(operation) = workflow.instantiate(ctx, &scope) {
            ctx.service_mut().workflows.insert(name.clone(), operation);
        }
    }

    if let Some(substitution) = &template.substitution_template {
        let substitution = substitution.instantiate(ctx, &scope);
        ctx.service_mut().substitution = substitution;
    }

    let outputs = instantiate_parameters(&template.outputs, ctx, &scope);
    ctx.service_mut().outputs = outputs;

    let service = ctx.take_service();
    tracing::debug!(
        "instantiated service: {} nodes, {} groups, {} policies",
        service.nodes.len(),
        service.groups.len(),
        service.policies.len()
    );
    Some(service)
}

/// Ids of the instances of each named template; a template without
/// instances is reported and contributes nothing.
fn instance_ids(
    ctx: &mut InstantiationContext<'_>,
    owner: &str,
    template_names: Vec<&str>,
    groups: bool,
) -> Vec<String> {
    let mut ids = Vec::new();
    for name in template_names {
        let found = if groups {
            ctx.service().get_group_ids(name)
        } else {
            ctx.service().get_node_ids(name)
        };
        if found.is_empty() {
            let kind = if groups { "group" } else { "node template" };
            ctx.report(
                Level::BetweenInstances,
                format!("{} refers to {} \"{}\" which has no instances", owner, kind, name),
                None,
            );
        }
        ids.extend(found);
    }
    ids
}

/// Member groups can only be linked once every group exists.
fn link_member_groups(template: &ServiceTemplate, ctx: &mut InstantiationContext<'_>) {
    for (_, group_template) in template.group_templates.iter() {
        if group_template.member_group_templates.is_empty() {
            continue;
        }
        let member_names: Vec<&str> = group_template
            .member_group_templates
            .iter()
            .map(|id| template.group_templates.name_of(*id))
            .collect();
        let member_ids = instance_ids(
            ctx,
            &format!("group \"{}\"", group_template.name),
            member_names,
            true,
        );
        for group_id in ctx.service().get_group_ids(&group_template.name) {
            if let Some(group) = ctx.service_mut().groups.get_mut(&group_id) {
                group.member_group_ids = member_ids.clone();
            }
        }
    }
}

fn instantiate_node_template(
    template: &NodeTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Node> {
    let id = ctx.next_id(&template.name);
    let properties = instantiate_parameters(&template.properties, ctx, container);
    let interfaces = instantiate_interfaces(&template.interface_templates, ctx, container);

    let mut artifacts = BTreeMap::new();
    for (name, artifact) in &template.artifact_templates {
        if let Some(artifact) = artifact.instantiate(ctx, container) {
            artifacts.insert(name.clone(), artifact);
        }
    }

    let mut capabilities = BTreeMap::new();
    for (name, capability) in &template.capability_templates {
        if let Some(capability) = capability.instantiate(ctx, container) {
            capabilities.insert(name.clone(), capability);
        }
    }

    tracing::debug!("instantiated node {} from {}", id, template.name);
    Some(Node {
        id,
        template_name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: template.description.clone(),
        properties,
        interfaces,
        artifacts,
        capabilities,
        outbound_relationships: Vec::new(),
    })
}

fn instantiate_capability_template(
    template: &CapabilityTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Capability> {
    Some(Capability {
        name: template.name.clone(),
        type_name: template.type_name.clone(),
        min_occurrences: template.min_occurrences,
        max_occurrences: template.max_occurrences,
        occurrences: 0,
        properties: instantiate_parameters(&template.properties, ctx, container),
    })
}

fn instantiate_interface_template(
    template: &InterfaceTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Interface> {
    let inputs = instantiate_parameters(&template.inputs, ctx, container);
    let mut operations = BTreeMap::new();
    for (name, operation) in &template.operation_templates {
        if let Some(operation) = operation.instantiate(ctx, container) {
            operations.insert(name.clone(), operation);
        }
    }
    Some(Interface {
        name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: template.description.clone(),
        inputs,
        operations,
    })
}

fn instantiate_operation_template(
    template: &OperationTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Operation> {
    Some(Operation {
        name: template.name.clone(),
        description: template.description.clone(),
        implementation: template.implementation.clone(),
        plugin: template.plugin.clone(),
        dependencies: template.dependencies.clone(),
        configuration: template.configuration.clone(),
        executor: template.executor.clone(),
        max_retries: template.max_retries,
        retry_interval: template.retry_interval,
        inputs: instantiate_parameters(&template.inputs, ctx, container),
        relationship_edge: template.relationship_edge,
    })
}

fn instantiate_artifact_template(
    template: &ArtifactTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Artifact> {
    Some(Artifact {
        name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: template.description.clone(),
        source_path: template.source_path.clone(),
        target_path: template.target_path.clone(),
        repository_url: template.repository_url.clone(),
        repository_credential: template.repository_credential.clone(),
        properties: instantiate_parameters(&template.properties, ctx, container),
    })
}

/// The relationship of a requirement, evaluated against the edge it
/// satisfies. Node ids and the target capability are filled in by
/// requirement satisfaction.
fn instantiate_requirement_template(
    template: &RequirementTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Relationship> {
    let mut relationship = Relationship {
        name: template.name.clone(),
        type_name: None,
        template_name: None,
        source_node_id: String::new(),
        target_node_id: String::new(),
        target_capability_name: None,
        properties: Parameters::new(),
        interfaces: BTreeMap::new(),
    };
    if let Some(relationship_template) = &template.relationship_template {
        relationship.type_name = relationship_template.type_name.clone();
        relationship.template_name = relationship_template.name.clone();
        relationship.properties =
            instantiate_parameters(&relationship_template.properties, ctx, container);
        relationship.interfaces =
            instantiate_interfaces(&relationship_template.interface_templates, ctx, container);
    }
    Some(relationship)
}

fn instantiate_group_template(
    template: &GroupTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Group> {
    let node_templates = &ctx.template().node_templates;
    let member_names: Vec<&str> = template
        .member_node_templates
        .iter()
        .map(|id| node_templates.name_of(*id))
        .collect();
    let member_node_ids = instance_ids(
        ctx,
        &format!("group \"{}\"", template.name),
        member_names,
        false,
    );

    Some(Group {
        id: ctx.next_id(&template.name),
        template_name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: template.description.clone(),
        properties: instantiate_parameters(&template.properties, ctx, container),
        interfaces: instantiate_interfaces(&template.interface_templates, ctx, container),
        member_node_ids,
        member_group_ids: Vec::new(),
    })
}

fn instantiate_policy_template(
    template: &PolicyTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Policy> {
    let model = ctx.template();
    let owner = format!("policy \"{}\"", template.name);
    let node_names: Vec<&str> = template
        .target_node_templates
        .iter()
        .map(|id| model.node_templates.name_of(*id))
        .collect();
    let group_names: Vec<&str> = template
        .target_group_templates
        .iter()
        .map(|id| model.group_templates.name_of(*id))
        .collect();
    let target_node_ids = instance_ids(ctx, &owner, node_names, false);
    let target_group_ids = instance_ids(ctx, &owner, group_names, true);

    Some(Policy {
        id: ctx.next_id(&template.name),
        template_name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: template.description.clone(),
        properties: instantiate_parameters(&template.properties, ctx, container),
        target_node_ids,
        target_group_ids,
    })
}

fn instantiate_substitution_template(
    template: &SubstitutionTemplate,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Substitution> {
    let mut mappings = BTreeMap::new();
    for (key, mapping) in &template.mappings {
        if let Some(mapping) = mapping.instantiate(ctx, container) {
            mappings.insert(key.clone(), mapping);
        }
    }
    Some(Substitution {
        node_type_name: template.node_type_name.clone(),
        mappings,
    })
}

/// Maps onto the first node of the mapped node template.
fn instantiate_substitution_mapping(
    template: &SubstitutionTemplateMapping,
    ctx: &mut InstantiationContext<'_>,
    _container: &dyn Container,
) -> Option<Mapping> {
    let node_template = ctx.template().node_templates.name_of(template.node_template);
    let node_id = ctx
        .service()
        .find_nodes(node_template)
        .first()
        .map(|node| node.id.clone());

    let Some(node_id) = node_id else {
        ctx.report(
            Level::BetweenInstances,
            format!(
                "substitution mapping \"{}\" refers to node template \"{}\" which has no instances",
                template.mapped_name, node_template
            ),
            None,
        );
        return None;
    };

    Some(Mapping {
        mapped_name: template.mapped_name.clone(),
        node_id,
        capability_name: template.capability_name.clone(),
        requirement_name: template.requirement_name.clone(),
    })
}

/// Evaluates function values; a function that cannot be evaluated keeps
/// its raw value.
fn instantiate_parameter(
    parameter: &Parameter,
    ctx: &mut InstantiationContext<'_>,
    container: &dyn Container,
) -> Option<Parameter> {
    if !is_function(&parameter.value) {
        return Some(parameter.clone());
    }
    match ctx.coercer().coerce(
        Some(container),
        parameter.type_name.as_deref(),
        &parameter.value,
        &parameter.name,
    ) {
        Ok(value) => Some(parameter.with_value(value)),
        Err(message) => {
            tracing::debug!("keeping {} unevaluated: {}", parameter.name, message);
            Some(parameter.clone())
        }
    }
}
