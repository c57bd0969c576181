//! Requirement satisfaction.
//!
//! After every node exists, each requirement of each node is matched to a
//! target node and capability. Candidates come from the requirement's
//! target node template, or from every node whose type derives from its
//! target node type. A candidate must pass the requirement's node filter and
//! offer a capability with room for another relationship. A candidate found
//! by type or capability must also pass its own template's node filter.
//!
//! Capabilities left below their minimum occurrences are reported once every
//! requirement has been tried.

use crate::instantiation::protocol::{Instantiable, InstantiationContext};
use crate::modeling::instances::Node;
use crate::modeling::scope::Scope;
use crate::modeling::templates::{NodeTemplateId, RequirementTemplate, ServiceTemplate};
use crate::validation::{Level, Locator};

/// A chosen requirement target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub node_id: String,
    pub capability: Option<String>,
}

/// Create a relationship for every satisfiable requirement of every node.
pub fn satisfy_requirements(
    template: &ServiceTemplate,
    ctx: &mut InstantiationContext<'_>,
    scope: &Scope<'_>,
) {
    let node_ids: Vec<String> = ctx.service().nodes.keys().cloned().collect();

    for source_id in node_ids {
        let Some(source_template_id) = ctx
            .service()
            .node(&source_id)
            .and_then(|node| template.node_templates.lookup(&node.template_name))
        else {
            continue;
        };
        let source_template = template.node_templates.get(source_template_id);

        for (index, requirement) in source_template.requirement_templates.iter().enumerate() {
            let target = find_target(template, ctx, scope, source_template_id, &source_id, requirement);
            let Some((target, target_template_id)) = target else {
                tracing::warn!(
                    "requirement {} of node {} cannot be satisfied",
                    requirement.name,
                    source_id
                );
                ctx.report(
                    Level::BetweenInstances,
                    format!(
                        "requirement \"{}\" of node \"{}\" cannot be satisfied",
                        requirement.name, source_id
                    ),
                    Some(
                        Locator::new("node_templates")
                            .child(&source_template.name)
                            .child("requirements")
                            .index(index),
                    ),
                );
                continue;
            };

            let edge = scope.with_edge(source_template_id, target_template_id);
            let Some(mut relationship) = requirement.instantiate(ctx, &edge) else {
                continue;
            };
            relationship.source_node_id = source_id.clone();
            relationship.target_node_id = target.node_id.clone();
            relationship.target_capability_name = target.capability.clone();

            let service = ctx.service_mut();
            if let Some(name) = &target.capability {
                if let Some(capability) = service
                    .nodes
                    .get_mut(&target.node_id)
                    .and_then(|node| node.capabilities.get_mut(name))
                {
                    capability.occurrences += 1;
                }
            }
            if let Some(source) = service.nodes.get_mut(&source_id) {
                source.outbound_relationships.push(relationship);
            }
        }
    }

    report_missing_occurrences(ctx);
}

fn report_missing_occurrences(ctx: &mut InstantiationContext<'_>) {
    let mut short = Vec::new();
    for node in ctx.service().nodes.values() {
        for capability in node.capabilities.values() {
            if !capability.has_enough_relationships() {
                short.push((
                    node.id.clone(),
                    node.template_name.clone(),
                    capability.name.clone(),
                    capability.occurrences,
                    capability.min_occurrences,
                ));
            }
        }
    }

    for (node_id, template_name, capability, occurrences, min) in short {
        tracing::warn!(
            "capability {} of node {} has {} relationships, needs at least {}",
            capability,
            node_id,
            occurrences,
            min
        );
        ctx.report(
            Level::BetweenInstances,
            format!(
                "capability \"{}\" of node \"{}\" is targeted by {} relationship(s), fewer than its minimum of {}",
                capability, node_id, occurrences, min
            ),
            Some(
                Locator::new("node_templates")
                    .child(&template_name)
                    .child("capabilities")
                    .child(&capability),
            ),
        );
    }
}

/// First candidate node, in id order, that satisfies `requirement`.
pub fn find_target(
    template: &ServiceTemplate,
    ctx: &InstantiationContext<'_>,
    scope: &Scope<'_>,
    source_template_id: NodeTemplateId,
    source_id: &str,
    requirement: &RequirementTemplate,
) -> Option<(Target, NodeTemplateId)> {
    let source_template = template.node_templates.get(source_template_id);

    for candidate in ctx.service().nodes.values() {
        if candidate.id == source_id {
            continue;
        }
        let Some(candidate_template_id) = template.node_templates.lookup(&candidate.template_name)
        else {
            continue;
        };
        let candidate_template = template.node_templates.get(candidate_template_id);

        let matches_node = match (requirement.target_node_template, &requirement.target_node_type_name) {
            (Some(target), _) => target == candidate_template_id,
            (None, Some(node_type)) => template.node_template_is_a(candidate_template, node_type),
            // Only a capability to go by.
            (None, None) => {
                requirement.target_capability_type.is_some()
                    || requirement.target_capability_name.is_some()
            }
        };
        if !matches_node {
            continue;
        }

        let edge = scope.with_edge(source_template_id, candidate_template_id);
        let selectable = requirement.target_node_template.is_some()
            || candidate_template
                .target_node_template_constraints
                .iter()
                .all(|constraint| constraint.evaluate(candidate_template, &edge, ctx.coercer()));
        let passes_filter = selectable
            && requirement
                .target_node_template_constraints
                .iter()
                .all(|constraint| constraint.evaluate(candidate_template, &edge, ctx.coercer()));
        if !passes_filter {
            continue;
        }

        let Some(capability) = choose_capability(template, requirement, candidate, &source_template.type_name)
        else {
            continue;
        };

        return Some((
            Target {
                node_id: candidate.id.clone(),
                capability,
            },
            candidate_template_id,
        ));
    }
    None
}

/// The target capability on `candidate`.
///
/// `Some(None)` when the requirement names no capability, `None` when the
/// candidate has no usable one.
fn choose_capability(
    template: &ServiceTemplate,
    requirement: &RequirementTemplate,
    candidate: &Node,
    source_type: &str,
) -> Option<Option<String>> {
    let accepts_source = |name: &str| {
        let Some(capability_template) = template
            .node_template(&candidate.template_name)
            .and_then(|t| t.capability_templates.get(name))
        else {
            return true;
        };
        if capability_template.valid_source_node_types.is_empty() {
            return true;
        }
        let forest = &template.types.node_types;
        capability_template
            .valid_source_node_types
            .iter()
            .any(|&valid| forest.is_descendant_of(source_type, forest.name(valid)))
    };

    if let Some(name) = &requirement.target_capability_name {
        let capability = candidate.capabilities.get(name)?;
        return (capability.has_room() && accepts_source(name.as_str())).then(|| Some(name.clone()));
    }

    if let Some(capability_type) = &requirement.target_capability_type_name {
        let forest = &template.types.capability_types;
        return candidate
            .capabilities
            .values()
            .find(|capability| {
                forest.is_descendant_of(&capability.type_name, capability_type)
                    && capability.has_room()
                    && accepts_source(capability.name.as_str())
            })
            .map(|capability| Some(capability.name.clone()));
    }

    Some(None)
}
