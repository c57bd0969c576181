//! Turning a template model into a running service.
//!
//! Each template kind implements [`Instantiable`]; the function that does
//! the work is looked up in an [`InstantiatorTable`] so it can be replaced
//! at runtime, mostly for tests. [`instantiate_service`] runs the whole
//! protocol with the built-in instantiators:
//!
//! 1. user inputs applied to the service inputs
//! 2. nodes, `default_instances` per node template
//! 3. relationships, by requirement satisfaction
//! 4. groups, then group members that are groups
//! 5. policies
//! 6. workflows
//! 7. substitution
//! 8. outputs
//!
//! # Example
//!
//! ```
//! use tosca_model::instantiation::instantiate_service;
//! use tosca_model::modeling::{NodeTemplate, ServiceTemplate};
//! use tosca_model::validation::IssueCollector;
//! use std::collections::BTreeMap;
//!
//! let mut template = ServiceTemplate::default();
//! let mut web = NodeTemplate::new("web", "tosca.nodes.WebServer");
//! web.default_instances = 2;
//! template.node_templates.alloc("web", web);
//!
//! let mut issues = IssueCollector::new();
//! let service = instantiate_service(&template, &BTreeMap::new(), &mut issues).unwrap();
//!
//! assert_eq!(service.get_node_ids("web"), vec!["web_1", "web_2"]);
//! ```

pub mod builtins;
pub mod protocol;
pub mod relationships;

pub use builtins::instantiate_parameters;
pub use protocol::{
    current, register, restore, snapshot, InstantiateFn, Instantiable, InstantiationContext,
    InstantiatorTable, OverrideGuard,
};
pub use relationships::{find_target, satisfy_requirements, Target};

use crate::modeling::instances::Service;
use crate::modeling::templates::ServiceTemplate;
use crate::validation::ValidationSink;
use serde_json::Value;
use std::collections::BTreeMap;

/// Instantiate `template` with user supplied input values.
pub fn instantiate_service(
    template: &ServiceTemplate,
    inputs: &BTreeMap<String, Value>,
    sink: &mut dyn ValidationSink,
) -> Option<Service> {
    let mut ctx = InstantiationContext::new(template, sink).with_inputs(inputs.clone());
    ctx.instantiate_service()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::builder::{create_service_template_model, ModelingContext};
    use crate::modeling::coerce::Container;
    use crate::modeling::instances::Node;
    use crate::modeling::templates::NodeTemplate;
    use crate::presentation::parse_document;
    use crate::validation::{IssueCollector, Level};
    use serde_json::json;

    const TEMPLATE: &str = r#"
capability_types:
  Endpoint: {}
  Database.Endpoint:
    derived_from: Endpoint
  Container:
    properties:
      num_cpus: { type: integer, default: 1 }
relationship_types:
  ConnectsTo:
    properties:
      port: { type: integer, required: false }
node_types:
  Compute:
    properties:
      flavor: { type: string, default: small }
    capabilities:
      host: { type: Container }
  Database:
    properties:
      port: { type: integer, default: 5432 }
    capabilities:
      endpoint: { type: Database.Endpoint, occurrences: [0, 1] }
  App:
    properties:
      port: { type: integer, required: false }
    requirements:
      - database: { capability: Endpoint, node: Database, relationship: ConnectsTo }
group_types:
  Tier: {}
policy_types:
  Placement: {}
topology_template:
  inputs:
    db_port: { type: integer, default: 5432 }
    admin: { type: string }
  node_templates:
    app:
      type: App
      properties:
        port: { get_input: db_port }
      requirements:
        - database:
            node: Database
            node_filter:
              properties:
                - port: { equal: 5433 }
            relationship:
              type: ConnectsTo
              properties:
                port: { get_property: [TARGET, port] }
    db_main:
      type: Database
      properties:
        port: { get_input: db_port }
    db_spare:
      type: Database
      properties:
        port: 5433
  groups:
    data:
      type: Tier
      members: [ db_main, db_spare ]
  policies:
    spread:
      type: Placement
      targets: [ data, app ]
  outputs:
    app_port: { value: { get_property: [app, port] } }
"#;

    fn model(text: &str) -> ServiceTemplate {
        let document = parse_document(text).unwrap();
        let mut sink = IssueCollector::new();
        let mut ctx = ModelingContext::new(&document, &mut sink);
        create_service_template_model(&mut ctx)
    }

    fn inputs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn instantiates_nodes_groups_policies_and_outputs() {
        let template = model(TEMPLATE);
        let mut sink = IssueCollector::new();
        let service =
            instantiate_service(&template, &inputs(&[("admin", json!("root"))]), &mut sink).unwrap();

        assert!(sink.is_empty(), "{:?}", sink.issues());
        assert_eq!(service.nodes.len(), 3);
        assert_eq!(service.inputs["admin"].value, json!("root"));

        let app = service.node("app_1").unwrap();
        assert_eq!(app.properties["port"].value, json!(5432));

        let data = service.find_groups("data")[0];
        assert_eq!(data.member_node_ids, vec!["db_main_1", "db_spare_1"]);

        let spread = service.policies.values().next().unwrap();
        assert_eq!(spread.target_node_ids, vec!["app_1"]);
        assert_eq!(spread.target_group_ids, vec![data.id.clone()]);

        assert_eq!(service.outputs["app_port"].value, json!(5432));
    }

    #[test]
    fn requirement_follows_node_filter_and_capability_type() {
        let template = model(TEMPLATE);
        let mut sink = IssueCollector::new();
        let service =
            instantiate_service(&template, &inputs(&[("admin", json!("root"))]), &mut sink).unwrap();

        let app = service.node("app_1").unwrap();
        assert_eq!(app.outbound_relationships.len(), 1);
        let relationship = &app.outbound_relationships[0];
        assert_eq!(relationship.name, "database");
        assert_eq!(relationship.source_node_id, "app_1");
        assert_eq!(relationship.target_node_id, "db_spare_1");
        assert_eq!(relationship.target_capability_name.as_deref(), Some("endpoint"));
        assert_eq!(relationship.type_name.as_deref(), Some("ConnectsTo"));
        assert_eq!(relationship.properties["port"].value, json!(5433));

        let endpoint = &service.node("db_spare_1").unwrap().capabilities["endpoint"];
        assert_eq!(endpoint.occurrences, 1);
    }

    #[test]
    fn user_inputs_override_defaults_and_are_checked() {
        let template = model(TEMPLATE);
        let mut sink = IssueCollector::new();
        let service = instantiate_service(
            &template,
            &inputs(&[("db_port", json!("5433")), ("colour", json!("blue"))]),
            &mut sink,
        )
        .unwrap();

        assert_eq!(service.inputs["db_port"].value, json!(5433));
        assert_eq!(service.node("app_1").unwrap().properties["port"].value, json!(5433));

        let messages: Vec<&str> = sink.issues().iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"input \"colour\" is not supported"));
        assert!(messages.contains(&"required input \"admin\" has no value"));
    }

    #[test]
    fn unsatisfied_requirement_is_reported_between_instances() {
        let text = TEMPLATE.replace("port: { equal: 5433 }", "port: { equal: 9999 }");
        let template = model(&text);
        let mut sink = IssueCollector::new();
        let service =
            instantiate_service(&template, &inputs(&[("admin", json!("root"))]), &mut sink).unwrap();

        assert!(service.node("app_1").unwrap().outbound_relationships.is_empty());
        assert_eq!(sink.at_level(Level::BetweenInstances).count(), 1);
    }

    #[test]
    fn default_instances_yield_distinct_nodes() {
        let mut template = ServiceTemplate::default();
        let mut web = NodeTemplate::new("web", "WebServer");
        web.default_instances = 2;
        template.node_templates.alloc("web", web);

        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        let nodes: Vec<&Node> = service.find_nodes("web");
        assert_eq!(nodes.len(), 2);
        assert_ne!(nodes[0].id, nodes[1].id);
        assert!(nodes.iter().all(|n| n.type_name == "WebServer"));
    }

    #[test]
    fn group_member_without_instances_is_reported() {
        let template = model(
            r#"
node_types:
  Compute:
    capabilities:
      scalable: { type: Scalable }
capability_types:
  Scalable:
    properties:
      default_instances: { type: integer, required: false }
group_types:
  Tier: {}
topology_template:
  node_templates:
    idle:
      type: Compute
      capabilities:
        scalable:
          properties: { default_instances: 0 }
  groups:
    tier:
      type: Tier
      members: [ idle ]
"#,
        );
        assert_eq!(template.node_template("idle").unwrap().default_instances, 0);

        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        assert!(service.nodes.is_empty());
        let tier = service.find_groups("tier")[0];
        assert!(tier.member_node_ids.is_empty());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.issues()[0].level, Level::BetweenInstances);
    }

    #[test]
    fn member_groups_are_linked() {
        let template = model(
            r#"
node_types:
  Compute: {}
group_types:
  Tier: {}
topology_template:
  node_templates:
    vm: { type: Compute }
  groups:
    outer: { type: Tier, members: [ inner ] }
    inner: { type: Tier, members: [ vm ] }
"#,
        );
        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        assert!(sink.is_empty(), "{:?}", sink.issues());
        let outer = service.find_groups("outer")[0];
        assert_eq!(outer.member_group_ids, service.get_group_ids("inner"));
        assert_eq!(service.find_groups("inner")[0].member_node_ids, vec!["vm_1"]);
    }

    #[test]
    fn substitution_mapping_without_nodes_is_omitted() {
        let template = model(
            r#"
capability_types:
  Endpoint: {}
  Scalable:
    properties:
      default_instances: { type: integer, required: false }
node_types:
  Server:
    capabilities:
      endpoint: { type: Endpoint }
      scalable: { type: Scalable }
topology_template:
  node_templates:
    live: { type: Server }
    parked:
      type: Server
      capabilities:
        scalable:
          properties: { default_instances: 0 }
  substitution_mappings:
    node_type: Server
    capabilities:
      public: [ live, endpoint ]
      backup: [ parked, endpoint ]
"#,
        );
        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        let substitution = service.substitution.unwrap();
        assert_eq!(substitution.node_type_name, "Server");
        assert_eq!(substitution.mappings.len(), 1);
        let public = &substitution.mappings["capability.public"];
        assert_eq!(public.node_id, "live_1");
        assert_eq!(public.capability_name.as_deref(), Some("endpoint"));
        assert_eq!(sink.at_level(Level::BetweenInstances).count(), 1);
    }

    const HOSTED: &str = r#"
capability_types:
  Container: {}
node_types:
  Compute:
    capabilities:
      host: { type: Container, occurrences: [0, 1] }
  Software:
    requirements:
      - host: { capability: host }
topology_template:
  node_templates:
    a_vm: { type: Compute }
    b_vm: { type: Compute }
    app1:
      type: Software
      requirements:
        - host: { capability: host }
    app2:
      type: Software
      requirements:
        - host: { capability: host }
"#;

    #[test]
    fn requirement_naming_only_a_capability_binds_where_there_is_room() {
        let template = model(HOSTED);
        let requirement = &template.node_template("app1").unwrap().requirement_templates[0];
        assert_eq!(requirement.target_capability_name.as_deref(), Some("host"));
        assert!(requirement.target_capability_type.is_none());

        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        assert!(sink.is_empty(), "{:?}", sink.issues());
        let first = &service.node("app1_1").unwrap().outbound_relationships[0];
        assert_eq!(first.target_node_id, "a_vm_1");
        assert_eq!(first.target_capability_name.as_deref(), Some("host"));
        // a_vm is full after app1, so app2 moves on to b_vm.
        let second = &service.node("app2_1").unwrap().outbound_relationships[0];
        assert_eq!(second.target_node_id, "b_vm_1");
    }

    const FILTERED: &str = r#"
node_types:
  Database:
    properties:
      port: { type: integer, default: 5432 }
  App:
    requirements:
      - database: { node: Database }
topology_template:
  node_templates:
    a_db:
      type: Database
      node_filter:
        properties:
          - port: { equal: 1 }
    b_db:
      type: Database
    by_type:
      type: App
      requirements:
        - database: Database
    by_name:
      type: App
      requirements:
        - database: a_db
"#;

    #[test]
    fn own_node_filter_guards_selection_by_type() {
        let template = model(FILTERED);
        assert_eq!(
            template.node_template("a_db").unwrap().target_node_template_constraints.len(),
            1
        );

        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        assert!(sink.is_empty(), "{:?}", sink.issues());
        let by_type = &service.node("by_type_1").unwrap().outbound_relationships[0];
        assert_eq!(by_type.target_node_id, "b_db_1");
        // Naming the template directly bypasses its own filter.
        let by_name = &service.node("by_name_1").unwrap().outbound_relationships[0];
        assert_eq!(by_name.target_node_id, "a_db_1");
    }

    #[test]
    fn capability_below_minimum_occurrences_is_reported() {
        let text = HOSTED.replace("occurrences: [0, 1]", "occurrences: [1, 1]");
        let text = text.replace("    b_vm: { type: Compute }\n", "    b_vm: { type: Compute }\n    c_vm: { type: Compute }\n");
        let template = model(&text);
        let mut sink = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut sink).unwrap();

        assert_eq!(service.node("c_vm_1").unwrap().capabilities["host"].occurrences, 0);
        let issues: Vec<_> = sink.at_level(Level::BetweenInstances).collect();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("\"host\" of node \"c_vm_1\""));
    }

    fn renamed(
        template: &NodeTemplate,
        _: &mut InstantiationContext<'_>,
        _: &dyn Container,
    ) -> Option<Node> {
        Some(Node {
            id: format!("custom-{}", template.name),
            template_name: template.name.clone(),
            type_name: template.type_name.clone(),
            description: None,
            properties: Default::default(),
            interfaces: Default::default(),
            artifacts: Default::default(),
            capabilities: Default::default(),
            outbound_relationships: Vec::new(),
        })
    }

    #[test]
    fn overridden_instantiator_is_used_and_restorable() {
        let mut template = ServiceTemplate::default();
        template
            .node_templates
            .alloc("web", NodeTemplate::new("web", "WebServer"));
        let mut sink = IssueCollector::new();
        let mut ctx = InstantiationContext::new(&template, &mut sink);

        let original = ctx.instantiate_service().unwrap();
        assert!(ctx
            .instantiators_mut()
            .register::<NodeTemplate>(renamed, false)
            .is_err());

        let saved = ctx.instantiators().current::<NodeTemplate>();
        ctx.instantiators_mut()
            .register::<NodeTemplate>(renamed, true)
            .unwrap();
        let overridden = ctx.instantiate_service().unwrap();
        assert_eq!(overridden.get_node_ids("web"), vec!["custom-web"]);

        ctx.instantiators_mut().restore::<NodeTemplate>(saved);
        let restored = ctx.instantiate_service().unwrap();
        assert_eq!(restored.get_node_ids("web"), original.get_node_ids("web"));
        assert_eq!(restored.get_node_ids("web"), vec!["web_1"]);
    }
}
