//! Process-wide instantiator overrides.
//!
//! Kept in its own test binary: the override is visible to every context
//! created while the guard is alive.

use std::collections::BTreeMap;

use tosca_model::instantiation::{
    current, instantiate_service, register, InstantiationContext, OverrideGuard,
};
use tosca_model::modeling::{Container, Group, GroupTemplate, NodeTemplate, ServiceTemplate};
use tosca_model::validation::IssueCollector;
use tosca_model::ModelError;

fn unnamed_group(
    template: &GroupTemplate,
    ctx: &mut InstantiationContext<'_>,
    _: &dyn Container,
) -> Option<Group> {
    Some(Group {
        id: ctx.next_id(&format!("{}-override", template.name)),
        template_name: template.name.clone(),
        type_name: template.type_name.clone(),
        description: Some("overridden".to_string()),
        properties: Default::default(),
        interfaces: Default::default(),
        member_node_ids: Vec::new(),
        member_group_ids: Vec::new(),
    })
}

fn template() -> ServiceTemplate {
    let mut template = ServiceTemplate::default();
    let web = template
        .node_templates
        .alloc("web", NodeTemplate::new("web", "WebServer"))
        .unwrap();
    let tier = GroupTemplate {
        name: "tier".to_string(),
        description: None,
        type_name: "Tier".to_string(),
        type_id: None,
        properties: Default::default(),
        interface_templates: Default::default(),
        member_node_templates: vec![web],
        member_group_templates: Vec::new(),
    };
    template.group_templates.alloc("tier", tier);
    template
}

#[test]
fn override_guard_replaces_and_restores_builtin() {
    let template = template();
    assert!(current::<GroupTemplate>().is_some());

    assert!(matches!(
        register::<GroupTemplate>(unnamed_group, false),
        Err(ModelError::DuplicateInstantiator { kind: "group template" })
    ));

    {
        let _guard = OverrideGuard::<GroupTemplate>::new(unnamed_group);
        let mut issues = IssueCollector::new();
        let service = instantiate_service(&template, &BTreeMap::new(), &mut issues).unwrap();
        let tier = service.find_groups("tier")[0];
        assert_eq!(tier.id, "tier-override_1");
        assert!(tier.member_node_ids.is_empty());
    }

    let mut issues = IssueCollector::new();
    let service = instantiate_service(&template, &BTreeMap::new(), &mut issues).unwrap();
    let tier = service.find_groups("tier")[0];
    assert_eq!(tier.id, "tier_1");
    assert_eq!(tier.member_node_ids, vec!["web_1"]);
    assert!(current::<GroupTemplate>().is_some());
}
