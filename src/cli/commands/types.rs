//! Types command implementation.
//!
//! The `tosca-model types` command prints the type forests of a service
//! template, one indented tree per type category.

use std::io::Write;

use serde::Serialize;

use crate::cli::args::TypesArgs;
use crate::error::Result;
use crate::presentation::load_document;
use crate::types::{TypeForest, TypeRegistry, TypeVariant};
use crate::validation::{IssueCollector, OutputFormat};

use super::dispatcher::{Command, CommandResult};

/// The types command implementation.
pub struct TypesCommand {
    args: TypesArgs,
}

#[derive(Serialize)]
struct TypeEntry<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    depth: usize,
}

impl TypesCommand {
    /// Create a new types command.
    pub fn new(args: TypesArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &TypesArgs {
        &self.args
    }

    fn entries(forest: &TypeForest) -> Vec<TypeEntry<'_>> {
        forest
            .walk()
            .into_iter()
            .map(|(depth, id)| {
                let node = forest.get(id);
                TypeEntry {
                    name: &node.name,
                    parent: node.parent.map(|parent| forest.name(parent)),
                    role: node.role.as_deref(),
                    depth,
                }
            })
            .collect()
    }

    fn write_tree(forest: &TypeForest, out: &mut dyn Write) -> std::io::Result<()> {
        for entry in Self::entries(forest) {
            write!(out, "{}{}", "  ".repeat(entry.depth + 1), entry.name)?;
            match entry.role {
                Some(role) => writeln!(out, " ({})", role)?,
                None => writeln!(out)?,
            }
        }
        Ok(())
    }
}

impl Command for TypesCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let document = load_document(&self.args.template)?;
        let mut issues = IssueCollector::new();
        let registry = TypeRegistry::from_document(&document, &mut issues);
        tracing::info!(
            "{} types in {}",
            registry.len(),
            self.args.template.display()
        );

        match self.args.format {
            OutputFormat::Json => {
                let forests: std::collections::BTreeMap<&str, Vec<TypeEntry<'_>>> = TypeVariant::ALL
                    .iter()
                    .map(|variant| (variant.catalog_key(), Self::entries(registry.forest(*variant))))
                    .collect();
                serde_json::to_writer_pretty(&mut *out, &forests).map_err(anyhow::Error::from)?;
                writeln!(out)?;
            }
            OutputFormat::Human => {
                for variant in TypeVariant::ALL {
                    let forest = registry.forest(variant);
                    if forest.is_empty() {
                        continue;
                    }
                    writeln!(out, "{}:", variant.catalog_key())?;
                    Self::write_tree(forest, out)?;
                }
            }
        }

        for issue in issues.issues() {
            tracing::warn!("{}", issue);
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TYPES: &str = r#"
node_types:
  Root: {}
  Compute:
    derived_from: Root
  WebServer:
    derived_from: Compute
policy_types:
  Plugin:
    _extensions: { role: plugin }
"#;

    fn run(format: OutputFormat) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        fs::write(&path, TYPES).unwrap();

        let mut out = Vec::new();
        let result = TypesCommand::new(TypesArgs {
            template: path,
            format,
        })
        .execute(&mut out)
        .unwrap();
        assert!(result.success);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_indented_tree() {
        let text = run(OutputFormat::Human);
        assert!(text.contains("node_types:\n  Root\n    Compute\n      WebServer\n"));
        assert!(text.contains("policy_types:\n  Plugin (plugin)\n"));
        assert!(!text.contains("group_types:"));
    }

    #[test]
    fn prints_json_with_parents() {
        let forests: serde_json::Value = serde_json::from_str(&run(OutputFormat::Json)).unwrap();
        let nodes = forests["node_types"].as_array().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2]["name"], "WebServer");
        assert_eq!(nodes[2]["parent"], "Compute");
        assert_eq!(nodes[2]["depth"], 2);
        assert!(forests["group_types"].as_array().unwrap().is_empty());
    }
}
