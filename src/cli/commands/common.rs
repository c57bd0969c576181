//! Steps shared by the template commands.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::cli::args::TemplateArgs;
use crate::error::{ModelError, Result};
use crate::modeling::{create_service_template_model, ModelingContext, ServiceTemplate};
use crate::presentation::load_document;
use crate::validation::{
    HumanFormatter, Issue, IssueFormatter, JsonFormatter, OutputFormat, ValidationSink,
};

/// Load the template file and build its model.
pub fn build_model(path: &Path, sink: &mut dyn ValidationSink) -> Result<ServiceTemplate> {
    let document = load_document(path)?;
    let mut ctx = ModelingContext::new(&document, sink);
    Ok(create_service_template_model(&mut ctx))
}

/// Parse one `NAME=VALUE` pair. The value is read as YAML, so `8080` is a
/// number and `[a, b]` a list.
pub fn parse_input(pair: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = pair.split_once('=') else {
        return Err(ModelError::InvalidInput {
            name: pair.to_string(),
            message: "expected NAME=VALUE".to_string(),
        });
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(ModelError::InvalidInput {
            name: pair.to_string(),
            message: "input name is empty".to_string(),
        });
    }
    if raw.trim().is_empty() {
        return Ok((name.to_string(), Value::String(String::new())));
    }
    let value = serde_yaml::from_str(raw).map_err(|e| ModelError::InvalidInput {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok((name.to_string(), value))
}

/// Input values from the inputs file, then from `--input` pairs.
pub fn collect_inputs(args: &TemplateArgs) -> Result<BTreeMap<String, Value>> {
    let mut inputs = BTreeMap::new();

    if let Some(path) = &args.inputs_file {
        if !path.exists() {
            return Err(ModelError::DocumentNotFound { path: path.clone() });
        }
        let content = fs::read_to_string(path)?;
        if !content.trim().is_empty() {
            let from_file: BTreeMap<String, Value> =
                serde_yaml::from_str(&content).map_err(|e| ModelError::DocumentParse {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            inputs.extend(from_file);
        }
    }

    for pair in &args.inputs {
        let (name, value) = parse_input(pair)?;
        inputs.insert(name, value);
    }
    Ok(inputs)
}

/// Write issues in the requested format.
pub fn write_issues(
    issues: &[Issue],
    format: OutputFormat,
    use_color: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Human => HumanFormatter::new(use_color).format(issues, &mut buffer)?,
        OutputFormat::Json => JsonFormatter::new().format(issues, &mut buffer)?,
    }
    out.write_all(&buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn args(inputs: &[&str], inputs_file: Option<PathBuf>) -> TemplateArgs {
        TemplateArgs {
            template: PathBuf::from("service.yaml"),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            inputs_file,
            format: OutputFormat::Human,
            strict: false,
        }
    }

    #[test]
    fn input_values_are_yaml() {
        assert_eq!(parse_input("port=8080").unwrap(), ("port".to_string(), json!(8080)));
        assert_eq!(parse_input("name=web").unwrap(), ("name".to_string(), json!("web")));
        assert_eq!(
            parse_input("hosts=[a, b]").unwrap(),
            ("hosts".to_string(), json!(["a", "b"]))
        );
        assert_eq!(parse_input("url=a=b").unwrap().1, json!("a=b"));
        assert_eq!(parse_input("empty=").unwrap().1, json!(""));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(matches!(
            parse_input("port"),
            Err(ModelError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_input("=8080"),
            Err(ModelError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_input("hosts=[a, b"),
            Err(ModelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn pairs_override_inputs_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inputs.yaml");
        fs::write(&file, "port: 80\nname: web\n").unwrap();

        let inputs = collect_inputs(&args(&["port=8080"], Some(file))).unwrap();
        assert_eq!(inputs["port"], json!(8080));
        assert_eq!(inputs["name"], json!("web"));
    }

    #[test]
    fn missing_inputs_file_is_an_error() {
        let result = collect_inputs(&args(&[], Some(PathBuf::from("/nonexistent/inputs.yaml"))));
        assert!(matches!(result, Err(ModelError::DocumentNotFound { .. })));
    }
}
