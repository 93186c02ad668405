use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::cli::utils::{output_error, output_success, output_value, parse_params};
use crate::cli::OutputFormat;
use crate::query::{self, NewQueryTemplate};

#[derive(Subcommand)]
pub enum TemplateCommands {
    #[command(about = "Check a template definition file (JSON or YAML)")]
    Check {
        #[arg(help = "Template file")]
        file: PathBuf,
    },

    #[command(about = "Validate parameters and print the substituted query document")]
    Render {
        #[arg(help = "Template file")]
        file: PathBuf,
        #[arg(long, help = "Parameters as a JSON object")]
        params: Option<String>,
    },
}

pub async fn handle(cmd: TemplateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TemplateCommands::Check { file } => {
            let definition = load_template(&file)?;
            if let Err(e) = definition.check() {
                output_error(&output_format, &format!("Template '{}' is invalid", definition.name), &[e.to_string()])?;
                anyhow::bail!("template check failed");
            }
            output_success(
                &output_format,
                &format!("Template '{}' is valid", definition.name),
                Some(json!({
                    "name": definition.name,
                    "collection": definition.collection,
                    "parameters": definition.parameters.len(),
                })),
            )
        }
        TemplateCommands::Render { file, params } => {
            let definition = load_template(&file)?;
            definition
                .check()
                .with_context(|| format!("template '{}' is invalid", definition.name))?;

            let provided = parse_params(params.as_deref())?;
            let template = definition.into_template(None);

            let errors = query::validate(&template, &provided);
            if !errors.is_empty() {
                output_error(&output_format, "Parameter validation failed", &errors)?;
                anyhow::bail!("{} parameter error(s)", errors.len());
            }

            let document = query::substitute(&template, &provided);
            let unresolved = query::unresolved_placeholders(&document);
            for name in &unresolved {
                tracing::warn!("Placeholder '{}' left unresolved", name);
            }

            output_value(
                &output_format,
                &json!({
                    "collection": template.collection,
                    "query": document,
                    "unresolved": unresolved,
                }),
            )
        }
    }
}

/// Read a template definition, YAML for `.yaml`/`.yml`, JSON otherwise
pub fn load_template(path: &Path) -> anyhow::Result<NewQueryTemplate> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_template(&content, is_yaml(path))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

pub fn parse_template(content: &str, yaml: bool) -> anyhow::Result<NewQueryTemplate> {
    let definition: NewQueryTemplate = if yaml {
        serde_yaml::from_str(content)?
    } else {
        serde_json::from_str(content)?
    };
    Ok(definition.normalized())
}
