//! Prompt templates for the generator and the judges.
//!
//! Templates are plain text with `{{name}}` placeholders. The renderer is built
//! once per process and handed to whoever needs it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Summarize,
    CorrectnessJudge,
    CompletenessJudge,
    MainTopic,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateId::Summarize => "summarize",
            TemplateId::CorrectnessJudge => "correctness_judge",
            TemplateId::CompletenessJudge => "completeness_judge",
            TemplateId::MainTopic => "main_topic",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("template {0} is not registered")]
    UnknownTemplate(TemplateId),
    #[error("template {template} needs variable `{name}`")]
    MissingVariable { template: TemplateId, name: String },
}

/// A value substituted into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Inserted verbatim
    Text(String),
    /// Rendered as one `- item` line per entry
    List(Vec<String>),
}

impl TemplateValue {
    fn render_into(&self, out: &mut String) {
        match self {
            TemplateValue::Text(text) => out.push_str(text),
            TemplateValue::List(items) => {
                let lines: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
                out.push_str(&lines.join("\n"));
            }
        }
    }
}

pub type TemplateVariables = BTreeMap<String, TemplateValue>;

/// Renders a named template with the given variables.
pub trait PromptRenderer: Send + Sync {
    fn render(
        &self,
        template: TemplateId,
        variables: &TemplateVariables,
    ) -> Result<String, PromptError>;
}

/// Optional template bodies from the `[templates]` config section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateOverrides {
    #[serde(default)]
    pub summarize: Option<String>,
    #[serde(default)]
    pub correctness_judge: Option<String>,
    #[serde(default)]
    pub completeness_judge: Option<String>,
    #[serde(default)]
    pub main_topic: Option<String>,
}

const SUMMARIZE_TEMPLATE: &str = "Summarize the following document:

    {{document}}

The summarization report must follow these requirements:
{{requirements}}";

const CORRECTNESS_JUDGE_TEMPLATE: &str = "Read the document as reference:
    {{document}}

Judge if the following statement is True or False:
    {{statement}}";

const COMPLETENESS_JUDGE_TEMPLATE: &str = "Read the following summarization report:
    {{report}}
Check if the summarization report above covers the following topic:
    {{topic}}";

const MAIN_TOPIC_TEMPLATE: &str = "Extract the main idea of the following document:
    {{document}}";

/// `{{name}}` substitution over an in-memory template table.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates: HashMap<TemplateId, String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let templates = [
            (TemplateId::Summarize, SUMMARIZE_TEMPLATE),
            (TemplateId::CorrectnessJudge, CORRECTNESS_JUDGE_TEMPLATE),
            (TemplateId::CompletenessJudge, COMPLETENESS_JUDGE_TEMPLATE),
            (TemplateId::MainTopic, MAIN_TOPIC_TEMPLATE),
        ]
        .into_iter()
        .map(|(id, body)| (id, body.to_string()))
        .collect();

        Self { templates }
    }

    /// Default templates with any configured bodies swapped in
    pub fn with_overrides(overrides: &TemplateOverrides) -> Self {
        let mut renderer = Self::new();
        let pairs = [
            (TemplateId::Summarize, &overrides.summarize),
            (TemplateId::CorrectnessJudge, &overrides.correctness_judge),
            (TemplateId::CompletenessJudge, &overrides.completeness_judge),
            (TemplateId::MainTopic, &overrides.main_topic),
        ];
        for (id, body) in pairs {
            if let Some(body) = body {
                renderer.templates.insert(id, body.clone());
            }
        }
        renderer
    }

    pub fn with_template(mut self, template: TemplateId, body: impl Into<String>) -> Self {
        self.templates.insert(template, body.into());
        self
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(
        &self,
        template: TemplateId,
        variables: &TemplateVariables,
    ) -> Result<String, PromptError> {
        let body = self
            .templates
            .get(&template)
            .ok_or(PromptError::UnknownTemplate(template))?;

        let mut out = String::with_capacity(body.len());
        let mut rest = body.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            out.push_str(&rest[..start]);

            let name = rest[start + 2..start + 2 + len].trim();
            let value = variables
                .get(name)
                .ok_or_else(|| PromptError::MissingVariable {
                    template,
                    name: name.to_string(),
                })?;
            value.render_into(&mut out);

            rest = &rest[start + 2 + len + 2..];
        }
        out.push_str(rest);

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, TemplateValue)]) -> TemplateVariables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_text_and_list_values() {
        let renderer = TemplateRenderer::new()
            .with_template(TemplateId::Summarize, "Doc: {{ document }}\nRules:\n{{requirements}}");

        let rendered = renderer
            .render(
                TemplateId::Summarize,
                &vars(&[
                    ("document", TemplateValue::Text("UCLA {{not a var}}".to_string())),
                    (
                        "requirements",
                        TemplateValue::List(vec!["one;".to_string(), "two;".to_string()]),
                    ),
                ]),
            )
            .unwrap();

        assert_eq!(rendered, "Doc: UCLA {{not a var}}\nRules:\n- one;\n- two;");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(TemplateId::MainTopic, &TemplateVariables::new())
            .unwrap_err();

        assert!(matches!(
            err,
            PromptError::MissingVariable { template: TemplateId::MainTopic, ref name }
                if name == "document"
        ));
    }

    #[test]
    fn default_judge_template_keeps_wording() {
        let rendered = TemplateRenderer::new()
            .render(
                TemplateId::CorrectnessJudge,
                &vars(&[
                    ("document", TemplateValue::Text("UCLA is in LA.".to_string())),
                    ("statement", TemplateValue::Text("UCLA is in LA".to_string())),
                ]),
            )
            .unwrap();

        assert!(rendered.starts_with("Read the document as reference:"));
        assert!(rendered
            .contains("Judge if the following statement is True or False:\n    UCLA is in LA"));
    }

    #[test]
    fn overrides_replace_only_configured_bodies() {
        let overrides = TemplateOverrides {
            main_topic: Some("Topic of {{document}}?".to_string()),
            ..Default::default()
        };
        let renderer = TemplateRenderer::with_overrides(&overrides);

        let topic = renderer
            .render(
                TemplateId::MainTopic,
                &vars(&[("document", TemplateValue::Text("UCLA".to_string()))]),
            )
            .unwrap();
        assert_eq!(topic, "Topic of UCLA?");
        assert!(renderer
            .render(TemplateId::Summarize, &TemplateVariables::new())
            .is_err());
    }
}
