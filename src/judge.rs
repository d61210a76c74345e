//! LLM-backed judges used by the semantic metrics.
//!
//! A judge renders one prompt, makes one call and parses a [`Judgement`].
//! Transport and parse failures surface as [`JudgeError`]; judges never retry.

use crate::document::{Document, Report};
use crate::llm::{complete_structured, LlmCallError, LlmClient, SYSTEM_ROLE};
use crate::prompt::{PromptError, PromptRenderer, TemplateId, TemplateValue, TemplateVariables};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("judge call failed: {0}")]
    Llm(#[from] LlmCallError),
    #[error("judge prompt failed: {0}")]
    Prompt(#[from] PromptError),
}

/// Binary verdict with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Judgement {
    /// A decision if the statement is True or False
    pub decision: bool,
    /// The reason to justify your decision
    pub reason: String,
}

/// Ground truth a statement is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub content: String,
}

impl From<&Document> for Reference {
    fn from(document: &Document) -> Self {
        Self {
            content: document.content.clone(),
        }
    }
}

/// One claim taken from a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub content: String,
}

impl Statement {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Topic {
    /// The main idea of the document
    pub content: String,
}

/// Decides whether a statement holds given a reference.
#[async_trait]
pub trait ReferenceBasedJudge: Send + Sync {
    async fn run(
        &self,
        statement: &Statement,
        reference: &Reference,
    ) -> Result<Judgement, JudgeError>;
}

/// Decides whether a report covers a topic.
#[async_trait]
pub trait TopicBasedJudge: Send + Sync {
    async fn run(&self, topic: &Topic, report: &Report) -> Result<Judgement, JudgeError>;
}

/// Client, templates and system role shared by every judge of a call.
#[derive(Clone)]
pub struct JudgeBackend {
    client: Arc<dyn LlmClient>,
    renderer: Arc<dyn PromptRenderer>,
    system_prompt: String,
}

impl JudgeBackend {
    pub fn new(client: Arc<dyn LlmClient>, renderer: Arc<dyn PromptRenderer>) -> Self {
        Self {
            client,
            renderer,
            system_prompt: SYSTEM_ROLE.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    async fn ask<T>(
        &self,
        template: TemplateId,
        variables: &TemplateVariables,
    ) -> Result<T, JudgeError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let prompt = self.renderer.render(template, variables)?;
        let value = complete_structured(self.client.as_ref(), &self.system_prompt, &prompt).await?;
        Ok(value)
    }
}

fn text_vars<const N: usize>(pairs: [(&str, &str); N]) -> TemplateVariables {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), TemplateValue::Text(value.to_string())))
        .collect()
}

/// Judge if a statement is True or False by a given reference.
pub struct ReferenceBasedCorrectnessJudge {
    backend: JudgeBackend,
}

impl ReferenceBasedCorrectnessJudge {
    pub fn new(backend: JudgeBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ReferenceBasedJudge for ReferenceBasedCorrectnessJudge {
    async fn run(
        &self,
        statement: &Statement,
        reference: &Reference,
    ) -> Result<Judgement, JudgeError> {
        let variables = text_vars([
            ("document", reference.content.as_str()),
            ("statement", statement.content.as_str()),
        ]);
        let judgement: Judgement = self
            .backend
            .ask(TemplateId::CorrectnessJudge, &variables)
            .await?;
        debug!(
            decision = judgement.decision,
            statement = %statement.content,
            "correctness judgement"
        );
        Ok(judgement)
    }
}

pub struct TopicBasedCompletenessJudge {
    backend: JudgeBackend,
}

impl TopicBasedCompletenessJudge {
    pub fn new(backend: JudgeBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TopicBasedJudge for TopicBasedCompletenessJudge {
    async fn run(&self, topic: &Topic, report: &Report) -> Result<Judgement, JudgeError> {
        let variables = text_vars([
            ("report", report.content.as_str()),
            ("topic", topic.content.as_str()),
        ]);
        let judgement: Judgement = self
            .backend
            .ask(TemplateId::CompletenessJudge, &variables)
            .await?;
        debug!(decision = judgement.decision, topic = %topic.content, "completeness judgement");
        Ok(judgement)
    }
}

/// Pulls the main idea out of a document.
pub struct MainTopicExtractor {
    backend: JudgeBackend,
}

impl MainTopicExtractor {
    pub fn new(backend: JudgeBackend) -> Self {
        Self { backend }
    }

    pub async fn run(&self, document: &Document) -> Result<Topic, JudgeError> {
        let variables = text_vars([("document", document.content.as_str())]);
        let topic: Topic = self.backend.ask(TemplateId::MainTopic, &variables).await?;
        debug!(topic = %topic.content, "extracted main topic");
        Ok(topic)
    }
}
