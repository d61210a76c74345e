//! Best-of-N summarisation.
//!
//! One call runs a single pass: assemble requirements, render one prompt,
//! make `num_tries` generation attempts, keep the candidates that meet every
//! must-satisfy requirement and pick one of them by the configured
//! [`SelectionPolicy`].

use crate::document::{Document, Report};
use crate::judge::JudgeBackend;
use crate::llm::{complete_structured, LlmClient, SYSTEM_ROLE};
use crate::prompt::{PromptError, PromptRenderer, TemplateId, TemplateValue, TemplateVariables};
use crate::requirements::{
    CompletenessRequirement, CorrectnessRequirement, DoubleNewlineDelimiterRequirement,
    HasTitleRequirement, NumberOfParagraphRequirement, NumberOfTokenRequirement, Requirement,
    TitleLengthRequirement,
};
use crate::scoring::{default_scorers, Scorer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error(
        "calling large language model api failed: none of {attempts} attempts produced a report"
    )]
    GenerationUnavailable { attempts: usize },
    #[error("no report satisfies all must requirements ({candidates} candidates checked)")]
    NoCandidateSatisfiesRequirements { candidates: usize },
    #[error("failed to build prompt: {0}")]
    Prompt(#[from] PromptError),
    #[error("invalid summarizer settings: {0}")]
    InvalidSettings(String),
}

/// How one report is chosen among the valid candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Earliest valid candidate in generation order
    #[default]
    FirstValid,
    /// Highest summed scorer value; ties keep the earliest
    BestScored,
}

/// Per-call knobs for [`BestHitSummarizer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizerSettings {
    pub num_tries: usize,
    pub has_title: bool,
    pub min_title_chars: usize,
    pub max_title_chars: usize,
    pub min_paragraphs: usize,
    pub max_paragraphs: usize,
    pub compression_rate: f64,
    pub judge_augmented: bool,
    pub selection: SelectionPolicy,
    pub system_prompt: String,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            num_tries: 3,
            has_title: true,
            min_title_chars: 5,
            max_title_chars: 80,
            min_paragraphs: 2,
            max_paragraphs: 4,
            compression_rate: 0.2,
            judge_augmented: false,
            selection: SelectionPolicy::FirstValid,
            system_prompt: SYSTEM_ROLE.to_string(),
        }
    }
}

impl SummarizerSettings {
    /// Reject settings no report could ever satisfy
    pub fn validate(&self) -> Result<(), SummarizeError> {
        if self.num_tries == 0 {
            return Err(SummarizeError::InvalidSettings("num_tries must be at least 1".to_string()));
        }
        if self.min_title_chars > self.max_title_chars {
            return Err(SummarizeError::InvalidSettings(format!(
                "title length bounds are inverted: {} > {}",
                self.min_title_chars, self.max_title_chars
            )));
        }
        if self.min_paragraphs > self.max_paragraphs {
            return Err(SummarizeError::InvalidSettings(format!(
                "paragraph bounds are inverted: {} > {}",
                self.min_paragraphs, self.max_paragraphs
            )));
        }
        // outside this range the derived token bounds invert
        if !(0.05..=0.95).contains(&self.compression_rate) {
            return Err(SummarizeError::InvalidSettings(format!(
                "compression_rate must be within [0.05, 0.95], got {}",
                self.compression_rate
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, document: &Document) -> Result<Report, SummarizeError>;
}

/// A generated report tagged with the attempt that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub report: Report,
}

/// Keep the candidates meeting every requirement in `must`, in generation order.
///
/// A judge failure while checking a candidate counts as unsatisfied.
pub async fn validate_candidates(
    candidates: &[Candidate],
    must: &[&dyn Requirement],
) -> Vec<Candidate> {
    let mut valid = Vec::new();

    'candidates: for candidate in candidates {
        for requirement in must {
            match requirement.is_satisfied(&candidate.report).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        index = candidate.index,
                        requirement = requirement.name(),
                        "candidate rejected"
                    );
                    continue 'candidates;
                }
                Err(e) => {
                    warn!(
                        index = candidate.index,
                        requirement = requirement.name(),
                        error = %e,
                        "requirement check failed, treating as unsatisfied"
                    );
                    continue 'candidates;
                }
            }
        }
        valid.push(candidate.clone());
    }

    valid
}

/// Pick one of the valid candidates; `None` only when `valid` is empty.
pub fn select_candidate(
    policy: SelectionPolicy,
    valid: Vec<Candidate>,
    scorers: &[Box<dyn Scorer>],
    reference: &Document,
) -> Option<Candidate> {
    match policy {
        SelectionPolicy::FirstValid => valid.into_iter().next(),
        SelectionPolicy::BestScored => {
            let mut best: Option<(f64, Candidate)> = None;
            for candidate in valid {
                let mut score = 0.0;
                for scorer in scorers {
                    let value = scorer.score(&candidate.report, reference);
                    debug!(
                        index = candidate.index,
                        scorer = scorer.name(),
                        value,
                        "scored candidate"
                    );
                    score += value;
                }

                match &best {
                    Some((best_score, _)) if score <= *best_score => {}
                    _ => best = Some((score, candidate)),
                }
            }
            best.map(|(_, candidate)| candidate)
        }
    }
}

/// Generates several candidate summaries and returns the best valid one.
pub struct BestHitSummarizer {
    client: Arc<dyn LlmClient>,
    renderer: Arc<dyn PromptRenderer>,
    settings: SummarizerSettings,
    scorers: Vec<Box<dyn Scorer>>,
}

impl BestHitSummarizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        renderer: Arc<dyn PromptRenderer>,
        settings: SummarizerSettings,
    ) -> Self {
        Self {
            client,
            renderer,
            settings,
            scorers: default_scorers(),
        }
    }

    pub fn with_scorers(mut self, scorers: Vec<Box<dyn Scorer>>) -> Self {
        self.scorers = scorers;
        self
    }

    /// Requirements for one document, in prompt order
    pub fn requirements(&self, document: &Document) -> Vec<Box<dyn Requirement>> {
        let s = &self.settings;
        let mut requirements: Vec<Box<dyn Requirement>> = Vec::new();

        if s.has_title {
            requirements.push(Box::new(HasTitleRequirement::new(true)));
            requirements.push(Box::new(TitleLengthRequirement::new(
                s.min_title_chars,
                s.max_title_chars,
                true,
            )));
        }
        requirements.push(Box::new(DoubleNewlineDelimiterRequirement::new()));
        requirements.push(Box::new(NumberOfParagraphRequirement::new(
            s.min_paragraphs,
            s.max_paragraphs,
            true,
        )));
        requirements.push(Box::new(NumberOfTokenRequirement::for_document(
            document,
            s.compression_rate,
            true,
        )));

        if s.judge_augmented {
            let backend = JudgeBackend::new(self.client.clone(), self.renderer.clone())
                .with_system_prompt(s.system_prompt.clone());
            requirements.push(Box::new(CorrectnessRequirement::new(
                document,
                backend.clone(),
                true,
            )));
            requirements.push(Box::new(CompletenessRequirement::new(document, backend, true)));
        }

        requirements
    }

    /// Generation prompt listing every requirement, gating or not
    pub fn render_prompt(
        &self,
        document: &Document,
        requirements: &[Box<dyn Requirement>],
    ) -> Result<String, PromptError> {
        let descriptions = requirements
            .iter()
            .map(|requirement| requirement.description().to_string())
            .collect();

        let mut variables = TemplateVariables::new();
        variables.insert("document".to_string(), TemplateValue::Text(document.content.clone()));
        variables.insert("requirements".to_string(), TemplateValue::List(descriptions));

        self.renderer.render(TemplateId::Summarize, &variables)
    }

    /// Make `num_tries` sequential attempts; failed attempts contribute nothing
    pub async fn generate(&self, prompt: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for index in 0..self.settings.num_tries {
            info!(attempt = index, "summarizing");
            let attempt = complete_structured::<Report>(
                self.client.as_ref(),
                &self.settings.system_prompt,
                prompt,
            )
            .await;
            match attempt {
                Ok(report) => {
                    debug!(attempt = index, title = %report.title, "attempt produced a report");
                    candidates.push(Candidate { index, report });
                }
                Err(e) => warn!(attempt = index, error = %e, "attempt failed"),
            }
        }

        candidates
    }

    /// Run the pipeline against an explicit requirement set
    pub async fn summarize_with(
        &self,
        document: &Document,
        requirements: Vec<Box<dyn Requirement>>,
    ) -> Result<Report, SummarizeError> {
        self.settings.validate()?;

        let must: Vec<&dyn Requirement> = requirements
            .iter()
            .filter(|requirement| requirement.must_be_satisfied())
            .map(|requirement| requirement.as_ref())
            .collect();
        info!(
            requirements = requirements.len(),
            must_be_satisfied = must.len(),
            "assembled requirements"
        );

        let prompt = self.render_prompt(document, &requirements)?;
        let candidates = self.generate(&prompt).await;
        if candidates.is_empty() {
            return Err(SummarizeError::GenerationUnavailable {
                attempts: self.settings.num_tries,
            });
        }

        let valid = validate_candidates(&candidates, &must).await;
        info!(candidates = candidates.len(), valid = valid.len(), "validated candidates");

        let no_valid = SummarizeError::NoCandidateSatisfiesRequirements {
            candidates: candidates.len(),
        };
        let selected = select_candidate(self.settings.selection, valid, &self.scorers, document)
            .ok_or(no_valid)?;
        info!(index = selected.index, policy = ?self.settings.selection, "selected candidate");

        Ok(selected.report)
    }
}

#[async_trait]
impl Summarizer for BestHitSummarizer {
    async fn summarize(&self, document: &Document) -> Result<Report, SummarizeError> {
        let requirements = self.requirements(document);
        self.summarize_with(document, requirements).await
    }
}
