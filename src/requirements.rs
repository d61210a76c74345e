//! Acceptance requirements for candidate reports.
//!
//! Every requirement describes itself for the generation prompt and checks a
//! report through its metric extractor. `is_satisfied` is async for all of
//! them; structural checks resolve immediately.

use crate::document::{Document, Report, PARAGRAPH_DELIMITER};
use crate::judge::{
    JudgeBackend, JudgeError, MainTopicExtractor, Reference, ReferenceBasedCorrectnessJudge,
    ReferenceBasedJudge, TopicBasedCompletenessJudge, TopicBasedJudge,
};
use crate::metrics::{
    CompletenessMetricExtractor, CorrectnessMetricExtractor, HasTitleMetricExtractor, Metric,
    MetricExtractor, NumberOfParagraphMetricExtractor, NumberOfTokenMetricExtractor,
    TitleLengthMetricExtractor,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Requirement: Send + Sync {
    fn name(&self) -> &str;

    /// Instruction placed verbatim in the generation prompt
    fn description(&self) -> &str;

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError>;

    /// Only requirements returning `true` here gate candidate validity
    fn must_be_satisfied(&self) -> bool;
}

/// Acceptable output token range for a document of `document_tokens` tokens.
///
/// The range is `compression_rate ± 0.05` of the document, clamped to
/// `[0.1, 0.9]` and truncated to whole tokens.
pub fn token_bounds(document_tokens: usize, compression_rate: f64) -> (usize, usize) {
    let total = document_tokens as f64;
    let low = (compression_rate - 0.05).max(0.1) * total;
    let high = (compression_rate + 0.05).min(0.9) * total;
    (low as usize, high as usize)
}

fn within(metric: &Metric, min: usize, max: usize) -> bool {
    metric
        .as_count()
        .is_some_and(|count| min <= count && count <= max)
}

pub struct HasTitleRequirement {
    must_be_satisfied: bool,
    metric_extractor: HasTitleMetricExtractor,
}

impl HasTitleRequirement {
    pub fn new(must_be_satisfied: bool) -> Self {
        Self {
            must_be_satisfied,
            metric_extractor: HasTitleMetricExtractor,
        }
    }
}

#[async_trait]
impl Requirement for HasTitleRequirement {
    fn name(&self) -> &str {
        "Has-Title-Requirement"
    }

    fn description(&self) -> &str {
        "Include a title that tells readers exactly what the document is about;"
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        Ok(self.metric_extractor.extract(report).as_flag())
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}

pub struct TitleLengthRequirement {
    min_num_of_char: usize,
    max_num_of_char: usize,
    must_be_satisfied: bool,
    description: String,
    metric_extractor: TitleLengthMetricExtractor,
}

impl TitleLengthRequirement {
    pub fn new(min_num_of_char: usize, max_num_of_char: usize, must_be_satisfied: bool) -> Self {
        Self {
            min_num_of_char,
            max_num_of_char,
            must_be_satisfied,
            description: format!(
                "Title must be: (1) longer than {} characters and (2) shorter than {} characters;",
                min_num_of_char, max_num_of_char
            ),
            metric_extractor: TitleLengthMetricExtractor,
        }
    }
}

#[async_trait]
impl Requirement for TitleLengthRequirement {
    fn name(&self) -> &str {
        "Title-Length-Requirement"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        let metric = self.metric_extractor.extract(report);
        Ok(within(&metric, self.min_num_of_char, self.max_num_of_char))
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}

/// Formatting instruction only: always satisfied, never gating.
pub struct DoubleNewlineDelimiterRequirement {
    description: String,
}

impl DoubleNewlineDelimiterRequirement {
    pub fn new() -> Self {
        Self {
            description: format!(
                "Use \"{}\" as the delimiter to separate paragraphs;",
                PARAGRAPH_DELIMITER
            ),
        }
    }
}

impl Default for DoubleNewlineDelimiterRequirement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Requirement for DoubleNewlineDelimiterRequirement {
    fn name(&self) -> &str {
        "Double-Newline-As-Paragraph-Delimiter-Requirement"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn is_satisfied(&self, _report: &Report) -> Result<bool, JudgeError> {
        Ok(true)
    }

    fn must_be_satisfied(&self) -> bool {
        false
    }
}

pub struct NumberOfParagraphRequirement {
    min_num_of_paragraph: usize,
    max_num_of_paragraph: usize,
    must_be_satisfied: bool,
    description: String,
    metric_extractor: NumberOfParagraphMetricExtractor,
}

impl NumberOfParagraphRequirement {
    pub fn new(
        min_num_of_paragraph: usize,
        max_num_of_paragraph: usize,
        must_be_satisfied: bool,
    ) -> Self {
        Self {
            min_num_of_paragraph,
            max_num_of_paragraph,
            must_be_satisfied,
            description: format!(
                "Summarization report should have {} to {} paragraphs in total;",
                min_num_of_paragraph, max_num_of_paragraph
            ),
            metric_extractor: NumberOfParagraphMetricExtractor,
        }
    }
}

#[async_trait]
impl Requirement for NumberOfParagraphRequirement {
    fn name(&self) -> &str {
        "Number-Of-Paragraphs-Requirement"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        let metric = self.metric_extractor.extract(report);
        Ok(within(&metric, self.min_num_of_paragraph, self.max_num_of_paragraph))
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}

pub struct NumberOfTokenRequirement {
    min_num_of_token: usize,
    max_num_of_token: usize,
    must_be_satisfied: bool,
    description: String,
    metric_extractor: NumberOfTokenMetricExtractor,
}

impl NumberOfTokenRequirement {
    pub fn new(min_num_of_token: usize, max_num_of_token: usize, must_be_satisfied: bool) -> Self {
        Self {
            min_num_of_token,
            max_num_of_token,
            must_be_satisfied,
            description: format!(
                "Summarization report should have {} to {} tokens / words in total;",
                min_num_of_token, max_num_of_token
            ),
            metric_extractor: NumberOfTokenMetricExtractor,
        }
    }

    /// Token range derived from the source document and a compression rate
    pub fn for_document(
        document: &Document,
        compression_rate: f64,
        must_be_satisfied: bool,
    ) -> Self {
        let (min, max) = token_bounds(document.num_tokens(), compression_rate);
        Self::new(min, max, must_be_satisfied)
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.min_num_of_token, self.max_num_of_token)
    }
}

#[async_trait]
impl Requirement for NumberOfTokenRequirement {
    fn name(&self) -> &str {
        "Number-Of-Tokens-Requirement"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        let metric = self.metric_extractor.extract(report);
        Ok(within(&metric, self.min_num_of_token, self.max_num_of_token))
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}

/// Every paragraph must be judged true against the source document.
pub struct CorrectnessRequirement {
    must_be_satisfied: bool,
    metric_extractor: CorrectnessMetricExtractor,
}

impl CorrectnessRequirement {
    pub fn new(document: &Document, backend: JudgeBackend, must_be_satisfied: bool) -> Self {
        Self::with_judge(
            document,
            Arc::new(ReferenceBasedCorrectnessJudge::new(backend)),
            must_be_satisfied,
        )
    }

    pub fn with_judge(
        document: &Document,
        judge: Arc<dyn ReferenceBasedJudge>,
        must_be_satisfied: bool,
    ) -> Self {
        Self {
            must_be_satisfied,
            metric_extractor: CorrectnessMetricExtractor::new(judge, Reference::from(document)),
        }
    }
}

#[async_trait]
impl Requirement for CorrectnessRequirement {
    fn name(&self) -> &str {
        "Correctness-Requirement"
    }

    fn description(&self) -> &str {
        "Ensure the summary faithfully reflects the original document meaning without adding personal opinions;"
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        let metric = self.metric_extractor.extract(report).await?;
        Ok(metric.as_flag())
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}

/// The report must cover the main topic of the source document.
pub struct CompletenessRequirement {
    must_be_satisfied: bool,
    metric_extractor: CompletenessMetricExtractor,
}

impl CompletenessRequirement {
    pub fn new(document: &Document, backend: JudgeBackend, must_be_satisfied: bool) -> Self {
        let judge: Arc<dyn TopicBasedJudge> =
            Arc::new(TopicBasedCompletenessJudge::new(backend.clone()));
        Self {
            must_be_satisfied,
            metric_extractor: CompletenessMetricExtractor::new(
                MainTopicExtractor::new(backend),
                judge,
                Reference::from(document),
            ),
        }
    }
}

#[async_trait]
impl Requirement for CompletenessRequirement {
    fn name(&self) -> &str {
        "Completeness-Requirement"
    }

    fn description(&self) -> &str {
        "Ensure the summary cover the main idea of the document;"
    }

    async fn is_satisfied(&self, report: &Report) -> Result<bool, JudgeError> {
        let metric = self.metric_extractor.extract(report).await?;
        Ok(metric.as_flag())
    }

    fn must_be_satisfied(&self) -> bool {
        self.must_be_satisfied
    }
}
