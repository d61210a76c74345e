//! Named measurements taken from a candidate report.
//!
//! Structural extractors are pure functions of the report. The correctness and
//! completeness extractors call judges and are async.

use crate::document::{Document, Report, PARAGRAPH_DELIMITER};
use crate::judge::{
    JudgeError, MainTopicExtractor, Reference, ReferenceBasedJudge, Statement, Topic,
    TopicBasedJudge,
};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const HAS_TITLE_METRIC: &str = "Has-Title-Metric";
pub const TITLE_LENGTH_METRIC: &str = "Number-Of-Chars-In-Title-Metric";
pub const NUMBER_OF_PARAGRAPHS_METRIC: &str = "Number-Of-Paragraphs-Metric";
pub const NUMBER_OF_TOKENS_METRIC: &str = "Number-Of-Tokens-Metric";
pub const CORRECTNESS_METRIC: &str = "Correctness-Metric";
pub const COMPLETENESS_METRIC: &str = "Completeness-Metric";

/// A stringified scalar with the name of what it measures.
///
/// Two metrics are equal only when both name and value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metric {
    name: String,
    value: String,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn flag(name: &str, on: bool) -> Self {
        Self::new(name, if on { "1" } else { "0" })
    }

    fn count(name: &str, n: usize) -> Self {
        Self::new(name, n.to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `true` for a "1" flag
    pub fn as_flag(&self) -> bool {
        self.value == "1"
    }

    pub fn as_count(&self) -> Option<usize> {
        self.value.parse().ok()
    }
}

/// Pure measurement of a report.
pub trait MetricExtractor: Send + Sync {
    fn extract(&self, report: &Report) -> Metric;
}

/// "1" when the title is non-empty, untrimmed
#[derive(Debug, Clone, Copy, Default)]
pub struct HasTitleMetricExtractor;

impl MetricExtractor for HasTitleMetricExtractor {
    fn extract(&self, report: &Report) -> Metric {
        Metric::flag(HAS_TITLE_METRIC, !report.title.is_empty())
    }
}

/// Characters in the trimmed title
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleLengthMetricExtractor;

impl MetricExtractor for TitleLengthMetricExtractor {
    fn extract(&self, report: &Report) -> Metric {
        Metric::count(TITLE_LENGTH_METRIC, report.title.trim().chars().count())
    }
}

/// Segments of the trimmed content split on the paragraph delimiter
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOfParagraphMetricExtractor;

impl MetricExtractor for NumberOfParagraphMetricExtractor {
    fn extract(&self, report: &Report) -> Metric {
        let paragraphs = report.content.trim().split(PARAGRAPH_DELIMITER).count();
        Metric::count(NUMBER_OF_PARAGRAPHS_METRIC, paragraphs)
    }
}

/// Whitespace-delimited tokens in the content
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOfTokenMetricExtractor;

impl MetricExtractor for NumberOfTokenMetricExtractor {
    fn extract(&self, report: &Report) -> Metric {
        Metric::count(NUMBER_OF_TOKENS_METRIC, report.content.split_whitespace().count())
    }
}

/// "1" iff every paragraph of the report is judged true against the reference.
///
/// Paragraphs are judged concurrently; the first failing judge call fails the
/// whole extraction.
pub struct CorrectnessMetricExtractor {
    judge: Arc<dyn ReferenceBasedJudge>,
    reference: Reference,
}

impl CorrectnessMetricExtractor {
    pub fn new(judge: Arc<dyn ReferenceBasedJudge>, reference: Reference) -> Self {
        Self { judge, reference }
    }

    pub async fn extract(&self, report: &Report) -> Result<Metric, JudgeError> {
        let statements: Vec<Statement> = report.paragraphs().map(Statement::new).collect();

        let judgements = try_join_all(
            statements
                .iter()
                .map(|statement| self.judge.run(statement, &self.reference)),
        )
        .await?;

        let all_true = judgements.iter().all(|judgement| judgement.decision);
        Ok(Metric::flag(CORRECTNESS_METRIC, all_true))
    }
}

/// "1" when the report covers the main topic of the reference.
///
/// The topic is extracted once per extractor and reused for every report; a
/// failed extraction is retried on the next report.
pub struct CompletenessMetricExtractor {
    topic_extractor: MainTopicExtractor,
    judge: Arc<dyn TopicBasedJudge>,
    reference: Document,
    topic: OnceCell<Topic>,
}

impl CompletenessMetricExtractor {
    pub fn new(
        topic_extractor: MainTopicExtractor,
        judge: Arc<dyn TopicBasedJudge>,
        reference: Reference,
    ) -> Self {
        Self {
            topic_extractor,
            judge,
            reference: Document::new(reference.content),
            topic: OnceCell::new(),
        }
    }

    pub async fn extract(&self, report: &Report) -> Result<Metric, JudgeError> {
        let topic = self
            .topic
            .get_or_try_init(|| self.topic_extractor.run(&self.reference))
            .await?;

        let judgement = self.judge.run(topic, report).await?;
        Ok(Metric::flag(COMPLETENESS_METRIC, judgement.decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{JudgeBackend, Judgement};
    use crate::llm::{LlmCallError, MockLlmClient};
    use crate::prompt::TemplateRenderer;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(title: &str, content: &str) -> Report {
        Report::new(title, content)
    }

    #[test]
    fn has_title_is_zero_only_for_empty_title() {
        let extractor = HasTitleMetricExtractor;
        assert_eq!(extractor.extract(&report("", "x")).value(), "0");
        assert_eq!(extractor.extract(&report("UCLA", "x")).value(), "1");
        // not trimmed before the check
        assert_eq!(extractor.extract(&report("  ", "x")).value(), "1");
    }

    #[test]
    fn title_length_counts_trimmed_chars() {
        let metric = TitleLengthMetricExtractor.extract(&report(" UCLA ", "x"));
        assert_eq!(metric.name(), TITLE_LENGTH_METRIC);
        assert_eq!(metric.value(), "4");
        assert_eq!(TitleLengthMetricExtractor.extract(&report("Zürich", "x")).as_count(), Some(6));
    }

    #[test]
    fn paragraphs_split_on_double_newline() {
        let extractor = NumberOfParagraphMetricExtractor;
        assert_eq!(extractor.extract(&report("t", "A.\n\nB.")).value(), "2");
        assert_eq!(extractor.extract(&report("t", "A. B.")).value(), "1");
        assert_eq!(extractor.extract(&report("t", "\n\nA.\n\nB.\n\n")).value(), "2");
    }

    #[test]
    fn tokens_split_on_whitespace() {
        let metric = NumberOfTokenMetricExtractor
            .extract(&report("t", "UCLA is a public university at Los Angeles."));
        assert_eq!(metric.value(), "8");
    }

    #[test]
    fn metric_equality_covers_name_and_value() {
        let a = Metric::new(NUMBER_OF_TOKENS_METRIC, "2");
        let b = Metric::new(NUMBER_OF_PARAGRAPHS_METRIC, "2");
        assert_ne!(a, b);
        assert_eq!(a, Metric::new(NUMBER_OF_TOKENS_METRIC, "2"));

        let set: HashSet<Metric> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    /// True unless the statement says "false"; errors on "boom"
    struct KeywordJudge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReferenceBasedJudge for KeywordJudge {
        async fn run(
            &self,
            statement: &Statement,
            _reference: &Reference,
        ) -> Result<Judgement, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if statement.content.contains("boom") {
                return Err(JudgeError::Llm(LlmCallError::RequestFailed("boom".to_string())));
            }
            Ok(Judgement {
                decision: !statement.content.contains("false"),
                reason: "keyword".to_string(),
            })
        }
    }

    fn correctness() -> (Arc<KeywordJudge>, CorrectnessMetricExtractor) {
        let judge = Arc::new(KeywordJudge {
            calls: AtomicUsize::new(0),
        });
        let extractor = CorrectnessMetricExtractor::new(
            judge.clone(),
            Reference {
                content: "reference".to_string(),
            },
        );
        (judge, extractor)
    }

    #[tokio::test]
    async fn correctness_judges_each_paragraph() {
        let (judge, extractor) = correctness();

        let metric = extractor
            .extract(&report("t", "A is true.\n\n  \n\nB is true."))
            .await
            .unwrap();
        assert_eq!(metric, Metric::new(CORRECTNESS_METRIC, "1"));
        assert_eq!(judge.calls.load(Ordering::SeqCst), 2);

        let metric = extractor
            .extract(&report("t", "A is true.\n\nB is false."))
            .await
            .unwrap();
        assert!(!metric.as_flag());
    }

    #[tokio::test]
    async fn correctness_fails_when_any_judge_call_fails() {
        let (_judge, extractor) = correctness();

        let result = extractor.extract(&report("t", "A is true.\n\nboom")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn completeness_extracts_topic_once() {
        let client = Arc::new(MockLlmClient::new(|request| {
            if request.user_prompt.starts_with("Extract the main idea") {
                Ok(r#"{"content": "UCLA is a public university"}"#.to_string())
            } else {
                Ok(r#"{"decision": true, "reason": "covered"}"#.to_string())
            }
        }));
        let backend = JudgeBackend::new(client.clone(), Arc::new(TemplateRenderer::new()));
        let extractor = CompletenessMetricExtractor::new(
            MainTopicExtractor::new(backend.clone()),
            Arc::new(crate::judge::TopicBasedCompletenessJudge::new(backend)),
            Reference {
                content: "UCLA is a public research university.".to_string(),
            },
        );

        for _ in 0..2 {
            let metric = extractor
                .extract(&report("UCLA", "UCLA is a public university."))
                .await
                .unwrap();
            assert!(metric.as_flag());
        }

        let topic_calls = client
            .requests()
            .iter()
            .filter(|r| r.user_prompt.starts_with("Extract the main idea"))
            .count();
        assert_eq!(topic_calls, 1);
        assert_eq!(client.call_count(), 3);
    }
}
