use super::{
    similarity, AiProvider, ContentBank, ContentItem, FallbackSentimentAnalyzer, GeneratedPrompt,
    HistoryEntry, PromptContext, Sentiment, SentimentReport, SourceTier,
};
use crate::core::breaker::BreakerConfig;
use crate::core::health::HealthRegistry;
use crate::{logging, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Registry keys of the two provider tiers.
pub const PRIMARY_SERVICE: &str = "ai-primary";
pub const SECONDARY_SERVICE: &str = "ai-secondary";

/// Hard-coded tier-4 prompt; serving it can never fail.
const DEFAULT_PROMPT: &str = "今天有什么想和对方分享的小事？说来听听吧。";

/// Content categories selected by the history sentiment heuristic.
const CATEGORY_FUN: &str = "fun";
const CATEGORY_FUTURE: &str = "future";
const CATEGORY_EMOTION: &str = "emotion";

/// Construction-time knobs of the coordinator. The primary breaker is
/// configured stricter than the secondary: the secondary is already the
/// backup and gets more room before its circuit trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// similarity above this counts as a near-duplicate
    pub duplicate_threshold: f64,
    pub primary: BreakerConfig,
    pub secondary: BreakerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            duplicate_threshold: similarity::DEFAULT_DUPLICATE_THRESHOLD,
            primary: BreakerConfig {
                failure_threshold: 3,
                recovery_timeout_ms: 30_000,
                monitoring_period_ms: 10_000,
            },
            secondary: BreakerConfig {
                failure_threshold: 5,
                recovery_timeout_ms: 60_000,
                monitoring_period_ms: 10_000,
            },
        }
    }
}

impl CoordinatorConfig {
    pub fn is_valid(&self) -> Result<()> {
        if !(self.duplicate_threshold > 0.0 && self.duplicate_threshold < 1.0) {
            return Err(Error::msg(
                "invalid duplicate_threshold (valid range: (0.0, 1.0))",
            ));
        }
        self.primary.is_valid()?;
        self.secondary.is_valid()
    }
}

impl fmt::Display for CoordinatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

/// Walks the tiered call sequence for prompt generation and sentiment
/// analysis, consulting the health registry before each provider tier and
/// recording outcomes back into it. Both operations always return a result;
/// nothing past construction can fail.
pub struct FallbackCoordinator {
    registry: Arc<HealthRegistry>,
    config: CoordinatorConfig,
    analyzer: FallbackSentimentAnalyzer,
}

impl FallbackCoordinator {
    pub fn new(registry: Arc<HealthRegistry>) -> Result<FallbackCoordinator> {
        FallbackCoordinator::with_config(registry, CoordinatorConfig::default())
    }

    pub fn with_config(
        registry: Arc<HealthRegistry>,
        config: CoordinatorConfig,
    ) -> Result<FallbackCoordinator> {
        config.is_valid()?;
        registry.register(PRIMARY_SERVICE, config.primary.clone())?;
        registry.register(SECONDARY_SERVICE, config.secondary.clone())?;
        Ok(FallbackCoordinator {
            registry,
            config,
            analyzer: FallbackSentimentAnalyzer::new(),
        })
    }

    #[inline]
    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    /// `generate` walks primary -> secondary -> content bank -> default and
    /// returns the first qualifying result. `recent_texts` is the caller's
    /// recently served content; bank candidates too close to it are
    /// rejected.
    pub fn generate(
        &self,
        ctx: &PromptContext,
        history: &[HistoryEntry],
        recent_texts: &[String],
        primary: &dyn AiProvider,
        secondary: &dyn AiProvider,
        bank: &dyn ContentBank,
    ) -> GeneratedPrompt {
        // tier 1: primary provider
        match primary.generate(ctx, history) {
            Ok(content) => {
                self.registry.mark_success(PRIMARY_SERVICE);
                return GeneratedPrompt {
                    content,
                    source: SourceTier::Primary,
                    category: None,
                };
            }
            Err(err) => {
                self.registry.mark_failure(PRIMARY_SERVICE, &err);
                logging::warn!(
                    "[FallbackCoordinator] {} generate failed, falling back: {}",
                    PRIMARY_SERVICE,
                    err
                );
            }
        }

        // tier 2: secondary provider, behind the double gate
        if self.secondary_gate_open(secondary) {
            match secondary.generate(ctx, history) {
                Ok(content) => {
                    self.registry.mark_success(SECONDARY_SERVICE);
                    return GeneratedPrompt {
                        content,
                        source: SourceTier::Secondary,
                        category: None,
                    };
                }
                Err(err) => {
                    self.registry.mark_failure(SECONDARY_SERVICE, &err);
                    logging::warn!(
                        "[FallbackCoordinator] {} generate failed, falling back: {}",
                        SECONDARY_SERVICE,
                        err
                    );
                }
            }
        }

        // tier 3: content bank, category from the history sentiment heuristic
        let category = select_category(history);
        if let Some(item) = self.pick_from_bank(bank, category, recent_texts) {
            return GeneratedPrompt {
                content: item.text,
                source: SourceTier::ContentBank,
                category: Some(item.category),
            };
        }

        // tier 4: hard-coded default, failure-free by construction
        logging::info!("[FallbackCoordinator] all generation tiers exhausted, serving default");
        GeneratedPrompt {
            content: DEFAULT_PROMPT.into(),
            source: SourceTier::Default,
            category: None,
        }
    }

    /// `analyze_sentiment` walks primary -> secondary -> keyword analyzer.
    /// The final tier cannot fail, so neither can this call.
    pub fn analyze_sentiment(
        &self,
        text: &str,
        primary: &dyn AiProvider,
        secondary: &dyn AiProvider,
    ) -> SentimentReport {
        match primary.analyze_sentiment(text) {
            Ok(score) => {
                self.registry.mark_success(PRIMARY_SERVICE);
                return SentimentReport::from_provider(score, SourceTier::Primary);
            }
            Err(err) => {
                self.registry.mark_failure(PRIMARY_SERVICE, &err);
                logging::warn!(
                    "[FallbackCoordinator] {} sentiment analysis failed, falling back: {}",
                    PRIMARY_SERVICE,
                    err
                );
            }
        }

        if self.secondary_gate_open(secondary) {
            match secondary.analyze_sentiment(text) {
                Ok(score) => {
                    self.registry.mark_success(SECONDARY_SERVICE);
                    return SentimentReport::from_provider(score, SourceTier::Secondary);
                }
                Err(err) => {
                    self.registry.mark_failure(SECONDARY_SERVICE, &err);
                    logging::warn!(
                        "[FallbackCoordinator] {} sentiment analysis failed, falling back: {}",
                        SECONDARY_SERVICE,
                        err
                    );
                }
            }
        }

        match self.analyzer.analyze(text) {
            Some(analysis) => SentimentReport {
                sentiment: analysis.sentiment,
                score: analysis.score,
                keywords: analysis.keywords,
                source: SourceTier::Default,
            },
            // blank input; answer neutral rather than erroring
            None => SentimentReport {
                sentiment: Sentiment::Neutral,
                score: 50,
                keywords: Vec::new(),
                source: SourceTier::Default,
            },
        }
    }

    /// Both gates must pass: the provider's own liveness probe and the
    /// breaker's historical judgement. A skipped tier records nothing on
    /// the breaker, since no call was attempted.
    fn secondary_gate_open(&self, secondary: &dyn AiProvider) -> bool {
        if !secondary.is_available() {
            logging::info!(
                "[FallbackCoordinator] {} liveness probe failed, skipping tier",
                SECONDARY_SERVICE
            );
            return false;
        }
        if !self.registry.is_healthy(SECONDARY_SERVICE) {
            logging::info!(
                "[FallbackCoordinator] {} circuit not healthy, skipping tier",
                SECONDARY_SERVICE
            );
            return false;
        }
        true
    }

    /// One draw from the selected category, one unfiltered retry if that
    /// candidate is missing or repeats recent content. A retry candidate
    /// that also fails the duplicate check falls through to the default
    /// tier.
    fn pick_from_bank(
        &self,
        bank: &dyn ContentBank,
        category: &str,
        recent_texts: &[String],
    ) -> Option<ContentItem> {
        let threshold = self.config.duplicate_threshold;
        match bank.random_by_category(Some(category)) {
            Some(item) if !similarity::is_duplicate(&item.text, recent_texts, threshold) => {
                return Some(item)
            }
            Some(item) => logging::debug!(
                "[FallbackCoordinator] bank candidate {} repeats recent content, retrying unfiltered",
                item.id
            ),
            None => logging::debug!(
                "[FallbackCoordinator] content bank has no rows for category {}",
                category
            ),
        }
        match bank.random_by_category(None) {
            Some(item) if !similarity::is_duplicate(&item.text, recent_texts, threshold) => {
                Some(item)
            }
            _ => None,
        }
    }
}

/// Category heuristic: mean sentiment score over the history (50 per entry
/// without a score; an empty history also counts as 50). Low moods get a
/// lighter category, high moods a forward-looking one.
fn select_category(history: &[HistoryEntry]) -> &'static str {
    let mean = if history.is_empty() {
        50.0
    } else {
        let total: u64 = history
            .iter()
            .map(|entry| u64::from(entry.sentiment_score.unwrap_or(50)))
            .sum();
        total as f64 / history.len() as f64
    };
    if mean < 50.0 {
        CATEGORY_FUN
    } else if mean > 70.0 {
        CATEGORY_FUTURE
    } else {
        CATEGORY_EMOTION
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::breaker::State;
    use crate::core::fallback::{ContentItem, InMemoryContentBank, SentimentScore};
    use mockall::mock;

    mock! {
        pub(crate) Provider {}
        impl AiProvider for Provider {
            fn generate(&self, ctx: &PromptContext, history: &[HistoryEntry]) -> crate::Result<String>;
            fn analyze_sentiment(&self, text: &str) -> crate::Result<SentimentScore>;
            fn is_available(&self) -> bool;
        }
    }

    fn coordinator() -> FallbackCoordinator {
        FallbackCoordinator::new(Arc::new(HealthRegistry::new())).unwrap()
    }

    fn entry(score: u8) -> HistoryEntry {
        HistoryEntry {
            text: "answer".into(),
            sentiment_score: Some(score),
        }
    }

    fn failing_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider
            .expect_generate()
            .returning(|_, _| Err(Error::msg("upstream 503")));
        provider
            .expect_analyze_sentiment()
            .returning(|_| Err(Error::msg("upstream 503")));
        provider.expect_is_available().return_const(true);
        provider
    }

    fn bank() -> InMemoryContentBank {
        InMemoryContentBank::new(vec![
            ContentItem {
                id: "f1".into(),
                text: "说一件本周最好笑的事".into(),
                category: "fun".into(),
            },
            ContentItem {
                id: "e1".into(),
                text: "最近一次被对方感动是什么时候".into(),
                category: "emotion".into(),
            },
        ])
    }

    #[test]
    fn rejects_invalid_threshold() {
        let config = CoordinatorConfig {
            duplicate_threshold: 1.5,
            ..Default::default()
        };
        assert!(FallbackCoordinator::with_config(Arc::new(HealthRegistry::new()), config).is_err());
    }

    #[test]
    fn primary_success_is_tier_one() {
        let coordinator = coordinator();
        let mut primary = MockProvider::new();
        primary
            .expect_generate()
            .returning(|_, _| Ok("你们今天最想感谢彼此什么？".into()));
        // the secondary must never be consulted
        let secondary = MockProvider::new();
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[],
            &[],
            &primary,
            &secondary,
            &bank(),
        );
        assert_eq!(prompt.source, SourceTier::Primary);
        let status = coordinator.registry().all_status();
        assert_eq!(status[PRIMARY_SERVICE].stats.successful_requests, 1);
        assert_eq!(status[SECONDARY_SERVICE].stats.total_requests, 0);
        coordinator.registry().stop_all();
    }

    #[test]
    fn secondary_covers_primary_failure() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(true);
        secondary
            .expect_generate()
            .returning(|_, _| Ok("最近有什么新的小目标？".into()));
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[],
            &[],
            &primary,
            &secondary,
            &bank(),
        );
        assert_eq!(prompt.source, SourceTier::Secondary);
        let status = coordinator.registry().all_status();
        assert_eq!(status[PRIMARY_SERVICE].stats.failed_requests, 1);
        assert_eq!(status[SECONDARY_SERVICE].stats.successful_requests, 1);
        coordinator.registry().stop_all();
    }

    #[test]
    fn unavailable_secondary_is_skipped_without_penalty() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(false);
        // generate must not be called on a failed gate
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[],
            &[],
            &primary,
            &secondary,
            &bank(),
        );
        assert_eq!(prompt.source, SourceTier::ContentBank);
        let status = coordinator.registry().all_status();
        assert_eq!(status[SECONDARY_SERVICE].stats.total_requests, 0);
        coordinator.registry().stop_all();
    }

    #[test]
    fn open_secondary_circuit_is_skipped() {
        let coordinator = coordinator();
        for _ in 0..5 {
            coordinator
                .registry()
                .mark_failure(SECONDARY_SERVICE, &Error::msg("refused"));
        }
        assert_eq!(
            coordinator
                .registry()
                .get(SECONDARY_SERVICE)
                .unwrap()
                .current_state(),
            State::Open
        );
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(true);
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[],
            &[],
            &primary,
            &secondary,
            &bank(),
        );
        assert_eq!(prompt.source, SourceTier::ContentBank);
        let status = coordinator.registry().all_status();
        // the five registry marks, nothing from a skipped attempt
        assert_eq!(status[SECONDARY_SERVICE].stats.total_requests, 5);
        coordinator.registry().stop_all();
    }

    #[test]
    fn duplicate_bank_candidate_retries_unfiltered() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(false);
        // only one "emotion" row exists and it repeats recent content, so
        // the unfiltered retry must land on the "fun" row
        let recent = vec!["最近一次被对方感动是什么时候".to_string()];
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[entry(60)],
            &recent,
            &primary,
            &secondary,
            &InMemoryContentBank::new(vec![
                ContentItem {
                    id: "e1".into(),
                    text: "最近一次被对方感动是什么时候".into(),
                    category: "emotion".into(),
                },
                ContentItem {
                    id: "f1".into(),
                    text: "说一件本周最好笑的事".into(),
                    category: "fun".into(),
                },
            ]),
        );
        // the retry draw is random across both rows; either it found the
        // fresh row or it fell through to the default
        match prompt.source {
            SourceTier::ContentBank => assert_eq!(prompt.content, "说一件本周最好笑的事"),
            SourceTier::Default => assert_eq!(prompt.content, DEFAULT_PROMPT),
            other => panic!("unexpected tier {:?}", other),
        }
        coordinator.registry().stop_all();
    }

    #[test]
    fn empty_bank_falls_through_to_default() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(false);
        let prompt = coordinator.generate(
            &PromptContext::default(),
            &[],
            &[],
            &primary,
            &secondary,
            &InMemoryContentBank::new(Vec::new()),
        );
        assert_eq!(prompt.source, SourceTier::Default);
        assert_eq!(prompt.content, DEFAULT_PROMPT);
        assert!(prompt.category.is_none());
        coordinator.registry().stop_all();
    }

    #[test]
    fn sentiment_falls_back_to_keyword_analyzer() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(false);
        let report = coordinator.analyze_sentiment("很开心很快乐", &primary, &secondary);
        assert_eq!(report.source, SourceTier::Default);
        assert_eq!(report.sentiment, Sentiment::Positive);
        assert!(report.score > 50);
        assert!(!report.keywords.is_empty());
        coordinator.registry().stop_all();
    }

    #[test]
    fn blank_sentiment_input_yields_neutral_default() {
        let coordinator = coordinator();
        let primary = failing_provider();
        let mut secondary = MockProvider::new();
        secondary.expect_is_available().return_const(false);
        let report = coordinator.analyze_sentiment("   ", &primary, &secondary);
        assert_eq!(report.source, SourceTier::Default);
        assert_eq!(report.sentiment, Sentiment::Neutral);
        assert_eq!(report.score, 50);
        assert!(report.keywords.is_empty());
        coordinator.registry().stop_all();
    }

    #[test]
    fn sentiment_primary_success() {
        let coordinator = coordinator();
        let mut primary = MockProvider::new();
        primary.expect_analyze_sentiment().returning(|_| {
            Ok(SentimentScore {
                sentiment: Sentiment::Positive,
                score: 82,
            })
        });
        let secondary = MockProvider::new();
        let report = coordinator.analyze_sentiment("真的很感动", &primary, &secondary);
        assert_eq!(report.source, SourceTier::Primary);
        assert_eq!(report.score, 82);
        assert!(report.keywords.is_empty());
        coordinator.registry().stop_all();
    }

    #[test]
    fn category_from_low_mood() {
        assert_eq!(select_category(&[entry(30), entry(40)]), CATEGORY_FUN);
    }

    #[test]
    fn category_from_high_mood() {
        assert_eq!(select_category(&[entry(90), entry(80)]), CATEGORY_FUTURE);
    }

    #[test]
    fn category_from_middle_band() {
        assert_eq!(select_category(&[entry(50), entry(70)]), CATEGORY_EMOTION);
        // boundaries stay in the middle band
        assert_eq!(select_category(&[entry(50)]), CATEGORY_EMOTION);
        assert_eq!(select_category(&[entry(70)]), CATEGORY_EMOTION);
    }

    #[test]
    fn category_defaults_for_missing_scores() {
        let unscored = HistoryEntry {
            text: "answer".into(),
            sentiment_score: None,
        };
        assert_eq!(select_category(&[unscored]), CATEGORY_EMOTION);
        assert_eq!(select_category(&[]), CATEGORY_EMOTION);
    }
}
