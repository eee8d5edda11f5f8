//! Tiered fallback for AI-backed prompt generation and sentiment analysis.
//!
//! The coordinator walks a deterministic chain of increasingly degraded
//! strategies (primary provider, secondary provider, static content bank,
//! hard-coded default) and tags every result with the tier that produced
//! it. Providers are external collaborators behind the [`AiProvider`]
//! capability trait; the content bank sits behind [`ContentBank`].

pub mod content;
pub mod coordinator;
pub mod sentiment;
pub mod similarity;

pub use content::*;
pub use coordinator::*;
pub use sentiment::*;
pub use similarity::*;

use crate::Result;
use serde::{Deserialize, Serialize};

/// `SourceTier` tags a result with the fallback tier that produced it, so
/// observers can tell how degraded a response is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTier {
    /// Live result from the primary provider.
    Primary,
    /// Live result from the secondary provider.
    Secondary,
    /// Pre-seeded content bank row.
    ContentBank,
    /// Hard-coded last resort; always available.
    Default,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Default for Sentiment {
    fn default() -> Sentiment {
        Sentiment::Neutral
    }
}

/// Opaque caller payload forwarded to providers verbatim. This crate
/// assigns it no meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// One previously collected answer, with the sentiment score recorded for
/// it (if any). The coordinator averages these scores to pick a content
/// bank category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    /// 0..=100; entries without a score count as 50
    pub sentiment_score: Option<u8>,
}

/// Provider-side sentiment verdict.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    /// 0..=100
    pub score: u8,
}

/// Result of a `generate` call; never absent, however degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPrompt {
    pub content: String,
    pub source: SourceTier,
    /// content bank category the text was drawn from, when applicable
    pub category: Option<String>,
}

/// Result of an `analyze_sentiment` call; never absent, however degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentReport {
    pub sentiment: Sentiment,
    /// 0..=100
    pub score: u8,
    pub keywords: Vec<String>,
    pub source: SourceTier,
}

impl SentimentReport {
    pub(crate) fn from_provider(score: SentimentScore, source: SourceTier) -> SentimentReport {
        SentimentReport {
            sentiment: score.sentiment,
            score: score.score,
            keywords: Vec::new(),
            source,
        }
    }
}

/// Capability interface of a remote AI provider. Implementations own their
/// call timeouts; this crate never cancels an in-flight call.
pub trait AiProvider: Send + Sync {
    /// Generate prompt content for the given context and answer history.
    fn generate(&self, ctx: &PromptContext, history: &[HistoryEntry]) -> Result<String>;

    /// Classify the sentiment of a short text.
    fn analyze_sentiment(&self, text: &str) -> Result<SentimentScore>;

    /// Non-throwing liveness probe.
    fn is_available(&self) -> bool;
}
