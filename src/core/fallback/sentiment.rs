//! Deterministic keyword-based sentiment scoring, the last-resort tier when
//! both providers are exhausted.

use super::similarity::PUNCTUATION;
use super::Sentiment;
use crate::utils;
use lazy_static::lazy_static;
use serde::Serialize;

lazy_static! {
    static ref POSITIVE_KEYWORDS: Vec<&'static str> = vec![
        "开心", "快乐", "幸福", "喜欢", "期待", "甜蜜", "温暖", "满足", "感动", "骄傲",
        "happy", "love", "great", "wonderful", "excited",
    ];
    static ref NEGATIVE_KEYWORDS: Vec<&'static str> = vec![
        "难过", "伤心", "生气", "失望", "孤单", "委屈", "烦躁", "焦虑", "疲惫", "压力",
        "sad", "angry", "tired", "upset", "lonely",
    ];
}

const MAX_KEYWORDS: usize = 5;

/// Outcome of the keyword scorer; the coordinator adds tier provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentAnalysis {
    pub sentiment: Sentiment,
    /// 0..=100
    pub score: u8,
    pub keywords: Vec<String>,
}

/// Keyword sentiment scorer. Stateless and infallible for non-blank input,
/// which is what makes it a safe final tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSentimentAnalyzer;

impl FallbackSentimentAnalyzer {
    pub fn new() -> FallbackSentimentAnalyzer {
        FallbackSentimentAnalyzer
    }

    /// `analyze` scores `text` against the fixed keyword tables. Returns
    /// `None` for blank input.
    pub fn analyze(&self, text: &str) -> Option<SentimentAnalysis> {
        if utils::is_blank(text) {
            return None;
        }
        let positive = count_matches(text, &POSITIVE_KEYWORDS);
        let negative = count_matches(text, &NEGATIVE_KEYWORDS);
        let (sentiment, score) = if positive > negative {
            (Sentiment::Positive, (50 + 10 * positive).min(100) as u8)
        } else if negative > positive {
            (Sentiment::Negative, 50u32.saturating_sub(10 * negative) as u8)
        } else {
            (Sentiment::Neutral, 50)
        };
        Some(SentimentAnalysis {
            sentiment,
            score,
            keywords: extract_keywords(text),
        })
    }
}

fn count_matches(text: &str, keywords: &[&str]) -> u32 {
    keywords
        .iter()
        .map(|keyword| text.matches(keyword).count() as u32)
        .sum()
}

/// Punctuation becomes whitespace, tokens of more than one char survive,
/// first five in original order.
fn extract_keywords(text: &str) -> Vec<String> {
    text.chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
