//! Edit-distance text similarity, used to keep served content from
//! repeating what a couple has recently seen.

use lazy_static::lazy_static;
use std::collections::HashSet;

/// Similarity above this counts as a near-duplicate.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.8;

lazy_static! {
    /// Punctuation stripped by `normalize`, ASCII and CJK.
    pub(crate) static ref PUNCTUATION: HashSet<char> =
        "，。！？、；：“”‘’（）【】《》…—～·,.!?;:'\"()[]<>-_"
            .chars()
            .collect();
}

/// `normalize` strips punctuation, trims and lower-cases (a no-op for
/// scripts without case).
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !PUNCTUATION.contains(c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// `similarity` returns a score in `[0, 1]`: 1 for two empty inputs, 0 when
/// exactly one is empty, otherwise `1 - distance / max_len` over the
/// normalized texts. Symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    // punctuation-only inputs normalize to nothing
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = edit_distance(&a, &b);
    let max_len = a.len().max(b.len());
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

/// `is_duplicate` reports whether `candidate` normalizes identically to, or
/// sits above the similarity threshold against, any recently used text.
pub fn is_duplicate(candidate: &str, recent_texts: &[String], threshold: f64) -> bool {
    let normalized = normalize(candidate);
    recent_texts.iter().any(|recent| {
        normalize(recent) == normalized || similarity(candidate, recent) > threshold
    })
}

/// Levenshtein distance over chars, single-row dynamic programming.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Hello, World!  "), "hello world");
        assert_eq!(normalize("你好，世界！"), "你好世界");
        assert_eq!(normalize("！？。"), "");
    }

    #[test]
    fn identical_strings_score_one() {
        for text in ["", "a", "hello world", "今天过得怎么样"] {
            assert!((similarity(text, text) - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn empty_cases() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn symmetric_and_bounded() {
        let pairs = [
            ("hello world", "hello worle"),
            ("你喜欢什么", "你讨厌什么"),
            ("short", "a much longer sentence entirely"),
        ];
        for (a, b) in pairs {
            let forward = similarity(a, b);
            let backward = similarity(b, a);
            assert!((forward - backward).abs() < f64::EPSILON);
            assert!((0.0..=1.0).contains(&forward));
        }
    }

    #[test]
    fn decreases_with_edit_distance() {
        let base = "hello world";
        let one_edit = similarity(base, "hello worle");
        let two_edits = similarity(base, "hello worxx");
        assert!(similarity(base, base) > one_edit);
        assert!(one_edit > two_edits);
    }

    #[test]
    fn duplicate_on_normalized_match() {
        let recents = vec!["  Hello, World!  ".to_string()];
        assert!(is_duplicate("hello world", &recents, DEFAULT_DUPLICATE_THRESHOLD));
    }

    #[test]
    fn duplicate_on_near_match() {
        let recents = vec!["今天想对彼此说一句什么话".to_string()];
        assert!(is_duplicate(
            "今天想对彼此说一句什么话呢",
            &recents,
            DEFAULT_DUPLICATE_THRESHOLD
        ));
    }

    #[test]
    fn no_duplicate_against_empty_recents() {
        assert!(!is_duplicate("anything", &[], DEFAULT_DUPLICATE_THRESHOLD));
    }

    #[test]
    fn distinct_texts_pass() {
        let recents = vec!["你们最近一次约会去了哪里".to_string()];
        assert!(!is_duplicate(
            "说一件让你感激对方的小事",
            &recents,
            DEFAULT_DUPLICATE_THRESHOLD
        ));
    }
}
