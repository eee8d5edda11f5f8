//! Static content bank: the pre-seeded prompt repository used when live
//! generation is unavailable.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One pre-seeded prompt row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub text: String,
    pub category: String,
}

/// Lookup interface of the content bank tier. `None` category draws from
/// the whole bank.
pub trait ContentBank: Send + Sync {
    fn random_by_category(&self, category: Option<&str>) -> Option<ContentItem>;
}

/// In-memory `ContentBank`, seeded at construction and keyed by category.
/// Backing a bank with a store instead is the caller's concern; this one
/// makes the crate usable standalone.
#[derive(Debug, Default)]
pub struct InMemoryContentBank {
    by_category: HashMap<String, Vec<ContentItem>>,
}

impl InMemoryContentBank {
    pub fn new(items: Vec<ContentItem>) -> InMemoryContentBank {
        let mut by_category: HashMap<String, Vec<ContentItem>> = HashMap::new();
        for item in items {
            by_category
                .entry(item.category.clone())
                .or_default()
                .push(item);
        }
        InMemoryContentBank { by_category }
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}

impl ContentBank for InMemoryContentBank {
    fn random_by_category(&self, category: Option<&str>) -> Option<ContentItem> {
        let mut rng = rand::thread_rng();
        match category {
            Some(category) => self
                .by_category
                .get(category)
                .and_then(|items| items.choose(&mut rng))
                .cloned(),
            None => {
                let all: Vec<&ContentItem> = self.by_category.values().flatten().collect();
                all.choose(&mut rng).map(|item| (*item).clone())
            }
        }
    }
}
