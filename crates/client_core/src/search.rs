//! Global search over prompts, brands and sources.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use shared::{
    domain::SearchCategory,
    protocol::{BrandResponse, PromptResponse, SourceResponse},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_RESULTS_PER_CATEGORY: usize = 5;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub category: SearchCategory,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultGroup {
    pub category: SearchCategory,
    pub label: String,
    pub results: Vec<SearchResult>,
}

pub fn total_results(groups: &[SearchResultGroup]) -> usize {
    groups.iter().map(|group| group.results.len()).sum()
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    prompts: Vec<SearchResult>,
    brands: Vec<SearchResult>,
    sources: Vec<SearchResult>,
}

impl SearchIndex {
    pub fn new(
        prompts: &[PromptResponse],
        brands: &[BrandResponse],
        sources: &[SourceResponse],
    ) -> Self {
        Self {
            prompts: prompts
                .iter()
                .map(|prompt| SearchResult {
                    id: prompt.id.to_string(),
                    category: SearchCategory::Prompts,
                    title: prompt.query.clone(),
                    subtitle: Some(format!("{}% visibility", prompt.visibility)),
                    href: format!("/prompts?highlight={}", prompt.id),
                    color: None,
                })
                .collect(),
            brands: brands
                .iter()
                .map(|brand| SearchResult {
                    id: brand.id.to_string(),
                    category: SearchCategory::Brands,
                    title: brand.name.clone(),
                    subtitle: Some(format!("{}% visibility", brand.visibility)),
                    href: format!("/?brand={}", brand.id),
                    color: Some(brand.color.clone()),
                })
                .collect(),
            sources: sources
                .iter()
                .map(|source| SearchResult {
                    id: source.domain.clone(),
                    category: SearchCategory::Sources,
                    title: source.domain.clone(),
                    subtitle: Some(format!("{}% usage", source.usage)),
                    href: format!("/?source={}", source.domain),
                    color: None,
                })
                .collect(),
        }
    }

    fn candidates(&self, category: SearchCategory) -> &[SearchResult] {
        match category {
            SearchCategory::Prompts => &self.prompts,
            SearchCategory::Brands => &self.brands,
            SearchCategory::Sources => &self.sources,
        }
    }

    /// Groups matches by category in display order. Queries shorter than two
    /// characters match nothing.
    pub fn search(&self, query: &str) -> Vec<SearchResultGroup> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        SearchCategory::ORDER
            .into_iter()
            .filter_map(|category| {
                let results: Vec<_> = self
                    .candidates(category)
                    .iter()
                    .filter(|candidate| candidate.title.to_lowercase().contains(&needle))
                    .take(MAX_RESULTS_PER_CATEGORY)
                    .cloned()
                    .collect();
                (!results.is_empty()).then(|| SearchResultGroup {
                    category,
                    label: category.label().to_string(),
                    results,
                })
            })
            .collect()
    }
}

/// Keyboard selection over the flattened result list. Moving past either
/// end clamps; `None` means nothing is highlighted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSelection {
    results: Vec<SearchResult>,
    selected: Option<usize>,
}

impl SearchSelection {
    pub fn new(groups: &[SearchResultGroup]) -> Self {
        Self {
            results: groups
                .iter()
                .flat_map(|group| group.results.iter().cloned())
                .collect(),
            selected: None,
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn current(&self) -> Option<&SearchResult> {
        self.selected.and_then(|index| self.results.get(index))
    }

    pub fn select_next(&mut self) {
        let Some(last) = self.results.len().checked_sub(1) else {
            return;
        };
        self.selected = Some(match self.selected {
            None => 0,
            Some(index) => (index + 1).min(last),
        });
    }

    pub fn select_previous(&mut self) {
        self.selected = match self.selected {
            None | Some(0) => None,
            Some(index) => Some(index - 1),
        };
    }
}

/// Search fed by raw keystrokes; results are published once input has been
/// quiet for the debounce delay.
pub struct DebouncedSearch {
    input: watch::Sender<String>,
    results: watch::Receiver<Vec<SearchResultGroup>>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    pub fn set_query(&self, query: impl Into<String>) {
        self.input.send_replace(query.into());
    }

    pub fn results(&self) -> watch::Receiver<Vec<SearchResultGroup>> {
        self.results.clone()
    }

    pub fn latest(&self) -> Vec<SearchResultGroup> {
        self.results.borrow().clone()
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn_debounced_search(index: Arc<SearchIndex>, delay: Duration) -> DebouncedSearch {
    let (input, mut input_rx) = watch::channel(String::new());
    let (results_tx, results) = watch::channel(Vec::new());

    let task = tokio::spawn(async move {
        while input_rx.changed().await.is_ok() {
            loop {
                tokio::select! {
                    changed = input_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(delay) => break,
                }
            }
            let query = input_rx.borrow_and_update().clone();
            let groups = index.search(&query);
            debug!(%query, groups = groups.len(), "search results published");
            if results_tx.send(groups).is_err() {
                return;
            }
        }
    });

    DebouncedSearch {
        input,
        results,
        task,
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
