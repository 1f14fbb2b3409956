//! Browsing filters over a cached catalog snapshot.

use serde::Deserialize;

use kitsync_core::{CatalogCacheEntry, TemplateSummary};

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Highest popularity index first.
    #[default]
    Popular,
    /// Most recently published first.
    New,
}

/// Which templates to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowFilter {
    #[default]
    All,
    /// Template packs only.
    Packs,
}

/// Sort, filter and search parameters for a catalog listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub show: ShowFilter,
    #[serde(default)]
    pub search: Option<String>,
}

impl CatalogQuery {
    fn matches(&self, template: &TemplateSummary, needle: Option<&str>) -> bool {
        if self.show == ShowFilter::Packs && !template.is_pack() {
            return false;
        }
        match needle {
            None => true,
            Some(needle) => {
                template.title.to_lowercase().contains(needle)
                    || template
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(needle))
            }
        }
    }

    /// Templates of `entry` selected and ordered by this query. The entry
    /// itself is left untouched.
    pub fn apply(&self, entry: &CatalogCacheEntry) -> Vec<TemplateSummary> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut selected: Vec<TemplateSummary> = entry
            .templates
            .iter()
            .filter(|t| self.matches(t, needle.as_deref()))
            .cloned()
            .collect();

        match self.sort {
            SortOrder::Popular => selected.sort_by(|a, b| {
                b.popularity_index
                    .cmp(&a.popularity_index)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            SortOrder::New => selected.sort_by(|a, b| {
                b.published.cmp(&a.published).then_with(|| a.id.cmp(&b.id))
            }),
        }
        selected
    }
}
