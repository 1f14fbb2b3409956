//! Remote template catalog browsing.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use kitsync_catalog::{CatalogQuery, ShowFilter, SortOrder};
use kitsync_core::{TemplateDetail, TemplateSummary};

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct TemplatesQuery {
    /// Bypass the cache (`1`, `true` or `yes`).
    pub force_update: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub show: ShowFilter,
    pub search: Option<String>,
}

impl TemplatesQuery {
    fn force(&self) -> bool {
        matches!(
            self.force_update.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes")
        )
    }
}

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<TemplateSummary>,
    pub count: usize,
    /// Unix time the catalog snapshot was fetched.
    pub timestamp: i64,
}

pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplatesQuery>,
) -> Result<Json<TemplatesResponse>, ApiError> {
    let entry = state.catalog.get(query.force()).await?;
    let templates = CatalogQuery {
        sort: query.sort,
        show: query.show,
        search: query.search,
    }
    .apply(&entry);

    Ok(Json(TemplatesResponse {
        count: templates.len(),
        templates,
        timestamp: entry.fetched_at.timestamp(),
    }))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TemplateDetail>, ApiError> {
    Ok(Json(state.catalog.get_one(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_flag_values() {
        for (raw, expected) in [("1", true), ("true", true), ("yes", true), ("0", false), ("", false)] {
            let query = TemplatesQuery {
                force_update: Some(raw.to_string()),
                ..Default::default()
            };
            assert_eq!(query.force(), expected, "force_update={:?}", raw);
        }
        assert!(!TemplatesQuery::default().force());
    }
}
