//! HTTP client for the remote template catalog.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use kitsync_core::defaults;
use kitsync_core::{FetchError, TemplateDetail, TemplateSummary};

/// Where catalog data comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full template listing.
    async fn fetch_catalog(&self, timeout: Duration)
        -> Result<Vec<TemplateSummary>, FetchError>;

    /// Fetch the payload of a single template.
    async fn fetch_template(
        &self,
        template_id: i64,
        timeout: Duration,
    ) -> Result<TemplateDetail, FetchError>;
}

/// Remote catalog endpoints and request metadata.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Listing endpoint.
    pub endpoint: String,
    /// Single template URL; `{id}` is replaced by the template id.
    pub template_url: String,
    pub site_lang: String,
    pub plugin_version: String,
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::CATALOG_ENDPOINT.to_string(),
            template_url: defaults::CATALOG_TEMPLATE_URL.to_string(),
            site_lang: defaults::CATALOG_SITE_LANG.to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            user_agent: format!("kitsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CatalogConfig {
    /// Read overrides from `CATALOG_ENDPOINT`, `CATALOG_TEMPLATE_URL` and
    /// `CATALOG_SITE_LANG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("CATALOG_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(url) = std::env::var("CATALOG_TEMPLATE_URL") {
            config.template_url = url;
        }
        if let Ok(lang) = std::env::var("CATALOG_SITE_LANG") {
            config.site_lang = lang;
        }
        config
    }

    /// Use a different base for both URLs (tests, mirrors).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.endpoint = format!("{}/templates/", base);
        self.template_url = format!("{}/templates/{{id}}", base);
        self
    }

    fn template_url_for(&self, template_id: i64) -> String {
        self.template_url.replace("{id}", &template_id.to_string())
    }
}

/// [`CatalogSource`] backed by reqwest.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    config: CatalogConfig,
}

impl HttpCatalogSource {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn query_args(&self) -> [(&'static str, &str); 2] {
        [
            ("plugin_version", self.config.plugin_version.as_str()),
            ("site_lang", self.config.site_lang.as_str()),
        ]
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<(StatusCode, JsonValue), FetchError> {
        let response = self
            .client
            .get(url)
            .query(&self.query_args())
            .header(USER_AGENT, &self.config.user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok((status, JsonValue::Null));
        }
        let body = response.json().await.map_err(|e| classify(e, timeout))?;
        Ok((status, body))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_catalog(
        &self,
        timeout: Duration,
    ) -> Result<Vec<TemplateSummary>, FetchError> {
        let start = Instant::now();
        let (status, body) = self.get_json(&self.config.endpoint, timeout).await?;
        if status != StatusCode::OK {
            warn!(
                subsystem = "catalog",
                component = "client",
                op = "fetch_catalog",
                status = status.as_u16(),
                "Catalog listing request failed"
            );
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let templates = parse_catalog(body)?;
        debug!(
            subsystem = "catalog",
            component = "client",
            op = "fetch_catalog",
            result_count = templates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched catalog listing"
        );
        Ok(templates)
    }

    async fn fetch_template(
        &self,
        template_id: i64,
        timeout: Duration,
    ) -> Result<TemplateDetail, FetchError> {
        let url = self.config.template_url_for(template_id);
        let (status, body) = self.get_json(&url, timeout).await?;
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        parse_template(body)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Parse a listing body: either a bare array of templates or an object with a
/// `templates` array.
pub fn parse_catalog(body: JsonValue) -> Result<Vec<TemplateSummary>, FetchError> {
    let list = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("templates") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                return Err(FetchError::Decode(
                    "catalog response has no templates array".to_string(),
                ))
            }
        },
        _ => {
            return Err(FetchError::Decode(
                "catalog response is not a JSON object or array".to_string(),
            ))
        }
    };

    list.into_iter()
        .map(|item| {
            serde_json::from_value::<TemplateSummary>(item)
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
        .collect()
}

/// Parse a single template body, surfacing remote errors and empty payloads.
pub fn parse_template(body: JsonValue) -> Result<TemplateDetail, FetchError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(FetchError::Payload(message));
    }

    if is_empty(body.get("data")) && is_empty(body.get("content")) {
        return Err(FetchError::EmptyPayload);
    }

    serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
}

fn is_empty(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::Bool(b)) => !b,
        Some(JsonValue::Number(n)) => n.as_f64() == Some(0.0),
        Some(JsonValue::String(s)) => s.is_empty() || s == "0",
        Some(JsonValue::Array(items)) => items.is_empty(),
        Some(JsonValue::Object(map)) => map.is_empty(),
    }
}
