//! Centralized default constants for kitsync.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers; the server lets most of them be overridden from the environment.

// =============================================================================
// REMOTE CATALOG
// =============================================================================

/// Remote template catalog listing endpoint.
pub const CATALOG_ENDPOINT: &str = "https://analogwp.com/wp-json/analogwp/v1/templates/";

/// Single template URL pattern; `{id}` is replaced by the template id.
pub const CATALOG_TEMPLATE_URL: &str = "https://analogwp.com/wp-json/analogwp/v1/templates/{id}";

/// How long a fetched catalog stays fresh (24 hours).
pub const CATALOG_TTL_SECS: u64 = 24 * 60 * 60;

/// Timeout for a background (non-forced) catalog fetch.
pub const CATALOG_TIMEOUT_SECS: u64 = 8;

/// Timeout for a user-initiated forced refresh.
pub const CATALOG_FORCE_TIMEOUT_SECS: u64 = 25;

/// Timeout for a single template payload (content payloads are larger).
pub const TEMPLATE_TIMEOUT_SECS: u64 = 40;

/// Site language reported to the catalog.
pub const CATALOG_SITE_LANG: &str = "en-US";

// =============================================================================
// KITS
// =============================================================================

/// Deepest allowed nesting of a property value (struct/list levels).
pub const MAX_PROPERTY_DEPTH: usize = 8;

/// Maximum accepted size of an import payload in bytes (after base64 decoding).
pub const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

/// Mode value written by migration rules that force a companion mode key.
pub const CUSTOM_MODE: &str = "custom";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Interval between heartbeat payloads on the side channel.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Capacity of the event bus broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_timeouts_ordered() {
        assert!(CATALOG_TIMEOUT_SECS < CATALOG_FORCE_TIMEOUT_SECS);
        assert!(CATALOG_FORCE_TIMEOUT_SECS < TEMPLATE_TIMEOUT_SECS);
    }

    #[test]
    fn test_template_url_has_placeholder() {
        assert!(CATALOG_TEMPLATE_URL.contains("{id}"));
    }

    #[test]
    fn test_ttl_is_one_day() {
        assert_eq!(CATALOG_TTL_SECS, 86_400);
    }
}
