//! Structured logging schema and field name constants for kitsync.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query kit, document and catalog events by the same
//! names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (stale catalog served) |
//! | INFO  | Lifecycle events, kit create/update/delete, global changes |
//! | DEBUG | Decision points (cache hit/miss, enqueue counts) |
//! | TRACE | Per-key iteration (migration rules, eligibility) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "catalog", "kits"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "catalog_cache", "kit_service", "stale_queue", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "get", "update_kit", "resolve_apply", "migrate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Kit UUID being operated on.
pub const KIT_ID: &str = "kit_id";

/// Host document identifier.
pub const DOCUMENT_ID: &str = "document_id";

/// Remote template id.
pub const TEMPLATE_ID: &str = "template_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of documents enqueued into a stale set.
pub const ENQUEUED_COUNT: &str = "enqueued_count";

/// Number of migration rules applied.
pub const RULES_APPLIED: &str = "rules_applied";

// ─── Catalog fields ────────────────────────────────────────────────────────

/// Whether a catalog read bypassed the TTL.
pub const FORCE: &str = "force";

/// Reason subtype of a failed catalog fetch.
pub const FETCH_REASON: &str = "fetch_reason";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
