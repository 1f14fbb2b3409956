//! Kit schema migration table.
//!
//! Kit content is versioned by `schema_version`. Each [`MigrationRule`] names
//! the schema version that introduced it; migrating content from version `n`
//! applies every rule with `introduced_in > n`. Rules are additive: the old
//! key is kept and its value copied to the new key, so running a migration
//! twice yields the same content.
//!
//! Version 2 split the legacy typography size keys into explicit
//! `*_font_size` / `*_line_height` keys and requires the matching
//! `*_typography` mode key to be set to `"custom"` for desktop sizes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::defaults::CUSTOM_MODE;
use crate::models::{KitContent, PropertyValue};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Schema version assumed for content that carries no version.
pub const LEGACY_SCHEMA_VERSION: i32 = 1;

const SIZES: &[&str] = &["xxl", "xl", "large", "medium", "small"];
const DEVICES: &[&str] = &["", "_tablet", "_mobile"];

/// One key rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRule {
    pub old_key: String,
    pub new_key: String,
    /// Companion mode key forced to `"custom"` when the rule fires.
    pub forces_mode_key: Option<String>,
    pub introduced_in: i32,
}

/// Non-fatal issues found while migrating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigrationWarning {
    /// The old key held something other than a non-empty list or struct.
    UnexpectedShape { key: String, found: String },
    /// The old key held an empty list or struct.
    EmptyValue { key: String },
}

/// Outcome of [`migrate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Migrated {
    pub content: KitContent,
    /// Old keys whose rules fired.
    pub applied: Vec<String>,
    pub warnings: Vec<MigrationWarning>,
    pub schema_version: i32,
}

/// Ordered list of rename rules.
#[derive(Debug, Clone)]
pub struct MigrationTable {
    rules: Vec<MigrationRule>,
}

impl MigrationTable {
    pub fn new(rules: Vec<MigrationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MigrationRule] {
        &self.rules
    }

    /// Highest version any rule introduces.
    pub fn latest_version(&self) -> i32 {
        self.rules
            .iter()
            .map(|r| r.introduced_in)
            .max()
            .unwrap_or(LEGACY_SCHEMA_VERSION)
    }

    /// Apply every rule newer than `from_version` to `content`.
    pub fn migrate(&self, content: &KitContent, from_version: i32) -> Migrated {
        let mut migrated = content.clone();
        let mut applied = Vec::new();
        let mut warnings = Vec::new();

        for rule in self.rules.iter().filter(|r| r.introduced_in > from_version) {
            let Some(old) = content.get(&rule.old_key) else {
                continue;
            };
            match old {
                PropertyValue::List(items) if !items.is_empty() => {}
                PropertyValue::Struct(fields) if !fields.is_empty() => {}
                PropertyValue::List(_) | PropertyValue::Struct(_) => {
                    warnings.push(MigrationWarning::EmptyValue {
                        key: rule.old_key.clone(),
                    });
                    continue;
                }
                other => {
                    warnings.push(MigrationWarning::UnexpectedShape {
                        key: rule.old_key.clone(),
                        found: other.kind().to_string(),
                    });
                    continue;
                }
            }

            tracing::trace!(old_key = %rule.old_key, new_key = %rule.new_key, "Applying migration rule");
            migrated.insert(rule.new_key.clone(), old.clone());
            if let Some(mode_key) = &rule.forces_mode_key {
                migrated.insert(mode_key.clone(), PropertyValue::from(CUSTOM_MODE));
            }
            applied.push(rule.old_key.clone());
        }

        Migrated {
            content: migrated,
            applied,
            warnings,
            schema_version: from_version.max(self.latest_version()),
        }
    }
}

impl Default for MigrationTable {
    fn default() -> Self {
        Self::new(typography_split_rules())
    }
}

/// The built-in table.
pub static MIGRATIONS: Lazy<MigrationTable> = Lazy::new(MigrationTable::default);

/// Migrate `content` from `from_version` with the built-in table.
pub fn migrate(content: &KitContent, from_version: i32) -> Migrated {
    MIGRATIONS.migrate(content, from_version)
}

/// Whether content at `version` needs a migration pass.
pub fn needs_migration(version: i32) -> bool {
    version < CURRENT_SCHEMA_VERSION
}

fn typography_split_rules() -> Vec<MigrationRule> {
    // (old key stem, new key stem, suffix, whether desktop forces the mode key)
    let families: [(fn(&str) -> String, fn(&str) -> String, &str, bool); 4] = [
        (
            |s| format!("ang_size_{s}"),
            |s| format!("ang_size_{s}"),
            "_font_size",
            true,
        ),
        (
            |s| format!("ang_heading_size_lh_{s}"),
            |s| format!("ang_size_{s}"),
            "_line_height",
            false,
        ),
        (
            |s| format!("ang_text_size_{s}"),
            |s| format!("ang_text_size_{s}"),
            "_font_size",
            true,
        ),
        (
            |s| format!("ang_text_size_lh_{s}"),
            |s| format!("ang_text_size_{s}"),
            "_line_height",
            false,
        ),
    ];

    let mut rules = Vec::with_capacity(families.len() * SIZES.len() * DEVICES.len());
    for (old_stem, new_stem, suffix, forces_mode) in families {
        for &size in SIZES {
            for &device in DEVICES {
                let forces_mode_key = (forces_mode && device.is_empty())
                    .then(|| format!("{}_typography", new_stem(size)));
                rules.push(MigrationRule {
                    old_key: format!("{}{}", old_stem(size), device),
                    new_key: format!("{}{}{}", new_stem(size), suffix, device),
                    forces_mode_key,
                    introduced_in: 2,
                });
            }
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: serde_json::Value) -> KitContent {
        serde_json::from_value(value).unwrap()
    }

    fn rule<'a>(old: &str) -> &'a MigrationRule {
        MIGRATIONS
            .rules()
            .iter()
            .find(|r| r.old_key == old)
            .unwrap_or_else(|| panic!("no rule for {old}"))
    }

    #[test]
    fn test_table_has_sixty_rules() {
        assert_eq!(MIGRATIONS.rules().len(), 60);
    }

    #[test]
    fn test_ten_rules_force_mode() {
        let forcing = MIGRATIONS
            .rules()
            .iter()
            .filter(|r| r.forces_mode_key.is_some())
            .count();
        assert_eq!(forcing, 10);
    }

    #[test]
    fn test_rule_shapes() {
        assert_eq!(
            rule("ang_size_xxl_tablet").new_key,
            "ang_size_xxl_font_size_tablet"
        );
        assert_eq!(
            rule("ang_heading_size_lh_medium_mobile").new_key,
            "ang_size_medium_line_height_mobile"
        );
        assert_eq!(
            rule("ang_text_size_lh_small").new_key,
            "ang_text_size_small_line_height"
        );
        assert_eq!(
            rule("ang_text_size_large").forces_mode_key.as_deref(),
            Some("ang_text_size_large_typography")
        );
        assert!(rule("ang_size_xl_mobile").forces_mode_key.is_none());
        assert!(rule("ang_heading_size_lh_xl").forces_mode_key.is_none());
    }

    #[test]
    fn test_migrate_copies_and_forces_mode() {
        let input = content(json!({"ang_size_xxl": [{"size": 4, "unit": "em"}]}));
        let out = migrate(&input, LEGACY_SCHEMA_VERSION);

        assert_eq!(out.content.get("ang_size_xxl"), input.get("ang_size_xxl"));
        assert_eq!(
            out.content.get("ang_size_xxl_font_size"),
            input.get("ang_size_xxl")
        );
        assert_eq!(
            out.content.get("ang_size_xxl_typography"),
            Some(&PropertyValue::from("custom"))
        );
        assert_eq!(out.applied, vec!["ang_size_xxl".to_string()]);
        assert_eq!(out.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let input = content(json!({
            "ang_size_xxl": [1],
            "ang_text_size_lh_xl_tablet": {"size": 1.4, "unit": "em"}
        }));
        let once = migrate(&input, LEGACY_SCHEMA_VERSION);
        let twice = migrate(&once.content, LEGACY_SCHEMA_VERSION);
        assert_eq!(once.content, twice.content);
    }

    #[test]
    fn test_migrate_accepts_struct_values() {
        let input = content(json!({"ang_text_size_lh_xl_tablet": {"size": 1.4, "unit": "em"}}));
        let out = migrate(&input, LEGACY_SCHEMA_VERSION);
        assert_eq!(
            out.content.get("ang_text_size_xl_line_height_tablet"),
            input.get("ang_text_size_lh_xl_tablet")
        );
        assert!(out.content.get("ang_text_size_xl_typography").is_none());
    }

    #[test]
    fn test_migrate_skips_empty_and_scalar_values() {
        let input = content(json!({"ang_size_xl": [], "ang_size_small": "12px"}));
        let out = migrate(&input, LEGACY_SCHEMA_VERSION);
        assert_eq!(out.content, input);
        assert!(out.applied.is_empty());
        assert_eq!(out.warnings.len(), 2);
        assert!(out.warnings.contains(&MigrationWarning::EmptyValue {
            key: "ang_size_xl".to_string()
        }));
        assert!(out.warnings.contains(&MigrationWarning::UnexpectedShape {
            key: "ang_size_small".to_string(),
            found: "text".to_string()
        }));
    }

    #[test]
    fn test_current_version_skips_rules() {
        let input = content(json!({"ang_size_xxl": [1]}));
        let out = migrate(&input, CURRENT_SCHEMA_VERSION);
        assert_eq!(out.content, input);
        assert!(out.applied.is_empty());
    }

    #[test]
    fn test_needs_migration() {
        assert!(needs_migration(LEGACY_SCHEMA_VERSION));
        assert!(!needs_migration(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_warning_serialization() {
        let warning = MigrationWarning::EmptyValue {
            key: "ang_size_xl".to_string(),
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("empty_value"));
    }
}
