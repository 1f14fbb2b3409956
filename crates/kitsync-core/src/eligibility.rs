//! Which document properties belong to a style kit.
//!
//! Save, update and reset all filter through [`select_style_properties`], so
//! the three flows always agree on the key set.

use std::collections::BTreeMap;

use crate::models::{KitContent, PropertyValue};

/// Prefixes that mark a property as style-bearing.
pub const STYLE_PREFIXES: &[&str] = &["ang_", "background", "hide"];

/// Prefix of control/action properties that are never part of a kit.
pub const ACTION_PREFIX: &str = "ang_action";

/// Field kept as-is when blanking a structured value.
const UNIT_FIELD: &str = "unit";

/// Whether `key` is a style property.
pub fn is_style_key(key: &str) -> bool {
    if key.starts_with(ACTION_PREFIX) {
        return false;
    }
    STYLE_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// Keep only the style properties of `properties`.
pub fn select_style_properties(properties: &KitContent) -> KitContent {
    let selected: KitContent = properties
        .iter()
        .filter(|(key, _)| is_style_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    tracing::trace!(
        input = properties.len(),
        selected = selected.len(),
        "Selected style properties"
    );
    selected
}

/// The empty counterpart of a value, shaped like the original.
pub fn blank_value(value: &PropertyValue) -> PropertyValue {
    match value {
        PropertyValue::Text(_) => PropertyValue::Text(String::new()),
        PropertyValue::Bool(_) => PropertyValue::Bool(false),
        PropertyValue::Number(_) | PropertyValue::Null => PropertyValue::Null,
        PropertyValue::List(_) => PropertyValue::List(Vec::new()),
        PropertyValue::Struct(fields) => PropertyValue::Struct(
            fields
                .iter()
                .map(|(name, field)| {
                    let blanked = if name == UNIT_FIELD {
                        field.clone()
                    } else {
                        blank_value(field)
                    };
                    (name.clone(), blanked)
                })
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

/// Blank every style property of `properties`; other keys are dropped.
pub fn reset_properties(properties: &KitContent) -> KitContent {
    select_style_properties(properties)
        .iter()
        .map(|(key, value)| (key.clone(), blank_value(value)))
        .collect()
}
