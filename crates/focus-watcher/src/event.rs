//! Event type emitted by native focus sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name used for the application identifier when serialized.
const APP_ID_KEY: &str = "app_id";

/// A focus change reported by a native source.
///
/// Semantics:
/// - `app_id` is the stable bundle/package identifier of the application that
///   became active. It is the only field the pipeline interprets.
/// - `attrs` carries any additional platform-supplied attributes (pid, window
///   title, localized name, ...). Keys are unique and values are opaque.
///
/// Events are built once by a source and then only read. Serialization is
/// flat: `app_id` and each attribute appear as top-level keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusEvent {
    /// Bundle or package identifier of the focused application.
    app_id: String,
    /// Additional platform attributes, keyed by name.
    #[serde(flatten)]
    attrs: BTreeMap<String, Value>,
}

impl FocusEvent {
    /// Create an event for `app_id` with no extra attributes.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Attach an attribute. A later value for the same key replaces the earlier
    /// one; the reserved key `app_id` is ignored.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != APP_ID_KEY {
            self.attrs.insert(key, value.into());
        }
        self
    }

    /// Application identifier.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Look up a single attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// All additional attributes.
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }
}
