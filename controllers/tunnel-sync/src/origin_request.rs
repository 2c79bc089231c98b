//! The `originRequest` object of an ingress rule.
//!
//! Cloudflare accepts many origin options; only two are driven by labels.
//! [`OriginRequest`] keeps the whole object as a JSON document so that every
//! key this controller does not manage is written back verbatim.

use serde_json::{Map, Value};

pub const ORIGIN_SERVER_NAME_KEY: &str = "originServerName";
pub const NO_TLS_VERIFY_KEY: &str = "noTLSVerify";

/// Key/value view over an `originRequest` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OriginRequest {
    fields: Map<String, Value>,
}

impl OriginRequest {
    /// `None` when `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|fields| Self { fields: fields.clone() })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns `true` when the stored value changed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.get(key) == Some(&value) {
            return false;
        }
        self.fields.insert(key.to_string(), value);
        true
    }

    /// Returns `true` when the key was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.fields.remove(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The document as a rule value. An empty document means "no origin options".
    pub fn into_value(self) -> Option<Value> {
        (!self.fields.is_empty()).then_some(Value::Object(self.fields))
    }

    fn apply<T: Into<Value>>(&mut self, key: &str, desired: Option<T>) -> bool {
        match desired {
            Some(value) => self.set(key, value),
            None => self.remove(key),
        }
    }
}

/// Whether `existing` would be discarded by [`merge_managed`].
pub fn is_invalid(existing: Option<&Value>) -> bool {
    matches!(existing, Some(value) if !value.is_null() && !value.is_object())
}

/// Apply the managed origin fields to `existing`.
///
/// A `Some` field is written, a `None` field is removed, and all other keys are
/// kept. An existing value that is not an object is replaced by the managed
/// fields alone. When nothing changes, `existing` is returned as-is.
pub fn merge_managed(existing: Option<&Value>, server_name: Option<&str>, no_tls_verify: Option<bool>) -> Option<Value> {
    let existing = existing.filter(|v| !v.is_null());
    if existing.is_none() && server_name.is_none() && no_tls_verify.is_none() {
        return None;
    }

    let (mut document, rebuilt) = match existing.map(OriginRequest::from_value) {
        Some(Some(document)) => (document, false),
        Some(None) => (OriginRequest::default(), true),
        None => (OriginRequest::default(), false),
    };

    let mut changed = document.apply(ORIGIN_SERVER_NAME_KEY, server_name);
    changed |= document.apply(NO_TLS_VERIFY_KEY, no_tls_verify);

    if !changed && !rebuilt {
        return existing.cloned();
    }
    document.into_value()
}
