//! Key marshalling.
//!
//! A [`MarshalledKey`] is the canonical string form of a caller's key. It is
//! used only for the in-flight request table and the memory layer's index;
//! layers always see the original key.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use strata_core::error::{AppError, ErrorKind};
use strata_core::result::AppResult;

/// Canonical string form of a key, used for internal indexing only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarshalledKey(String);

impl MarshalledKey {
    /// The canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarshalledKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON value with object members sorted by name.
#[derive(Serialize)]
#[serde(untagged)]
enum Canonical {
    Leaf(Value),
    Seq(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

impl From<Value> for Canonical {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
            Value::Object(members) => Self::Map(
                members
                    .into_iter()
                    .map(|(name, member)| (name, Self::from(member)))
                    .collect(),
            ),
            leaf => Self::Leaf(leaf),
        }
    }
}

/// Marshal a key into its canonical string form.
///
/// Structurally equal keys marshal identically regardless of the iteration
/// order of the source collection. The key itself is only borrowed.
pub fn marshal_key<K: Serialize + ?Sized>(key: &K) -> AppResult<MarshalledKey> {
    let value = serde_json::to_value(key).map_err(|e| {
        AppError::with_source(
            ErrorKind::Serialization,
            format!("key cannot be marshalled: {e}"),
            e,
        )
    })?;
    Ok(MarshalledKey(serde_json::to_string(&Canonical::from(value))?))
}

/// Parse a marshalled key back into a JSON value.
pub fn unmarshal_key(key: &MarshalledKey) -> AppResult<Value> {
    Ok(serde_json::from_str(key.as_str())?)
}
