use serde::{Deserialize, Deserializer};

/// Presence-tracking value for sparse updates of nullable columns.
///
/// In JSON, an absent key is `Unchanged` (via `#[serde(default)]`), `null`
/// is `Clear`, and any other value is `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPatch<T> {
    Unchanged,
    Clear,
    Set(T),
}

impl<T> Default for FieldPatch<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> FieldPatch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// `None` when untouched, `Some(None)` to write NULL, `Some(Some(v))` to write `v`.
    pub fn as_update(&self) -> Option<Option<&T>> {
        match self {
            Self::Unchanged => None,
            Self::Clear => Some(None),
            Self::Set(value) => Some(Some(value)),
        }
    }
}

impl FieldPatch<String> {
    /// Treats `Set("")` as `Clear`. Foreign-key columns use this so that an
    /// empty string never reaches the store.
    pub fn normalize_empty(self) -> Self {
        match self {
            Self::Set(value) if value.trim().is_empty() => Self::Clear,
            other => other,
        }
    }
}

impl<T> From<Option<T>> for FieldPatch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Set(value),
            None => Self::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldPatch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}
