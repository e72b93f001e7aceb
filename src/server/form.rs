//! URL-encoded form fields

use serde::Deserialize;

/// Decoded `application/x-www-form-urlencoded` fields, in body order
///
/// Extracted with `axum::extract::Form<FormFields>`. Repeated fields resolve
/// to the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// Build from already decoded pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Value of a field; the last occurrence wins when repeated
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of decoded fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the form has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
