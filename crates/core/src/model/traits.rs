//! Trait maps attached to shapes and members.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace of the built-in prelude traits and shapes.
pub const PRELUDE_NAMESPACE: &str = "smithy.api";

pub const DOCUMENTATION: &str = "smithy.api#documentation";
pub const REQUIRED: &str = "smithy.api#required";
pub const LENGTH: &str = "smithy.api#length";
pub const RANGE: &str = "smithy.api#range";
pub const PATTERN: &str = "smithy.api#pattern";
pub const DEFAULT: &str = "smithy.api#default";
pub const HTTP: &str = "smithy.api#http";
pub const HTTP_LABEL: &str = "smithy.api#httpLabel";
pub const HTTP_QUERY: &str = "smithy.api#httpQuery";
pub const HTTP_HEADER: &str = "smithy.api#httpHeader";
pub const HTTP_PAYLOAD: &str = "smithy.api#httpPayload";

pub const REST_JSON_1: &str = "aws.protocols#restJson1";
pub const AWS_JSON_1_0: &str = "aws.protocols#awsJson1_0";
pub const AWS_JSON_1_1: &str = "aws.protocols#awsJson1_1";

/// Ordered map of trait id to trait value.
///
/// Lookups accept the absolute id (`smithy.api#required`) as well as the
/// short name (`required`), since hand-written structured documents use both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Traits(BTreeMap<String, Value>);

impl Traits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(id.into(), value)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(id) {
            return Some(value);
        }
        match id.split_once('#') {
            Some((_, short)) => self.0.get(short),
            None => self.0.get(&format!("{PRELUDE_NAMESPACE}#{id}")),
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// String value of a trait, if the trait is present and holds a string.
    pub fn string(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    pub fn documentation(&self) -> Option<String> {
        self.string(DOCUMENTATION).map(str::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for Traits {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Traits {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_accepts_short_and_absolute_ids() {
        let traits: Traits = [
            ("smithy.api#required".to_string(), json!({})),
            ("httpQuery".to_string(), json!("limit")),
        ]
        .into_iter()
        .collect();

        assert!(traits.has("required"));
        assert!(traits.has(REQUIRED));
        assert_eq!(traits.string(HTTP_QUERY), Some("limit"));
        assert!(!traits.has(HTTP_HEADER));
    }

    #[test]
    fn test_documentation_only_reads_strings() {
        let mut traits = Traits::new();
        traits.insert(DOCUMENTATION, json!(42));
        assert_eq!(traits.documentation(), None);
        traits.insert(DOCUMENTATION, json!("A blog post."));
        assert_eq!(traits.documentation().as_deref(), Some("A blog post."));
    }
}
