//! The fixed schema of facts a research run tries to fill in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Data points looked up when the caller does not supply its own schema
pub const DEFAULT_SCHEMA: [&str; 5] = [
    "product_or_service",
    "company_size",
    "headquarters_location",
    "email",
    "phone",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub value: Option<String>,
    pub reference: Option<String>,
}

impl DataPoint {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            value: None,
            reference: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }
}

/// One entry of the `update_data` tool's `datas_update` argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPointUpdate {
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl DataPointUpdate {
    pub fn new<N, V, R>(name: N, value: V, reference: R) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            value: value.into(),
            reference: Some(reference.into()),
        }
    }
}

// Models occasionally send numbers or booleans for a value ("company_size": 120)
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => value,
        other => other.to_string(),
    })
}

/// Holds the schema and the current extraction state for one run.
///
/// The set of names is fixed at construction; updates only ever overwrite the
/// value and reference of an existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DataPointStore {
    points: Vec<DataPoint>,
}

impl Default for DataPointStore {
    fn default() -> Self {
        Self::with_schema(DEFAULT_SCHEMA)
    }
}

impl DataPointStore {
    /// Build a store from a list of names. Repeated names are kept once, in first-seen order.
    pub fn with_schema<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut points: Vec<DataPoint> = Vec::new();
        for name in names {
            let name = name.into();
            if !points.iter().any(|point| point.name == name) {
                points.push(DataPoint::new(name));
            }
        }
        Self { points }
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn get(&self, name: &str) -> Option<&DataPoint> {
        self.points.iter().find(|point| point.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.points.iter().map(|point| point.name.clone()).collect()
    }

    /// Names that still have no value, in schema order
    pub fn pending_names(&self) -> Vec<String> {
        self.points
            .iter()
            .filter(|point| !point.is_resolved())
            .map(|point| point.name.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.points.iter().all(DataPoint::is_resolved)
    }

    /// Overwrite value and reference of every matching data point. Updates naming a data
    /// point outside the schema are ignored. Returns the observation for the model.
    pub fn apply_updates(&mut self, updates: &[DataPointUpdate]) -> String {
        for update in updates {
            match self.points.iter_mut().find(|point| point.name == update.name) {
                Some(point) => {
                    point.value = Some(update.value.clone());
                    point.reference = update.reference.clone();
                    tracing::info!(name = %point.name, value = %update.value, "data point updated");
                }
                None => {
                    tracing::debug!(name = %update.name, "ignoring update for unknown data point");
                }
            }
        }
        format!("data updated: {}", self.render())
    }

    pub fn render(&self) -> String {
        serde_json::to_string(&self.points).unwrap_or_else(|_| format!("{:?}", self.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_schema() {
        let store = DataPointStore::default();
        assert_eq!(store.names(), DEFAULT_SCHEMA.to_vec());
        assert_eq!(store.pending_names().len(), 5);
        assert!(!store.is_complete());
    }

    #[test]
    fn test_duplicate_schema_names_collapse() {
        let store = DataPointStore::with_schema(["email", "phone", "email"]);
        assert_eq!(store.names(), vec!["email", "phone"]);
    }

    #[test]
    fn test_update_sets_value_and_reference_together() {
        let mut store = DataPointStore::with_schema(["email", "phone"]);
        let observation =
            store.apply_updates(&[DataPointUpdate::new("email", "a@b.com", "http://x")]);

        let email = store.get("email").unwrap();
        assert_eq!(email.value.as_deref(), Some("a@b.com"));
        assert_eq!(email.reference.as_deref(), Some("http://x"));
        assert!(observation.starts_with("data updated: "));
        assert!(observation.contains("a@b.com"));
        assert_eq!(store.pending_names(), vec!["phone"]);
    }

    #[test]
    fn test_update_overwrites_previous_reference() {
        let mut store = DataPointStore::with_schema(["email"]);
        store.apply_updates(&[DataPointUpdate::new("email", "a@b.com", "http://x")]);
        store.apply_updates(&[DataPointUpdate {
            name: "email".to_string(),
            value: "c@d.com".to_string(),
            reference: None,
        }]);

        let email = store.get("email").unwrap();
        assert_eq!(email.value.as_deref(), Some("c@d.com"));
        assert_eq!(email.reference, None);
    }

    #[test]
    fn test_unknown_name_leaves_store_unchanged() {
        let mut store = DataPointStore::with_schema(["email"]);
        let before = store.clone();
        store.apply_updates(&[DataPointUpdate::new("revenue", "$1M", "http://x")]);
        assert_eq!(store, before);
        assert_eq!(store.names(), vec!["email"]);
    }

    #[test]
    fn test_pending_names_is_stable_without_updates() {
        let store = DataPointStore::default();
        assert_eq!(store.pending_names(), store.pending_names());
    }

    #[test]
    fn test_update_deserializes_loose_values() {
        let updates: Vec<DataPointUpdate> = serde_json::from_value(json!([
            {"name": "company_size", "value": 120, "reference": "http://x"},
            {"name": "email", "value": "a@b.com"}
        ]))
        .unwrap();

        assert_eq!(updates[0].value, "120");
        assert_eq!(updates[1].reference, None);
    }

    #[test]
    fn test_store_serializes_as_list() {
        let store = DataPointStore::with_schema(["email"]);
        assert_eq!(
            serde_json::to_value(&store).unwrap(),
            json!([{"name": "email", "value": null, "reference": null}])
        );
    }
}
