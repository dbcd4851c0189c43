use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::{ClientIdentifiers, StageMapping};

pub const STAGE_SEPARATOR: &str = ", ";
const FIELD_PREFIX: &str = "map_";

/// Ordered set of category labels a stage may be mapped onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<String>,
}

impl Taxonomy {
    pub fn new(categories: Vec<String>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Canonical label for `label`, compared case-insensitively after trimming.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let wanted = label.trim().to_lowercase();
        self.categories
            .iter()
            .find(|category| category.to_lowercase() == wanted)
            .map(|category| category.as_str())
    }
}

fn snake_case(label: &str) -> String {
    let words: Vec<String> = label
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();
    words.join("_")
}

/// `"No Show Demo"` becomes `"map_no_show_demo"`.
pub fn field_key(category: &str) -> String {
    format!("{FIELD_PREFIX}{}", snake_case(category))
}

/// `"Pre Success"` becomes `"calendar_pre_success_id"`.
pub fn calendar_key(name: &str) -> String {
    format!("calendar_{}_id", snake_case(name))
}

/// Flat string record handed to the submission relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubmissionRecord(BTreeMap<String, String>);

impl SubmissionRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| value.as_str())
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Stage names bucketed by assigned category, in mapping order. Unassigned stages are dropped.
pub fn group_by_category(mappings: &[StageMapping]) -> HashMap<&str, Vec<&str>> {
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for mapping in mappings {
        let Some(category) = mapping.category.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        groups
            .entry(category)
            .or_default()
            .push(mapping.stage_name.as_str());
    }
    groups
}

pub fn build_payload(
    mappings: &[StageMapping],
    identifiers: &ClientIdentifiers,
    taxonomy: &Taxonomy,
) -> SubmissionRecord {
    let groups = group_by_category(mappings);
    let mut fields = BTreeMap::new();

    fields.insert(
        "ghl_subaccount_id".to_string(),
        identifiers.subaccount_id.clone(),
    );
    fields.insert(
        "meta_ad_account_id".to_string(),
        identifiers.ad_account_id.clone(),
    );
    for (name, id) in &identifiers.calendars {
        fields.insert(calendar_key(name), id.clone());
    }

    for category in taxonomy.categories() {
        let joined = groups
            .get(category.as_str())
            .map(|stages| stages.join(STAGE_SEPARATOR))
            .unwrap_or_default();
        fields.insert(field_key(category), joined);
    }

    SubmissionRecord(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CATEGORIES;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect())
    }

    fn mapping(stage: &str, category: &str) -> StageMapping {
        StageMapping {
            stage_name: stage.to_string(),
            category: (!category.is_empty()).then(|| category.to_string()),
        }
    }

    fn identifiers() -> ClientIdentifiers {
        ClientIdentifiers {
            subaccount_id: "sub-1".to_string(),
            ad_account_id: "act-9".to_string(),
            calendars: [
                ("diagnosis".to_string(), "cal-d".to_string()),
                ("demo".to_string(), "cal-m".to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn groups_stages_and_drops_unassigned() {
        let mappings = vec![mapping("A", "Won"), mapping("B", "Won"), mapping("C", "")];
        let record = build_payload(&mappings, &identifiers(), &taxonomy());

        assert_eq!(record.get("map_won"), Some("A, B"));
        assert!(record.fields().values().all(|value| !value.contains('C')));
        assert_eq!(record.get("map_lost"), Some(""));
    }

    #[test]
    fn every_category_has_a_field() {
        let record = build_payload(&[], &identifiers(), &taxonomy());
        for category in DEFAULT_CATEGORIES {
            assert_eq!(record.get(&field_key(category)), Some(""), "{category}");
        }
        assert_eq!(record.get("ghl_subaccount_id"), Some("sub-1"));
        assert_eq!(record.get("meta_ad_account_id"), Some("act-9"));
        assert_eq!(record.get("calendar_diagnosis_id"), Some("cal-d"));
        assert_eq!(record.get("calendar_demo_id"), Some("cal-m"));
        assert_eq!(record.fields().len(), 16);
    }

    #[test]
    fn repeated_builds_are_byte_identical() {
        let mappings = vec![
            mapping("Demo Booked", "Demo Set"),
            mapping("Closed", "Won"),
            mapping("Ghosted", "Dead Lead"),
            mapping("Signed", "Won"),
        ];
        let first = serde_json::to_string(&build_payload(&mappings, &identifiers(), &taxonomy())).unwrap();
        let second = serde_json::to_string(&build_payload(&mappings, &identifiers(), &taxonomy())).unwrap();
        assert_eq!(first, second);
        assert!(first.contains(r#""map_won":"Closed, Signed""#));
    }

    #[test]
    fn field_keys_are_snake_case() {
        assert_eq!(field_key("No Show Demo"), "map_no_show_demo");
        assert_eq!(field_key("Won"), "map_won");
        assert_eq!(field_key(" Non  Qualificato "), "map_non_qualificato");
    }

    #[test]
    fn calendar_keys_are_snake_case() {
        let mut ids = identifiers();
        ids.calendars
            .insert(" Pre  Success ".to_string(), "cal-p".to_string());
        let record = build_payload(&[], &ids, &taxonomy());
        assert_eq!(record.get("calendar_pre_success_id"), Some("cal-p"));
        assert_eq!(calendar_key("Diagnosis"), "calendar_diagnosis_id");
    }

    #[test]
    fn resolve_returns_canonical_label() {
        let taxonomy = taxonomy();
        assert_eq!(taxonomy.resolve(" demo set "), Some("Demo Set"));
        assert_eq!(taxonomy.resolve("Closed Won"), None);
    }
}
