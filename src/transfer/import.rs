//! Import through a [`FieldMapping`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{FieldMapping, Result, TransferError};
use crate::extract::clean_price;
use crate::store::{NewItem, Store};

#[allow(clippy::expect_used)]
static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s-]").expect("slug filter regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static SLUG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\s_]+").expect("slug separator regex is valid") // Static pattern, safe to panic
});

/// One catalog item read from an import document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    /// Owning set, if the document names one.
    pub set_name: Option<String>,
    /// Stable item key.
    pub item_key: String,
    /// Display name.
    pub name: String,
    /// Serial number.
    pub number: Option<String>,
    /// Product page URL.
    pub source_url: Option<String>,
    /// Reference price.
    pub price: Option<f64>,
}

/// Records extracted from a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    /// Usable records, in document order.
    pub records: Vec<ImportRecord>,
    /// Entries dropped for lacking a name.
    pub skipped: usize,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Distinct sets upserted.
    pub sets: usize,
    /// Items upserted.
    pub items: usize,
    /// Entries dropped for lacking a name.
    pub skipped: usize,
}

/// Splits `"Charizard #4"` into name and number at the last `#`.
///
/// ```
/// use pricewatch_core::transfer::split_label;
///
/// assert_eq!(split_label("Charizard #4"), ("Charizard".to_string(), Some("4".to_string())));
/// assert_eq!(split_label("Energy Pack"), ("Energy Pack".to_string(), None));
/// ```
#[must_use]
pub fn split_label(label: &str) -> (String, Option<String>) {
    match label.rsplit_once('#') {
        Some((name, number)) => {
            let number = number.trim();
            (
                name.trim().to_string(),
                (!number.is_empty()).then(|| number.to_string()),
            )
        }
        None => (label.trim().to_string(), None),
    }
}

fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let filtered = NON_SLUG.replace_all(&lowered, "");
    SLUG_SEPARATORS
        .replace_all(filtered.trim(), "-")
        .into_owned()
}

/// Fallback item key for records without one: the set slug (minus a
/// leading `pokemon-`) joined with the number, or with the name slug when
/// there is no number.
///
/// ```
/// use pricewatch_core::transfer::variant_slug;
///
/// assert_eq!(variant_slug(Some("Pokemon Base Set"), "Charizard", Some("4")), "base-set-4");
/// assert_eq!(variant_slug(None, "Pikachu Promo", None), "pikachu-promo");
/// ```
#[must_use]
pub fn variant_slug(set_name: Option<&str>, name: &str, number: Option<&str>) -> String {
    let set_slug = set_name
        .map(slugify)
        .map(|slug| slug.strip_prefix("pokemon-").map(str::to_string).unwrap_or(slug))
        .filter(|slug| !slug.is_empty());
    let tail = match number {
        Some(number) => number.to_lowercase().replace(' ', "-"),
        None => slugify(name),
    };
    match set_slug {
        Some(set_slug) => format!("{set_slug}-{tail}"),
        None => tail,
    }
}

fn pointer<'a>(value: &'a Value, path: Option<&String>) -> Option<&'a Value> {
    let path = path?;
    if path.is_empty() {
        Some(value)
    } else {
        value.pointer(path)
    }
}

fn text_at(value: &Value, path: Option<&String>) -> Option<String> {
    let text = match pointer(value, path)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn price_at(value: &Value, path: Option<&String>) -> Option<f64> {
    match pointer(value, path)? {
        Value::Number(n) => n.as_f64().filter(|price| *price > 0.0),
        Value::String(s) => clean_price(s),
        _ => None,
    }
}

fn array_at<'a>(value: &'a Value, path: &String, field: &str) -> Result<&'a Vec<Value>> {
    pointer(value, Some(path))
        .and_then(Value::as_array)
        .ok_or_else(|| TransferError::Mapping(format!("`{field}` pointer '{path}' is not an array")))
}

fn read_record(
    entry: &Value,
    set_name: Option<String>,
    mapping: &FieldMapping,
) -> Option<ImportRecord> {
    let (name, number) = match text_at(entry, mapping.label.as_ref()) {
        Some(label) => split_label(&label),
        None => (
            text_at(entry, mapping.name.as_ref())?,
            text_at(entry, mapping.number.as_ref()),
        ),
    };
    if name.is_empty() {
        return None;
    }

    let item_key = text_at(entry, mapping.key.as_ref())
        .unwrap_or_else(|| variant_slug(set_name.as_deref(), &name, number.as_deref()));

    Some(ImportRecord {
        set_name,
        item_key,
        name,
        number,
        source_url: text_at(entry, mapping.source_url.as_ref()),
        price: price_at(entry, mapping.price.as_ref()),
    })
}

/// Applies `mapping` to a parsed document.
///
/// # Errors
///
/// Returns [`TransferError::Mapping`] when `records` (or `cards`) does not
/// point at an array. Entries without a name are counted as skipped.
pub fn extract_records(document: &Value, mapping: &FieldMapping) -> Result<ImportPlan> {
    mapping.validate()?;
    let mut plan = ImportPlan::default();

    for record in array_at(document, &mapping.records, "records")? {
        if let Some(cards_path) = &mapping.cards {
            let set_name = text_at(record, mapping.set_name.as_ref());
            for entry in array_at(record, cards_path, "cards")? {
                match read_record(entry, set_name.clone(), mapping) {
                    Some(parsed) => plan.records.push(parsed),
                    None => plan.skipped += 1,
                }
            }
        } else {
            let set_name = text_at(record, mapping.set_name.as_ref());
            match read_record(record, set_name, mapping) {
                Some(parsed) => plan.records.push(parsed),
                None => plan.skipped += 1,
            }
        }
    }

    debug!(records = plan.records.len(), skipped = plan.skipped, "records extracted");
    Ok(plan)
}

/// Upserts `records`, creating sets as they are first seen.
///
/// # Errors
///
/// Returns [`TransferError::Store`] on the first failed write.
pub async fn import_records(store: &Store, records: &[ImportRecord]) -> Result<ImportSummary> {
    let mut set_ids: HashMap<String, i64> = HashMap::new();
    let mut summary = ImportSummary::default();

    for record in records {
        let set_id = match &record.set_name {
            Some(name) => match set_ids.get(name) {
                Some(id) => Some(*id),
                None => {
                    let id = store.upsert_set(name, None).await?;
                    set_ids.insert(name.clone(), id);
                    Some(id)
                }
            },
            None => None,
        };

        store
            .upsert_item(&NewItem {
                item_key: record.item_key.clone(),
                name: record.name.clone(),
                serial_number: record.number.clone(),
                set_id,
                source_url: record.source_url.clone(),
                reference_price: record.price,
            })
            .await?;
        summary.items += 1;
    }

    summary.sets = set_ids.len();
    Ok(summary)
}

/// Reads `path` through `mapping` into the store.
///
/// # Errors
///
/// Returns [`TransferError`] for unreadable files, invalid JSON, mapping
/// mismatches or store failures.
#[instrument(skip(store, mapping), fields(path = %path.display()))]
pub async fn import_file(store: &Store, path: &Path, mapping: &FieldMapping) -> Result<ImportSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TransferError::io(path, &e))?;
    let document: Value = serde_json::from_str(&raw).map_err(|e| TransferError::json(path, &e))?;

    let plan = extract_records(&document, mapping)?;
    if plan.skipped > 0 {
        warn!(skipped = plan.skipped, "entries without a name were skipped");
    }
    let mut summary = import_records(store, &plan.records).await?;
    summary.skipped = plan.skipped;

    info!(sets = summary.sets, items = summary.items, "import complete");
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    fn flat_mapping() -> FieldMapping {
        FieldMapping {
            cards: None,
            set_name: Some("/series".to_string()),
            ..FieldMapping::default()
        }
    }

    // ==== Label and Key Tests ====

    #[test]
    fn test_split_label_uses_last_hash() {
        assert_eq!(
            split_label("Team Rocket #1 Promo #15"),
            ("Team Rocket #1 Promo".to_string(), Some("15".to_string()))
        );
        assert_eq!(split_label("Pikachu #"), ("Pikachu".to_string(), None));
    }

    #[test]
    fn test_variant_slug_strips_punctuation() {
        assert_eq!(
            variant_slug(Some("Pokemon Sun & Moon: Promos"), "x", Some("SM 01")),
            "sun-moon-promos-sm-01"
        );
    }

    // ==== Extraction Tests ====

    #[test]
    fn test_extract_nested_document() {
        let document = json!([
            {"name": "Base Set", "cards": [
                {"card": "Charizard #4", "price": 350.0, "id": "base-4"},
                {"card": "Blastoise #2", "price": "$120.50"}
            ]},
            {"name": "Jungle", "cards": []}
        ]);
        let plan = extract_records(&document, &FieldMapping::default()).unwrap();

        assert_eq!(plan.records.len(), 2);
        assert_eq!(plan.skipped, 0);
        let first = &plan.records[0];
        assert_eq!(first.item_key, "base-4");
        assert_eq!(first.set_name.as_deref(), Some("Base Set"));
        assert_eq!(first.number.as_deref(), Some("4"));
        assert_eq!(plan.records[1].item_key, "base-set-2");
        assert_eq!(plan.records[1].price, Some(120.5));
    }

    #[test]
    fn test_extract_flat_document_counts_skipped() {
        let document = json!([
            {"card": "Charizard #4", "series": "Pokemon Base Set", "price": 100},
            {"series": "Pokemon Base Set", "price": 5},
            {"card": "", "series": "Pokemon Base Set"}
        ]);
        let plan = extract_records(&document, &flat_mapping()).unwrap();

        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.skipped, 2);
        assert_eq!(plan.records[0].item_key, "base-set-4");
        assert_eq!(plan.records[0].price, Some(100.0));
    }

    #[test]
    fn test_extract_rejects_non_array_records() {
        let document = json!({"data": {"cards": 3}});
        let mapping = FieldMapping {
            records: "/data".to_string(),
            ..FieldMapping::default()
        };
        assert!(matches!(
            extract_records(&document, &mapping),
            Err(TransferError::Mapping(_))
        ));
    }

    #[test]
    fn test_extract_separate_name_and_number_fields() {
        let document = json!({"items": [{"title": "Mew", "no": 151, "url": "https://x.test/game/a/mew"}]});
        let mapping = FieldMapping {
            records: "/items".to_string(),
            cards: None,
            set_name: None,
            label: None,
            name: Some("/title".to_string()),
            number: Some("/no".to_string()),
            key: None,
            source_url: Some("/url".to_string()),
            price: None,
        };
        let plan = extract_records(&document, &mapping).unwrap();

        assert_eq!(plan.records[0].name, "Mew");
        assert_eq!(plan.records[0].number.as_deref(), Some("151"));
        assert_eq!(plan.records[0].item_key, "151");
        assert_eq!(
            plan.records[0].source_url.as_deref(),
            Some("https://x.test/game/a/mew")
        );
    }

    // ==== Store Tests ====

    #[tokio::test]
    async fn test_import_records_is_idempotent() {
        let store = Store::new(Database::new_in_memory().await.unwrap());
        let document = json!([
            {"name": "Base Set", "cards": [
                {"card": "Charizard #4", "price": 350.0},
                {"card": "Blastoise #2", "price": 120.0}
            ]}
        ]);
        let plan = extract_records(&document, &FieldMapping::default()).unwrap();

        let first = import_records(&store, &plan.records).await.unwrap();
        let second = import_records(&store, &plan.records).await.unwrap();
        assert_eq!(first.items, 2);
        assert_eq!(first.sets, 1);
        assert_eq!(second.items, 2);

        let set = store.find_set("Base Set").await.unwrap().unwrap();
        assert_eq!(store.items_in_set(set.id).await.unwrap().len(), 2);
        let charizard = store.require_item("base-set-4").await.unwrap();
        assert_eq!(charizard.item.reference_price, Some(350.0));
    }
}
