use serde_json::Value;

use crate::harvest::models::{DetailRecord, SummaryRecord};

/// Flattens one raw listing item into a [`SummaryRecord`]. Total over any
/// JSON shape: missing keys, nulls and absent nested objects all map to
/// empty fields.
pub fn parse_summary(site_base: &str, item: &Value) -> SummaryRecord {
    SummaryRecord {
        id: text(item, "id").unwrap_or_default(),
        url: format!("{site_base}{}", str_field(item, "path").unwrap_or_default()),
        price: nested_text(item, "price", "value"),
        currency: nested_text(item, "price", "currency"),
        rooms: uint(item, "rooms"),
        area: nested_text(item, "area", "value"),
        area_units: nested_text(item, "area", "units"),
        location: nested_text(item, "location", "fullName"),
        city: nested_text(item, "city", "name"),
        updated_at: text(item, "updatedAt"),
        photos_count: uint(item, "photosCount"),
    }
}

/// Flattens one raw detail item into a [`DetailRecord`]. Same totality
/// contract as [`parse_summary`].
pub fn parse_detail(item: &Value) -> DetailRecord {
    let floor = match (text(item, "floor"), text(item, "floors")) {
        (Some(floor), Some(floors)) => Some(format!("{floor}/{floors}")),
        _ => None,
    };

    DetailRecord {
        description: text(item, "description"),
        address: text(item, "address"),
        latitude: float(item, "latitude"),
        longitude: float(item, "longitude"),
        contact_name: text(item, "contactName"),
        phones: join_phones(item),
        category: nested_text(item, "category", "name"),
        has_deed: flag(item, "hasBillOfSale"),
        has_repair: flag(item, "hasRepair"),
        floor,
    }
}

/// Non-empty phone values joined with `", "`; `None` when nothing usable.
fn join_phones(item: &Value) -> Option<String> {
    let phones: Vec<&str> = item
        .get("phones")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|p| p.get("value").and_then(Value::as_str))
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if phones.is_empty() {
        None
    } else {
        Some(phones.join(", "))
    }
}

/// String-or-number field rendered as text. The upstream API is loose about
/// whether ids, prices and counts arrive as strings or numbers.
fn text(item: &Value, key: &str) -> Option<String> {
    match item.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str)
}

fn nested_text(item: &Value, object: &str, key: &str) -> Option<String> {
    item.get(object).map(|inner| text(inner, key)).unwrap_or(None)
}

fn uint(item: &Value, key: &str) -> Option<u64> {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float(item: &Value, key: &str) -> Option<f64> {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(item: &Value, key: &str) -> bool {
    item.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const BASE: &str = "https://bina.az";

    #[test]
    fn summary_of_empty_object_is_all_empty() {
        let record = parse_summary(BASE, &json!({}));
        assert_eq!(record.id, "");
        assert_eq!(record.url, BASE);
        assert_eq!(record.price, None);
        assert_eq!(record.rooms, None);
        assert_eq!(record.location, None);
        assert_eq!(record.photos_count, None);
    }

    #[test]
    fn detail_of_empty_object_is_all_empty() {
        let record = parse_detail(&json!({}));
        assert_eq!(record.description, None);
        assert_eq!(record.phones, None);
        assert_eq!(record.floor, None);
        assert!(!record.has_deed);
        assert!(!record.has_repair);
    }

    #[test]
    fn summary_reads_nested_objects() {
        let item = json!({
            "id": "4077381",
            "path": "/items/4077381",
            "price": {"value": "155000", "currency": "AZN"},
            "area": {"value": 92.5, "units": "m²"},
            "location": {"fullName": "Nəsimi r."},
            "city": {"name": "Bakı"},
            "rooms": 3,
            "updatedAt": "2025-08-01T10:00:00Z",
            "photosCount": 14
        });
        let record = parse_summary(BASE, &item);
        assert_eq!(record.id, "4077381");
        assert_eq!(record.url, "https://bina.az/items/4077381");
        assert_eq!(record.price.as_deref(), Some("155000"));
        assert_eq!(record.currency.as_deref(), Some("AZN"));
        assert_eq!(record.area.as_deref(), Some("92.5"));
        assert_eq!(record.location.as_deref(), Some("Nəsimi r."));
        assert_eq!(record.city.as_deref(), Some("Bakı"));
        assert_eq!(record.rooms, Some(3));
        assert_eq!(record.photos_count, Some(14));
    }

    #[test]
    fn null_nested_objects_do_not_fail_the_record() {
        let item = json!({
            "id": 123,
            "price": null,
            "area": null,
            "location": null,
            "city": null
        });
        let record = parse_summary(BASE, &item);
        assert_eq!(record.id, "123");
        assert_eq!(record.price, None);
        assert_eq!(record.city, None);
    }

    #[test]
    fn numeric_strings_parse_as_counts() {
        let record = parse_summary(BASE, &json!({"rooms": "4", "photosCount": "9"}));
        assert_eq!(record.rooms, Some(4));
        assert_eq!(record.photos_count, Some(9));
    }

    #[test]
    fn phones_join_skips_empty_values() {
        let item = json!({
            "phones": [
                {"value": "(050) 555-55-55"},
                {"value": ""},
                {"other": "x"},
                {"value": "(012) 444-44-44"}
            ]
        });
        let record = parse_detail(&item);
        assert_eq!(
            record.phones.as_deref(),
            Some("(050) 555-55-55, (012) 444-44-44")
        );
    }

    #[test]
    fn floor_descriptor_requires_both_parts() {
        assert_eq!(
            parse_detail(&json!({"floor": 5, "floors": 9})).floor.as_deref(),
            Some("5/9")
        );
        assert_eq!(parse_detail(&json!({"floor": 5})).floor, None);
        assert_eq!(parse_detail(&json!({"floors": 9})).floor, None);
    }

    #[test]
    fn detail_flags_and_category() {
        let item = json!({
            "category": {"name": "Yeni tikili"},
            "hasBillOfSale": true,
            "hasRepair": false,
            "latitude": 40.4093,
            "longitude": "49.8671"
        });
        let record = parse_detail(&item);
        assert_eq!(record.category.as_deref(), Some("Yeni tikili"));
        assert!(record.has_deed);
        assert!(!record.has_repair);
        assert_eq!(record.latitude, Some(40.4093));
        assert_eq!(record.longitude, Some(49.8671));
    }
}
