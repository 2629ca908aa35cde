//! Scaling of CPU/memory requests and limits in rendered objects

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info};

static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(\.\d+)?([A-Za-z]+)?").expect("quantity pattern is valid")
});

const RESOURCE_SECTIONS: &[&str] = &["limits", "requests"];

/// Scale a resource quantity such as `500Mi` or `200m`
///
/// The number is rounded to one decimal place and the unit is kept, so
/// `"500Mi"` scaled by `0.1` becomes `"50.0Mi"`. Strings without a leading
/// number are returned unchanged.
pub fn scale_quantity(quantity: &str, factor: f64) -> String {
    let Some(captures) = QUANTITY_PATTERN.captures(quantity) else {
        return quantity.to_string();
    };

    let whole = captures.get(1).map(|m| m.as_str()).unwrap_or("0");
    let fraction = captures.get(2).map(|m| m.as_str()).unwrap_or(".0");
    let unit = captures.get(3).map(|m| m.as_str()).unwrap_or("");

    match format!("{}{}", whole, fraction).parse::<f64>() {
        Ok(number) => format!("{:.1}{}", number * factor, unit),
        Err(_) => quantity.to_string(),
    }
}

/// Scale every `resources` block found under the rendered `items`
///
/// A factor of exactly 1 leaves the document untouched. A factor of 0 or
/// less removes `limits` and `requests` instead of scaling them to zero.
pub fn scale_resources(document: &mut Value, factor: f64) {
    if factor == 1.0 {
        return;
    }
    if let Some(items) = document.get_mut("items") {
        walk(items, factor, "items", None);
    }
}

fn walk(value: &mut Value, factor: f64, path: &str, owner: Option<&str>) {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                walk(item, factor, &format!("{}[{}]", path, index), owner);
            }
        }
        Value::Object(map) => {
            let name = map
                .get("metadata")
                .and_then(|metadata| metadata.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let owner = name.as_deref().or(owner);

            if let Some(Value::Object(resources)) = map.get_mut("resources") {
                if factor <= 0.0 {
                    info!(
                        object = owner.unwrap_or("<unknown>"),
                        path = %path,
                        "Removing resource requests/limits"
                    );
                    for section in RESOURCE_SECTIONS {
                        resources.remove(*section);
                    }
                } else {
                    info!(
                        object = owner.unwrap_or("<unknown>"),
                        path = %path,
                        factor,
                        "Scaling resource requests/limits"
                    );
                    for section in RESOURCE_SECTIONS {
                        if let Some(Value::Object(quantities)) = resources.get_mut(*section) {
                            scale_section(quantities, factor);
                        }
                    }
                }
            }

            for (key, child) in map.iter_mut() {
                if key == "resources" {
                    continue;
                }
                walk(child, factor, &format!("{}['{}']", path, key), owner);
            }
        }
        _ => {}
    }
}

fn scale_section(quantities: &mut serde_json::Map<String, Value>, factor: f64) {
    for (key, quantity) in quantities.iter_mut() {
        let old = match quantity {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        let new = scale_quantity(&old, factor);
        debug!(resource = %key, old = %old, new = %new, "Adjusted quantity");
        *quantity = Value::String(new);
    }
}
