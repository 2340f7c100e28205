//! Key case conversion for response payloads.

use serde_json::{Map, Value};

/// "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Rename object keys to camelCase, descending into nested objects and arrays
/// so included relationships are converted too.
pub fn keys_to_camel_case(v: Value) -> Value {
    match v {
        Value::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (k, v) in obj {
                out.insert(to_camel_case(&k), keys_to_camel_case(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(keys_to_camel_case).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_identifiers() {
        assert_eq!(to_camel_case("user_id"), "userId");
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("_private"), "private");
        assert_eq!(to_camel_case("name"), "name");
    }

    #[test]
    fn converts_nested_keys() {
        let v = keys_to_camel_case(json!({"customer_id": 1, "line_items": [{"unit_price": 2}]}));
        assert_eq!(v, json!({"customerId": 1, "lineItems": [{"unitPrice": 2}]}));
    }
}
