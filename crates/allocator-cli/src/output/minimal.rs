use serde_json::Value;

use super::round_decimal;

/// Print just the answer: `asset weight` lines for an allocation, otherwise
/// the first well-known field of the result.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(Value::Array(rows)) = result_obj.get("allocations") {
        for row in rows {
            let asset = row.get("asset").and_then(|a| a.as_str()).unwrap_or("?");
            let weight = row
                .get("weight")
                .and_then(|w| round_decimal(w, 4))
                .unwrap_or_default();
            println!("{} {}", asset, weight);
        }
        return;
    }

    let priority_keys = ["expected_return", "expected_volatility", "expected_returns"];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => arr.iter().map(format_minimal).collect::<Vec<_>>().join(" "),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
