use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::round_decimal;

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(result)) = map.get("result") {
                print_result(result);
                print_envelope(map);
            } else {
                print_fields(map);
            }
        }
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>) {
    if let Some(Value::Array(rows)) = result.get("allocations") {
        print_allocations(rows);
    }
    if let (Some(Value::Array(assets)), Some(Value::Array(cov))) =
        (result.get("assets"), result.get("covariance"))
    {
        print_statistics(assets, result.get("expected_returns"), cov);
    }

    let scalars: Map<String, Value> = result
        .iter()
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if !scalars.is_empty() {
        print_fields(&scalars);
    }
}

/// One row per asset; weights shown to two decimals.
fn print_allocations(rows: &[Value]) {
    let mut builder = Builder::default();
    builder.push_record(["Asset", "Weight", "Amount", "Asset Return"]);
    for row in rows {
        if let Value::Object(a) = row {
            builder.push_record([
                a.get("asset").map(format_value).unwrap_or_default(),
                a.get("weight")
                    .and_then(|w| round_decimal(w, 2))
                    .unwrap_or_default(),
                a.get("allocated_amount")
                    .and_then(|m| round_decimal(m, 2))
                    .unwrap_or_else(|| "-".to_string()),
                a.get("asset_expected_return")
                    .and_then(|r| round_decimal(r, 4))
                    .unwrap_or_default(),
            ]);
        }
    }
    println!("{}", Table::from(builder));
}

fn print_statistics(assets: &[Value], expected: Option<&Value>, cov: &[Value]) {
    let names: Vec<String> = assets.iter().map(format_value).collect();

    let mut header = vec!["".to_string(), "Expected Return".to_string()];
    header.extend(names.iter().cloned());
    let mut builder = Builder::default();
    builder.push_record(header);

    let returns = expected.and_then(|v| v.as_array());
    for (i, name) in names.iter().enumerate() {
        let mut record = vec![name.clone()];
        record.push(
            returns
                .and_then(|r| r.get(i))
                .and_then(|r| round_decimal(r, 6))
                .unwrap_or_default(),
        );
        if let Some(Value::Array(row)) = cov.get(i) {
            record.extend(row.iter().map(|c| round_decimal(c, 6).unwrap_or_default()));
        }
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

fn print_envelope(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
