use serde_json::{Map, Value};
use std::io;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Allocation results become one row per asset; statistics become a
/// covariance matrix with an expected-return column; anything else is written
/// as field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value.as_object().and_then(|m| m.get("result"));
    match result {
        Some(Value::Object(res)) if res.get("allocations").is_some_and(|a| a.is_array()) => {
            if let Some(Value::Array(rows)) = res.get("allocations") {
                write_array_csv(&mut wtr, rows);
            }
        }
        Some(Value::Object(res)) if res.contains_key("covariance") => {
            write_statistics_csv(&mut wtr, res);
        }
        Some(Value::Object(res)) => write_fields(&mut wtr, res),
        _ => match value {
            Value::Object(map) => write_fields(&mut wtr, map),
            Value::Array(arr) => write_array_csv(&mut wtr, arr),
            _ => {
                let _ = wtr.write_record([&format_csv_value(value)]);
            }
        },
    }

    let _ = wtr.flush();
}

fn write_fields(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_statistics_csv(wtr: &mut StdoutWriter<'_>, res: &Map<String, Value>) {
    let empty = Vec::new();
    let assets = res.get("assets").and_then(|a| a.as_array()).unwrap_or(&empty);
    let returns = res.get("expected_returns").and_then(|r| r.as_array()).unwrap_or(&empty);
    let cov = res.get("covariance").and_then(|c| c.as_array()).unwrap_or(&empty);

    let mut header = vec!["asset".to_string(), "expected_return".to_string()];
    header.extend(assets.iter().map(format_csv_value));
    let _ = wtr.write_record(&header);

    for (i, asset) in assets.iter().enumerate() {
        let mut row = vec![
            format_csv_value(asset),
            returns.get(i).map(format_csv_value).unwrap_or_default(),
        ];
        if let Some(Value::Array(cells)) = cov.get(i) {
            row.extend(cells.iter().map(format_csv_value));
        }
        let _ = wtr.write_record(&row);
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    // Extract headers from first object
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
