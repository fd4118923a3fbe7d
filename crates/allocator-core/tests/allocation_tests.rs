use allocator_core::allocation::{optimize_from_prices, AllocationParameters, SolverSettings};
use allocator_core::market_data::csv_source::{read_price_csv, CsvPriceOptions};
use allocator_core::market_data::PriceSeries;
use allocator_core::statistics::estimate_return_statistics;
use allocator_core::{AllocatorError, RiskTolerance, TransactionCost};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Helpers
// ===========================================================================

/// Build a `Date,<assets...>` CSV whose daily returns cycle through `patterns`.
fn cyclic_csv(assets: &[&str], patterns: &[Vec<Decimal>], observations: usize) -> String {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut prices = vec![dec!(100); assets.len()];
    let mut text = format!("Date,{}\n", assets.join(","));
    for t in 0..observations {
        if t > 0 {
            for (p, pattern) in prices.iter_mut().zip(patterns) {
                *p *= Decimal::ONE + pattern[(t - 1) % pattern.len()];
            }
        }
        let row: Vec<String> = prices.iter().map(|p| p.to_string()).collect();
        text.push_str(&format!("{},{}\n", start + Days::new(t as u64), row.join(",")));
    }
    text
}

fn load(text: &str) -> PriceSeries {
    read_price_csv(text.as_bytes(), "stock_data.csv", &CsvPriceOptions::default()).unwrap()
}

/// High return/high vol, low vol, middling.
fn three_asset_prices() -> PriceSeries {
    load(&cyclic_csv(
        &["AAA", "BBB", "CCC"],
        &[
            vec![dec!(0.03), dec!(-0.01)],
            vec![dec!(0.001), dec!(0.002), dec!(0.0015)],
            vec![dec!(0.02), dec!(-0.015), dec!(0.01), dec!(-0.005)],
        ],
        253,
    ))
}

fn params(tc: Decimal, rt: Decimal) -> AllocationParameters {
    AllocationParameters {
        transaction_cost: TransactionCost::new(tc).unwrap(),
        risk_tolerance: RiskTolerance::new(rt).unwrap(),
        capital: None,
        solver: SolverSettings::default(),
    }
}

fn names(assets: &[&str]) -> Vec<String> {
    assets.iter().map(|a| a.to_string()).collect()
}

fn argmax(w: &[Decimal]) -> usize {
    w.iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

// ===========================================================================
// Statistics from prices
// ===========================================================================

#[test]
fn test_missing_asset_named() {
    let prices = load(&cyclic_csv(
        &["AAA", "BBB"],
        &[vec![dec!(0.01)], vec![dec!(0.02)]],
        5,
    ));
    let err = estimate_return_statistics(&prices, &names(&["AAA", "CCC"])).unwrap_err();
    assert_eq!(err, AllocatorError::MissingAsset("CCC".into()));

    let err = optimize_from_prices(&prices, &names(&["AAA", "CCC"]), &params(dec!(0), dec!(0.5)))
        .unwrap_err();
    assert_eq!(err, AllocatorError::MissingAsset("CCC".into()));
}

#[test]
fn test_statistics_annualised_from_daily_prices() {
    let prices = three_asset_prices();
    let stats = estimate_return_statistics(&prices, &names(&["AAA", "BBB", "CCC"])).unwrap();
    // AAA alternates +3% / -1% over 252 returns: mean 1% per day.
    assert!((stats.expected_returns()[0] - dec!(2.52)).abs() < dec!(0.000001));
    assert!((stats.expected_returns()[1] - dec!(0.378)).abs() < dec!(0.000001));
    assert!(stats.covariance()[1][1] < stats.covariance()[2][2]);
    assert!(stats.covariance()[2][2] < stats.covariance()[0][0]);
    assert_eq!(stats.observations(), Some(253));
}

// ===========================================================================
// Allocation scenarios
// ===========================================================================

#[test]
fn test_equal_returns_zero_covariance_splits_evenly() {
    let growth = vec![dec!(0.001)];
    let prices = load(&cyclic_csv(
        &["AAA", "BBB", "CCC"],
        &[growth.clone(), growth.clone(), growth],
        252,
    ));
    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB", "CCC"]), &params(dec!(0), dec!(0.5)))
        .unwrap();
    let third = Decimal::ONE / dec!(3);
    for w in out.result.weights() {
        assert!((w - third).abs() < dec!(0.000001), "weight {}", w);
    }
    assert!(out.result.expected_volatility < dec!(0.000001));
}

#[test]
fn test_weights_stay_on_simplex_across_parameters() {
    let prices = three_asset_prices();
    let assets = names(&["AAA", "BBB", "CCC"]);
    for rt in [dec!(0), dec!(0.25), dec!(0.5), dec!(0.75), dec!(1)] {
        for tc in [dec!(0), dec!(0.01)] {
            let out = optimize_from_prices(&prices, &assets, &params(tc, rt)).unwrap();
            let w = out.result.weights();
            let total: Decimal = w.iter().sum();
            assert!(
                (total - Decimal::ONE).abs() < dec!(0.000001),
                "rt={} tc={}: sum {}",
                rt,
                tc,
                total
            );
            for wi in &w {
                assert!(
                    *wi >= -dec!(0.000000001) && *wi <= Decimal::ONE + dec!(0.000000001),
                    "rt={} tc={}: weight {}",
                    rt,
                    tc,
                    wi
                );
            }
            assert!(out.result.expected_volatility >= Decimal::ZERO);
        }
    }
}

#[test]
fn test_full_tolerance_favours_highest_return() {
    let prices = three_asset_prices();
    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB", "CCC"]), &params(dec!(0), dec!(1)))
        .unwrap();
    let w = out.result.weights();
    assert_eq!(argmax(&w), 0, "weights {:?}", w);
    // Dispersion penalty keeps the allocation short of a full corner.
    assert!(w[0] < Decimal::ONE);
}

#[test]
fn test_zero_tolerance_favours_lowest_volatility() {
    let prices = three_asset_prices();
    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB", "CCC"]), &params(dec!(0), dec!(0)))
        .unwrap();
    let w = out.result.weights();
    assert_eq!(argmax(&w), 1, "weights {:?}", w);
}

#[test]
fn test_return_weight_grows_with_tolerance() {
    let prices = three_asset_prices();
    let assets = names(&["AAA", "BBB", "CCC"]);
    let mut last = -Decimal::ONE;
    for rt in [dec!(0), dec!(0.25), dec!(0.5), dec!(0.75), dec!(1)] {
        let w = optimize_from_prices(&prices, &assets, &params(dec!(0), rt))
            .unwrap()
            .result
            .weights();
        assert!(w[0] > last, "rt={} weight {} not above {}", rt, w[0], last);
        last = w[0];
    }
}

#[test]
fn test_repeat_calls_identical() {
    let prices = three_asset_prices();
    let assets = names(&["CCC", "AAA", "BBB"]);
    let a = optimize_from_prices(&prices, &assets, &params(dec!(0.002), dec!(0.4))).unwrap();
    let b = optimize_from_prices(&prices, &assets, &params(dec!(0.002), dec!(0.4))).unwrap();
    assert_eq!(a.result, b.result);
    assert_eq!(a.result.allocations[0].asset, "CCC");
}

#[test]
fn test_single_asset_pipeline() {
    let prices = three_asset_prices();
    let out = optimize_from_prices(&prices, &names(&["BBB"]), &params(dec!(0.001), dec!(0.7))).unwrap();
    assert_eq!(out.result.weights(), vec![Decimal::ONE]);
    assert_eq!(out.result.dispersion_penalty, Decimal::ZERO);
}

#[test]
fn test_short_history_warns() {
    let prices = load(&cyclic_csv(
        &["AAA", "BBB"],
        &[vec![dec!(0.01), dec!(-0.005)], vec![dec!(0.002), dec!(0.001)]],
        30,
    ));
    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB"]), &params(dec!(0), dec!(0.5))).unwrap();
    assert!(out
        .warnings
        .iter()
        .any(|w| w.contains("less than one trading year")));
}

#[test]
fn test_too_few_observations_is_invalid_statistics() {
    let prices = load(&cyclic_csv(&["AAA"], &[vec![dec!(0.01)]], 1));
    let err = optimize_from_prices(&prices, &names(&["AAA"]), &params(dec!(0), dec!(0.5))).unwrap_err();
    assert!(matches!(err, AllocatorError::InvalidStatistics(_)));
}

#[test]
fn test_capital_amounts_follow_weights() {
    let prices = three_asset_prices();
    let mut p = params(dec!(0), dec!(0.5));
    p.capital = Some(dec!(250000));
    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB", "CCC"]), &p).unwrap();
    for a in &out.result.allocations {
        assert_eq!(a.allocated_amount, Some(a.weight * dec!(250000)));
    }
}

#[test]
fn test_late_listing_column_does_not_block_other_assets() {
    let mut text = String::new();
    for (t, line) in cyclic_csv(
        &["AAA", "BBB"],
        &[vec![dec!(0.01), dec!(-0.005)], vec![dec!(0.002), dec!(0.001)]],
        40,
    )
    .lines()
    .enumerate()
    {
        // NEW has no prices for its first ten rows.
        let extra = match t {
            0 => "NEW".to_string(),
            1..=10 => String::new(),
            _ => format!("{}", 20 + t),
        };
        text.push_str(&format!("{},{}\n", line, extra));
    }
    let prices = load(&text);

    let out = optimize_from_prices(&prices, &names(&["AAA", "BBB"]), &params(dec!(0), dec!(0.5))).unwrap();
    let total: Decimal = out.result.weights().iter().sum();
    assert!((total - Decimal::ONE).abs() < dec!(0.000001));

    let err = optimize_from_prices(&prices, &names(&["AAA", "NEW"]), &params(dec!(0), dec!(0.5))).unwrap_err();
    assert!(matches!(err, AllocatorError::InvalidParameter { ref field, .. } if field.starts_with("NEW[")));
}
