//! Comparator: joins normal/crisis values per aggregate row into delta,
//! percent change and trend, plus the top-movers and whole-table rollup
//! views consumed by the display layer.

use crate::types::{AggregateRow, ComparisonRow, Totals, Trend};

pub fn compare(rows: &[AggregateRow]) -> Vec<ComparisonRow> {
    rows.iter()
        .map(|row| {
            let delta = row.value_crisis - row.value_normal;
            ComparisonRow {
                key: row.key.clone(),
                value_normal: row.value_normal,
                value_crisis: row.value_crisis,
                delta,
                pct_change: pct_change(delta, row.value_normal),
                trend: Trend::from_delta(delta),
            }
        })
        .collect()
}

/// `None` when the baseline is zero: division by zero is the defined
/// "undefined" marker, never an infinity or an error.
fn pct_change(delta: f64, normal: f64) -> Option<f64> {
    if normal == 0.0 {
        None
    } else {
        Some(delta / normal * 100.0)
    }
}

/// Top gains and top losses over one sort by delta descending: gains are
/// the first `k` rows, losses the last `k` re-sorted ascending so the most
/// negative comes first. `k` is a display parameter, not a constant.
pub fn top_movers(rows: &[ComparisonRow], k: usize) -> (Vec<ComparisonRow>, Vec<ComparisonRow>) {
    let mut sorted: Vec<ComparisonRow> = rows.to_vec();
    sorted.sort_by(|a, b| b.delta.partial_cmp(&a.delta).unwrap_or(std::cmp::Ordering::Equal));

    let gains: Vec<ComparisonRow> = sorted.iter().take(k).cloned().collect();
    let mut losses: Vec<ComparisonRow> = sorted
        .iter()
        .rev()
        .take(k)
        .cloned()
        .collect();
    losses.sort_by(|a, b| a.delta.partial_cmp(&b.delta).unwrap_or(std::cmp::Ordering::Equal));
    (gains, losses)
}

/// Global rollup: sum across the table, then take the ratio once. This is
/// the single-row special case of a comparison; averaging per-row percent
/// changes would be a different (and wrong) statistic.
pub fn rollup(rows: &[AggregateRow]) -> Totals {
    let normal: f64 = rows.iter().map(|r| r.value_normal).sum();
    let crisis: f64 = rows.iter().map(|r| r.value_crisis).sum();
    let delta = crisis - normal;
    Totals {
        normal,
        crisis,
        delta,
        pct_change: pct_change(delta, normal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupKey;

    fn agg(label: &str, normal: f64, crisis: f64) -> AggregateRow {
        AggregateRow {
            key: GroupKey {
                indicator: Some(label.to_string()),
                ..GroupKey::default()
            },
            value_normal: normal,
            value_crisis: crisis,
            count: 1,
        }
    }

    #[test]
    fn seventy_percent_scenario() {
        // PLF 100/170 + CFX 50/85 folded into one TOTAL aggregate.
        let rows = compare(&[agg("Déchets", 150.0, 255.0)]);
        let row = &rows[0];
        assert_eq!(row.delta, 105.0);
        assert!((row.pct_change.unwrap() - 70.0).abs() < 1e-9);
        assert_eq!(row.trend, Trend::Up);
    }

    #[test]
    fn zero_normal_yields_undefined_pct_not_infinity() {
        let rows = compare(&[agg("Magasin", 0.0, 20.0)]);
        let row = &rows[0];
        assert_eq!(row.delta, 20.0);
        assert_eq!(row.pct_change, None);
        assert_eq!(row.trend, Trend::Up);
    }

    #[test]
    fn trend_is_exhaustive_and_matches_delta_sign() {
        let rows = compare(&[
            agg("a", 10.0, 17.0),
            agg("b", 10.0, 4.0),
            agg("c", 10.0, 10.0),
            agg("d", -5.0, -2.0),
        ]);
        for row in &rows {
            let expected = if row.delta > 0.0 {
                Trend::Up
            } else if row.delta < 0.0 {
                Trend::Down
            } else {
                Trend::Flat
            };
            assert_eq!(row.trend, expected);
        }
    }

    #[test]
    fn negative_values_pass_through_without_crash() {
        let rows = compare(&[agg("x", -10.0, -17.0)]);
        assert_eq!(rows[0].delta, -7.0);
        assert_eq!(rows[0].trend, Trend::Down);
        assert!((rows[0].pct_change.unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn top_movers_split_one_sort() {
        let rows = compare(&[
            agg("a", 10.0, 40.0),  // +30
            agg("b", 10.0, 20.0),  // +10
            agg("c", 10.0, 8.0),   // -2
            agg("d", 10.0, 1.0),   // -9
        ]);
        let (gains, losses) = top_movers(&rows, 2);
        assert_eq!(gains[0].key.indicator.as_deref(), Some("a"));
        assert_eq!(gains[1].key.indicator.as_deref(), Some("b"));
        // Most negative first.
        assert_eq!(losses[0].key.indicator.as_deref(), Some("d"));
        assert_eq!(losses[1].key.indicator.as_deref(), Some("c"));
    }

    #[test]
    fn rollup_sums_before_ratio() {
        // Heterogeneous rows whose per-row percentages (70% and 300%) must
        // not be averaged: the rollup takes the ratio over the sums.
        let rows = vec![agg("a", 100.0, 170.0), agg("b", 10.0, 40.0)];
        let totals = rollup(&rows);
        assert_eq!(totals.normal, 110.0);
        assert_eq!(totals.crisis, 210.0);
        assert_eq!(totals.delta, 100.0);
        let pct = totals.pct_change.unwrap();
        assert!((pct - (100.0 / 110.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn rollup_of_empty_table_is_defined() {
        let totals = rollup(&[]);
        assert_eq!(totals.normal, 0.0);
        assert_eq!(totals.pct_change, None);
    }
}
