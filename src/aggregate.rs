//! Aggregator: groups a table by an ordered set of dimensions and sums or
//! averages the normal/crisis values. Group output order is the first
//! appearance of each group key, so downstream top-N tie-breaking stays
//! deterministic on input order.

use crate::columns::ValueField;
use crate::types::{AggregateRow, GroupKey, Record, UnitMismatch};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Year,
    Month,
    Date,
    Weekday,
    Site,
    Indicator,
    SubIndicator,
    Unit,
}

/// SUM for volumetric quantities; MEAN only for day-of-week seasonal
/// profiles, where summing would conflate "typical Monday" with "all
/// Mondays combined".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Sum,
    Mean,
}

/// Builds the group key for one record, or `None` when the record lacks a
/// requested time dimension (e.g. a Month grouping over annual data).
fn group_key(r: &Record, dims: &[Dimension]) -> Option<GroupKey> {
    let mut key = GroupKey::default();
    for dim in dims {
        match dim {
            Dimension::Year => key.year = Some(r.period.year()),
            Dimension::Month => key.month = Some(r.period.month()?),
            Dimension::Date => key.date = Some(r.period.date()?),
            Dimension::Weekday => key.weekday = Some(r.period.weekday()?),
            Dimension::Site => key.site = Some(r.site),
            Dimension::Indicator => key.indicator = Some(r.indicator.clone()),
            Dimension::SubIndicator => key.sub_indicator = Some(r.sub_indicator.clone()),
            Dimension::Unit => key.unit = Some(r.unit.clone()),
        }
    }
    Some(key)
}

pub fn aggregate(table: &[Record], dims: &[Dimension], agg: AggFn) -> Vec<AggregateRow> {
    struct Acc {
        key: GroupKey,
        sum_normal: f64,
        sum_crisis: f64,
        count: usize,
    }

    let mut order: Vec<Acc> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for r in table {
        let Some(key) = group_key(r, dims) else {
            continue;
        };
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            order.push(Acc {
                key,
                sum_normal: 0.0,
                sum_crisis: 0.0,
                count: 0,
            });
            order.len() - 1
        });
        let acc = &mut order[idx];
        acc.sum_normal += r.value_normal;
        acc.sum_crisis += r.value_crisis;
        acc.count += 1;
    }

    order
        .into_iter()
        .map(|acc| {
            let divisor = match agg {
                AggFn::Sum => 1.0,
                AggFn::Mean => acc.count.max(1) as f64,
            };
            AggregateRow {
                key: acc.key,
                value_normal: acc.sum_normal / divisor,
                value_crisis: acc.sum_crisis / divisor,
                count: acc.count,
            }
        })
        .collect()
}

/// Top-N view: sort by the selected value descending and truncate. The sort
/// is stable, so ties keep their first-appearance order.
pub fn top_n(rows: &[AggregateRow], n: usize, field: ValueField) -> Vec<AggregateRow> {
    let mut sorted: Vec<AggregateRow> = rows.to_vec();
    sorted.sort_by(|a, b| {
        field
            .read_agg(b)
            .partial_cmp(&field.read_agg(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

/// Data-integrity check: lists every (indicator, sub_indicator) pair whose
/// records span more than one unit of measure. Aggregating across such a
/// pair would produce a unit-less number, so callers should report the
/// mismatch alongside any results.
pub fn check_units(table: &[Record]) -> Vec<UnitMismatch> {
    let mut units: Vec<((String, String), Vec<String>)> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for r in table {
        let pair = (r.indicator.clone(), r.sub_indicator.clone());
        let idx = *index.entry(pair.clone()).or_insert_with(|| {
            units.push((pair, Vec::new()));
            units.len() - 1
        });
        let seen = &mut units[idx].1;
        if !seen.contains(&r.unit) {
            seen.push(r.unit.clone());
        }
    }

    units
        .into_iter()
        .filter(|(_, seen)| seen.len() > 1)
        .map(|((indicator, sub_indicator), units)| UnitMismatch {
            indicator,
            sub_indicator,
            units,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Period, Site};
    use chrono::NaiveDate;

    fn record(period: Period, site: Site, indicator: &str, sub: &str, unit: &str, v: f64) -> Record {
        Record {
            period,
            site,
            indicator: indicator.to_string(),
            sub_indicator: sub.to_string(),
            unit: unit.to_string(),
            value_normal: v,
            value_crisis: v * 1.7,
        }
    }

    #[test]
    fn sum_by_indicator_keeps_first_appearance_order() {
        let table = vec![
            record(Period::Year(2015), Site::Plf, "Lingerie", "Linge", "kg", 10.0),
            record(Period::Year(2015), Site::Plf, "Déchets", "Cartons", "tonnes", 5.0),
            record(Period::Year(2015), Site::Cfx, "Lingerie", "Linge", "kg", 20.0),
        ];
        let rows = aggregate(&table, &[Dimension::Indicator], AggFn::Sum);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key.indicator.as_deref(), Some("Lingerie"));
        assert_eq!(rows[0].value_normal, 30.0);
        assert_eq!(rows[1].key.indicator.as_deref(), Some("Déchets"));
    }

    #[test]
    fn total_site_is_fold_of_plf_and_cfx() {
        let table = vec![
            record(Period::Year(2015), Site::Plf, "Déchets", "Cartons", "tonnes", 100.0),
            record(Period::Year(2015), Site::Cfx, "Déchets", "Cartons", "tonnes", 50.0),
        ];
        // Aggregating without a Site dimension folds PLF + CFX.
        let total = aggregate(&table, &[Dimension::Year, Dimension::Indicator], AggFn::Sum);
        assert_eq!(total[0].value_normal, 150.0);
        assert!((total[0].value_crisis - 255.0).abs() < 1e-9);

        // Per-site aggregates must sum back to the total.
        let per_site = aggregate(&table, &[Dimension::Site], AggFn::Sum);
        let sum: f64 = per_site.iter().map(|r| r.value_normal).sum();
        assert_eq!(sum, total[0].value_normal);
    }

    #[test]
    fn sum_is_additive_across_finer_grouping() {
        let table = vec![
            record(Period::Month(2015, 1), Site::Plf, "Déchets", "Cartons", "t", 10.0),
            record(Period::Month(2015, 2), Site::Plf, "Déchets", "Cartons", "t", 20.0),
            record(Period::Month(2015, 3), Site::Plf, "Déchets", "Cartons", "t", 30.0),
        ];
        let monthly = aggregate(&table, &[Dimension::Year, Dimension::Month], AggFn::Sum);
        let refolded: f64 = monthly.iter().map(|r| r.value_normal).sum();
        let yearly = aggregate(&table, &[Dimension::Year], AggFn::Sum);
        assert_eq!(refolded, yearly[0].value_normal);

        // Documented exception: MEAN is not additive the same way.
        let monthly_mean = aggregate(&table, &[Dimension::Year, Dimension::Month], AggFn::Mean);
        let mean_refold: f64 = monthly_mean.iter().map(|r| r.value_normal).sum();
        let yearly_mean = aggregate(&table, &[Dimension::Year], AggFn::Mean);
        assert_ne!(mean_refold, yearly_mean[0].value_normal);
    }

    #[test]
    fn weekday_mean_profile() {
        // Two Mondays and one Tuesday: the Monday average must not be the
        // combined Monday load.
        let mon1 = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
        let mon2 = NaiveDate::from_ymd_opt(2015, 1, 12).unwrap();
        let tue = NaiveDate::from_ymd_opt(2015, 1, 6).unwrap();
        let table = vec![
            record(Period::Day(mon1), Site::Plf, "Restauration", "Repas", "repas", 100.0),
            record(Period::Day(mon2), Site::Plf, "Restauration", "Repas", "repas", 300.0),
            record(Period::Day(tue), Site::Plf, "Restauration", "Repas", "repas", 50.0),
        ];
        let rows = aggregate(&table, &[Dimension::Weekday], AggFn::Mean);
        let monday = rows
            .iter()
            .find(|r| r.key.weekday == Some(chrono::Weekday::Mon))
            .unwrap();
        assert_eq!(monday.value_normal, 200.0);
        assert_eq!(monday.count, 2);
    }

    #[test]
    fn filter_then_aggregate_matches_aggregate_then_select() {
        use crate::filter::{filter, FilterSpec};
        let table = vec![
            record(Period::Year(2014), Site::Plf, "Déchets", "Cartons", "t", 7.0),
            record(Period::Year(2015), Site::Plf, "Déchets", "Cartons", "t", 10.0),
            record(Period::Year(2015), Site::Cfx, "Déchets", "Cartons", "t", 5.0),
        ];
        let spec = FilterSpec {
            year: Some(2015),
            ..FilterSpec::default()
        };
        let narrowed = aggregate(&filter(&table, &spec), &[Dimension::Year], AggFn::Sum);
        assert_eq!(narrowed.len(), 1);

        let all_years = aggregate(&table, &[Dimension::Year], AggFn::Sum);
        let selected = all_years
            .iter()
            .find(|r| r.key.year == Some(2015))
            .unwrap();
        assert_eq!(narrowed[0].value_normal, selected.value_normal);
        assert_eq!(narrowed[0].value_crisis, selected.value_crisis);
    }

    #[test]
    fn total_with_one_site_absent_equals_the_present_site() {
        let table = vec![record(Period::Year(2015), Site::Cfx, "Déchets", "Cartons", "t", 42.0)];
        let total = aggregate(&table, &[Dimension::Year], AggFn::Sum);
        let per_site = aggregate(&table, &[Dimension::Site], AggFn::Sum);
        assert_eq!(total[0].value_normal, per_site[0].value_normal);
        assert_eq!(total[0].value_normal, 42.0);
    }

    #[test]
    fn month_grouping_skips_annual_records() {
        let table = vec![
            record(Period::Year(2015), Site::Plf, "Déchets", "Cartons", "t", 10.0),
            record(Period::Month(2015, 4), Site::Plf, "Déchets", "Cartons", "t", 20.0),
        ];
        let rows = aggregate(&table, &[Dimension::Month], AggFn::Sum);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.month, Some(4));
    }

    #[test]
    fn top_n_breaks_ties_on_input_order() {
        let values = [50.0, 40.0, 40.0, 30.0, 20.0, 10.0, 5.0, 5.0, 5.0, 1.0];
        let table: Vec<Record> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                record(
                    Period::Year(2015),
                    Site::Plf,
                    "Déchets",
                    &format!("S{i}"),
                    "t",
                    *v,
                )
            })
            .collect();
        let rows = aggregate(&table, &[Dimension::SubIndicator], AggFn::Sum);
        let top = top_n(&rows, 3, ValueField::Normal);
        let names: Vec<&str> = top
            .iter()
            .map(|r| r.key.sub_indicator.as_deref().unwrap())
            .collect();
        // The two rows tied at 40 keep their original relative order.
        assert_eq!(names, vec!["S0", "S1", "S2"]);
    }

    #[test]
    fn unit_mismatch_is_surfaced() {
        let table = vec![
            record(Period::Year(2015), Site::Plf, "Déchets", "Cartons", "tonnes", 1.0),
            record(Period::Year(2015), Site::Cfx, "Déchets", "Cartons", "kg", 2.0),
            record(Period::Year(2015), Site::Plf, "Lingerie", "Linge", "kg", 3.0),
        ];
        let mismatches = check_units(&table);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].indicator, "Déchets");
        assert_eq!(mismatches[0].units, vec!["tonnes", "kg"]);
    }
}
