//! Batch report tables: the crisis-impact synthesis per indicator for the
//! reference year, the per-site breakdown, the day-of-week profile and the
//! fixed priority action plan. All of them are plain folds of the
//! Filter/Aggregator/Comparator outputs into formatted rows.

use crate::aggregate::{aggregate, AggFn, Dimension};
use crate::columns::ValueField;
use crate::compare::{compare, rollup};
use crate::filter::{filter, FilterSpec};
use crate::types::{
    ActionPlanRow, DowProfileRow, ForecastMonthRow, IndicatorSummaryRow, MonthlyProfileRow,
    Record, Site, SiteBreakdownRow, SummaryStats,
};
use crate::util::{format_number, average};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;

/// Reference year of the report: the last complete year of observed data.
pub const REFERENCE_YEAR: i32 = 2015;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Fev", "Mar", "Avr", "Mai", "Jun", "Jul", "Aou", "Sep", "Oct", "Nov", "Dec",
];

fn signed_volume(v: f64) -> String {
    if v >= 0.0 {
        format!("+{}", format_number(v, 0))
    } else {
        format_number(v, 0)
    }
}

/// Crisis-impact synthesis per indicator for the given year.
pub fn indicator_summary(table: &[Record], year: i32) -> Vec<IndicatorSummaryRow> {
    let spec = FilterSpec {
        year: Some(year),
        ..FilterSpec::default()
    };
    let filtered = filter(table, &spec);
    let rows = aggregate(&filtered, &[Dimension::Indicator], AggFn::Sum);
    compare(&rows)
        .into_iter()
        .map(|c| IndicatorSummaryRow {
            domaine: c.key.indicator.unwrap_or_default(),
            volume_normal: format_number(c.value_normal, 0),
            volume_crise: format_number(c.value_crisis, 0),
            ecart: signed_volume(c.delta),
            hausse: match c.pct_change {
                Some(p) => format!("{:+.0} %", p),
                None => "—".to_string(),
            },
        })
        .collect()
}

/// Normal-mode volumes split by site, with the derived total, per
/// indicator (reference-year snapshot).
pub fn site_breakdown(table: &[Record], year: i32) -> Vec<SiteBreakdownRow> {
    let spec = FilterSpec {
        year: Some(year),
        ..FilterSpec::default()
    };
    let filtered = filter(table, &spec);
    let rows = aggregate(&filtered, &[Dimension::Indicator, Dimension::Site], AggFn::Sum);

    let mut order: Vec<(String, f64, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        let indicator = row.key.indicator.clone().unwrap_or_default();
        let idx = *index.entry(indicator.clone()).or_insert_with(|| {
            order.push((indicator, 0.0, 0.0));
            order.len() - 1
        });
        match row.key.site {
            Some(Site::Plf) => order[idx].1 += row.value_normal,
            Some(Site::Cfx) => order[idx].2 += row.value_normal,
            None => {}
        }
    }

    order
        .into_iter()
        .map(|(domaine, plf, cfx)| SiteBreakdownRow {
            domaine,
            plf: format_number(plf, 0),
            cfx: format_number(cfx, 0),
            total: format_number(plf + cfx, 0),
        })
        .collect()
}

/// Average daily activity per weekday over the whole history, ordered
/// Monday first. MEAN, never SUM: the profile describes a typical day.
pub fn dow_profile(table: &[Record], indicator: &str, sub_indicator: &str) -> Vec<DowProfileRow> {
    let filtered: Vec<Record> = table
        .iter()
        .filter(|r| r.indicator == indicator && r.sub_indicator == sub_indicator)
        .cloned()
        .collect();
    let rows = aggregate(&filtered, &[Dimension::Weekday], AggFn::Mean);

    const WEEK: [(Weekday, &str); 7] = [
        (Weekday::Mon, "Lundi"),
        (Weekday::Tue, "Mardi"),
        (Weekday::Wed, "Mercredi"),
        (Weekday::Thu, "Jeudi"),
        (Weekday::Fri, "Vendredi"),
        (Weekday::Sat, "Samedi"),
        (Weekday::Sun, "Dimanche"),
    ];

    WEEK.iter()
        .filter_map(|(wd, name)| {
            rows.iter()
                .find(|r| r.key.weekday == Some(*wd))
                .map(|r| DowProfileRow {
                    jour: name.to_string(),
                    moyenne_normal: format_number(r.value_normal, 1),
                    moyenne_crise: format_number(r.value_crisis, 1),
                })
        })
        .collect()
}

/// Monthly volume series for one (indicator, sub_indicator) pair. SUM per
/// (year, month); groups come out in file order, which the daily and
/// monthly datasets keep chronological.
pub fn monthly_profile(
    table: &[Record],
    indicator: &str,
    sub_indicator: &str,
) -> Vec<MonthlyProfileRow> {
    let filtered: Vec<Record> = table
        .iter()
        .filter(|r| r.indicator == indicator && r.sub_indicator == sub_indicator)
        .cloned()
        .collect();
    let rows = aggregate(&filtered, &[Dimension::Year, Dimension::Month], AggFn::Sum);
    rows.into_iter()
        .filter_map(|r| {
            let year = r.key.year?;
            let month = r.key.month?;
            Some(MonthlyProfileRow {
                mois: format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
                volume_normal: format_number(r.value_normal, 0),
                volume_crise: format_number(r.value_crisis, 0),
            })
        })
        .collect()
}

/// Folds a daily point forecast into chronological monthly totals for
/// display alongside the observed monthly series.
pub fn forecast_monthly(points: &[(NaiveDate, f64)]) -> Vec<ForecastMonthRow> {
    let mut order: Vec<((i32, u32), f64)> = Vec::new();
    let mut index: HashMap<(i32, u32), usize> = HashMap::new();
    for (date, value) in points {
        let key = (date.year(), date.month());
        let idx = *index.entry(key).or_insert_with(|| {
            order.push((key, 0.0));
            order.len() - 1
        });
        order[idx].1 += value;
    }
    order
        .into_iter()
        .map(|((year, month), total)| ForecastMonthRow {
            mois: format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
            volume_prevu: format_number(total, 0),
        })
        .collect()
}

/// Fixed-content priority action plan from the crisis-preparedness report.
pub fn action_plan() -> Vec<ActionPlanRow> {
    let rows = [
        ("HAUTE", "Constituer un stock stratégique d'EPI et de consommables (30 jours)", "Direction des Achats"),
        ("HAUTE", "Négocier des conventions avec prestataires de secours (restauration, linge, déchets)", "Direction Logistique"),
        ("HAUTE", "Définir un protocole de bionettoyage de niveau crise", "Service Hygiène"),
        ("HAUTE", "Augmenter les capacités de stockage DASRI", "Services Techniques"),
        ("MOYENNE", "Mettre en place un système d'alerte de réapprovisionnement automatique", "Pharmacie / Magasin"),
        ("MOYENNE", "Former le personnel logistique aux procédures de crise", "DRH / Formation Continue"),
        ("MOYENNE", "Prévoir des menus simplifiés activables en 48h", "Service Restauration"),
        ("BASSE", "Dématérialiser le courrier administratif", "Direction des Systèmes d'Information"),
        ("BASSE", "Réduire la fréquence d'entretien des zones non-critiques en crise", "Direction Logistique"),
    ];
    rows.iter()
        .map(|(priorite, action, responsable)| ActionPlanRow {
            priorite: priorite.to_string(),
            action: action.to_string(),
            responsable: responsable.to_string(),
        })
        .collect()
}

/// Global stats for the JSON summary: grand totals for the reference year
/// plus the overall percent change (ratio over sums, not an average of
/// per-row percentages).
pub fn generate_summary(table: &[Record], year: i32) -> SummaryStats {
    let spec = FilterSpec {
        year: Some(year),
        ..FilterSpec::default()
    };
    let filtered = filter(table, &spec);
    let rows = aggregate(&filtered, &[Dimension::Indicator], AggFn::Sum);
    let totals = rollup(&rows);
    SummaryStats {
        reference_year: year,
        total_normal: totals.normal,
        total_crisis: totals.crisis,
        total_delta: totals.delta,
        pct_change: totals.pct_change,
        indicator_count: rows.len(),
    }
}

/// Mean daily volume of an indicator in the selected mode, used in console
/// diagnostics next to the forecast.
pub fn mean_daily_volume(table: &[Record], indicator: &str, field: ValueField) -> f64 {
    let values: Vec<f64> = table
        .iter()
        .filter(|r| r.indicator == indicator && r.period.date().is_some())
        .map(|r| field.read(r))
        .collect();
    average(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;

    fn record(year: i32, site: Site, indicator: &str, normal: f64, crisis: f64) -> Record {
        Record {
            period: Period::Year(year),
            site,
            indicator: indicator.to_string(),
            sub_indicator: "Sub".to_string(),
            unit: "kg".to_string(),
            value_normal: normal,
            value_crisis: crisis,
        }
    }

    #[test]
    fn summary_folds_sites_and_formats_rise() {
        let table = vec![
            record(2015, Site::Plf, "Déchets", 100.0, 170.0),
            record(2015, Site::Cfx, "Déchets", 50.0, 85.0),
            record(2016, Site::Plf, "Déchets", 999.0, 999.0),
        ];
        let rows = indicator_summary(&table, 2015);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domaine, "Déchets");
        assert_eq!(rows[0].volume_normal, "150");
        assert_eq!(rows[0].volume_crise, "255");
        assert_eq!(rows[0].ecart, "+105");
        assert_eq!(rows[0].hausse, "+70 %");
    }

    #[test]
    fn breakdown_total_is_sum_of_sites() {
        let table = vec![
            record(2015, Site::Plf, "Lingerie", 1200.0, 2040.0),
            record(2015, Site::Cfx, "Lingerie", 300.0, 510.0),
        ];
        let rows = site_breakdown(&table, 2015);
        assert_eq!(rows[0].plf, "1,200");
        assert_eq!(rows[0].cfx, "300");
        assert_eq!(rows[0].total, "1,500");
    }

    #[test]
    fn breakdown_with_one_site_absent() {
        let table = vec![record(2015, Site::Plf, "Vaguemestre", 40.0, 68.0)];
        let rows = site_breakdown(&table, 2015);
        assert_eq!(rows[0].plf, "40");
        assert_eq!(rows[0].cfx, "0");
        assert_eq!(rows[0].total, "40");
    }

    #[test]
    fn dow_profile_is_monday_first() {
        let mon = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
        let sun = NaiveDate::from_ymd_opt(2015, 1, 4).unwrap();
        let table = vec![
            Record {
                period: Period::Day(sun),
                site: Site::Plf,
                indicator: "Restauration".to_string(),
                sub_indicator: "Nombre de Repas".to_string(),
                unit: "repas".to_string(),
                value_normal: 500.0,
                value_crisis: 850.0,
            },
            Record {
                period: Period::Day(mon),
                site: Site::Plf,
                indicator: "Restauration".to_string(),
                sub_indicator: "Nombre de Repas".to_string(),
                unit: "repas".to_string(),
                value_normal: 900.0,
                value_crisis: 1530.0,
            },
        ];
        let rows = dow_profile(&table, "Restauration", "Nombre de Repas");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].jour, "Lundi");
        assert_eq!(rows[1].jour, "Dimanche");
    }

    #[test]
    fn monthly_profile_folds_days_into_months() {
        let jan1 = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2015, 1, 6).unwrap();
        let feb = NaiveDate::from_ymd_opt(2015, 2, 2).unwrap();
        let day = |d: NaiveDate, v: f64| Record {
            period: Period::Day(d),
            site: Site::Plf,
            indicator: "Restauration".to_string(),
            sub_indicator: "Nombre de Repas".to_string(),
            unit: "repas".to_string(),
            value_normal: v,
            value_crisis: v * 1.7,
        };
        let table = vec![day(jan1, 100.0), day(jan2, 200.0), day(feb, 50.0)];
        let rows = monthly_profile(&table, "Restauration", "Nombre de Repas");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mois, "Jan 2015");
        assert_eq!(rows[0].volume_normal, "300");
        assert_eq!(rows[1].mois, "Fev 2015");
        assert_eq!(rows[1].volume_normal, "50");
    }

    #[test]
    fn forecast_months_are_chronological() {
        let points = vec![
            (NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(), 10.0),
            (NaiveDate::from_ymd_opt(2017, 1, 2).unwrap(), 20.0),
            (NaiveDate::from_ymd_opt(2017, 2, 1).unwrap(), 5.0),
        ];
        let rows = forecast_monthly(&points);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mois, "Jan 2017");
        assert_eq!(rows[0].volume_prevu, "30");
        assert_eq!(rows[1].mois, "Fev 2017");
    }

    #[test]
    fn json_summary_matches_rollup() {
        let table = vec![
            record(2015, Site::Plf, "Déchets", 100.0, 170.0),
            record(2015, Site::Plf, "Lingerie", 10.0, 40.0),
        ];
        let s = generate_summary(&table, 2015);
        assert_eq!(s.total_normal, 110.0);
        assert_eq!(s.total_crisis, 210.0);
        assert_eq!(s.indicator_count, 2);
        assert!((s.pct_change.unwrap() - 100.0 / 110.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn action_plan_is_fixed_content() {
        let rows = action_plan();
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0].priorite, "HAUTE");
        assert_eq!(rows[8].priorite, "BASSE");
    }
}
