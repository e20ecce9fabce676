//! Forecast Estimator: projects one future year of daily volumes for a
//! (site, indicator, sub_indicator) triple from its pre-cutover history.
//!
//! The model is a seasonal ARIMA with a non-seasonal (1,1,1) component and
//! a weekly (1,1,1) seasonal component (period 7), fitted by conditional
//! least squares. Output is a point forecast only. The whole feature is
//! best-effort: thin history or any numeric failure degrades to an empty
//! result that callers treat as "forecast unavailable".

use crate::types::{Record, SiteChoice};
use chrono::{Datelike, Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Minimum daily observations required before fitting anything.
pub const MIN_HISTORY_DAYS: usize = 100;
/// Point-forecast horizon.
pub const HORIZON_DAYS: usize = 365;
const SEASON: usize = 7;

/// Fitted coefficients: non-seasonal AR/MA and weekly seasonal AR/MA.
#[derive(Debug, Clone, Copy)]
struct SarimaParams {
    phi: f64,
    theta: f64,
    seasonal_phi: f64,
    seasonal_theta: f64,
}

pub fn forecast_year(
    table: &[Record],
    site: SiteChoice,
    indicator: &str,
    sub_indicator: &str,
    target_year: i32,
) -> Vec<(NaiveDate, f64)> {
    try_forecast(table, site, indicator, sub_indicator, target_year).unwrap_or_default()
}

fn try_forecast(
    table: &[Record],
    site: SiteChoice,
    indicator: &str,
    sub_indicator: &str,
    target_year: i32,
) -> Option<Vec<(NaiveDate, f64)>> {
    let series = daily_series(table, site, indicator, sub_indicator, target_year);
    if series.len() < MIN_HISTORY_DAYS {
        return None;
    }

    let (dates, values) = resample_daily(&series);
    if values.len() < MIN_HISTORY_DAYS || values.len() <= SEASON + 2 {
        return None;
    }

    // First difference then weekly seasonal difference.
    let w = difference(&values);
    if w.is_empty() {
        return None;
    }

    let params = fit(&w)?;
    let projected = project(&values, &w, params, HORIZON_DAYS)?;

    let last = *dates.last()?;
    let mut out = Vec::with_capacity(projected.len());
    for (i, v) in projected.into_iter().enumerate() {
        if !v.is_finite() {
            return None;
        }
        let date = last.checked_add_days(Days::new(i as u64 + 1))?;
        out.push((date, v));
    }
    Some(out)
}

/// Restricts the table to the triple and to dates strictly before the
/// target year; for TOTAL the two sites are summed per date first.
fn daily_series(
    table: &[Record],
    site: SiteChoice,
    indicator: &str,
    sub_indicator: &str,
    target_year: i32,
) -> BTreeMap<NaiveDate, f64> {
    let mut series: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in table {
        let Some(date) = r.period.date() else {
            continue;
        };
        if date.year() >= target_year
            || !site.matches(r.site)
            || r.indicator != indicator
            || r.sub_indicator != sub_indicator
        {
            continue;
        }
        *series.entry(date).or_insert(0.0) += r.value_normal;
    }
    series
}

/// Fills every calendar day between the first and last observation:
/// forward-fill, then back-fill. Missing days are assumed equal to the most
/// recent known day, never interpolated or zero-filled.
fn resample_daily(series: &BTreeMap<NaiveDate, f64>) -> (Vec<NaiveDate>, Vec<f64>) {
    let (Some((&first, _)), Some((&last, _))) =
        (series.iter().next(), series.iter().next_back())
    else {
        return (Vec::new(), Vec::new());
    };

    let mut dates = Vec::new();
    let mut values = Vec::new();
    let mut carried: Option<f64> = None;
    let mut day = first;
    while day <= last {
        if let Some(v) = series.get(&day) {
            carried = Some(*v);
        }
        dates.push(day);
        values.push(carried.unwrap_or(f64::NAN));
        day = match day.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    // Back-fill any leading gap (only possible if the first value was NaN,
    // which cannot happen here, but mirrors the definitional choice).
    if let Some(first_known) = values.iter().copied().find(|v| v.is_finite()) {
        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = first_known;
            } else {
                break;
            }
        }
    }
    (dates, values)
}

/// (1 - B)(1 - B^7) y: first difference followed by the weekly seasonal
/// difference.
fn difference(values: &[f64]) -> Vec<f64> {
    if values.len() <= SEASON + 1 {
        return Vec::new();
    }
    let d1: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    d1.iter()
        .skip(SEASON)
        .zip(d1.iter())
        .map(|(a, b)| a - b)
        .collect()
}

/// Residuals of the differenced series under the given coefficients,
/// with pre-sample terms taken as zero (conditional least squares).
fn residuals(w: &[f64], p: SarimaParams) -> Option<Vec<f64>> {
    let mut eps = vec![0.0f64; w.len()];
    for t in 0..w.len() {
        let lag = |v: &[f64], k: usize| if t >= k { v[t - k] } else { 0.0 };
        let e = w[t]
            - p.phi * lag(w, 1)
            - p.seasonal_phi * lag(w, SEASON)
            + p.phi * p.seasonal_phi * lag(w, SEASON + 1)
            - p.theta * lag(&eps, 1)
            - p.seasonal_theta * lag(&eps, SEASON)
            - p.theta * p.seasonal_theta * lag(&eps, SEASON + 1);
        if !e.is_finite() {
            return None;
        }
        eps[t] = e;
    }
    Some(eps)
}

fn sse(w: &[f64], p: SarimaParams) -> f64 {
    match residuals(w, p) {
        Some(eps) => eps.iter().map(|e| e * e).sum(),
        None => f64::INFINITY,
    }
}

/// Coarse grid search over the four coefficients followed by coordinate
/// descent with a shrinking step. Deterministic and bounded; good enough
/// for a best-effort projection.
fn fit(w: &[f64]) -> Option<SarimaParams> {
    const GRID: [f64; 5] = [-0.6, -0.3, 0.0, 0.3, 0.6];
    const BOUND: f64 = 0.95;

    let mut best = SarimaParams {
        phi: 0.0,
        theta: 0.0,
        seasonal_phi: 0.0,
        seasonal_theta: 0.0,
    };
    let mut best_sse = f64::INFINITY;

    for &phi in &GRID {
        for &theta in &GRID {
            for &seasonal_phi in &GRID {
                for &seasonal_theta in &GRID {
                    let p = SarimaParams {
                        phi,
                        theta,
                        seasonal_phi,
                        seasonal_theta,
                    };
                    let cost = sse(w, p);
                    if cost < best_sse {
                        best_sse = cost;
                        best = p;
                    }
                }
            }
        }
    }
    if !best_sse.is_finite() {
        return None;
    }

    for step in [0.15, 0.05, 0.02] {
        loop {
            let mut improved = false;
            for idx in 0..4 {
                for dir in [-1.0, 1.0] {
                    let mut candidate = best;
                    let field = match idx {
                        0 => &mut candidate.phi,
                        1 => &mut candidate.theta,
                        2 => &mut candidate.seasonal_phi,
                        _ => &mut candidate.seasonal_theta,
                    };
                    *field = (*field + dir * step).clamp(-BOUND, BOUND);
                    let cost = sse(w, candidate);
                    if cost < best_sse {
                        best_sse = cost;
                        best = candidate;
                        improved = true;
                    }
                }
            }
            if !improved {
                break;
            }
        }
    }
    Some(best)
}

/// Iterates the fitted recursion forward with future shocks at zero, then
/// integrates the differences back into the level series.
fn project(values: &[f64], w: &[f64], p: SarimaParams, horizon: usize) -> Option<Vec<f64>> {
    let eps = residuals(w, p)?;
    let n = w.len();

    let mut w_ext = w.to_vec();
    let mut eps_ext = eps;
    eps_ext.resize(n + horizon, 0.0);

    for t in n..n + horizon {
        let w_lag = |v: &Vec<f64>, k: usize| if t >= k { v[t - k] } else { 0.0 };
        let next = p.phi * w_lag(&w_ext, 1)
            + p.seasonal_phi * w_lag(&w_ext, SEASON)
            - p.phi * p.seasonal_phi * w_lag(&w_ext, SEASON + 1)
            + p.theta * w_lag(&eps_ext, 1)
            + p.seasonal_theta * w_lag(&eps_ext, SEASON)
            + p.theta * p.seasonal_theta * w_lag(&eps_ext, SEASON + 1);
        if !next.is_finite() {
            return None;
        }
        w_ext.push(next);
    }

    // Invert (1 - B)(1 - B^7): y_t = w_t + y_{t-1} + y_{t-7} - y_{t-8}.
    let offset = values.len() - n; // = SEASON + 1
    let mut y = values.to_vec();
    for t in n..n + horizon {
        let i = t + offset;
        let next = w_ext[t] + y[i - 1] + y[i - SEASON] - y[i - SEASON - 1];
        if !next.is_finite() {
            return None;
        }
        y.push(next);
    }
    Some(y[values.len()..].to_vec())
}

/// Memoizes forecasts by their full input key so UI redraws never refit the
/// model. Same no-eviction discipline as the data cache.
#[derive(Default)]
pub struct ForecastCache {
    entries: Mutex<HashMap<(SiteChoice, String, String, i32), Arc<Vec<(NaiveDate, f64)>>>>,
}

impl ForecastCache {
    pub fn new() -> ForecastCache {
        ForecastCache::default()
    }

    pub fn get_or_compute(
        &self,
        table: &[Record],
        site: SiteChoice,
        indicator: &str,
        sub_indicator: &str,
        target_year: i32,
    ) -> Arc<Vec<(NaiveDate, f64)>> {
        let key = (
            site,
            indicator.to_string(),
            sub_indicator.to_string(),
            target_year,
        );
        let mut entries = self.entries.lock().unwrap();
        if let Some(hit) = entries.get(&key) {
            return Arc::clone(hit);
        }
        let computed = Arc::new(forecast_year(table, site, indicator, sub_indicator, target_year));
        entries.insert(key, Arc::clone(&computed));
        computed
    }
}
