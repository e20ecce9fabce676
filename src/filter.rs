//! Filter Engine: narrows a table by year, month, site and indicator. Every
//! criterion is optional; absent means "All". Filtering never fails — an
//! empty result is valid output that callers render as "no data".

use crate::types::{Record, SiteChoice, Table};

#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// `Total` keeps both sites so the Aggregator can fold them.
    pub site: SiteChoice,
    pub indicator: Option<String>,
}

pub fn filter(table: &[Record], spec: &FilterSpec) -> Table {
    table
        .iter()
        .filter(|r| spec.year.map_or(true, |y| r.period.year() == y))
        .filter(|r| spec.month.map_or(true, |m| r.period.month() == Some(m)))
        .filter(|r| spec.site.matches(r.site))
        .filter(|r| {
            spec.indicator
                .as_deref()
                .map_or(true, |i| r.indicator == i)
        })
        .cloned()
        .collect()
}
