use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tabled::Tabled;

/// One of the two physical facilities. The TOTAL view is never stored as a
/// record; it is always computed by folding PLF + CFX at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Plf,
    Cfx,
}

impl Site {
    pub fn code(&self) -> &'static str {
        match self {
            Site::Plf => "PLF",
            Site::Cfx => "CFX",
        }
    }

    pub fn from_code(s: &str) -> Option<Site> {
        match s.trim() {
            "PLF" => Some(Site::Plf),
            "CFX" => Some(Site::Cfx),
            _ => None,
        }
    }
}

/// Query-side site selection: a concrete site or the derived total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SiteChoice {
    #[default]
    Total,
    Plf,
    Cfx,
}

impl SiteChoice {
    /// Whether a stored record's site matches this selection.
    pub fn matches(&self, site: Site) -> bool {
        match self {
            SiteChoice::Total => true,
            SiteChoice::Plf => site == Site::Plf,
            SiteChoice::Cfx => site == Site::Cfx,
        }
    }
}

/// Normal operation vs the simulated health-crisis scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Crisis,
}

/// Time key of a record. Granularity is a property of the dataset (one file
/// is entirely annual, monthly or daily), not of individual rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Year(i32),
    Month(i32, u32),
    Day(NaiveDate),
}

impl Period {
    pub fn year(&self) -> i32 {
        match self {
            Period::Year(y) => *y,
            Period::Month(y, _) => *y,
            Period::Day(d) => d.year(),
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            Period::Year(_) => None,
            Period::Month(_, m) => Some(*m),
            Period::Day(d) => Some(d.month()),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Period::Day(d) => Some(*d),
            _ => None,
        }
    }

    pub fn weekday(&self) -> Option<Weekday> {
        self.date().map(|d| d.weekday())
    }
}

/// One logistics/activity data point, normalized from either CSV shape.
/// Immutable after load; every transformation builds new tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub period: Period,
    pub site: Site,
    pub indicator: String,
    pub sub_indicator: String,
    pub unit: String,
    pub value_normal: f64,
    pub value_crisis: f64,
}

pub type Table = Vec<Record>;

/// Qualitative direction of the crisis-vs-normal delta. Exactly one variant
/// holds for any finite delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn from_delta(delta: f64) -> Trend {
        if delta > 0.0 {
            Trend::Up
        } else if delta < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::Flat => "FLAT",
        }
    }
}

/// Grouping key of an aggregate row. Only the dimensions requested by the
/// caller are populated; the rest stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupKey {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub date: Option<NaiveDate>,
    pub weekday: Option<Weekday>,
    pub site: Option<Site>,
    pub indicator: Option<String>,
    pub sub_indicator: Option<String>,
    pub unit: Option<String>,
}

impl GroupKey {
    /// Human-readable label joining whichever dimensions are present.
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(y) = self.year {
            parts.push(y.to_string());
        }
        if let Some(m) = self.month {
            parts.push(format!("{:02}", m));
        }
        if let Some(d) = self.date {
            parts.push(d.to_string());
        }
        if let Some(w) = self.weekday {
            parts.push(w.to_string());
        }
        if let Some(s) = self.site {
            parts.push(s.code().to_string());
        }
        if let Some(i) = &self.indicator {
            parts.push(i.clone());
        }
        if let Some(s) = &self.sub_indicator {
            parts.push(s.clone());
        }
        parts.join(" / ")
    }
}

/// Output of the Aggregator: a grouping key plus summed (or averaged)
/// normal/crisis values.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub value_normal: f64,
    pub value_crisis: f64,
    pub count: usize,
}

/// Aggregate row augmented with the comparison metrics.
///
/// `pct_change` is `None` when the normal value is zero (the undefined
/// marker); it never carries an infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub key: GroupKey,
    pub value_normal: f64,
    pub value_crisis: f64,
    pub delta: f64,
    pub pct_change: Option<f64>,
    pub trend: Trend,
}

/// Whole-table rollup: sums are taken across the filtered table before the
/// ratio, matching a single-row comparison over the grand totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub normal: f64,
    pub crisis: f64,
    pub delta: f64,
    pub pct_change: Option<f64>,
}

/// A (indicator, sub_indicator) group spanning more than one unit of
/// measure. Summing across it would be meaningless, so the condition is
/// surfaced to the caller instead of silently folded into one number.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMismatch {
    pub indicator: String,
    pub sub_indicator: String,
    pub units: Vec<String>,
}

// ---------------------------------------------------------------------------
// Report rows (CSV export + console previews)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct IndicatorSummaryRow {
    #[serde(rename = "Domaine")]
    #[tabled(rename = "Domaine")]
    pub domaine: String,
    #[serde(rename = "VolumeNormal")]
    #[tabled(rename = "VolumeNormal")]
    pub volume_normal: String,
    #[serde(rename = "VolumeCrise")]
    #[tabled(rename = "VolumeCrise")]
    pub volume_crise: String,
    #[serde(rename = "Ecart")]
    #[tabled(rename = "Ecart")]
    pub ecart: String,
    #[serde(rename = "Hausse")]
    #[tabled(rename = "Hausse")]
    pub hausse: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SiteBreakdownRow {
    #[serde(rename = "Domaine")]
    #[tabled(rename = "Domaine")]
    pub domaine: String,
    #[serde(rename = "PLF")]
    #[tabled(rename = "PLF")]
    pub plf: String,
    #[serde(rename = "CFX")]
    #[tabled(rename = "CFX")]
    pub cfx: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ActionPlanRow {
    #[serde(rename = "Priorite")]
    #[tabled(rename = "Priorite")]
    pub priorite: String,
    #[serde(rename = "Action")]
    #[tabled(rename = "Action")]
    pub action: String,
    #[serde(rename = "Responsable")]
    #[tabled(rename = "Responsable")]
    pub responsable: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ComparisonDisplayRow {
    #[serde(rename = "Poste")]
    #[tabled(rename = "Poste")]
    pub poste: String,
    #[serde(rename = "Normal")]
    #[tabled(rename = "Normal")]
    pub normal: String,
    #[serde(rename = "Crise")]
    #[tabled(rename = "Crise")]
    pub crise: String,
    #[serde(rename = "Changement")]
    #[tabled(rename = "Changement")]
    pub changement: String,
    #[serde(rename = "Evolution")]
    #[tabled(rename = "Evolution")]
    pub evolution: String,
    #[serde(rename = "Tendance")]
    #[tabled(rename = "Tendance")]
    pub tendance: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DowProfileRow {
    #[serde(rename = "Jour")]
    #[tabled(rename = "Jour")]
    pub jour: String,
    #[serde(rename = "MoyenneNormal")]
    #[tabled(rename = "MoyenneNormal")]
    pub moyenne_normal: String,
    #[serde(rename = "MoyenneCrise")]
    #[tabled(rename = "MoyenneCrise")]
    pub moyenne_crise: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyProfileRow {
    #[serde(rename = "Mois")]
    #[tabled(rename = "Mois")]
    pub mois: String,
    #[serde(rename = "VolumeNormal")]
    #[tabled(rename = "VolumeNormal")]
    pub volume_normal: String,
    #[serde(rename = "VolumeCrise")]
    #[tabled(rename = "VolumeCrise")]
    pub volume_crise: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ForecastMonthRow {
    #[serde(rename = "Mois")]
    #[tabled(rename = "Mois")]
    pub mois: String,
    #[serde(rename = "VolumePrevu")]
    #[tabled(rename = "VolumePrevu")]
    pub volume_prevu: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub reference_year: i32,
    pub total_normal: f64,
    pub total_crisis: f64,
    pub total_delta: f64,
    pub pct_change: Option<f64>,
    pub indicator_count: usize,
}
