//! Column Selector: maps the UI's (site, mode) selection to the value
//! field(s) to read. Pure and total over the closed enums; invalid input is
//! impossible by construction, so there are no error cases here.

use crate::types::{AggregateRow, Mode, Record, SiteChoice};

/// Which of the two stored value fields a view reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueField {
    Normal,
    Crisis,
}

impl ValueField {
    pub fn of(mode: Mode) -> ValueField {
        match mode {
            Mode::Normal => ValueField::Normal,
            Mode::Crisis => ValueField::Crisis,
        }
    }

    pub fn read(&self, r: &Record) -> f64 {
        match self {
            ValueField::Normal => r.value_normal,
            ValueField::Crisis => r.value_crisis,
        }
    }

    pub fn read_agg(&self, row: &AggregateRow) -> f64 {
        match self {
            ValueField::Normal => row.value_normal,
            ValueField::Crisis => row.value_crisis,
        }
    }
}

/// Column pair (normal, crisis) carrying a site's values in the wide-format
/// yearly comparison file.
pub fn wide_value_columns(site: SiteChoice) -> (&'static str, &'static str) {
    match site {
        SiteChoice::Total => ("TOTAL_NORMAL", "TOTAL_CRISE"),
        SiteChoice::Plf => ("PLF_NORMAL", "PLF_CRISE"),
        SiteChoice::Cfx => ("CFX_NORMAL", "CFX_CRISE"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Period, Record, Site};

    #[test]
    fn field_follows_mode() {
        let r = Record {
            period: Period::Year(2015),
            site: Site::Plf,
            indicator: "Restauration".into(),
            sub_indicator: "Nombre de Repas".into(),
            unit: "repas".into(),
            value_normal: 10.0,
            value_crisis: 17.0,
        };
        assert_eq!(ValueField::of(Mode::Normal).read(&r), 10.0);
        assert_eq!(ValueField::of(Mode::Crisis).read(&r), 17.0);
    }

    #[test]
    fn wide_columns_cover_all_sites() {
        assert_eq!(
            wide_value_columns(SiteChoice::Total),
            ("TOTAL_NORMAL", "TOTAL_CRISE")
        );
        assert_eq!(wide_value_columns(SiteChoice::Plf), ("PLF_NORMAL", "PLF_CRISE"));
        assert_eq!(wide_value_columns(SiteChoice::Cfx), ("CFX_NORMAL", "CFX_CRISE"));
    }
}
