// Entry point and high-level CLI flow.
//
// Each menu action is an independent, synchronous recomputation over the
// cached tables:
// - Option [1] loads the yearly and daily CSV files, printing diagnostics.
// - Option [2] runs the interactive normal-vs-crisis comparison view.
// - Option [3] previews the seasonal forecast for the missing year.
// - Option [4] writes the report CSV files and the JSON summary.
mod aggregate;
mod columns;
mod compare;
mod error;
mod filter;
mod forecast;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use columns::ValueField;
use filter::FilterSpec;
use forecast::ForecastCache;
use loader::{DataCache, LoadedTable};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use types::{ComparisonDisplayRow, Mode, SiteChoice};
use util::{format_int, format_number};

const YEARLY_DATA_PATH: &str = "data/logistics-crise-comparaison.csv";
const DAILY_DATA_PATH: &str = "data/donnees_journalieres_reconstituees.csv";
/// The year absent from the base history, available through the forecast.
const FORECAST_YEAR: i32 = 2017;

static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        cache: DataCache::new(),
        forecasts: ForecastCache::new(),
        yearly: None,
        daily: None,
    })
});

struct AppState {
    cache: DataCache,
    forecasts: ForecastCache,
    yearly: Option<Arc<LoadedTable>>,
    daily: Option<Arc<LoadedTable>>,
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_year() -> Option<i32> {
    let s = prompt("Année (All ou ex. 2015): ");
    if s.is_empty() || s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("toutes") {
        None
    } else {
        util::parse_i32_safe(Some(s.as_str()))
    }
}

fn prompt_site() -> SiteChoice {
    match prompt("Site (TOTAL/PLF/CFX): ").to_uppercase().as_str() {
        "PLF" => SiteChoice::Plf,
        "CFX" => SiteChoice::Cfx,
        _ => SiteChoice::Total,
    }
}

fn prompt_mode() -> Mode {
    match prompt("Mode (N = normal, C = crise): ").to_uppercase().as_str() {
        "C" | "CRISE" | "CRISIS" => Mode::Crisis,
        _ => Mode::Normal,
    }
}

/// Handle option [1]: load both datasets through the path-keyed cache.
///
/// Each file is loaded independently so a missing daily file does not take
/// down the yearly view (and vice versa).
fn handle_load() {
    let mut state = APP_STATE.lock().unwrap();

    for (label, path, is_daily) in [
        ("comparaison annuelle", YEARLY_DATA_PATH, false),
        ("données journalières", DAILY_DATA_PATH, true),
    ] {
        match state.cache.get_or_load(Path::new(path)) {
            Ok(loaded) => {
                println!(
                    "{} : {} lignes lues, {} enregistrements chargés, {} erreurs ignorées",
                    label,
                    format_int(loaded.report.total_rows as i64),
                    format_int(loaded.report.loaded_records as i64),
                    format_int(loaded.report.parse_errors as i64)
                );
                if loaded.report.derived_crisis {
                    println!(
                        "  Attention : colonne 'value_crise' absente, valeurs dérivées (facteur {:.2})",
                        1.0 + loader::DEFAULT_CRISIS_FACTOR
                    );
                }
                let mismatches = aggregate::check_units(&loaded.table);
                for m in &mismatches {
                    println!(
                        "  Incohérence d'unité : {} / {} couvre les unités [{}]",
                        m.indicator,
                        m.sub_indicator,
                        m.units.join(", ")
                    );
                }
                if is_daily {
                    state.daily = Some(loaded);
                } else {
                    state.yearly = Some(loaded);
                }
            }
            Err(e) => {
                eprintln!("Impossible de charger {} ({}) : {}", label, path, e);
            }
        }
    }
    println!();
}

/// Handle option [2]: the interactive comparison view. Filters, aggregates
/// at the chosen level, shows the KPI rollup, the top-N table and the top
/// gains/losses.
fn handle_comparison() {
    let yearly = {
        let state = APP_STATE.lock().unwrap();
        state.yearly.clone()
    };
    let Some(loaded) = yearly else {
        println!("Aucune donnée chargée. Utiliser d'abord l'option 1.\n");
        return;
    };

    let spec = FilterSpec {
        year: prompt_year(),
        site: prompt_site(),
        ..FilterSpec::default()
    };
    let mode = prompt_mode();
    let by_sub = prompt("Vue (1 = par catégorie, 2 = par sous-catégorie): ") == "2";
    let top_input = prompt("Top N (défaut 15): ");
    let top = util::parse_i32_safe(Some(top_input.as_str()))
        .map(|n| n.max(1) as usize)
        .unwrap_or(15);

    let filtered = filter::filter(&loaded.table, &spec);
    let dims: &[aggregate::Dimension] = if by_sub {
        &[
            aggregate::Dimension::Indicator,
            aggregate::Dimension::SubIndicator,
            aggregate::Dimension::Unit,
        ]
    } else {
        &[aggregate::Dimension::Indicator]
    };
    let rows = aggregate::aggregate(&filtered, dims, aggregate::AggFn::Sum);

    let totals = compare::rollup(&rows);
    println!("\nTotal (situation normale) : {}", format_number(totals.normal, 0));
    println!("Total (crise simulée)     : {}", format_number(totals.crisis, 0));
    println!("Changement                : {}", format_number(totals.delta, 0));
    match totals.pct_change {
        Some(p) => println!("Évolution                 : {:+.1} %\n", p),
        None => println!("Évolution                 : —\n"),
    }

    let ranked = aggregate::top_n(&rows, top, ValueField::of(mode));
    let display: Vec<ComparisonDisplayRow> = compare::compare(&ranked)
        .into_iter()
        .map(comparison_display_row)
        .collect();
    println!("Top {} postes (normal vs crise) :", top);
    output::preview_rows(&display, top);

    let all_compared = compare::compare(&rows);
    let (gains, losses) = compare::top_movers(&all_compared, 10);
    println!("Plus fortes hausses :");
    let gains_rows: Vec<ComparisonDisplayRow> =
        gains.into_iter().map(comparison_display_row).collect();
    output::preview_rows(&gains_rows, 10);
    println!("Plus fortes baisses :");
    let losses_rows: Vec<ComparisonDisplayRow> =
        losses.into_iter().map(comparison_display_row).collect();
    output::preview_rows(&losses_rows, 10);
}

fn comparison_display_row(c: types::ComparisonRow) -> ComparisonDisplayRow {
    ComparisonDisplayRow {
        poste: c.key.label(),
        normal: format_number(c.value_normal, 0),
        crise: format_number(c.value_crisis, 0),
        changement: format_number(c.delta, 0),
        evolution: match c.pct_change {
            Some(p) => format!("{:+.1} %", p),
            None => "—".to_string(),
        },
        tendance: c.trend.label().to_string(),
    }
}

/// Handle option [3]: seasonal forecast preview for the year missing from
/// the base history. Empty output means "forecast unavailable", never an
/// error.
fn handle_forecast() {
    let (daily, indicator, sub_indicator, site) = {
        let state = APP_STATE.lock().unwrap();
        let Some(loaded) = state.daily.clone() else {
            println!("Aucune donnée journalière chargée. Utiliser d'abord l'option 1.\n");
            return;
        };
        drop(state);
        let indicator = prompt("Indicateur (ex. Restauration): ");
        let sub_indicator = prompt("Sous-indicateur (ex. Nombre de Repas): ");
        let site = prompt_site();
        (loaded, indicator, sub_indicator, site)
    };

    println!("Ajustement du modèle saisonnier (hebdomadaire) ...");
    let points = {
        let state = APP_STATE.lock().unwrap();
        state
            .forecasts
            .get_or_compute(&daily.table, site, &indicator, &sub_indicator, FORECAST_YEAR)
    };

    if points.is_empty() {
        println!(
            "Prévision indisponible pour {} / {} (historique insuffisant, minimum {} jours).\n",
            indicator,
            sub_indicator,
            forecast::MIN_HISTORY_DAYS
        );
        return;
    }

    let annual: f64 = points.iter().map(|(_, v)| v).sum();
    println!(
        "Prévision {} — {} / {} : volume annuel estimé {}",
        FORECAST_YEAR,
        indicator,
        sub_indicator,
        format_number(annual, 0)
    );
    println!(
        "Volume journalier moyen observé : {}",
        format_number(
            reports::mean_daily_volume(&daily.table, &indicator, ValueField::Normal),
            1
        )
    );
    let monthly = reports::forecast_monthly(&points);
    output::preview_rows(&monthly, 12);
}

/// Handle option [4]: write the report tables and JSON summary, previewing
/// each on the console.
fn handle_reports() {
    let (table, has_daily) = {
        let state = APP_STATE.lock().unwrap();
        if let Some(daily) = state.daily.clone() {
            (daily, true)
        } else if let Some(yearly) = state.yearly.clone() {
            (yearly, false)
        } else {
            println!("Aucune donnée chargée. Utiliser d'abord l'option 1.\n");
            return;
        }
    };

    println!("Génération des rapports ({})\n", reports::REFERENCE_YEAR);

    let r1 = reports::indicator_summary(&table.table, reports::REFERENCE_YEAR);
    let file1 = "rapport_synthese_indicateurs.csv";
    if let Err(e) = output::write_csv(file1, &r1) {
        eprintln!("Erreur d'écriture : {}", e);
    }
    println!("Impact d'une crise sanitaire par domaine (exporté vers {}) :", file1);
    output::preview_rows(&r1, 10);

    let r2 = reports::site_breakdown(&table.table, reports::REFERENCE_YEAR);
    let file2 = "rapport_repartition_sites.csv";
    if let Err(e) = output::write_csv(file2, &r2) {
        eprintln!("Erreur d'écriture : {}", e);
    }
    println!("Répartition par site (exporté vers {}) :", file2);
    output::preview_rows(&r2, 10);

    if has_daily {
        let r3 = reports::dow_profile(&table.table, "Restauration", "Nombre de Repas");
        let file3 = "rapport_profil_hebdomadaire.csv";
        if let Err(e) = output::write_csv(file3, &r3) {
            eprintln!("Erreur d'écriture : {}", e);
        }
        println!("Profil hebdomadaire moyen — Restauration (exporté vers {}) :", file3);
        output::preview_rows(&r3, 7);

        let r3b = reports::monthly_profile(&table.table, "Restauration", "Nombre de Repas");
        let file3b = "rapport_profil_mensuel.csv";
        if let Err(e) = output::write_csv(file3b, &r3b) {
            eprintln!("Erreur d'écriture : {}", e);
        }
        println!("Profil mensuel — Restauration (exporté vers {}) :", file3b);
        output::preview_rows(&r3b, 12);
    }

    let r4 = reports::action_plan();
    let file4 = "plan_action_logistique.csv";
    if let Err(e) = output::write_csv(file4, &r4) {
        eprintln!("Erreur d'écriture : {}", e);
    }
    println!("Plan d'action prioritaire (exporté vers {}) :", file4);
    output::preview_rows(&r4, 9);

    let summary = reports::generate_summary(&table.table, reports::REFERENCE_YEAR);
    if let Err(e) = output::write_json("summary.json", &summary) {
        eprintln!("Erreur d'écriture : {}", e);
    }
    println!(
        "Synthèse (summary.json) : normal={}, crise={}, écart={}\n",
        format_number(summary.total_normal, 0),
        format_number(summary.total_crisis, 0),
        format_number(summary.total_delta, 0)
    );
}

fn main() {
    loop {
        println!("Logistique PSL–CFX — Mode Normal / Mode Crise");
        println!("[1] Charger les données");
        println!("[2] Vue comparaison (normal vs crise)");
        println!("[3] Prévision {} (données journalières)", FORECAST_YEAR);
        println!("[4] Générer les rapports");
        println!("[0] Quitter\n");
        match prompt("Choix : ").as_str() {
            "1" => handle_load(),
            "2" => handle_comparison(),
            "3" => handle_forecast(),
            "4" => handle_reports(),
            "0" => {
                println!("Fin du programme.");
                break;
            }
            _ => println!("Choix invalide.\n"),
        }
    }
}
