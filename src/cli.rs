use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::info;

use crate::config::AppConfig;
use crate::ensemble::{load_models, EnsembleAggregator};
use crate::error::{EdgeError, Result};
use crate::matching::EventMatcher;
use crate::persistence::JsonRecordWriter;
use crate::pipeline::{load_features, EvPipeline, MarketSelection, ValuePipeline};
use crate::pricing::{devig_odds, EvBet, EvEngine};
use crate::sources::{CachedSource, OddsSource, SnapshotFileSource, SourceSnapshot};
use crate::telemetry::TracingTelemetry;
use crate::value::{ValueBet, ValueBetSelector};

#[derive(Parser)]
#[command(name = "sports-edge")]
#[command(version = "0.1.0")]
#[command(about = "Sportsbook devigging, EV scanning and ensemble value bets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory
    #[arg(short, long, default_value = "config", global = true)]
    pub config: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging to console and file
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove the margin from a set of moneyline prices
    Devig {
        /// Home decimal price
        #[arg(long)]
        home: f64,
        /// Away decimal price
        #[arg(long)]
        away: f64,
        /// Draw decimal price (three-way markets)
        #[arg(long)]
        draw: Option<f64>,
    },
    /// Score book prices against the devigged sharp book
    Ev {
        /// Snapshot file of the sharp source
        #[arg(long)]
        sharp: PathBuf,
        /// Snapshot file of the books to score
        #[arg(long)]
        books: PathBuf,
        #[arg(long, default_value = "basketball")]
        sport: String,
        #[arg(long)]
        league: Option<String>,
        /// Minimum EV percent to report (overrides config)
        #[arg(long)]
        min_ev: Option<f64>,
        /// Sharp book name (overrides config)
        #[arg(long)]
        sharp_book: Option<String>,
        /// Write results to the output directory
        #[arg(long)]
        save: bool,
    },
    /// Run the model ensemble and select value bets
    Value {
        /// Snapshot file of the statistics source (events and statuses)
        #[arg(long)]
        stats: PathBuf,
        /// Feature file keyed by stats event id
        #[arg(long)]
        features: PathBuf,
        /// Directory of model artifacts
        #[arg(long)]
        models: PathBuf,
        /// Snapshot file of the books
        #[arg(long)]
        books: PathBuf,
        #[arg(long, default_value = "basketball")]
        sport: String,
        #[arg(long)]
        league: Option<String>,
        /// Confidence threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,
        /// Write results to the output directory
        #[arg(long)]
        save: bool,
    },
}

/// Output mode for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Table if items.is_empty() => println!("(no results)"),
        OutputMode::Table => println!("{}", Table::new(items)),
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct FairOddsRow {
    pub side: String,
    pub offered: String,
    pub implied: String,
    pub fair_prob: String,
    pub fair_odds: String,
}

#[derive(Debug, Serialize, Tabled)]
pub struct EvBetRow {
    pub event: String,
    pub book: String,
    pub side: String,
    pub offered: String,
    pub fair: String,
    pub ev_pct: String,
    pub best: String,
}

impl From<&EvBet> for EvBetRow {
    fn from(b: &EvBet) -> Self {
        Self {
            event: b.event_ref.to_string(),
            book: b.book.clone(),
            side: b.side.to_string(),
            offered: format!("{:.3}", b.offered_price),
            fair: format!("{:.3}", b.fair_price),
            ev_pct: format!("{:+.2}", b.ev_percent),
            best: if b.side == b.best_side { "*".to_string() } else { String::new() },
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct ValueBetRow {
    pub event: String,
    pub side: String,
    pub model_prob: String,
    pub implied_prob: String,
    pub edge: String,
    pub kelly: String,
}

impl From<&ValueBet> for ValueBetRow {
    fn from(v: &ValueBet) -> Self {
        Self {
            event: v.event_ref.to_string(),
            side: v.side.to_string(),
            model_prob: format!("{:.3}", v.model_probability),
            implied_prob: format!("{:.3}", v.market_implied_probability),
            edge: format!("{:+.3}", v.edge),
            kelly: format!("{:.3}", v.kelly_fraction()),
        }
    }
}

pub fn run_devig(home: f64, away: f64, draw: Option<f64>, mode: OutputMode) -> Result<()> {
    let fair = devig_odds(home, away, draw)?;
    let mut rows = vec![
        FairOddsRow {
            side: "home".to_string(),
            offered: format!("{home:.3}"),
            implied: format!("{:.4}", 1.0 / home),
            fair_prob: format!("{:.4}", fair.fair_home_prob),
            fair_odds: format!("{:.3}", fair.fair_home_odds),
        },
        FairOddsRow {
            side: "away".to_string(),
            offered: format!("{away:.3}"),
            implied: format!("{:.4}", 1.0 / away),
            fair_prob: format!("{:.4}", fair.fair_away_prob),
            fair_odds: format!("{:.3}", fair.fair_away_odds),
        },
    ];
    if let (Some(d), Some(p), Some(o)) = (draw, fair.fair_draw_prob, fair.fair_draw_odds) {
        rows.push(FairOddsRow {
            side: "draw".to_string(),
            offered: format!("{d:.3}"),
            implied: format!("{:.4}", 1.0 / d),
            fair_prob: format!("{p:.4}"),
            fair_odds: format!("{o:.3}"),
        });
    }

    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&fair)?),
        OutputMode::Table => {
            print_items(&rows, mode)?;
            println!(
                "overround {:.4} (margin {:.2}%)",
                fair.overround,
                fair.margin_pct()
            );
        }
    }
    Ok(())
}

async fn fetch_file(
    config: &AppConfig,
    name: &str,
    path: PathBuf,
    sport: &str,
    league: Option<&str>,
) -> Result<SourceSnapshot> {
    let source = SnapshotFileSource::new(name, path);
    CachedSource::new(source, &config.sources.cache_dir)
        .with_ttl(config.sources.cache_ttl_secs)
        .fetch(sport, league)
        .await
}

pub async fn run_ev(
    config: &AppConfig,
    sharp: PathBuf,
    books: PathBuf,
    sport: &str,
    league: Option<&str>,
    save: bool,
    mode: OutputMode,
) -> Result<()> {
    let sharp = fetch_file(config, "sharp", sharp, sport, league).await?;
    let books = fetch_file(config, "books", books, sport, league).await?;

    let telemetry = TracingTelemetry::shared();
    let matcher = EventMatcher::new(config.matching.strategy(), telemetry.clone());
    let engine = EvEngine::new(config.ev.engine_config()).with_telemetry(telemetry);
    let report = EvPipeline::new(matcher, engine).run(&sharp, &books)?;

    info!(
        assessments = report.assessments.len(),
        bets = report.bets.len(),
        actionable = report.actionable.len(),
        "EV scan complete"
    );

    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&report.actionable)?),
        OutputMode::Table => {
            let rows: Vec<EvBetRow> = report.actionable.iter().map(EvBetRow::from).collect();
            print_items(&rows, mode)?;
        }
    }

    if save {
        let writer = JsonRecordWriter::new(&config.output.dir);
        writer.write(sport, league, "ev_bets", &report.actionable).await?;
        writer
            .write(sport, league, "ev_assessments", &report.assessments)
            .await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn run_value(
    config: &AppConfig,
    stats: PathBuf,
    features: PathBuf,
    models: PathBuf,
    books: PathBuf,
    sport: &str,
    league: Option<&str>,
    save: bool,
    mode: OutputMode,
) -> Result<()> {
    let threshold = config.value.confidence_threshold;
    ValueBetSelector::validate_threshold(threshold)?;

    let stats_snapshot = SnapshotFileSource::new("stats", stats)
        .fetch(sport, league)
        .await?;
    let features = load_features(&features, &stats_snapshot.source)?;
    let models = load_models(&models, &config.value.target)?;
    if models.is_empty() {
        return Err(EdgeError::Validation(format!(
            "no models for target {}",
            config.value.target
        )));
    }
    let books = fetch_file(config, "books", books, sport, league).await?;

    let telemetry = TracingTelemetry::shared();
    let pipeline = ValuePipeline::new(
        EventMatcher::new(config.matching.strategy(), telemetry.clone()),
        EnsembleAggregator::new().with_telemetry(telemetry.clone()),
        ValueBetSelector::new().with_telemetry(telemetry),
        MarketSelection {
            book: config.value.market_book.clone(),
            devig: config.value.devig_market,
        },
    );
    let report = pipeline.run(&stats_snapshot.events, &features, &models, &books, threshold)?;

    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&report.value_bets)?),
        OutputMode::Table => {
            let rows: Vec<ValueBetRow> = report.value_bets.iter().map(ValueBetRow::from).collect();
            print_items(&rows, mode)?;
        }
    }

    if save {
        let writer = JsonRecordWriter::new(&config.output.dir);
        let kind = format!("{}_predictions", config.value.target);
        writer.write(sport, league, &kind, &report.predictions).await?;
        writer
            .write(sport, league, "value_bets", &report.value_bets)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventRef, Side};

    #[test]
    fn test_cli_parses_devig() {
        let cli = Cli::try_parse_from(["sports-edge", "devig", "--home", "2.10", "--away", "1.80"]).unwrap();
        match cli.command {
            Commands::Devig { home, away, draw } => {
                assert_eq!(home, 2.10);
                assert_eq!(away, 1.80);
                assert!(draw.is_none());
            }
            _ => panic!("expected devig"),
        }
    }

    #[test]
    fn test_cli_parses_value_overrides() {
        let cli = Cli::try_parse_from([
            "sports-edge", "value", "--stats", "s.json", "--features", "f.json", "--models", "m",
            "--books", "b.json", "--threshold", "0.65", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Value { threshold: Some(t), .. } if t == 0.65));
    }

    #[test]
    fn test_ev_row_marks_best_side() {
        let bet = EvBet {
            event_ref: EventRef::new("betmgm", "1"),
            book: "betmgm".to_string(),
            side: Side::Home,
            offered_price: 2.3,
            fair_price: 2.1667,
            ev_percent: 6.15,
            best_side: Side::Home,
        };
        let row = EvBetRow::from(&bet);
        assert_eq!(row.best, "*");
        assert_eq!(row.ev_pct, "+6.15");
    }
}
