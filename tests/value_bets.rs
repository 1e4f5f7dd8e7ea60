use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sports_edge::domain::{EventRef, EventStatus, Side};
use sports_edge::ensemble::{load_models, EnsembleAggregator, ModelResult, Prediction};
use sports_edge::matching::{EventMatcher, MatchStrategy};
use sports_edge::pipeline::{load_features, MarketSelection, ValuePipeline};
use sports_edge::sources::{OddsSource, SnapshotFileSource};
use sports_edge::telemetry::{NoopTelemetry, RecordingTelemetry, Signal};
use sports_edge::value::{MarketSnapshot, ValueBetSelector, ValueCandidate};

const STATS: &str = r#"{
  "source": "espn",
  "events": [
    {"source": "espn", "event_id": "401", "sport": "basketball", "league": "nba",
     "home_team": "Los Angeles Lakers", "away_team": "Boston Celtics", "status": "scheduled"},
    {"source": "espn", "event_id": "402", "sport": "basketball", "league": "nba",
     "home_team": "Miami Heat", "away_team": "New York Knicks", "status": "scheduled"},
    {"source": "espn", "event_id": "403", "sport": "basketball", "league": "nba",
     "home_team": "Denver Nuggets", "away_team": "Phoenix Suns", "status": "final"},
    {"source": "espn", "event_id": "404", "sport": "basketball", "league": "nba",
     "home_team": "Chicago Bulls", "away_team": "Detroit Pistons", "status": "scheduled"}
  ]
}"#;

const FEATURES: &str = r#"{
  "401": {"elo_diff": 150.0, "form_diff": 1.0},
  "402": {"elo_diff": -150.0},
  "403": {"elo_diff": 300.0, "form_diff": 3.0}
}"#;

const BOOKS: &str = r#"{
  "source": "oddsfeed",
  "events": [
    {"source": "oddsfeed", "event_id": "b1", "sport": "basketball", "league": "nba",
     "home_team": "Los Angeles Lakers", "away_team": "Boston Celtics", "status": "scheduled"},
    {"source": "oddsfeed", "event_id": "b2", "sport": "basketball", "league": "nba",
     "home_team": "Miami Heat", "away_team": "New York Knicks", "status": "scheduled"},
    {"source": "oddsfeed", "event_id": "b3", "sport": "basketball", "league": "nba",
     "home_team": "Denver Nuggets", "away_team": "Phoenix Suns", "status": "scheduled"}
  ],
  "quotes": [
    {"event_id": "b1", "book": "betmgm", "market": "moneyline", "side": "home", "price": {"decimal": 2.50}},
    {"event_id": "b1", "book": "betmgm", "market": "moneyline", "side": "away", "price": {"decimal": 1.55}},
    {"event_id": "b2", "book": "betmgm", "market": "moneyline", "side": "home", "price": {"decimal": 1.40}},
    {"event_id": "b2", "book": "betmgm", "market": "moneyline", "side": "away", "price": {"decimal": 3.00}},
    {"event_id": "b3", "book": "betmgm", "market": "moneyline", "side": "home", "price": {"decimal": 3.00}},
    {"event_id": "b3", "book": "betmgm", "market": "moneyline", "side": "away", "price": {"decimal": 1.40}}
  ]
}"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn write_models(dir: &Path) {
    write(
        dir,
        "elo_v2.json",
        r#"{"name": "elo", "target": "home_team_winning", "trained_at": "2024-03-01T00:00:00Z",
            "feature_names": ["elo_diff"],
            "model": {"kind": "logistic", "intercept": 0.0, "coefficients": [0.01]}}"#,
    );
    // superseded by elo_v2
    write(
        dir,
        "elo_v1.json",
        r#"{"name": "elo", "target": "home_team_winning", "trained_at": "2023-11-01T00:00:00Z",
            "feature_names": ["elo_diff"],
            "model": {"kind": "logistic", "intercept": 0.0, "coefficients": [10.0]}}"#,
    );
    write(
        dir,
        "form.json",
        r#"{"name": "form", "target": "home_team_winning", "trained_at": "2024-03-01T00:00:00Z",
            "feature_names": ["form_diff"],
            "model": {"kind": "logistic", "intercept": 0.0, "coefficients": [1.0]}}"#,
    );
    write(
        dir,
        "spread.json",
        r#"{"name": "spread", "target": "home_team_covering", "trained_at": "2024-03-01T00:00:00Z",
            "feature_names": ["elo_diff"],
            "model": {"kind": "logistic", "intercept": 0.0, "coefficients": [0.02]}}"#,
    );
    write(dir, "README.txt", "not a model");
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[test]
fn test_three_model_majority() {
    let aggregator = EnsembleAggregator::new().with_telemetry(Arc::new(NoopTelemetry));
    let results: Vec<ModelResult> = [("a", 0.8, 1), ("b", 0.6, 1), ("c", 0.55, 0)]
        .into_iter()
        .map(|(model, probability, class)| ModelResult::Predicted {
            model: model.to_string(),
            probability,
            class,
        })
        .collect();

    let prediction = aggregator
        .aggregate(&EventRef::new("espn", "1"), &results)
        .unwrap();
    assert_eq!(prediction.ensemble_class, 1);
    assert!((prediction.ensemble_probability - 0.65).abs() < 1e-9);
    assert_eq!(prediction.per_model_probability.len(), 3);
}

#[test]
fn test_confident_home_value_bet() {
    let candidate = ValueCandidate {
        prediction: Prediction {
            event_ref: EventRef::new("espn", "1"),
            per_model_probability: BTreeMap::from([("elo".to_string(), 0.75)]),
            ensemble_probability: 0.75,
            ensemble_class: 1,
        },
        status: EventStatus::Scheduled,
        market: MarketSnapshot {
            home_implied_probability: Some(0.40),
            away_implied_probability: Some(0.65),
        },
    };

    let selector = ValueBetSelector::new().with_telemetry(Arc::new(NoopTelemetry));
    let bets = selector.get_value_bets(&[candidate], 0.7).unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].side, Side::Home);
    assert!((bets[0].edge - 0.35).abs() < 1e-9);
}

#[test]
fn test_models_loaded_by_target_and_recency() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());

    let models = load_models(dir.path(), "home_team_winning").unwrap();
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["elo", "form"]);
    assert_eq!(models[0].feature_names, vec!["elo_diff".to_string()]);

    let covering = load_models(dir.path(), "home_team_covering").unwrap();
    assert_eq!(covering.len(), 1);

    assert!(load_models(dir.path().join("nope"), "home_team_winning")
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_value_run_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let models_dir = dir.path().join("models");
    std::fs::create_dir_all(&models_dir).unwrap();
    write_models(&models_dir);

    let stats = SnapshotFileSource::new("stats", write(dir.path(), "stats.json", STATS))
        .fetch("basketball", Some("nba"))
        .await
        .unwrap();
    let books = SnapshotFileSource::new("books", write(dir.path(), "books.json", BOOKS))
        .fetch("basketball", Some("nba"))
        .await
        .unwrap();
    let features = load_features(write(dir.path(), "features.json", FEATURES), &stats.source).unwrap();
    let models = load_models(&models_dir, "home_team_winning").unwrap();

    let telemetry = RecordingTelemetry::new();
    let pipeline = ValuePipeline::new(
        EventMatcher::new(MatchStrategy::default(), Arc::new(NoopTelemetry)),
        EnsembleAggregator::new().with_telemetry(telemetry.clone()),
        ValueBetSelector::new().with_telemetry(telemetry.clone()),
        MarketSelection::default(),
    );
    let report = pipeline
        .run(&stats.events, &features, &models, &books, 0.7)
        .unwrap();

    // 404 has no features, so no prediction
    let predicted: Vec<&str> = report
        .predictions
        .iter()
        .map(|p| p.event_ref.event_id.as_str())
        .collect();
    assert_eq!(predicted, vec!["401", "402", "403"]);

    // form cannot score 402 and is left out of its ensemble
    let p402 = &report.predictions[1];
    assert_eq!(p402.per_model_probability.len(), 1);
    assert!((p402.ensemble_probability - sigmoid(-1.5)).abs() < 1e-9);
    assert!(telemetry.signals().iter().any(|s| matches!(
        s,
        Signal::ModelUnusable { event_ref, model, .. }
            if event_ref.event_id == "402" && model == "form"
    )));

    // 403 is final; 402 (away) outranks 401 (home) on edge
    assert_eq!(report.value_bets.len(), 2);
    let away = &report.value_bets[0];
    assert_eq!(away.event_ref, EventRef::new("espn", "402"));
    assert_eq!(away.side, Side::Away);
    assert!((away.model_probability - sigmoid(1.5)).abs() < 1e-9);
    assert!((away.edge - (sigmoid(1.5) - 1.0 / 3.0)).abs() < 1e-9);

    let home = &report.value_bets[1];
    assert_eq!(home.event_ref, EventRef::new("espn", "401"));
    assert_eq!(home.side, Side::Home);
    let mean = (sigmoid(1.5) + sigmoid(1.0)) / 2.0;
    assert!((home.edge - (mean - 0.4)).abs() < 1e-9);
    assert!(home.kelly_fraction() > 0.0);
}

#[tokio::test]
async fn test_devigged_market_widens_edge() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());
    let stats = SnapshotFileSource::new("stats", write(dir.path(), "stats.json", STATS))
        .load()
        .await
        .unwrap();
    let books = SnapshotFileSource::new("books", write(dir.path(), "books.json", BOOKS))
        .load()
        .await
        .unwrap();
    let features = load_features(write(dir.path(), "features.json", FEATURES), "espn").unwrap();
    let models = load_models(dir.path(), "home_team_winning").unwrap();

    let run = |devig: bool| {
        ValuePipeline::new(
            EventMatcher::new(MatchStrategy::default(), Arc::new(NoopTelemetry)),
            EnsembleAggregator::new().with_telemetry(Arc::new(NoopTelemetry)),
            ValueBetSelector::new().with_telemetry(Arc::new(NoopTelemetry)),
            MarketSelection {
                book: Some("betmgm".to_string()),
                devig,
            },
        )
        .run(&stats.events, &features, &models, &books, 0.7)
        .unwrap()
    };

    let raw = run(false);
    let fair = run(true);
    assert_eq!(raw.value_bets.len(), fair.value_bets.len());
    for (r, f) in raw.value_bets.iter().zip(&fair.value_bets) {
        assert_eq!(r.event_ref, f.event_ref);
        assert!(f.market_implied_probability < r.market_implied_probability);
        assert!(f.edge > r.edge);
    }
}

#[test]
fn test_threshold_out_of_range_is_rejected() {
    let selector = ValueBetSelector::new().with_telemetry(Arc::new(NoopTelemetry));
    assert!(selector.get_value_bets(&[], 0.4).is_err());
    assert!(selector.get_value_bets(&[], 1.0).is_err());
    assert!(selector.get_value_bets(&[], 0.5).unwrap().is_empty());
}
