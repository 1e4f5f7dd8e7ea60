//! End-to-end runs over one snapshot of inputs.
//!
//! EV: match sharp events to book events, devig the sharp book, score every
//! other book. Value: predict each stats event with the ensemble, attach a
//! book's market probabilities through event matching, select value bets.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{Event, EventRef, QuoteBook};
use crate::ensemble::{Classifier, EnsembleAggregator, FeatureVector, Prediction};
use crate::error::Result;
use crate::matching::EventMatcher;
use crate::pricing::{devig_odds, EvAssessment, EvBet, EvEngine};
use crate::sources::SourceSnapshot;
use crate::value::{MarketSnapshot, ValueBet, ValueBetSelector, ValueCandidate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvReport {
    pub assessments: Vec<EvAssessment>,
    /// Every scored side
    pub bets: Vec<EvBet>,
    /// Bets clearing min EV, best first
    pub actionable: Vec<EvBet>,
}

pub struct EvPipeline {
    matcher: EventMatcher,
    engine: EvEngine,
}

impl EvPipeline {
    pub fn new(matcher: EventMatcher, engine: EvEngine) -> Self {
        Self { matcher, engine }
    }

    pub fn run(&self, sharp: &SourceSnapshot, books: &SourceSnapshot) -> Result<EvReport> {
        let pairs = self.matcher.match_events(&sharp.events, &books.events);
        let assessments =
            self.engine
                .assess_pairs(&pairs, &sharp.quote_book(), &books.quote_book())?;

        let bets: Vec<EvBet> = assessments.iter().flat_map(EvAssessment::bets).collect();
        let mut actionable = self.engine.actionable(&bets);
        actionable.sort_by(|a, b| {
            b.ev_percent
                .partial_cmp(&a.ev_percent)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.event_ref.cmp(&b.event_ref))
                .then_with(|| a.book.cmp(&b.book))
                .then_with(|| a.side.cmp(&b.side))
        });

        Ok(EvReport {
            assessments,
            bets,
            actionable,
        })
    }
}

/// Feature file: `{ "<event_id>": { "<feature>": value, ... }, ... }`
pub fn load_features<P: AsRef<Path>>(
    path: P,
    source: &str,
) -> Result<BTreeMap<EventRef, FeatureVector>> {
    let content = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, FeatureVector> = serde_json::from_str(&content)?;
    Ok(raw
        .into_iter()
        .map(|(id, fv)| (EventRef::new(source, id), fv))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketSelection {
    /// Book whose moneyline is compared to the model; first book with both
    /// sides priced when unset
    pub book: Option<String>,
    /// Compare against devigged probabilities instead of raw implied ones
    pub devig: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueReport {
    pub predictions: Vec<Prediction>,
    pub value_bets: Vec<ValueBet>,
}

pub struct ValuePipeline {
    matcher: EventMatcher,
    aggregator: EnsembleAggregator,
    selector: ValueBetSelector,
    market: MarketSelection,
}

impl ValuePipeline {
    pub fn new(
        matcher: EventMatcher,
        aggregator: EnsembleAggregator,
        selector: ValueBetSelector,
        market: MarketSelection,
    ) -> Self {
        Self {
            matcher,
            aggregator,
            selector,
            market,
        }
    }

    pub fn run<C: Classifier>(
        &self,
        stats_events: &[Event],
        features: &BTreeMap<EventRef, FeatureVector>,
        models: &[C],
        books: &SourceSnapshot,
        confidence_threshold: f64,
    ) -> Result<ValueReport> {
        ValueBetSelector::validate_threshold(confidence_threshold)?;

        let known: BTreeMap<EventRef, &Event> =
            stats_events.iter().map(|e| (e.event_ref(), e)).collect();
        let predictions: Vec<Prediction> = self
            .aggregator
            .predict_all(features, models)
            .into_iter()
            .filter(|p| known.contains_key(&p.event_ref))
            .collect();

        let quotes = books.quote_book();
        let pairs = self.matcher.match_events(stats_events, &books.events);
        let mut markets: BTreeMap<EventRef, MarketSnapshot> = BTreeMap::new();
        for pair in &pairs {
            if let Some(snapshot) = self.market_for(&quotes, &pair.right.event_ref())? {
                markets.insert(pair.left.event_ref(), snapshot);
            }
        }

        let candidates: Vec<ValueCandidate> = predictions
            .iter()
            .filter_map(|p| {
                let event = known.get(&p.event_ref)?;
                Some(ValueCandidate {
                    prediction: p.clone(),
                    status: event.status,
                    market: markets.get(&p.event_ref).copied().unwrap_or_default(),
                })
            })
            .collect();

        let value_bets = self
            .selector
            .get_value_bets(&candidates, confidence_threshold)?;
        Ok(ValueReport {
            predictions,
            value_bets,
        })
    }

    /// Market probabilities from the first book pricing both sides.
    ///
    /// Devig failures (negative margin, inconsistent sums) are returned, not skipped.
    fn market_for(
        &self,
        quotes: &QuoteBook,
        event_ref: &EventRef,
    ) -> Result<Option<MarketSnapshot>> {
        let books = match &self.market.book {
            Some(book) => vec![book.clone()],
            None => quotes.books_for(event_ref),
        };
        for book in &books {
            let prices = quotes.moneyline(event_ref, book);
            let Some((home, away)) = prices.both_sides() else {
                continue;
            };
            let snapshot = if self.market.devig {
                MarketSnapshot::from_fair(&devig_odds(home, away, prices.draw.available())?)
            } else {
                MarketSnapshot::from_moneyline(&prices)
            };
            return Ok(Some(snapshot));
        }
        Ok(None)
    }
}
