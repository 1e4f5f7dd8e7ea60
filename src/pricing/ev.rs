//! Expected value of book prices against a sharp reference book.
//!
//! The reference (sharp) book is devigged to get fair odds; every other book
//! quoting the same matched event is then scored side by side. A side with no
//! usable price on either book is left out of the comparison, never scored 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::devig::{devig_two_way, FairOdds, FairOddsEngine};
use crate::domain::{validate_decimal_price, Event, EventRef, Market, QuoteBook, Quoted, Side};
use crate::error::{EdgeError, Result};
use crate::matching::EventPair;
use crate::telemetry::{SharedTelemetry, Signal, TracingTelemetry};

pub const DEFAULT_MIN_EV: f64 = 2.0;
pub const DEFAULT_SHARP_BOOK: &str = "pinnacle";

/// EV in percent of stake when the true price is `fair_price`.
///
/// Evaluated as `100 * (offered / fair - 1)`, which equals
/// `100 * (offered * fair_prob - 1)` and is exactly zero when both are equal.
pub fn calculate_ev(offered_price: f64, fair_price: f64) -> Result<f64> {
    validate_decimal_price(offered_price, "offered_price")?;
    if fair_price.is_nan() || fair_price <= 1.0 {
        return Err(EdgeError::invalid_price("fair_price", fair_price));
    }
    Ok(100.0 * (offered_price / fair_price - 1.0))
}

/// EV of one side at one book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideEv {
    pub side: Side,
    pub offered_price: f64,
    pub fair_price: f64,
    pub ev_percent: f64,
}

/// Argmax over scored sides; on equal EV the earlier side wins
pub fn best_side(sides: &[SideEv]) -> Option<(Side, f64)> {
    let mut best: Option<(Side, f64)> = None;
    for s in sides {
        match best {
            Some((_, ev)) if s.ev_percent <= ev => {}
            _ => best = Some((s.side, s.ev_percent)),
        }
    }
    best
}

/// One scored bet, as reported downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvBet {
    pub event_ref: EventRef,
    pub book: String,
    pub side: Side,
    pub offered_price: f64,
    pub fair_price: f64,
    pub ev_percent: f64,
    pub best_side: Side,
}

/// Full assessment of one market of one matched event at one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvAssessment {
    /// Event as listed by the book being scored
    pub event_ref: EventRef,
    /// Same match as listed by the sharp source
    pub sharp_event_ref: EventRef,
    pub sport: String,
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub book: String,
    pub sharp_book: String,
    pub market: Market,
    pub line: Option<f64>,
    pub overround: f64,
    pub match_confidence: f64,
    pub sides: Vec<SideEv>,
    pub best_side: Side,
    pub max_ev: f64,
    pub computed_at: DateTime<Utc>,
}

impl EvAssessment {
    /// One bet per scored side, all sharing `best_side`
    pub fn bets(&self) -> Vec<EvBet> {
        self.sides
            .iter()
            .map(|s| EvBet {
                event_ref: self.event_ref.clone(),
                book: self.book.clone(),
                side: s.side,
                offered_price: s.offered_price,
                fair_price: s.fair_price,
                ev_percent: s.ev_percent,
                best_side: self.best_side,
            })
            .collect()
    }

    pub fn side(&self, side: Side) -> Option<&SideEv> {
        self.sides.iter().find(|s| s.side == side)
    }
}

/// Bets at or above `min_ev`, in input order
pub fn filter_actionable(bets: &[EvBet], min_ev: f64) -> Vec<EvBet> {
    bets.iter()
        .filter(|b| b.ev_percent >= min_ev)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvEngineConfig {
    pub sharp_book: String,
    pub min_ev: f64,
    /// Books to score; empty means every book except the sharp one
    pub books: Vec<String>,
    /// Also score spread and total lines quoted by both books
    pub include_lines: bool,
}

impl Default for EvEngineConfig {
    fn default() -> Self {
        Self {
            sharp_book: DEFAULT_SHARP_BOOK.to_string(),
            min_ev: DEFAULT_MIN_EV,
            books: Vec::new(),
            include_lines: true,
        }
    }
}

pub struct EvEngine {
    config: EvEngineConfig,
    fair: FairOddsEngine,
    telemetry: SharedTelemetry,
}

impl EvEngine {
    pub fn new(config: EvEngineConfig) -> Self {
        Self {
            config,
            fair: FairOddsEngine::new(),
            telemetry: TracingTelemetry::shared(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &EvEngineConfig {
        &self.config
    }

    fn target_books(&self, quotes: &QuoteBook, event_ref: &EventRef) -> Vec<String> {
        quotes
            .books_for(event_ref)
            .into_iter()
            .filter(|b| b != &self.config.sharp_book)
            .filter(|b| self.config.books.is_empty() || self.config.books.contains(b))
            .collect()
    }

    /// Score every market of every matched pair at every target book.
    ///
    /// `pair.left` is the sharp source's event, `pair.right` the book's.
    pub fn assess_pairs(
        &self,
        pairs: &[EventPair<'_>],
        sharp_quotes: &QuoteBook,
        book_quotes: &QuoteBook,
    ) -> Result<Vec<EvAssessment>> {
        let mut out = Vec::new();
        for pair in pairs {
            out.extend(self.assess_pair(pair, sharp_quotes, book_quotes)?);
        }
        Ok(out)
    }

    pub fn assess_pair(
        &self,
        pair: &EventPair<'_>,
        sharp_quotes: &QuoteBook,
        book_quotes: &QuoteBook,
    ) -> Result<Vec<EvAssessment>> {
        let ctx = PairContext {
            sharp_event: pair.left,
            book_event: pair.right,
            confidence: pair.confidence,
            computed_at: Utc::now(),
        };
        let mut out = Vec::new();

        for book in self.target_books(book_quotes, &ctx.book_event.event_ref()) {
            if let Some(a) = self.assess_moneyline(&ctx, &book, sharp_quotes, book_quotes)? {
                out.push(a);
            }
            if self.config.include_lines {
                for market in [Market::Spread, Market::Total] {
                    out.extend(self.assess_lines(&ctx, &book, market, sharp_quotes, book_quotes)?);
                }
            }
        }
        Ok(out)
    }

    fn assess_moneyline(
        &self,
        ctx: &PairContext<'_>,
        book: &str,
        sharp_quotes: &QuoteBook,
        book_quotes: &QuoteBook,
    ) -> Result<Option<EvAssessment>> {
        let sharp_ref = ctx.sharp_event.event_ref();
        let book_ref = ctx.book_event.event_ref();
        let sharp = sharp_quotes.moneyline(&sharp_ref, &self.config.sharp_book);
        let offered = book_quotes.moneyline(&book_ref, book);

        let Some(fair) = self
            .fair
            .devig_moneyline(&sharp_ref, &self.config.sharp_book, &sharp)?
        else {
            self.skip(&book_ref, book, Market::Moneyline, "sharp book lacks home/away prices");
            return Ok(None);
        };
        if offered.both_sides().is_none() {
            self.skip(&book_ref, book, Market::Moneyline, "book lacks home/away prices");
            return Ok(None);
        }

        let mut sides = Vec::with_capacity(3);
        for (side, quoted) in [
            (Side::Home, offered.home),
            (Side::Away, offered.away),
            (Side::Draw, offered.draw),
        ] {
            let Some(fair_price) = fair.odds.odds(side) else {
                continue;
            };
            match quoted.available() {
                Some(offered_price) => sides.push(SideEv {
                    side,
                    offered_price,
                    fair_price,
                    ev_percent: calculate_ev(offered_price, fair_price)?,
                }),
                None => {
                    if let Quoted::Unavailable(reason) = quoted {
                        self.telemetry.emit(Signal::SideExcluded {
                            event_ref: book_ref.clone(),
                            book: book.to_string(),
                            side,
                            reason,
                        });
                    }
                }
            }
        }

        Ok(self.finish(ctx, book, Market::Moneyline, None, &fair.odds, sides))
    }

    fn assess_lines(
        &self,
        ctx: &PairContext<'_>,
        book: &str,
        market: Market,
        sharp_quotes: &QuoteBook,
        book_quotes: &QuoteBook,
    ) -> Result<Vec<EvAssessment>> {
        let sharp_ref = ctx.sharp_event.event_ref();
        let book_ref = ctx.book_event.event_ref();
        let book_lines = book_quotes.lines(&book_ref, book, market);
        let mut out = Vec::new();

        for line in sharp_quotes.lines(&sharp_ref, &self.config.sharp_book, market) {
            if !book_lines.contains(&line) {
                continue;
            }
            let sharp = sharp_quotes.two_way(&sharp_ref, &self.config.sharp_book, market, line);
            let offered = book_quotes.two_way(&book_ref, book, market, line);
            let (Some((s1, s2)), Some((o1, o2))) = (sharp.both_sides(), offered.both_sides()) else {
                self.skip(&book_ref, book, market, "line not priced on both sides");
                continue;
            };

            let fair = devig_two_way(market, line, s1, s2)?;
            let sides = vec![
                SideEv {
                    side: fair.first,
                    offered_price: o1,
                    fair_price: fair.fair_first_odds,
                    ev_percent: calculate_ev(o1, fair.fair_first_odds)?,
                },
                SideEv {
                    side: fair.second,
                    offered_price: o2,
                    fair_price: fair.fair_second_odds,
                    ev_percent: calculate_ev(o2, fair.fair_second_odds)?,
                },
            ];
            let as_fair = FairOdds {
                fair_home_prob: fair.fair_first_prob,
                fair_away_prob: fair.fair_second_prob,
                fair_draw_prob: None,
                fair_home_odds: fair.fair_first_odds,
                fair_away_odds: fair.fair_second_odds,
                fair_draw_odds: None,
                overround: fair.overround,
            };
            if let Some(a) = self.finish(ctx, book, market, Some(line), &as_fair, sides) {
                out.push(a);
            }
        }
        Ok(out)
    }

    fn finish(
        &self,
        ctx: &PairContext<'_>,
        book: &str,
        market: Market,
        line: Option<f64>,
        fair: &FairOdds,
        sides: Vec<SideEv>,
    ) -> Option<EvAssessment> {
        let (best, max_ev) = best_side(&sides)?;
        let event_ref = ctx.book_event.event_ref();
        self.telemetry.emit(Signal::EvAssessed {
            event_ref: event_ref.clone(),
            book: book.to_string(),
            best_side: best,
            max_ev,
        });

        Some(EvAssessment {
            event_ref,
            sharp_event_ref: ctx.sharp_event.event_ref(),
            sport: ctx.book_event.sport.clone(),
            league: ctx
                .book_event
                .league
                .clone()
                .or_else(|| ctx.sharp_event.league.clone()),
            home_team: ctx.book_event.home_team.clone(),
            away_team: ctx.book_event.away_team.clone(),
            book: book.to_string(),
            sharp_book: self.config.sharp_book.clone(),
            market,
            line,
            overround: fair.overround,
            match_confidence: ctx.confidence,
            sides,
            best_side: best,
            max_ev,
            computed_at: ctx.computed_at,
        })
    }

    fn skip(&self, event_ref: &EventRef, book: &str, market: Market, reason: &str) {
        self.telemetry.emit(Signal::MarketSkipped {
            event_ref: event_ref.clone(),
            book: book.to_string(),
            market,
            reason: reason.to_string(),
        });
    }

    /// Bets clearing the configured `min_ev`
    pub fn actionable(&self, bets: &[EvBet]) -> Vec<EvBet> {
        let actionable = filter_actionable(bets, self.config.min_ev);
        self.telemetry.emit(Signal::BetsFiltered {
            total: bets.len(),
            actionable: actionable.len(),
            min_ev: self.config.min_ev,
        });
        actionable
    }
}

struct PairContext<'a> {
    sharp_event: &'a Event,
    book_event: &'a Event,
    confidence: f64,
    computed_at: DateTime<Utc>,
}
