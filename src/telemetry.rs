//! Telemetry interface injected into every component.
//!
//! Components never touch a global subscriber directly; they report what they
//! skipped or produced through a [`Telemetry`] handle passed in at
//! construction. [`TracingTelemetry`] forwards to `tracing`, which is what the
//! binary wires up. Tests use [`RecordingTelemetry`].

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::domain::{EventRef, Market, Side, Unavailable};

/// Something a component wants observed
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    EventsMatched {
        left: usize,
        right: usize,
        pairs: usize,
    },
    EventUnmatched {
        event_ref: EventRef,
        matchup: String,
    },
    MarketSkipped {
        event_ref: EventRef,
        book: String,
        market: Market,
        reason: String,
    },
    SideExcluded {
        event_ref: EventRef,
        book: String,
        side: Side,
        reason: Unavailable,
    },
    EvAssessed {
        event_ref: EventRef,
        book: String,
        best_side: Side,
        max_ev: f64,
    },
    BetsFiltered {
        total: usize,
        actionable: usize,
        min_ev: f64,
    },
    ModelUnusable {
        event_ref: EventRef,
        model: String,
        reason: String,
    },
    PredictionDropped {
        event_ref: EventRef,
    },
    ValueBetsSelected {
        candidates: usize,
        selected: usize,
        threshold: f64,
    },
    SourceFallback {
        source: String,
        reason: String,
        served_cache: bool,
    },
}

pub trait Telemetry: Send + Sync {
    fn emit(&self, signal: Signal);
}

pub type SharedTelemetry = Arc<dyn Telemetry>;

/// Default handle: forwards to `tracing` with structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    pub fn shared() -> SharedTelemetry {
        Arc::new(TracingTelemetry)
    }
}

impl Telemetry for TracingTelemetry {
    fn emit(&self, signal: Signal) {
        match signal {
            Signal::EventsMatched { left, right, pairs } => {
                info!(left, right, pairs, "Matched {} events across sources", pairs);
            }
            Signal::EventUnmatched { event_ref, matchup } => {
                debug!(event = %event_ref, "No counterpart for {}", matchup);
            }
            Signal::MarketSkipped {
                event_ref,
                book,
                market,
                reason,
            } => {
                debug!(event = %event_ref, book = %book, market = %market, "Skipping market: {}", reason);
            }
            Signal::SideExcluded {
                event_ref,
                book,
                side,
                reason,
            } => {
                debug!(event = %event_ref, book = %book, side = %side, "Side excluded: {}", reason);
            }
            Signal::EvAssessed {
                event_ref,
                book,
                best_side,
                max_ev,
            } => {
                debug!(event = %event_ref, book = %book, best_side = %best_side, "Best EV {:.2}%", max_ev);
            }
            Signal::BetsFiltered {
                total,
                actionable,
                min_ev,
            } => {
                info!(total, actionable, "{} of {} bets clear min EV {:.2}%", actionable, total, min_ev);
            }
            Signal::ModelUnusable {
                event_ref,
                model,
                reason,
            } => {
                warn!(event = %event_ref, model = %model, "Model unusable: {}", reason);
            }
            Signal::PredictionDropped { event_ref } => {
                warn!(event = %event_ref, "No usable model output, event dropped");
            }
            Signal::ValueBetsSelected {
                candidates,
                selected,
                threshold,
            } => {
                info!(candidates, selected, "Selected {} value bets at threshold {:.2}", selected, threshold);
            }
            Signal::SourceFallback {
                source,
                reason,
                served_cache,
            } => {
                warn!(source = %source, served_cache, "Live fetch failed: {}", reason);
            }
        }
    }
}

/// Drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn emit(&self, _signal: Signal) {}
}

/// Keeps every signal in memory
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Telemetry for RecordingTelemetry {
    fn emit(&self, signal: Signal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_telemetry_keeps_order() {
        let rec = RecordingTelemetry::new();
        rec.emit(Signal::PredictionDropped {
            event_ref: EventRef::new("espn", "1"),
        });
        rec.emit(Signal::BetsFiltered {
            total: 3,
            actionable: 1,
            min_ev: 2.0,
        });

        let signals = rec.signals();
        assert_eq!(signals.len(), 2);
        assert!(matches!(signals[0], Signal::PredictionDropped { .. }));
    }
}
