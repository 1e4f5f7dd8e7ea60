pub mod cli;
pub mod config;
pub mod domain;
pub mod ensemble;
pub mod error;
pub mod matching;
pub mod persistence;
pub mod pipeline;
pub mod pricing;
pub mod sources;
pub mod telemetry;
pub mod value;

pub use config::AppConfig;
pub use domain::{Event, EventRef, EventStatus, Market, OddsQuote, QuoteBook, Side};
pub use ensemble::{EnsembleAggregator, ModelArtifact, Prediction};
pub use error::{EdgeError, Result};
pub use matching::{EventMatcher, EventPair, MatchStrategy};
pub use pipeline::{EvPipeline, EvReport, ValuePipeline, ValueReport};
pub use pricing::{EvBet, EvEngine, FairOdds, FairOddsEngine};
pub use sources::{CachedSource, OddsSource, SnapshotFileSource, SourceSnapshot};
pub use telemetry::{NoopTelemetry, RecordingTelemetry, Signal, Telemetry, TracingTelemetry};
pub use value::{ValueBet, ValueBetSelector};
