//! Fair odds and expected value.

pub mod devig;
pub mod ev;

pub use devig::{
    devig_odds, devig_two_way, EventFairOdds, FairOdds, FairOddsEngine, TwoWayFairOdds,
    PROBABILITY_SUM_TOLERANCE,
};
pub use ev::{
    best_side, calculate_ev, filter_actionable, EvAssessment, EvBet, EvEngine, EvEngineConfig,
    SideEv, DEFAULT_MIN_EV, DEFAULT_SHARP_BOOK,
};
