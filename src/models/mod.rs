//! Domain model layer.
//!
//! Every persisted object is serde-serializable JSON with the same field
//! names the browser-side tracker writes, so storage dumps stay
//! interchangeable between implementations.

pub mod raffle;

pub use raffle::{
    CandidateRaffle, ClaimInfo, EntryInfo, Raffle, RaffleDetails, StatusInfo, TokenInfo,
    WinnerInfo,
};
