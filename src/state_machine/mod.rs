// Status model for the raffle lifecycle.
//
// Pure derivation from a raffle's raw fields: no I/O, no clocks of its own.
// The resolution engine records transport outcomes through `derive` and the
// store persists whatever phase falls out.

pub mod derive;
pub mod states;

pub use derive::{derive_phase, record_attempt};
pub use states::{RafflePhase, Transport};
