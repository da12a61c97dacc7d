//! Protocol model: pool variants, hop chains, execution outcomes and the host interface

pub mod events;
pub mod hop_chain;
pub mod host;
pub mod outcome;
pub mod variant;
