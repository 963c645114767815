//! Hash chain builder.
//!
//! A chain is a text file: a header, a starting message, then blocks of
//! (nonce, separator, digest). Block `i` chains from the previous digest and
//! must have exactly `i` leading zero bits, so every block costs about twice
//! as much work as the one before it.

pub mod block;
pub mod chain;
pub mod codec;
pub mod digest;
pub mod error;
pub mod miner;
pub mod normalize;
pub mod validator;
pub mod writer;

pub use chain::{MiningOptions, MiningOutcome};
pub use error::{HcbError, Result};
pub use validator::ChainTip;
