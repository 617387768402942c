//! Round/block lifecycle.
//!
//! A round is the live, mutable part (counters + timer); a block is the
//! frozen record a round leaves behind when it is finalized.

mod block;
mod session;

pub use block::{Block, BlockDraft, BlockSource};
pub use session::RoundSession;
