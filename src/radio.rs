//! Radio Control Logic
//!
//! Driver contract, the forwarder's state machine, and the dispatcher that
//! turns radio completions into state transitions.

pub mod state;
pub mod driver;
pub mod dispatch;
pub mod echo;
