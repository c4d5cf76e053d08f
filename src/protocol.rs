//! Serial Wire Protocol
//!
//! Framing used on the serial side of the forwarder and the gate applied
//! to frames submitted for transmission.
//!
//! ```text
//! offset  0      1      2..3        4..7       8..n-2    n-2..n
//!       ┌──────┬──────┬──────────┬──────────┬─────────┬────────┐
//!       │ 0x01 │ type │ len (BE) │ metadata │ payload │ CR LF  │
//!       └──────┴──────┴──────────┴──────────┴─────────┴────────┘
//! ```
//!
//! `len` counts the whole frame, marker through terminator.

pub mod frame;
pub mod validator;
