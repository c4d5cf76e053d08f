//! USB Subsystem
//!
//! The host link: a CDC ACM virtual serial port carrying forwarder frames
//! both ways.

pub mod cdc;
