//! The ERCI (ring-switched antenna control) protocol: a small fixed-header
//! UDP protocol for selecting and driving one antenna ring at a time.

pub mod client;
pub mod constants;
pub mod simulator;
