//! A pure Rust runtime for the PPL and ERCI radio-bridge UDP protocols:
//! wire codecs, a non-blocking transport, request/response query matching,
//! and the PPL configuration transaction state machine.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod codec;
pub mod erci;
pub mod error;
pub mod mac;
pub mod ppl;
pub mod query;
pub mod transport;
