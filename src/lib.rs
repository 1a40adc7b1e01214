//! Daily wallpaper fetcher: pulls candidates from an image archive API,
//! validates them and writes the result to a fixed path.

#![allow(clippy::multiple_crate_versions)]
#![deny(clippy::all)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::disallowed_methods)]
#![deny(clippy::expect_used)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::panic)]
#![deny(clippy::perf)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::unreachable)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod orchestrator;
pub mod pool;
pub mod storage;
pub mod transport;
pub mod validator;
