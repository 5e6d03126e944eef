//! Brokerdesk: signature audit trail and lifecycle gate for brokerage
//! contracts.
//!
//! Every signature drawn, replaced or cleared produces a forensic audit
//! record that is logged locally first and mirrored to the back-office API.
//! The same contract snapshot then drives a conservative "signed" and
//! "immutable" verdict used to gate further changes.

pub mod api;
pub mod audit;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod settings;
pub mod signing;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
