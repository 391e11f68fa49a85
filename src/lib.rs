//! pump-bundler
//!
//! Launches a bonding-curve token and trades it from a small set of wallets,
//! submitting every step as an atomic transaction bundle through a relay.

pub mod compat;
pub mod config;
pub mod constants;
pub mod curve;
pub mod metadata;
pub mod metrics;
pub mod observability;
pub mod retry;
pub mod rpc_manager;
pub mod structured_logging;
pub mod tx_builder;
pub mod wallet;
pub mod workflow;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
