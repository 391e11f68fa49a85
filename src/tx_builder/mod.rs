//! Transaction building and bundle submission
//!
//! ## Layout
//! - [`instructions`]: PDA derivation, typed create/buy/sell requests, compute-budget planning
//! - [`output`]: [`TransactionStep`] and signed [`TxBuildOutput`]
//! - [`builder`]: [`TxBuilder`], create + seed buy, multi-wallet buy and sell
//! - [`bundle`]: [`BundleBuilder`], the tip transaction and wire encoding
//! - [`simulate`]: pre-submission simulation under a [`SimulationPolicy`]
//! - [`relay`]: the [`Bundler`] trait, bloXroute client and [`RelaySubmitter`]
//! - [`errors`]: [`TransactionBuilderError`]
//!
//! ## Ordering
//! Instruction order inside a transaction and transaction order inside a
//! bundle are preserved from the builder to the relay request body. The tip
//! transfer is always the last entry.

pub mod builder;
pub mod bundle;
pub mod errors;
pub mod instructions;
pub mod output;
pub mod relay;
pub mod simulate;

pub use builder::{
    AssetInfo, BuyAmount, BuyLeg, ComputeBudget, SellAmount, SellLeg, TxBuilder, TxBuilderConfig,
};
pub use bundle::{Bundle, BundleBuilder, TipConfig};
pub use errors::TransactionBuilderError;
pub use instructions::{BuyRequest, CreateRequest, InstructionPlan, SellRequest};
pub use output::{TransactionStep, TxBuildOutput};
pub use relay::{BloxrouteRelay, BundleReceipt, Bundler, RelayResponse, RelaySubmitter};
pub use simulate::{SimulationFailure, SimulationPolicy, SimulationReport};
