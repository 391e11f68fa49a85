//! Error types for the transaction builder
//!
//! One enum covers instruction assembly, signing, bundle composition and
//! relay submission, so a workflow can surface any failure of a bundle with
//! a single `?`.

use thiserror::Error;

use crate::rpc_manager::RpcManagerError;

/// Error type for all transaction builder operations
#[derive(Error, Debug)]
pub enum TransactionBuilderError {
    /// Failed to build an instruction for a specific program
    ///
    /// Contains the program ID and detailed reason for failure
    #[error("Instruction build error (program={program}): {reason}")]
    InstructionBuild {
        /// The program that failed to build an instruction
        program: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// Transaction simulation failed and the policy said to abort
    #[error("Simulation failed: {0}")]
    Simulation(String),

    /// Failed to sign the transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A signer the message requires was not supplied
    #[error("Missing signature from required signer {0}")]
    MissingSigner(String),

    /// Failed to fetch a recent blockhash
    #[error("Blockhash error: {0}")]
    Blockhash(String),

    /// Compute-budget instructions out of place
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Configuration or validation error
    ///
    /// This includes:
    /// - Empty tip-account set
    /// - Zero amounts where a trade was requested
    /// - Payer absent from the identity set
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// RPC client error
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcManagerError),

    /// The relay answered with a non-2xx status
    #[error("Relay rejected bundle (status {status}): {body}")]
    RelayRejected { status: u16, body: String },

    /// The relay could not be reached
    #[error("Relay transport error: {0}")]
    RelayTransport(String),

    /// Transaction wire encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransactionBuilderError {
    /// Check if this error is potentially retryable
    ///
    /// Returns `true` if retrying the operation might succeed,
    /// `false` if the error is fatal or non-retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blockhash(_) => true,
            Self::Rpc(e) => e.is_retryable(),
            Self::RelayTransport(_) => true,
            Self::Simulation(msg) => !msg.contains("insufficient") && !msg.contains("balance"),

            Self::InstructionBuild { .. } => false,
            Self::Signing(_) => false,
            Self::MissingSigner(_) => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::Configuration(_) => false,
            // A rejected bundle is surfaced, never resubmitted automatically
            Self::RelayRejected { .. } => false,
            Self::Serialization(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InstructionBuild { .. } => "instruction",
            Self::Simulation(_) => "simulation",
            Self::Signing(_) | Self::MissingSigner(_) => "signing",
            Self::Blockhash(_) => "blockhash",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Configuration(_) => "config",
            Self::Rpc(_) => "rpc",
            Self::RelayRejected { .. } | Self::RelayTransport(_) => "relay",
            Self::Serialization(_) => "serialization",
        }
    }
}

// Convenience constructors for common error scenarios
impl TransactionBuilderError {
    /// Create an instruction build error for a specific program
    pub fn instruction_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn simulation_failed(reason: impl Into<String>) -> Self {
        Self::Simulation(reason.into())
    }

    pub fn blockhash_unavailable(reason: impl Into<String>) -> Self {
        Self::Blockhash(reason.into())
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}
