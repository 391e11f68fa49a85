use solana_client::client_error::{ClientError, ClientErrorKind};
use thiserror::Error;

/// Chain reader error types
#[derive(Debug, Clone, Error)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired { endpoint: String },

    /// The account (usually a token account) does not exist yet
    #[error("Account not found: {account} (endpoint: {endpoint})")]
    AccountNotFound { account: String, endpoint: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RpcManagerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::RateLimitExceeded { .. } => true,
            RpcManagerError::BlockhashNotFound { .. } => true,
            // The account may appear once the pending transaction lands
            RpcManagerError::AccountNotFound { .. } => true,

            RpcManagerError::TransactionExpired { .. } => false,
            RpcManagerError::InsufficientFunds { .. } => false,
            RpcManagerError::InvalidResponse(_) => false,
            RpcManagerError::Configuration(_) => false,

            RpcManagerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    pub fn is_account_not_found(&self) -> bool {
        matches!(self, RpcManagerError::AccountNotFound { .. })
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcManagerError::Transport { endpoint, .. } => Some(endpoint),
            RpcManagerError::Timeout { endpoint, .. } => Some(endpoint),
            RpcManagerError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcManagerError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcManagerError::BlockhashNotFound { endpoint } => Some(endpoint),
            RpcManagerError::TransactionExpired { endpoint } => Some(endpoint),
            RpcManagerError::AccountNotFound { endpoint, .. } => Some(endpoint),
            RpcManagerError::InsufficientFunds { endpoint } => Some(endpoint),
            _ => None,
        }
    }

    /// Create from ClientError with context
    ///
    /// `account` names the address being read, when the call was about one.
    pub fn from_client_error(err: ClientError, endpoint: &str, account: Option<&str>) -> Self {
        let err_str = err.to_string().to_lowercase();
        let endpoint = endpoint.to_string();

        if err_str.contains("blockhash not found") {
            RpcManagerError::BlockhashNotFound { endpoint }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            RpcManagerError::TransactionExpired { endpoint }
        } else if err_str.contains("account not found")
            || err_str.contains("accountnotfound")
            || err_str.contains("could not find account")
        {
            RpcManagerError::AccountNotFound {
                account: account.unwrap_or("unknown").to_string(),
                endpoint,
            }
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            RpcManagerError::InsufficientFunds { endpoint }
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            RpcManagerError::RateLimitExceeded { endpoint }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcManagerError::Timeout {
                endpoint,
                timeout_ms: 0,
            }
        } else if matches!(err.kind(), ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_)) {
            RpcManagerError::Transport {
                endpoint,
                message: err.to_string(),
            }
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(',').parse::<i64>().ok());

            RpcManagerError::RpcResponse {
                endpoint,
                message: err.to_string(),
                code,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(msg: &str) -> ClientError {
        ClientError::from(ClientErrorKind::Custom(msg.to_string()))
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(RpcManagerError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(RpcManagerError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 5000,
        }
        .is_retryable());

        assert!(!RpcManagerError::Configuration("test".to_string()).is_retryable());
        assert!(!RpcManagerError::TransactionExpired {
            endpoint: "test".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_missing_token_account_is_classified() {
        let err = RpcManagerError::from_client_error(
            custom("Invalid param: could not find account"),
            "https://rpc.test",
            Some("Ata111"),
        );
        assert!(err.is_account_not_found());
        assert!(err.to_string().contains("Ata111"));
        assert_eq!(err.endpoint(), Some("https://rpc.test"));
    }

    #[test]
    fn test_classification_by_message() {
        let err = RpcManagerError::from_client_error(custom("Blockhash not found"), "e", None);
        assert!(matches!(err, RpcManagerError::BlockhashNotFound { .. }));

        let err = RpcManagerError::from_client_error(custom("429 Too Many Requests"), "e", None);
        assert!(matches!(err, RpcManagerError::RateLimitExceeded { .. }));

        let err = RpcManagerError::from_client_error(custom("something odd"), "e", None);
        assert!(matches!(err, RpcManagerError::RpcResponse { code: None, .. }));
    }
}
