//! Wallet persistence
//!
//! Each role has one keypair file under the wallet directory. Files hold the
//! 64-byte secret as a base58 JSON string; the Solana CLI's JSON byte array
//! is accepted on read.

use std::fs;
use std::path::{Path, PathBuf};

use solana_sdk::signature::{Keypair, Signer};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletRole {
    Creator,
    Second,
    Third,
    Mint,
}

impl WalletRole {
    pub const ALL: [WalletRole; 4] = [
        WalletRole::Creator,
        WalletRole::Second,
        WalletRole::Third,
        WalletRole::Mint,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            WalletRole::Creator => "creator.json",
            WalletRole::Second => "second.json",
            WalletRole::Third => "third.json",
            WalletRole::Mint => "mintAddr.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletRole::Creator => "creator",
            WalletRole::Second => "second",
            WalletRole::Third => "third",
            WalletRole::Mint => "mint",
        }
    }
}

impl std::fmt::Display for WalletRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for WalletRole {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creator" => Ok(WalletRole::Creator),
            "second" => Ok(WalletRole::Second),
            "third" => Ok(WalletRole::Third),
            "mint" => Ok(WalletRole::Mint),
            other => Err(WalletError::InvalidKey(format!("unknown wallet role '{other}'"))),
        }
    }
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("{role} wallet not found at {path}")]
    NotFound { role: WalletRole, path: PathBuf },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid keypair in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid keypair: {0}")]
    InvalidKey(String),
}

pub trait WalletStore: Send + Sync {
    fn load(&self, role: WalletRole) -> Result<Keypair, WalletError>;

    fn save(&self, role: WalletRole, keypair: &Keypair) -> Result<(), WalletError>;
}

/// Keypair files in one directory, named by role
#[derive(Debug, Clone)]
pub struct FileWalletStore {
    dir: PathBuf,
}

impl FileWalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, role: WalletRole) -> PathBuf {
        self.dir.join(role.file_name())
    }
}

impl WalletStore for FileWalletStore {
    fn load(&self, role: WalletRole) -> Result<Keypair, WalletError> {
        let path = self.path_for(role);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WalletError::NotFound { role, path })
            }
            Err(source) => return Err(WalletError::Io { path, source }),
        };
        parse_keypair(&contents).map_err(|e| WalletError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    fn save(&self, role: WalletRole, keypair: &Keypair) -> Result<(), WalletError> {
        fs::create_dir_all(&self.dir).map_err(|source| WalletError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(role);
        let encoded = serde_json::to_string(&encode_keypair(keypair))
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        fs::write(&path, encoded).map_err(|source| WalletError::Io {
            path: path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(|source| WalletError::Io { path, source })?;
        }
        Ok(())
    }
}

/// Base58 of the 64-byte secret key.
pub fn encode_keypair(keypair: &Keypair) -> String {
    bs58::encode(keypair.to_bytes()).into_string()
}

/// Parses a JSON base58 string, a JSON byte array, or bare base58 text.
pub fn parse_keypair(contents: &str) -> Result<Keypair, WalletError> {
    let trimmed = contents.trim();
    let bytes: Vec<u8> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| WalletError::InvalidKey(e.to_string()))?
    } else {
        let text = if trimmed.starts_with('"') {
            serde_json::from_str::<String>(trimmed)
                .map_err(|e| WalletError::InvalidKey(e.to_string()))?
        } else {
            trimmed.to_string()
        };
        bs58::decode(text.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidKey(format!("bad base58: {e}")))?
    };

    if bytes.len() != 64 {
        return Err(WalletError::InvalidKey(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Err(WalletError::InvalidKey("all-zero key rejected".into()));
    }
    Keypair::try_from(bytes.as_slice()).map_err(|e| WalletError::InvalidKey(e.to_string()))
}

/// Generates a keypair for `role` and persists it, replacing any previous one.
pub fn save_new_wallet(store: &dyn WalletStore, role: WalletRole) -> Result<Keypair, WalletError> {
    let keypair = Keypair::new();
    store.save(role, &keypair)?;
    info!(role = %role, pubkey = %keypair.pubkey(), "New wallet saved");
    Ok(keypair)
}

/// Generates and persists the mint keypair for the next launch.
pub fn create_mint(store: &dyn WalletStore) -> Result<Keypair, WalletError> {
    save_new_wallet(store, WalletRole::Mint)
}
