use crate::reward::RewardTier;

pub const VICTORY_CONTRACT_ADDRESS: &str = "0x98b09019c91cd15f4ddc6e5f2d13426f66fcb728";
pub const MINT_FUNCTION: &str = "mintVictoryNFT";
pub const EXPLORER_TX_BASE: &str = "https://monad-testnet.socialscan.io/tx/";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MintError {
    #[error("Please connect your wallet first")]
    WalletNotConnected,
    #[error("no victory to mint for")]
    NoVictory,
    #[error("a mint is already in flight")]
    AlreadyMinting,
    #[error("this victory was already minted")]
    AlreadyMinted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub recipient: String,
    pub tier: RewardTier,
}

impl MintRequest {
    pub fn for_victory(wallet: Option<&str>, tier: RewardTier) -> Result<Self, MintError> {
        let recipient = wallet
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or(MintError::WalletNotConnected)?;
        Ok(Self {
            recipient: recipient.to_string(),
            tier,
        })
    }

    /// `uint8` level argument of the contract call.
    pub fn level(&self) -> u8 {
        self.tier.level()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    Minted { tx_hash: String },
    Failed { message: String },
}

pub type MintCallback = Box<dyn FnOnce(MintOutcome) + Send + 'static>;

/// Wallet-side contract call. Implementations must not block; the outcome
/// arrives through `on_done`, possibly on another task.
pub trait MintAdapter {
    fn mint(&mut self, request: MintRequest, on_done: MintCallback);
}

/// Local, per-notice mint progress. Never written to shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MintStatus {
    #[default]
    Idle,
    Minting,
    Minted { tx_hash: String },
    Failed { message: String },
}

impl MintStatus {
    pub fn can_start(&self) -> Result<(), MintError> {
        match self {
            MintStatus::Idle | MintStatus::Failed { .. } => Ok(()),
            MintStatus::Minting => Err(MintError::AlreadyMinting),
            MintStatus::Minted { .. } => Err(MintError::AlreadyMinted),
        }
    }

    pub fn finish(&mut self, outcome: MintOutcome) {
        if *self != MintStatus::Minting {
            tracing::debug!(status = ?self, "ignoring mint outcome without a pending mint");
            return;
        }
        *self = match outcome {
            MintOutcome::Minted { tx_hash } => MintStatus::Minted { tx_hash },
            MintOutcome::Failed { message } => MintStatus::Failed { message },
        };
    }
}

pub fn explorer_url(tx_hash: &str) -> String {
    format!("{EXPLORER_TX_BASE}{tx_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_needs_wallet() {
        assert_eq!(
            MintRequest::for_victory(None, RewardTier::Swift),
            Err(MintError::WalletNotConnected)
        );
        assert_eq!(
            MintRequest::for_victory(Some("  "), RewardTier::Swift),
            Err(MintError::WalletNotConnected)
        );
        let request = MintRequest::for_victory(Some("0xabc"), RewardTier::Lightning)
            .expect("wallet present");
        assert_eq!(request.level(), 3);
        assert_eq!(MintError::WalletNotConnected.to_string(), "Please connect your wallet first");
    }

    #[test]
    fn status_transitions() {
        let mut status = MintStatus::Idle;
        assert_eq!(status.can_start(), Ok(()));
        status = MintStatus::Minting;
        assert_eq!(status.can_start(), Err(MintError::AlreadyMinting));
        status.finish(MintOutcome::Failed {
            message: "user rejected".to_string(),
        });
        assert_eq!(status.can_start(), Ok(()));
        status = MintStatus::Minting;
        status.finish(MintOutcome::Minted {
            tx_hash: "0x01".to_string(),
        });
        assert_eq!(status.can_start(), Err(MintError::AlreadyMinted));
        status.finish(MintOutcome::Failed {
            message: "late".to_string(),
        });
        assert_eq!(
            status,
            MintStatus::Minted {
                tx_hash: "0x01".to_string()
            }
        );
    }

    #[test]
    fn explorer_link() {
        assert_eq!(
            explorer_url("0xfeed"),
            "https://monad-testnet.socialscan.io/tx/0xfeed"
        );
    }
}
