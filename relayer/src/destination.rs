//! Seams between the dispatch engine and the destination chain.

use crate::error::Result;
use crate::quote::WhirlpoolRoute;
use crate::types::AssetRepresentation;
use crate::vaa::ParsedTransfer;
use async_trait::async_trait;
use thiserror::Error;

/// Program log emitted when the posted message account does not exist yet.
pub const MESSAGE_NOT_VERIFIED_MARKER: &str = "vaa. Error Code: AccountNotInitialized";

/// Program log emitted when the swap output is under the quoted minimum.
pub const SLIPPAGE_MARKER: &str = "AmountOutBelowMinimum";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message not verified on-chain: {0}")]
    MessageNotVerified(String),

    #[error("swap output below minimum: {0}")]
    SlippageExceeded(String),

    #[error("{0}")]
    Other(String),
}

impl SubmitError {
    /// Classify a failure by the markers in its text and program logs.
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.contains(MESSAGE_NOT_VERIFIED_MARKER) {
            SubmitError::MessageNotVerified(text)
        } else if text.contains(SLIPPAGE_MARKER) {
            SubmitError::SlippageExceeded(text)
        } else {
            SubmitError::Other(text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Release the bridged asset to the receiver as-is.
    WithoutSwap { skip_verify: bool },
    /// Release and swap through a whirlpool in the same transaction.
    WithSwap { route: WhirlpoolRoute },
}

impl Completion {
    pub fn name(&self, asset: AssetRepresentation) -> &'static str {
        match (self, asset) {
            (Completion::WithoutSwap { .. }, AssetRepresentation::Native) => {
                "RedeemNativeWithoutSwap"
            }
            (Completion::WithoutSwap { .. }, AssetRepresentation::Wrapped) => {
                "RedeemWrappedWithoutSwap"
            }
            (Completion::WithSwap { .. }, AssetRepresentation::Native) => "RedeemNativeWithSwap",
            (Completion::WithSwap { .. }, AssetRepresentation::Wrapped) => "RedeemWrappedWithSwap",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Destination: Send + Sync {
    /// Which completion variant applies to the bridged asset.
    async fn asset_representation(
        &self,
        transfer: &ParsedTransfer,
    ) -> std::result::Result<AssetRepresentation, SubmitError>;

    /// Submit a completion and return the destination transaction signature.
    async fn complete(
        &self,
        transfer: &ParsedTransfer,
        asset: AssetRepresentation,
        completion: &Completion,
    ) -> std::result::Result<String, SubmitError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePoster: Send + Sync {
    /// Verify and post the signed message with the core bridge.
    async fn post_message(&self, vaa: &[u8]) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteQuoter: Send + Sync {
    /// Quote the single swap step of `transfer`.
    async fn quote(&self, transfer: &ParsedTransfer) -> Result<WhirlpoolRoute>;
}
