//! Treasury gateway seam.
//!
//! The treasury is an external on-chain contract exposing three
//! symmetric token-transfer actions against one address and amount.
//! The core holds no state about past payouts: idempotency for treasury
//! actions is delegated entirely to the treasury system, and the only
//! local trace of an action is its transaction identifier, logged and
//! surfaced in an issue comment.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

/// The three treasury transfer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreasuryVerb {
    /// Reserve a reward for an assignee.
    Assign,
    /// Reverse a previously assigned reward.
    Reverse,
    /// Release a reward on work completion.
    Release,
}

impl TreasuryVerb {
    /// Contract method name.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Reverse => "reverse",
            Self::Release => "release",
        }
    }

    /// Past-tense form used in issue comments and logs.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Assign => "assigned",
            Self::Reverse => "reversed",
            Self::Release => "released",
        }
    }

    /// Noun used in issue comments; release speaks of the payout
    /// itself, the other two of the conclusion payout being reserved.
    #[must_use]
    pub const fn comment_noun(self) -> &'static str {
        match self {
            Self::Assign | Self::Reverse => "conclusion payout",
            Self::Release => "payout",
        }
    }
}

impl fmt::Display for TreasuryVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Errors surfaced by the treasury gateway.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TreasuryError {
    /// The node rejected the call.
    #[error("treasury RPC error: {message}")]
    Rpc {
        /// Error message from the node.
        message: String,
    },

    /// The request never completed.
    #[error("treasury transport error: {0}")]
    Transport(String),

    /// The response did not match the expected shape.
    #[error("malformed treasury response: {0}")]
    Decode(String),

    /// The wallet address could not be encoded as a call argument.
    #[error("invalid wallet address: {address}")]
    InvalidAddress {
        /// The offending address.
        address: String,
    },
}

/// Narrow interface to the on-chain treasury.
#[async_trait]
pub trait TreasuryGateway: Send + Sync {
    /// Executes one transfer action and returns the transaction
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`TreasuryError`] when the transaction is rejected or
    /// the node is unreachable. No retry and no compensating action is
    /// performed by callers.
    async fn execute(
        &self,
        verb: TreasuryVerb,
        wallet: &str,
        amount: u128,
    ) -> Result<String, TreasuryError>;

    /// Returns the current chain height, used as the vote-counting
    /// reference point for new proposals.
    ///
    /// # Errors
    ///
    /// Returns a [`TreasuryError`] when the node is unreachable.
    async fn block_height(&self) -> Result<u64, TreasuryError>;
}

/// Formats a base-unit amount as a decimal token amount.
///
/// Trailing fractional zeros are trimmed; whole amounts render without
/// a fraction.
#[must_use]
pub fn format_amount(amount: u128, decimals: u32) -> String {
    let base = 10u128.pow(decimals);
    let whole = amount / base;
    let fraction = amount % base;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = decimals as usize);
    let trimmed = digits.trim_end_matches('0');
    format!("{whole}.{trimmed}")
}

/// One recorded call on a [`MockTreasury`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryCall {
    /// The verb that was executed.
    pub verb: TreasuryVerb,
    /// Target wallet address.
    pub wallet: String,
    /// Amount in base units.
    pub amount: u128,
}

/// In-memory treasury for tests.
///
/// Returns predictable transaction identifiers and records every call.
#[derive(Debug, Default)]
pub struct MockTreasury {
    calls: Mutex<Vec<TreasuryCall>>,
    counter: AtomicU64,
    fail: AtomicBool,
    height: AtomicU64,
}

impl MockTreasury {
    /// Creates a mock treasury.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `execute` call fail.
    pub fn fail_transactions(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Sets the reported chain height.
    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<TreasuryCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TreasuryGateway for MockTreasury {
    async fn execute(
        &self,
        verb: TreasuryVerb,
        wallet: &str,
        amount: u128,
    ) -> Result<String, TreasuryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TreasuryError::Rpc {
                message: "mock transaction rejected".to_string(),
            });
        }
        let call = TreasuryCall {
            verb,
            wallet: wallet.to_string(),
            amount,
        };
        match self.calls.lock() {
            Ok(mut guard) => guard.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
        let nonce = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0xmock{nonce:04x}"))
    }

    async fn block_height(&self) -> Result<u64, TreasuryError> {
        Ok(self.height.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_amounts_without_fraction() {
        assert_eq!(format_amount(0, 18), "0");
        assert_eq!(format_amount(5_000_000_000_000_000_000, 18), "5");
    }

    #[test]
    fn formats_fractions_with_trimmed_zeros() {
        assert_eq!(format_amount(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(format_amount(25, 18), "0.000000000000000025");
    }

    #[test]
    fn zero_decimals_formats_as_integer() {
        assert_eq!(format_amount(42, 0), "42");
    }

    #[tokio::test]
    async fn mock_records_calls_and_mints_unique_tx_ids() {
        let treasury = MockTreasury::new();
        let tx1 = treasury.execute(TreasuryVerb::Assign, "0xaaa", 100).await.unwrap();
        let tx2 = treasury.execute(TreasuryVerb::Release, "0xaaa", 100).await.unwrap();
        assert_ne!(tx1, tx2);
        let calls = treasury.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].verb, TreasuryVerb::Assign);
        assert_eq!(calls[1].verb, TreasuryVerb::Release);
    }
}
