//! Invocation context passed to every state-changing contract call.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Who is calling and at what block time.
///
/// Contracts never read the wall clock; the engine stamps each invocation
/// with a timestamp from its clock and the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
	/// The authenticated sender of the call.
	pub caller: Address,
	/// Block timestamp in unix seconds.
	pub timestamp: u64,
}

impl CallContext {
	pub fn new(caller: Address, timestamp: u64) -> Self {
		Self { caller, timestamp }
	}

	/// Returns a context for a nested call made by `caller` within the same block.
	pub fn forwarded_by(&self, caller: Address) -> Self {
		Self {
			caller,
			timestamp: self.timestamp,
		}
	}
}
