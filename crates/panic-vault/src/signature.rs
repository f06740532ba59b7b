//! Signer recovery for relay authorizations.
//!
//! Pure functions over a digest and a 65-byte `r || s || v` signature;
//! independent of vault storage.

use alloy_primitives::{uint, Address, Signature, B256, U256};
use thiserror::Error;

/// Half the secp256k1 group order. Signatures with `s` above it are malleable.
const SECP256K1N_HALF: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Why a signature could not be turned into a signer address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
	#[error("Invalid signature length: {0}")]
	InvalidLength(usize),
	#[error("Invalid recovery byte: {0}")]
	InvalidRecoveryId(u8),
	#[error("Signature s value is in the upper half of the curve order")]
	MalleableS,
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
}

/// Recovers the address that produced `signature` over `digest`.
///
/// Accepts `v` as 27/28 or 0/1. Rejects high-`s` signatures.
pub fn recover_signer(digest: &B256, signature: &[u8]) -> Result<Address, SignatureError> {
	if signature.len() != 65 {
		return Err(SignatureError::InvalidLength(signature.len()));
	}

	let v = signature[64];
	if !matches!(v, 0 | 1 | 27 | 28) {
		return Err(SignatureError::InvalidRecoveryId(v));
	}

	let s = U256::from_be_slice(&signature[32..64]);
	if s > SECP256K1N_HALF {
		return Err(SignatureError::MalleableS);
	}

	let parsed =
		Signature::try_from(signature).map_err(|e| SignatureError::Recovery(e.to_string()))?;
	parsed
		.recover_address_from_prehash(digest)
		.map_err(|e| SignatureError::Recovery(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;

	fn sign(signer: &PrivateKeySigner, digest: &B256) -> Vec<u8> {
		signer.sign_hash_sync(digest).unwrap().as_bytes().to_vec()
	}

	#[test]
	fn test_recovers_signer() {
		let signer = PrivateKeySigner::random();
		let digest = B256::repeat_byte(0x42);

		let recovered = recover_signer(&digest, &sign(&signer, &digest)).unwrap();
		assert_eq!(recovered, signer.address());
	}

	#[test]
	fn test_recovery_is_bound_to_digest() {
		let signer = PrivateKeySigner::random();
		let signature = sign(&signer, &B256::repeat_byte(0x42));

		let recovered = recover_signer(&B256::repeat_byte(0x43), &signature);
		assert_ne!(recovered, Ok(signer.address()));
	}

	#[test]
	fn test_accepts_zero_one_recovery_byte() {
		let signer = PrivateKeySigner::random();
		let digest = B256::repeat_byte(0x07);
		let mut signature = sign(&signer, &digest);
		signature[64] -= 27;

		assert_eq!(recover_signer(&digest, &signature), Ok(signer.address()));
	}

	#[test]
	fn test_rejects_malformed_signatures() {
		let digest = B256::repeat_byte(0x01);

		assert_eq!(
			recover_signer(&digest, &[]),
			Err(SignatureError::InvalidLength(0))
		);
		assert_eq!(
			recover_signer(&digest, &[0u8; 64]),
			Err(SignatureError::InvalidLength(64))
		);

		let signer = PrivateKeySigner::random();
		let mut signature = sign(&signer, &digest);
		signature[64] = 29;
		assert_eq!(
			recover_signer(&digest, &signature),
			Err(SignatureError::InvalidRecoveryId(29))
		);
	}

	#[test]
	fn test_rejects_high_s() {
		let signer = PrivateKeySigner::random();
		let digest = B256::repeat_byte(0x09);
		let mut signature = sign(&signer, &digest);
		signature[32..64].copy_from_slice(&[0xff; 32]);

		assert_eq!(
			recover_signer(&digest, &signature),
			Err(SignatureError::MalleableS)
		);
	}
}
