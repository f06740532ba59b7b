//! HTTP API types and handlers.
//!
//! Errors are reported as `{ "error": kind, "message": text }` with a status
//! code derived from the kind of refusal.

pub mod relay;
pub mod user;

use alloy_primitives::Address;
use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use panic_core::EngineError;
use panic_relay::RelayError;
use panic_token::TokenError;
use panic_types::OwnershipError;
use panic_vault::VaultError;
use serde::{Deserialize, Serialize};

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error kind, e.g. `NONCE_MISMATCH`
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// The call was refused by a contract precondition (400)
	BadRequest { error_type: String, message: String },
	/// The caller lacks the required role (403)
	Forbidden { error_type: String, message: String },
	/// No contract at the requested address (404)
	NotFound { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::Forbidden { .. } => StatusCode::FORBIDDEN,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::Forbidden {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

/// Parses an address taken from a request path.
pub fn parse_address(raw: &str) -> Result<Address, APIError> {
	raw.parse()
		.map_err(|_| APIError::bad_request("INVALID_ADDRESS", format!("Invalid address: {}", raw)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
	Refused,
	AccessControl,
	Missing,
	Internal,
}

fn ownership_kind(e: &OwnershipError) -> (Class, &'static str) {
	match e {
		OwnershipError::NotOwner { .. } => (Class::AccessControl, "NOT_OWNER"),
		OwnershipError::ZeroAddress => (Class::Refused, "ZERO_ADDRESS"),
	}
}

fn token_kind(e: &TokenError) -> (Class, &'static str) {
	match e {
		TokenError::InsufficientBalance { .. } => (Class::Refused, "INSUFFICIENT_BALANCE"),
		TokenError::InsufficientAllowance { .. } => (Class::Refused, "INSUFFICIENT_ALLOWANCE"),
		TokenError::ZeroAddress => (Class::Refused, "ZERO_ADDRESS"),
		TokenError::NotController { .. } => (Class::AccessControl, "NOT_CONTROLLER"),
		TokenError::Ownership(e) => ownership_kind(e),
		TokenError::Reverted(_) => (Class::Refused, "TOKEN_REVERTED"),
	}
}

fn vault_kind(e: &VaultError) -> (Class, &'static str) {
	match e {
		VaultError::ZeroAddress => (Class::Refused, "ZERO_ADDRESS"),
		VaultError::InvalidInput { .. } => (Class::Refused, "INVALID_INPUT"),
		VaultError::SafeAddressRequired { .. } => (Class::Refused, "SAFE_ADDRESS_REQUIRED"),
		VaultError::SafeAddressMismatch { .. } => (Class::Refused, "SAFE_ADDRESS_MISMATCH"),
		VaultError::DeadlineExpired { .. } => (Class::Refused, "DEADLINE_EXPIRED"),
		VaultError::NonceMismatch { .. } => (Class::Refused, "NONCE_MISMATCH"),
		VaultError::InvalidSignature(_) => (Class::Refused, "INVALID_SIGNATURE"),
		VaultError::UnauthorizedCaller { .. } => (Class::AccessControl, "UNAUTHORIZED_CALLER"),
		VaultError::FeeTokenMissing(_) => (Class::Internal, "FEE_TOKEN_MISSING"),
		VaultError::FeeBurn(e) => token_kind(e),
		VaultError::Ownership(e) => ownership_kind(e),
	}
}

fn engine_kind(e: &EngineError) -> (Class, &'static str) {
	match e {
		EngineError::Token(e) => token_kind(e),
		EngineError::Vault(e) => vault_kind(e),
		EngineError::Relay(RelayError::NotRelayer { .. }) => (Class::AccessControl, "NOT_RELAYER"),
		EngineError::Relay(RelayError::ZeroAddress) => (Class::Refused, "ZERO_ADDRESS"),
		EngineError::Relay(RelayError::VaultMismatch { .. }) => (Class::Internal, "VAULT_MISMATCH"),
		EngineError::Relay(RelayError::Vault(e)) => vault_kind(e),
		EngineError::Relay(RelayError::Ownership(e)) => ownership_kind(e),
		EngineError::Storage(_) => (Class::Internal, "STORAGE_ERROR"),
		EngineError::Account(_) => (Class::Internal, "ACCOUNT_ERROR"),
		EngineError::UnknownToken(_) => (Class::Missing, "UNKNOWN_TOKEN"),
		EngineError::UnknownContract(_) => (Class::Missing, "UNKNOWN_CONTRACT"),
	}
}

impl From<EngineError> for APIError {
	fn from(e: EngineError) -> Self {
		let (class, kind) = engine_kind(&e);
		let error_type = kind.to_string();
		let message = e.to_string();
		match class {
			Class::Refused => APIError::BadRequest {
				error_type,
				message,
			},
			Class::AccessControl => APIError::Forbidden {
				error_type,
				message,
			},
			Class::Missing => APIError::NotFound {
				error_type,
				message,
			},
			Class::Internal => APIError::InternalServerError {
				error_type,
				message,
			},
		}
	}
}
