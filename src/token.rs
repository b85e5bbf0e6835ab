//! Compact bearer-token codec (JWT, HMAC family).
//!
//! The codec only answers "is this a well-formed token with a valid
//! signature?". Expiry, issuer, audience, and revocation are business rules
//! checked by the login manager on top of a successful decode.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

/// Supported signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub alg: String,
    pub typ: String,
    /// Caller-supplied extra header fields, carried verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    fn new(algorithm: Algorithm, extra: Map<String, Value>) -> Self {
        Self {
            alg: algorithm.name().to_string(),
            typ: "JWT".to_string(),
            extra,
        }
    }
}

/// Claims carried by every token this core issues. `jit` is the revocable
/// ticket id; `iss` is the issuing manager's process-lifetime id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub jit: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn hmac_sign(algorithm: Algorithm, key: &[u8], input: &[u8]) -> Result<Vec<u8>, TokenError> {
    match algorithm {
        Algorithm::HS256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::HS384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::HS512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    }
}

fn hmac_verify(
    algorithm: Algorithm,
    key: &[u8],
    input: &[u8],
    signature: &[u8],
) -> Result<(), TokenError> {
    match algorithm {
        Algorithm::HS256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            mac.verify_slice(signature)
                .map_err(|_| TokenError::InvalidSignature)
        }
        Algorithm::HS384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            mac.verify_slice(signature)
                .map_err(|_| TokenError::InvalidSignature)
        }
        Algorithm::HS512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|_| TokenError::Key)?;
            mac.update(input);
            mac.verify_slice(signature)
                .map_err(|_| TokenError::InvalidSignature)
        }
    }
}

/// Create a signed token in compact serialization.
///
/// # Errors
///
/// Returns an error if the header/claims cannot be encoded or the signing
/// key is rejected.
pub fn sign(
    algorithm: Algorithm,
    key: &[u8],
    claims: &Claims,
    extra_headers: Map<String, Value>,
) -> Result<String, TokenError> {
    let header = Header::new(algorithm, extra_headers);
    let header_b64 = b64e_json(&header)?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = hmac_sign(algorithm, key, signing_input.as_bytes())?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

fn split(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    let header = parts.next().ok_or(TokenError::TokenFormat)?;
    let claims = parts.next().ok_or(TokenError::TokenFormat)?;
    let signature = parts.next().ok_or(TokenError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(TokenError::TokenFormat);
    }
    Ok((header, claims, signature))
}

/// Verify structure and signature and return the decoded header and claims.
///
/// # Errors
///
/// Returns an error if the token is malformed, the header names a different
/// algorithm than expected, a required claim is missing, or the signature
/// does not match.
pub fn verify(token: &str, algorithm: Algorithm, key: &[u8]) -> Result<(Header, Claims), TokenError> {
    let (header_b64, claims_b64, signature_b64) = split(token)?;

    let header: Header = b64d_json(header_b64)?;
    if header.alg != algorithm.name() {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Base64)?;
    hmac_verify(algorithm, key, signing_input.as_bytes(), &signature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    Ok((header, claims))
}

/// Decode the claims segment without verifying anything.
///
/// The result is untrusted input: the caller may use it only to select a
/// verification key (the `aud` record's salt), never to authorize.
///
/// # Errors
///
/// Returns an error if the compact structure or the claims JSON is invalid.
pub fn peek_claims(token: &str) -> Result<Claims, TokenError> {
    let (_, claims_b64, _) = split(token)?;
    b64d_json(claims_b64)
}
