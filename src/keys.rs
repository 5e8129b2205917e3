// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Stakeholder identities, signing keys, and VSS key pairs.
//!
//! Stakeholders are identified by the Keccak256 digest of their compressed
//! ECDSA verifying key. Separately from the signing key, each participant
//! holds a VSS key pair for the secret sharing scheme; the public half is
//! announced to the other participants through a [`VssCertificate`]
//! (see [`crate::messages`]).

use crate::{
    codec::Canonical,
    curve::{CurvePoint, POINT_LENGTH},
    errors::{CallerError, InternalError, Result},
    utils::ParseBytes,
};
use k256::{
    ecdsa::{
        signature::{DigestSigner, DigestVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    Scalar,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt::{self, Debug, Display, Formatter};
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of a [`StakeholderId`].
pub(crate) const STAKEHOLDER_ID_LENGTH: usize = 32;

/// Byte length of a canonical ECDSA signature encoding.
pub(crate) const SIGNATURE_LENGTH: usize = 64;

/// Identity of a stakeholder: the Keccak256 digest of its compressed
/// verifying key. Equality and ordering are bitwise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StakeholderId([u8; STAKEHOLDER_ID_LENGTH]);

impl StakeholderId {
    /// Derive the identity of the holder of `key`.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest = Keccak256::digest(key.to_encoded_point(true).as_bytes());
        Self(digest.into())
    }

    /// The raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; STAKEHOLDER_ID_LENGTH] {
        &self.0
    }
}

impl Display for StakeholderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // An 8-byte prefix is plenty to tell stakeholders apart in logs.
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for StakeholderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "StakeholderId({self})")
    }
}

impl Canonical for StakeholderId {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let bytes: [u8; STAKEHOLDER_ID_LENGTH] = parser
            .take_bytes(STAKEHOLDER_ID_LENGTH)?
            .try_into()
            .map_err(|_| InternalError::InternalInvariantFailed)?;
        Ok(Self(bytes))
    }
}

/// Public half of a VSS key pair: the point under which encrypted shares
/// addressed to the holder are computed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VssPublicKey(pub(crate) CurvePoint);

impl VssPublicKey {
    /// Compressed byte encoding, used for duplicate detection and hashing.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

impl Canonical for VssPublicKey {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_bytes());
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Ok(Self(CurvePoint::try_from_bytes(
            parser.take_bytes(POINT_LENGTH)?,
        )?))
    }
}

/// Secret half of a VSS key pair.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VssSecretKey(pub(crate) Scalar);

impl VssSecretKey {
    /// Sample a fresh VSS key pair.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(Self(crate::curve::random_nonzero_scalar(rng)?))
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> VssPublicKey {
        VssPublicKey(CurvePoint::GENERATOR.multiply_by_scalar(&self.0))
    }
}

impl Debug for VssSecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VssSecretKey").field(&"[redacted]").finish()
    }
}

/// Sign the canonical bytes of a message with a stakeholder signing key.
pub(crate) fn sign_message(signing_key: &SigningKey, message: &[u8]) -> Result<Signature> {
    signing_key
        .try_sign_digest(Keccak256::new_with_prefix(message))
        .map_err(|_| {
            error!("ECDSA signing failed");
            InternalError::InternalInvariantFailed
        })
}

/// Verify a stakeholder signature over the canonical bytes of a message.
pub(crate) fn verify_message(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> bool {
    verifying_key
        .verify_digest(Keccak256::new_with_prefix(message), signature)
        .is_ok()
}

impl Canonical for Signature {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Signature::from_slice(parser.take_bytes(SIGNATURE_LENGTH)?).map_err(|_| {
            error!("Failed to decode bytes as an ECDSA signature");
            CallerError::DeserializationFailed.into()
        })
    }
}

impl Canonical for VerifyingKey {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.to_encoded_point(true).as_bytes());
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        VerifyingKey::from_sec1_bytes(parser.take_bytes(POINT_LENGTH)?).map_err(|_| {
            error!("Failed to decode bytes as a verifying key");
            CallerError::DeserializationFailed.into()
        })
    }
}
