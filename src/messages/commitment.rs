// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    codec::Canonical,
    errors::{CallerError, Result},
    keys::{sign_message, verify_message, StakeholderId, VssPublicKey},
    phase::EpochIndex,
    pvss::{
        gen_shared_secret, verify_enc_share, verify_secret_proof, EncryptedShare, Secret,
        SecretProof,
    },
    utils::ParseBytes,
};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::error;

/// A stakeholder's escrow of its seed contribution: the public PVSS dealing
/// payload, the consistency proof, and one encrypted share per intended
/// recipient, keyed by the recipient's VSS public key.
///
/// Share order is significant: the position of a pair in `shares` is the
/// share's id in the dealing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    extra: crate::pvss::Extra,
    proof: SecretProof,
    shares: Vec<(VssPublicKey, EncryptedShare)>,
}

impl Commitment {
    /// The encrypted shares, in dealing order.
    pub fn shares(&self) -> &[(VssPublicKey, EncryptedShare)] {
        &self.shares
    }

    /// The intended recipients of this commitment's shares.
    pub fn vss_keys(&self) -> impl Iterator<Item = &VssPublicKey> {
        self.shares.iter().map(|(key, _)| key)
    }

    /// Look up the encrypted share addressed to `recipient`.
    pub fn find_share(&self, recipient: &VssPublicKey) -> Option<&EncryptedShare> {
        self.shares
            .iter()
            .find(|(key, _)| key == recipient)
            .map(|(_, share)| share)
    }

    /// The PVSS dealing payload.
    pub(crate) fn extra(&self) -> &crate::pvss::Extra {
        &self.extra
    }

    /// True iff the commitment distributes at least one share and every
    /// encrypted share sits at its dealing position and verifies under its
    /// paired VSS key. A shareless commitment escrows nothing anyone could
    /// recover, so it is not well-formed.
    pub fn verify(&self) -> bool {
        !self.shares.is_empty()
            && self.shares.iter().enumerate().all(|(position, (key, share))| {
                share.id() == position as u64 && verify_enc_share(&self.extra, key, share)
            })
    }
}

/// The secret a stakeholder reveals during the opening phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    secret: Secret,
}

impl Opening {
    /// The revealed secret.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

/// True iff `opening` reveals the secret committed by `commitment`.
pub fn verify_opening(commitment: &Commitment, opening: &Opening) -> bool {
    verify_secret_proof(&commitment.extra, &opening.secret, &commitment.proof)
}

/// Generate a commitment/opening pair escrowing a fresh secret to the given
/// recipients with the given recovery threshold.
pub fn gen_commitment_and_opening<R: RngCore + CryptoRng>(
    rng: &mut R,
    threshold: usize,
    vss_keys: &[VssPublicKey],
) -> Result<(Commitment, Opening)> {
    let (extra, secret, proof, shares) = gen_shared_secret(rng, threshold, vss_keys)?;
    let shares = vss_keys.iter().copied().zip(shares).collect();
    Ok((
        Commitment {
            extra,
            proof,
            shares,
        },
        Opening { secret },
    ))
}

/// A commitment wrapped with its author's verifying key and a signature
/// binding it to an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCommitment {
    public_key: VerifyingKey,
    commitment: Commitment,
    signature: Signature,
}

fn signing_bytes(epoch: EpochIndex, commitment: &Commitment) -> Vec<u8> {
    let mut message = Vec::new();
    epoch.append_to(&mut message);
    commitment.append_to(&mut message);
    message
}

impl SignedCommitment {
    /// Sign `commitment` for `epoch`.
    pub fn create(
        signing_key: &SigningKey,
        epoch: EpochIndex,
        commitment: Commitment,
    ) -> Result<Self> {
        let signature = sign_message(signing_key, &signing_bytes(epoch, &commitment))?;
        Ok(Self {
            public_key: *signing_key.verifying_key(),
            commitment,
            signature,
        })
    }

    /// The author's verifying key.
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// The wrapped commitment.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// The author's stakeholder id.
    pub fn stakeholder_id(&self) -> StakeholderId {
        StakeholderId::from_verifying_key(&self.public_key)
    }

    /// True iff the signature is valid for this commitment at `epoch` under
    /// the embedded verifying key.
    pub fn verify_signature(&self, epoch: EpochIndex) -> bool {
        verify_message(
            &self.public_key,
            &signing_bytes(epoch, &self.commitment),
            &self.signature,
        )
    }

    /// Check both the signature and the commitment itself, collecting every
    /// violation rather than stopping at the first. Failing messages are
    /// rejected either way; reporting all reasons makes rejection logs
    /// actionable.
    pub fn verify(&self, epoch: EpochIndex) -> std::result::Result<(), CommitmentViolations> {
        let mut violations = Vec::new();
        if !self.verify_signature(epoch) {
            violations.push(CommitmentViolation::BadSignature);
        }
        if !self.commitment.verify() {
            violations.push(CommitmentViolation::BadCommitment);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CommitmentViolations(violations))
        }
    }
}

/// A single reason a signed commitment failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommitmentViolation {
    /// The epoch-bound signature did not verify.
    #[error("the commitment signature is invalid for this epoch")]
    BadSignature,
    /// At least one encrypted share failed public verification.
    #[error("the commitment contains an invalid encrypted share")]
    BadCommitment,
}

/// Every reason a signed commitment failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CommitmentViolations(
    /// The individual violations, in check order.
    pub Vec<CommitmentViolation>,
);

impl Display for CommitmentViolations {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
            first = false;
        }
        Ok(())
    }
}

impl Canonical for Commitment {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.extra.append_to(out);
        self.proof.append_to(out);
        crate::codec::append_len(out, self.shares.len());
        for (key, share) in &self.shares {
            key.append_to(out);
            share.append_to(out);
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let extra = crate::pvss::Extra::parse(parser)?;
        let proof = SecretProof::parse(parser)?;
        let count = parser.take_count()?;
        if count == 0 {
            error!("Encoded commitment distributes no shares");
            Err(CallerError::DeserializationFailed)?;
        }
        let mut shares = Vec::new();
        let mut seen = HashSet::new();
        for _ in 0..count {
            let key = VssPublicKey::parse(parser)?;
            let share = EncryptedShare::parse(parser)?;
            if !seen.insert(key.to_bytes()) {
                error!("Encoded commitment repeats a recipient VSS key");
                Err(CallerError::DeserializationFailed)?;
            }
            shares.push((key, share));
        }
        Ok(Self {
            extra,
            proof,
            shares,
        })
    }
}

impl Canonical for Opening {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.secret.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Ok(Self {
            secret: Secret::parse(parser)?,
        })
    }
}

impl Canonical for SignedCommitment {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.public_key.append_to(out);
        self.commitment.append_to(out);
        self.signature.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let public_key = VerifyingKey::parse(parser)?;
        let commitment = Commitment::parse(parser)?;
        let signature = Signature::parse(parser)?;
        Ok(Self {
            public_key,
            commitment,
            signature,
        })
    }
}

impl_serde_via_canonical!(Commitment);
impl_serde_via_canonical!(Opening);
impl_serde_via_canonical!(SignedCommitment);
