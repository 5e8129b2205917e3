// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Publicly verifiable secret sharing over secp256k1.
//!
//! This module is the crate's cryptographic trust boundary: the rest of the
//! protocol treats its operations as opaque primitives.
//!
//! # High-level scheme description
//! A dealer who wants to escrow a secret among `n` recipients so that any
//! `t` of them can recover it proceeds as follows:
//! - Sample a fresh generator `h` and a random polynomial `p` of degree
//!   `t-1`. The escrowed secret is the group element `S = p(0)·G`.
//! - Publish coefficient commitments `Cⱼ = aⱼ·h` (the [`Extra`] payload)
//!   and, for recipient `i` holding VSS public key `vpkᵢ`, the encrypted
//!   share `Yᵢ = p(xᵢ)·vpkᵢ` where `xᵢ = i+1`.
//! - Attach to each encrypted share a proof of discrete-log equality
//!   between `Yᵢ` and `Xᵢ = p(xᵢ)·h`, where any observer can compute `Xᵢ`
//!   from the coefficient commitments. This makes the sharing *publicly*
//!   verifiable: no secret material is needed to check that every recipient
//!   can decrypt a consistent share.
//! - Attach a [`SecretProof`] tying the escrowed secret to `C₀`, so that a
//!   later revelation of `S` can be checked against the original dealing.
//!
//! Recipient `i` decrypts its share as `Sᵢ = skᵢ⁻¹·Yᵢ = p(xᵢ)·G`, again
//! with a proof of correct decryption, and any `t` decrypted shares
//! recover `S` by Lagrange interpolation in the exponent.

mod dleq;

pub(crate) use dleq::Dleq;

use crate::{
    codec::Canonical,
    curve::{random_nonzero_scalar, random_scalar, CurvePoint, POINT_LENGTH},
    errors::{CallerError, InternalError, Result},
    keys::{VssPublicKey, VssSecretKey},
    utils::ParseBytes,
};
use k256::Scalar;
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::error;
use zeroize::Zeroizing;

const SHARE_PROOF_CONTEXT: &[u8] = b"pvss encrypted share";
const SECRET_PROOF_CONTEXT: &[u8] = b"pvss secret";
const DECRYPT_PROOF_CONTEXT: &[u8] = b"pvss decrypted share";

/// Auxiliary public payload of a dealing: the dealer's fresh generator and
/// its commitments to the sharing polynomial's coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extra {
    generator: CurvePoint,
    commitments: Vec<CurvePoint>,
}

impl Extra {
    /// The recovery threshold this dealing was produced for.
    pub fn threshold(&self) -> usize {
        self.commitments.len()
    }

    /// Evaluate the committed polynomial in the exponent at `x`.
    fn commitment_eval(&self, x: &Scalar) -> CurvePoint {
        self.commitments
            .iter()
            .rev()
            .fold(CurvePoint::IDENTITY, |acc, commitment| {
                acc.multiply_by_scalar(x) + *commitment
            })
    }
}

/// An escrowed secret: the group element recovered when enough shares are
/// combined. Its canonical byte extraction feeds the FTS seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Secret(pub(crate) CurvePoint);

impl Secret {
    /// Canonical Diffie-Hellman byte extraction: the affine x-coordinate of
    /// the secret point.
    pub fn dh_bytes(&self) -> [u8; 32] {
        self.0.x_affine().into()
    }
}

/// Proof that a revealed [`Secret`] is the one committed by a dealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretProof(Dleq);

/// A share of an escrowed secret, encrypted to one recipient's VSS key.
///
/// The embedded `id` is the share's position in the dealing and determines
/// its evaluation point `x = id + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedShare {
    id: u64,
    value: CurvePoint,
    proof: Dleq,
}

impl EncryptedShare {
    /// The share's position in its dealing.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A share decrypted by its recipient, with a proof of correct decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedShare {
    id: u64,
    value: CurvePoint,
    proof: Dleq,
}

impl DecryptedShare {
    /// The share's position in its dealing.
    pub fn id(&self) -> u64 {
        self.id
    }
}

fn share_point(id: u64) -> Scalar {
    // Evaluation points start at 1; zero is the secret itself.
    Scalar::from(id) + Scalar::ONE
}

/// Escrow a fresh random secret among `recipients` so that any `threshold`
/// of them can recover it.
///
/// Returns the public dealing payload, the escrowed secret, a proof binding
/// the secret to the dealing, and one encrypted share per recipient, paired
/// with `recipients` in order. Repeated invocations draw independent
/// secrets.
pub fn gen_shared_secret<R: RngCore + CryptoRng>(
    rng: &mut R,
    threshold: usize,
    recipients: &[VssPublicKey],
) -> Result<(Extra, Secret, SecretProof, Vec<EncryptedShare>)> {
    let participants = recipients.len();
    if threshold < 1 || threshold > participants {
        error!(
            "Threshold {} is out of range for {} recipients",
            threshold, participants
        );
        Err(CallerError::BadThreshold {
            threshold,
            participants,
        })?;
    }
    let mut seen = HashSet::with_capacity(participants);
    if !recipients.iter().all(|key| seen.insert(key.to_bytes())) {
        error!("Recipient list contains a duplicate VSS public key");
        Err(CallerError::DuplicateVssKey)?;
    }

    let generator =
        CurvePoint::GENERATOR.multiply_by_scalar(&random_nonzero_scalar(rng)?);
    let coefficients = Zeroizing::new(
        std::iter::repeat_with(|| random_scalar(rng))
            .take(threshold)
            .collect::<Vec<_>>(),
    );
    let commitments = coefficients
        .iter()
        .map(|coefficient| generator.multiply_by_scalar(coefficient))
        .collect::<Vec<_>>();
    let extra = Extra {
        generator,
        commitments,
    };

    let secret_scalar = Zeroizing::new(coefficients[0]);
    let secret = Secret(CurvePoint::GENERATOR.multiply_by_scalar(&secret_scalar));
    let proof = SecretProof(Dleq::prove(
        rng,
        SECRET_PROOF_CONTEXT,
        &CurvePoint::GENERATOR,
        &secret.0,
        &extra.generator,
        &extra.commitments[0],
        &secret_scalar,
    )?);

    let shares = recipients
        .iter()
        .enumerate()
        .map(|(index, recipient)| {
            let id = index as u64;
            let eval = Zeroizing::new(evaluate_polynomial(&coefficients, &share_point(id)));
            let public_eval = extra.generator.multiply_by_scalar(&eval);
            let value = recipient.0.multiply_by_scalar(&eval);
            let proof = Dleq::prove(
                rng,
                SHARE_PROOF_CONTEXT,
                &extra.generator,
                &public_eval,
                &recipient.0,
                &value,
                &eval,
            )?;
            Ok(EncryptedShare { id, value, proof })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((extra, secret, proof, shares))
}

fn evaluate_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coefficient| acc * x + coefficient)
}

/// True iff `share` is a well-formed encryption to `recipient` of the share
/// at its position in the dealing described by `extra`.
pub fn verify_enc_share(extra: &Extra, recipient: &VssPublicKey, share: &EncryptedShare) -> bool {
    let public_eval = extra.commitment_eval(&share_point(share.id));
    share.proof.verify(
        SHARE_PROOF_CONTEXT,
        &extra.generator,
        &public_eval,
        &recipient.0,
        &share.value,
    )
}

/// True iff `secret` is the secret committed by the dealing `(extra, proof)`.
pub fn verify_secret_proof(extra: &Extra, secret: &Secret, proof: &SecretProof) -> bool {
    match extra.commitments.first() {
        Some(commitment) => proof.0.verify(
            SECRET_PROOF_CONTEXT,
            &CurvePoint::GENERATOR,
            &secret.0,
            &extra.generator,
            commitment,
        ),
        None => false,
    }
}

/// Decrypt an encrypted share with the recipient's VSS secret key, attaching
/// a proof of correct decryption.
pub fn decrypt_share<R: RngCore + CryptoRng>(
    rng: &mut R,
    secret_key: &VssSecretKey,
    share: &EncryptedShare,
) -> Result<DecryptedShare> {
    let inverse: Option<Scalar> = secret_key.0.invert().into();
    let inverse = Zeroizing::new(inverse.ok_or_else(|| {
        error!("A VSS secret key is zero, which the key sampler rules out");
        InternalError::InternalInvariantFailed
    })?);
    let value = share.value.multiply_by_scalar(&inverse);
    let proof = Dleq::prove(
        rng,
        DECRYPT_PROOF_CONTEXT,
        &CurvePoint::GENERATOR,
        &secret_key.public_key().0,
        &value,
        &share.value,
        &secret_key.0,
    )?;
    Ok(DecryptedShare {
        id: share.id,
        value,
        proof,
    })
}

/// True iff `decrypted` is the correct decryption of `encrypted` under the
/// VSS key `recipient`.
pub fn verify_dec_share(
    recipient: &VssPublicKey,
    encrypted: &EncryptedShare,
    decrypted: &DecryptedShare,
) -> bool {
    decrypted.id == encrypted.id
        && decrypted.proof.verify(
            DECRYPT_PROOF_CONTEXT,
            &CurvePoint::GENERATOR,
            &recipient.0,
            &decrypted.value,
            &encrypted.value,
        )
}

/// Recover the escrowed secret from at least `threshold` decrypted shares
/// with distinct ids, by Lagrange interpolation at zero in the exponent.
pub fn recover_secret(threshold: usize, shares: &[DecryptedShare]) -> Result<Secret> {
    let mut distinct = Vec::<&DecryptedShare>::with_capacity(threshold);
    for share in shares {
        if !distinct.iter().any(|other| other.id == share.id) {
            distinct.push(share);
        }
        if distinct.len() == threshold {
            break;
        }
    }
    if distinct.len() < threshold {
        error!(
            "Secret recovery needs {} distinct shares but only {} were supplied",
            threshold,
            distinct.len()
        );
        Err(CallerError::BadInput)?;
    }

    let points = distinct
        .iter()
        .map(|share| share_point(share.id))
        .collect::<Vec<_>>();
    let mut secret = CurvePoint::IDENTITY;
    for (share, point) in distinct.iter().zip(&points) {
        let coefficient = lagrange_coefficient_at_zero(point, &points)?;
        secret = secret + share.value.multiply_by_scalar(&coefficient);
    }
    Ok(Secret(secret))
}

/// Compute the Lagrange coefficient evaluated at zero.
/// This is used to reconstruct the secret from the shares.
fn lagrange_coefficient_at_zero(my_point: &Scalar, other_points: &[Scalar]) -> Result<Scalar> {
    let mut result = Scalar::ONE;
    for point in other_points {
        if point != my_point {
            let numerator = Scalar::ZERO - point;
            let denominator = my_point - point;
            let inverse: Option<Scalar> = denominator.invert().into();
            let inverse = inverse.ok_or_else(|| {
                error!("Lagrange interpolation hit a repeated evaluation point");
                InternalError::InternalInvariantFailed
            })?;
            result *= numerator * inverse;
        }
    }
    Ok(result)
}

impl Canonical for Extra {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.generator.to_bytes());
        crate::codec::append_len(out, self.commitments.len());
        for commitment in &self.commitments {
            out.extend_from_slice(&commitment.to_bytes());
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let generator = CurvePoint::try_from_bytes(parser.take_bytes(POINT_LENGTH)?)?;
        let count = parser.take_count()?;
        let commitments = (0..count)
            .map(|_| CurvePoint::try_from_bytes(parser.take_bytes(POINT_LENGTH)?))
            .collect::<Result<Vec<_>>>()?;
        if commitments.is_empty() {
            error!("A dealing must commit to at least one coefficient");
            Err(CallerError::DeserializationFailed)?;
        }
        Ok(Self {
            generator,
            commitments,
        })
    }
}

impl Canonical for Secret {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_bytes());
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Ok(Self(CurvePoint::try_from_bytes(
            parser.take_bytes(POINT_LENGTH)?,
        )?))
    }
}

impl Canonical for SecretProof {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.0.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Ok(Self(Dleq::parse(parser)?))
    }
}

impl Canonical for EncryptedShare {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.id.append_to(out);
        out.extend_from_slice(&self.value.to_bytes());
        self.proof.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let id = u64::parse(parser)?;
        let value = CurvePoint::try_from_bytes(parser.take_bytes(POINT_LENGTH)?)?;
        let proof = Dleq::parse(parser)?;
        Ok(Self { id, value, proof })
    }
}

impl Canonical for DecryptedShare {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.id.append_to(out);
        out.extend_from_slice(&self.value.to_bytes());
        self.proof.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let id = u64::parse(parser)?;
        let value = CurvePoint::try_from_bytes(parser.take_bytes(POINT_LENGTH)?)?;
        let proof = Dleq::parse(parser)?;
        Ok(Self { id, value, proof })
    }
}

impl_serde_via_canonical!(Secret);
impl_serde_via_canonical!(DecryptedShare);

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{errors::CallerError, utils::testing::init_testing};
    use rand::rngs::StdRng;

    pub(crate) fn setup_keys(rng: &mut StdRng, n: usize) -> (Vec<VssSecretKey>, Vec<VssPublicKey>) {
        let secrets = (0..n)
            .map(|_| VssSecretKey::random(rng).unwrap())
            .collect::<Vec<_>>();
        let publics = secrets.iter().map(VssSecretKey::public_key).collect();
        (secrets, publics)
    }

    #[test]
    fn dealing_produces_verifiable_shares() {
        let rng = &mut init_testing();
        for (threshold, n) in [(1, 1), (2, 3), (3, 5), (4, 7)] {
            let (_, publics) = setup_keys(rng, n);
            let (extra, secret, proof, shares) =
                gen_shared_secret(rng, threshold, &publics).unwrap();

            assert_eq!(extra.threshold(), threshold);
            assert_eq!(shares.len(), n);
            for (recipient, share) in publics.iter().zip(&shares) {
                assert!(verify_enc_share(&extra, recipient, share));
            }
            assert!(verify_secret_proof(&extra, &secret, &proof));
        }
    }

    #[test]
    fn shares_do_not_verify_under_the_wrong_key() {
        let rng = &mut init_testing();
        let (_, publics) = setup_keys(rng, 3);
        let (extra, _, _, shares) = gen_shared_secret(rng, 2, &publics).unwrap();

        assert!(!verify_enc_share(&extra, &publics[1], &shares[0]));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let rng = &mut init_testing();
        let (_, publics) = setup_keys(rng, 3);

        for threshold in [0, 4, 100] {
            let result = gen_shared_secret(rng, threshold, &publics);
            assert_eq!(
                result.unwrap_err(),
                CallerError::BadThreshold {
                    threshold,
                    participants: 3
                }
                .into()
            );
        }
    }

    #[test]
    fn duplicate_recipients_are_rejected() {
        let rng = &mut init_testing();
        let (_, mut publics) = setup_keys(rng, 3);
        publics.push(publics[0]);

        let result = gen_shared_secret(rng, 2, &publics);
        assert_eq!(result.unwrap_err(), CallerError::DuplicateVssKey.into());
    }

    #[test]
    fn decrypt_verify_and_recover_round_trip() {
        let rng = &mut init_testing();
        let threshold = 3;
        let (secrets, publics) = setup_keys(rng, 5);
        let (extra, dealt_secret, _, shares) =
            gen_shared_secret(rng, threshold, &publics).unwrap();

        let decrypted = secrets
            .iter()
            .zip(&shares)
            .map(|(secret_key, share)| decrypt_share(rng, secret_key, share).unwrap())
            .collect::<Vec<_>>();
        for ((recipient, encrypted), dec) in publics.iter().zip(&shares).zip(&decrypted) {
            assert!(verify_dec_share(recipient, encrypted, dec));
        }

        // Any threshold-sized subset recovers the dealt secret.
        let recovered = recover_secret(threshold, &decrypted[..threshold]).unwrap();
        assert_eq!(recovered, dealt_secret);
        let recovered = recover_secret(threshold, &decrypted[2..]).unwrap();
        assert_eq!(recovered, dealt_secret);

        // Fewer shares than the threshold are not enough.
        assert!(recover_secret(threshold, &decrypted[..threshold - 1]).is_err());
    }

    #[test]
    fn tampered_decryptions_fail_verification() {
        let rng = &mut init_testing();
        let (secrets, publics) = setup_keys(rng, 3);
        let (_, _, _, shares) = gen_shared_secret(rng, 2, &publics).unwrap();

        let honest = decrypt_share(rng, &secrets[0], &shares[0]).unwrap();
        let forged = DecryptedShare {
            id: honest.id,
            value: honest.value + CurvePoint::GENERATOR,
            proof: honest.proof,
        };
        assert!(!verify_dec_share(&publics[0], &shares[0], &forged));
    }

    #[test]
    fn independent_dealings_differ() {
        let rng = &mut init_testing();
        let (_, publics) = setup_keys(rng, 3);

        let (_, first_secret, _, first_shares) = gen_shared_secret(rng, 2, &publics).unwrap();
        let (_, second_secret, _, second_shares) = gen_shared_secret(rng, 2, &publics).unwrap();
        assert_ne!(first_secret, second_secret);
        assert_ne!(first_shares, second_shares);
    }

    #[test]
    fn share_canonical_round_trips() {
        let rng = &mut init_testing();
        let (secrets, publics) = setup_keys(rng, 3);
        let (extra, secret, proof, shares) = gen_shared_secret(rng, 2, &publics).unwrap();

        let extra_bytes = extra.to_canonical_bytes();
        assert_eq!(Extra::from_canonical_bytes(&extra_bytes).unwrap(), extra);

        let secret_bytes = secret.to_canonical_bytes();
        assert_eq!(Secret::from_canonical_bytes(&secret_bytes).unwrap(), secret);

        let proof_bytes = proof.to_canonical_bytes();
        assert_eq!(
            SecretProof::from_canonical_bytes(&proof_bytes).unwrap(),
            proof
        );

        let share_bytes = shares[0].to_canonical_bytes();
        assert_eq!(
            EncryptedShare::from_canonical_bytes(&share_bytes).unwrap(),
            shares[0]
        );

        let decrypted = decrypt_share(rng, &secrets[0], &shares[0]).unwrap();
        let decrypted_bytes = decrypted.to_canonical_bytes();
        assert_eq!(
            DecryptedShare::from_canonical_bytes(&decrypted_bytes).unwrap(),
            decrypted
        );
    }
}
