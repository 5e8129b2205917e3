// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Chaum-Pedersen proofs of discrete-logarithm equality.
//!
//! A [`Dleq`] proof convinces a verifier that the prover knows a witness `α`
//! with `h₁ = α·g₁` and `h₂ = α·g₂`, without revealing `α`. The proof is
//! made non-interactive with a merlin transcript and stored in compressed
//! `(c, z)` form; the verifier reconstructs the prover's nonce commitments
//! and recomputes the challenge.

use crate::{
    codec::Canonical,
    curve::{
        random_scalar, scalar_from_bytes, scalar_to_bytes, CurvePoint, SCALAR_LENGTH,
    },
    errors::Result,
    utils::{scalar_challenge_from_transcript, ParseBytes},
};
use k256::Scalar;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// A non-interactive proof of discrete-logarithm equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dleq {
    challenge: Scalar,
    response: Scalar,
}

fn base_transcript(
    label: &'static [u8],
    g1: &CurvePoint,
    h1: &CurvePoint,
    g2: &CurvePoint,
    h2: &CurvePoint,
) -> Transcript {
    let mut transcript = Transcript::new(b"dleq proof");
    transcript.append_message(b"context", label);
    transcript.append_message(b"g1", &g1.to_bytes());
    transcript.append_message(b"h1", &h1.to_bytes());
    transcript.append_message(b"g2", &g2.to_bytes());
    transcript.append_message(b"h2", &h2.to_bytes());
    transcript
}

impl Dleq {
    /// Prove that `h1 = witness·g1` and `h2 = witness·g2`.
    pub(crate) fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        label: &'static [u8],
        g1: &CurvePoint,
        h1: &CurvePoint,
        g2: &CurvePoint,
        h2: &CurvePoint,
        witness: &Scalar,
    ) -> Result<Self> {
        let nonce = Zeroizing::new(random_scalar(rng));
        let nonce_commitment_1 = g1.multiply_by_scalar(&nonce);
        let nonce_commitment_2 = g2.multiply_by_scalar(&nonce);

        let mut transcript = base_transcript(label, g1, h1, g2, h2);
        transcript.append_message(b"a1", &nonce_commitment_1.to_bytes());
        transcript.append_message(b"a2", &nonce_commitment_2.to_bytes());
        let challenge = scalar_challenge_from_transcript(&mut transcript)?;

        let response = *nonce + challenge * witness;
        Ok(Self {
            challenge,
            response,
        })
    }

    /// Check the proof against the claimed bases and images.
    pub(crate) fn verify(
        &self,
        label: &'static [u8],
        g1: &CurvePoint,
        h1: &CurvePoint,
        g2: &CurvePoint,
        h2: &CurvePoint,
    ) -> bool {
        // Reconstruct the nonce commitments the prover must have used.
        let nonce_commitment_1 =
            g1.multiply_by_scalar(&self.response) - h1.multiply_by_scalar(&self.challenge);
        let nonce_commitment_2 =
            g2.multiply_by_scalar(&self.response) - h2.multiply_by_scalar(&self.challenge);

        let mut transcript = base_transcript(label, g1, h1, g2, h2);
        transcript.append_message(b"a1", &nonce_commitment_1.to_bytes());
        transcript.append_message(b"a2", &nonce_commitment_2.to_bytes());
        match scalar_challenge_from_transcript(&mut transcript) {
            Ok(challenge) => challenge == self.challenge,
            Err(_) => false,
        }
    }
}

impl Canonical for Dleq {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&scalar_to_bytes(&self.challenge));
        out.extend_from_slice(&scalar_to_bytes(&self.response));
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let challenge = scalar_from_bytes(parser.take_bytes(SCALAR_LENGTH)?)?;
        let response = scalar_from_bytes(parser.take_bytes(SCALAR_LENGTH)?)?;
        Ok(Self {
            challenge,
            response,
        })
    }
}
