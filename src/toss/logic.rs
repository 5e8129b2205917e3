// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Checked admission of block payloads into the accumulator.
//!
//! [`verify_and_apply_payload`] is the write path the block application
//! driver uses: it enforces the phase schedule, participant eligibility and
//! message validity before touching the accumulator through the unchecked
//! `put*` interface. Operations are applied in the order the payload
//! enumerates them; on rejection the accumulator may hold a prefix of the
//! payload, so drivers needing atomicity run this inside a
//! [`TossJournal`](crate::toss::TossJournal).

use super::{Toss, TossRead};
use crate::{
    keys::StakeholderId,
    messages::{CommitmentViolations, SignedCommitment, SscPayload, VssCertificate},
    parameters::{vss_threshold, ProtocolParams},
    phase::{EpochIndex, SlotId},
    pvss::verify_dec_share,
};
use thiserror::Error;
use tracing::{info, instrument};

/// Reasons a payload, or an entry within it, is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TossError {
    /// The payload's variant does not match the phase of its slot.
    #[error("payload is outside its phase window at {0}")]
    WrongPhase(SlotId),
    /// The stake distribution for the epoch is not known yet.
    #[error("richmen for {0} are not known")]
    RichmenUnavailable(EpochIndex),
    /// The sender is not an eligible participant or lacks a usable
    /// certificate.
    #[error("stakeholder {0} is not an eligible participant")]
    UnknownParticipant(StakeholderId),
    /// The sender already has an entry for this phase.
    #[error("stakeholder {0} already has an entry for this phase")]
    Duplicate(StakeholderId),
    /// The commitment failed cryptographic verification.
    #[error("commitment from {0} is invalid: {1}")]
    BadCommitment(StakeholderId, CommitmentViolations),
    /// The commitment distributes shares to keys outside the certified set.
    #[error("commitment from {0} distributes shares to uncertified keys")]
    BadShareDistribution(StakeholderId),
    /// The commitment was dealt with a recovery threshold other than the
    /// protocol's majority rule for its share count.
    #[error("commitment from {0} was dealt with the wrong recovery threshold")]
    WrongThreshold(StakeholderId),
    /// The opening does not reveal the committed secret.
    #[error("opening from {0} does not match its commitment")]
    BadOpening(StakeholderId),
    /// An opening or share refers to a commitment that was never made.
    #[error("stakeholder {0} has no commitment this epoch")]
    MissingCommitment(StakeholderId),
    /// A relayed share failed verification against its encrypted original.
    #[error("share relayed by {0} for {1} is invalid")]
    BadShare(StakeholderId, StakeholderId),
    /// The certificate is not valid at this epoch.
    #[error("certificate from {0} is invalid")]
    BadCertificate(StakeholderId),
}

/// Validate a block's payload against the accumulator and the phase
/// schedule, applying each admitted entry in payload order.
#[instrument(skip_all, fields(slot = %slot))]
pub fn verify_and_apply_payload<T: Toss>(
    toss: &mut T,
    params: &ProtocolParams,
    slot: SlotId,
    payload: &SscPayload,
) -> std::result::Result<(), TossError> {
    if let Some(expected) = payload.expected_phase() {
        if params.current_phase(slot.slot) != Some(expected) {
            return Err(TossError::WrongPhase(slot));
        }
    }
    let epoch = slot.epoch;

    for certificate in payload.certificates() {
        apply_certificate(toss, epoch, certificate)?;
    }

    match payload {
        SscPayload::Commitments { commitments, .. } => {
            for commitment in commitments {
                apply_commitment(toss, epoch, commitment)?;
            }
        }
        SscPayload::Openings { openings, .. } => {
            for (id, opening) in openings {
                apply_opening(toss, *id, opening)?;
            }
        }
        SscPayload::Shares { shares, .. } => {
            for (id, inner) in shares {
                apply_shares(toss, epoch, *id, inner)?;
            }
        }
        SscPayload::Certificates { .. } => {}
    }
    info!("Applied payload at {}", slot);
    Ok(())
}

fn richmen_contain<T: Toss>(
    toss: &T,
    epoch: EpochIndex,
    id: StakeholderId,
) -> std::result::Result<(), TossError> {
    let richmen = toss
        .richmen(epoch)
        .ok_or(TossError::RichmenUnavailable(epoch))?;
    if !richmen.contains(&id) {
        return Err(TossError::UnknownParticipant(id));
    }
    Ok(())
}

fn apply_certificate<T: Toss>(
    toss: &mut T,
    epoch: EpochIndex,
    certificate: &VssCertificate,
) -> std::result::Result<(), TossError> {
    let id = certificate.stakeholder_id();
    if !certificate.verify(epoch) {
        return Err(TossError::BadCertificate(id));
    }
    richmen_contain(toss, epoch, id)?;
    // No duplicate check: certificates are not phase entries. A valid newer
    // certificate replaces the old one, which is how a stakeholder rotates
    // its VSS key or extends its expiry.
    toss.put_certificate(certificate.clone());
    Ok(())
}

fn apply_commitment<T: Toss>(
    toss: &mut T,
    epoch: EpochIndex,
    commitment: &SignedCommitment,
) -> std::result::Result<(), TossError> {
    let id = commitment.stakeholder_id();
    richmen_contain(toss, epoch, id)?;

    let stable = toss.stable_certificates(epoch);
    if !stable.contains_key(&id) {
        return Err(TossError::UnknownParticipant(id));
    }
    if toss.commitments().contains_key(&id) {
        return Err(TossError::Duplicate(id));
    }
    commitment
        .verify(epoch)
        .map_err(|violations| TossError::BadCommitment(id, violations))?;

    // The per-share proofs only bind shares to whatever polynomial degree
    // the dealer picked, so the dealt threshold itself must be pinned to the
    // protocol's majority rule or recovery from a share majority would
    // interpolate the wrong secret.
    let inner = commitment.commitment();
    if inner.extra().threshold() != vss_threshold(inner.shares().len()) {
        return Err(TossError::WrongThreshold(id));
    }

    // Shares may only be distributed to the certified keys of stable
    // certificate holders.
    let certified_keys: std::collections::HashSet<_> = stable
        .values()
        .map(|certificate| certificate.vss_key().to_bytes())
        .collect();
    if !commitment
        .commitment()
        .vss_keys()
        .all(|key| certified_keys.contains(&key.to_bytes()))
    {
        return Err(TossError::BadShareDistribution(id));
    }

    toss.put_commitment(commitment.clone());
    Ok(())
}

fn apply_opening<T: Toss>(
    toss: &mut T,
    id: StakeholderId,
    opening: &crate::messages::Opening,
) -> std::result::Result<(), TossError> {
    if toss.openings().contains_key(&id) {
        return Err(TossError::Duplicate(id));
    }
    let commitment = toss
        .commitments()
        .get(&id)
        .ok_or(TossError::MissingCommitment(id))?;
    if !crate::messages::verify_opening(commitment.commitment(), opening) {
        return Err(TossError::BadOpening(id));
    }
    toss.put_opening(id, opening.clone());
    Ok(())
}

fn apply_shares<T: Toss>(
    toss: &mut T,
    epoch: EpochIndex,
    decryptor: StakeholderId,
    inner: &crate::messages::InnerSharesMap,
) -> std::result::Result<(), TossError> {
    richmen_contain(toss, epoch, decryptor)?;
    let stable = toss.stable_certificates(epoch);
    let decryptor_key = *stable
        .get(&decryptor)
        .ok_or(TossError::UnknownParticipant(decryptor))?
        .vss_key();
    if toss.shares().contains_key(&decryptor) {
        return Err(TossError::Duplicate(decryptor));
    }

    for (author, share) in inner {
        let commitment = toss
            .commitments()
            .get(author)
            .ok_or(TossError::MissingCommitment(*author))?;
        let encrypted = commitment
            .commitment()
            .find_share(&decryptor_key)
            .ok_or(TossError::BadShare(decryptor, *author))?;
        if !verify_dec_share(&decryptor_key, encrypted, share) {
            return Err(TossError::BadShare(decryptor, *author));
        }
    }
    toss.put_shares(decryptor, inner.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        keys::{VssPublicKey, VssSecretKey},
        messages::{
            gen_commitment_and_opening, InnerSharesMap, Opening, OpeningsMap, SharesMap,
            VssCertificatesMap,
        },
        phase::{EpochOrSlot, SlotId},
        pvss::decrypt_share,
        toss::{RichmenSet, TossRead, TossState},
        utils::testing::init_testing,
    };
    use k256::ecdsa::SigningKey;
    use rand::rngs::StdRng;

    struct Participant {
        signing_key: SigningKey,
        vss_key: VssSecretKey,
        id: StakeholderId,
    }

    /// A state with `n` certified richmen, positioned at the start of
    /// epoch 0 with `k = 2`.
    fn setup(rng: &mut StdRng, n: usize) -> (ProtocolParams, TossState, Vec<Participant>) {
        let params = ProtocolParams::new(2).unwrap();
        let mut state = TossState::new(EpochOrSlot::EpochBoundary(EpochIndex(0)));

        let participants: Vec<Participant> = (0..n)
            .map(|_| {
                let signing_key = SigningKey::random(rng);
                let vss_key = VssSecretKey::random(rng).unwrap();
                let id = StakeholderId::from_verifying_key(signing_key.verifying_key());
                Participant {
                    signing_key,
                    vss_key,
                    id,
                }
            })
            .collect();

        let mut certificates = VssCertificatesMap::new();
        let mut richmen = RichmenSet::new();
        for participant in &participants {
            let certificate = VssCertificate::create(
                &participant.signing_key,
                participant.vss_key.public_key(),
                EpochIndex(10),
            )
            .unwrap();
            let _ = certificates.insert(participant.id, certificate.clone());
            let _ = richmen.insert(participant.id);
            state.put_certificate(certificate);
        }
        state.install_richmen(EpochIndex(0), richmen);
        state.install_stable_certificates(EpochIndex(0), certificates);

        (params, state, participants)
    }

    fn recipient_keys(participants: &[Participant]) -> Vec<VssPublicKey> {
        participants
            .iter()
            .map(|participant| participant.vss_key.public_key())
            .collect()
    }

    fn commitment_payload(
        rng: &mut StdRng,
        participants: &[Participant],
        who: usize,
    ) -> (SscPayload, Opening) {
        let keys = recipient_keys(participants);
        let (commitment, opening) =
            gen_commitment_and_opening(rng, crate::parameters::vss_threshold(keys.len()), &keys)
                .unwrap();
        let signed = SignedCommitment::create(
            &participants[who].signing_key,
            EpochIndex(0),
            commitment,
        )
        .unwrap();
        (
            SscPayload::Commitments {
                commitments: vec![signed],
                certificates: vec![],
            },
            opening,
        )
    }

    #[test]
    fn payloads_are_rejected_outside_their_phase() {
        let rng = &mut init_testing();
        let (params, mut state, participants) = setup(rng, 3);
        let (payload, _) = commitment_payload(rng, &participants, 0);

        // Slot 2 is the idle gap after the commitment window.
        let result =
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 2), &payload);
        assert_eq!(result, Err(TossError::WrongPhase(SlotId::new(0, 2))));

        // Openings and shares windows reject commitment payloads too.
        for slot in [4, 8] {
            let result =
                verify_and_apply_payload(&mut state, &params, SlotId::new(0, slot), &payload);
            assert!(matches!(result, Err(TossError::WrongPhase(_))));
        }

        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &payload).is_ok()
        );
    }

    #[test]
    fn unknown_participants_are_rejected() {
        let rng = &mut init_testing();
        let (params, mut state, mut participants) = setup(rng, 3);

        // A signer with stake and certificate not yet known to the state.
        let outsider_key = SigningKey::random(rng);
        participants[1].signing_key = outsider_key;
        let (payload, _) = commitment_payload(rng, &participants, 1);

        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &payload);
        assert!(matches!(result, Err(TossError::UnknownParticipant(_))));
    }

    #[test]
    fn duplicate_commitments_are_rejected() {
        let rng = &mut init_testing();
        let (params, mut state, participants) = setup(rng, 3);

        let (first, _) = commitment_payload(rng, &participants, 0);
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &first).is_ok()
        );

        let (second, _) = commitment_payload(rng, &participants, 0);
        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 1), &second);
        assert_eq!(result, Err(TossError::Duplicate(participants[0].id)));
        // The raw interface still allows the driver to overwrite.
        assert_eq!(state.commitments().len(), 1);
    }

    #[test]
    fn commitments_must_use_the_protocol_threshold() {
        let rng = &mut init_testing();
        let (params, mut state, participants) = setup(rng, 3);
        let keys = recipient_keys(&participants);

        // Dealt so that all three shares are needed instead of the majority
        // of two. Every per-share proof still verifies, so only the
        // threshold check can catch it.
        let (commitment, _) = gen_commitment_and_opening(rng, 3, &keys).unwrap();
        let signed = SignedCommitment::create(
            &participants[0].signing_key,
            EpochIndex(0),
            commitment,
        )
        .unwrap();
        let payload = SscPayload::Commitments {
            commitments: vec![signed],
            certificates: vec![],
        };

        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &payload);
        assert_eq!(result, Err(TossError::WrongThreshold(participants[0].id)));
        assert!(state.commitments().is_empty());
    }

    #[test]
    fn openings_require_a_matching_commitment() {
        let rng = &mut init_testing();
        let (params, mut state, participants) = setup(rng, 3);

        let (payload, opening) = commitment_payload(rng, &participants, 0);
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &payload).is_ok()
        );

        // An opening from a stakeholder who never committed.
        let mut openings = OpeningsMap::new();
        let _ = openings.insert(participants[1].id, opening.clone());
        let orphan = SscPayload::Openings {
            openings,
            certificates: vec![],
        };
        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 4), &orphan);
        assert_eq!(
            result,
            Err(TossError::MissingCommitment(participants[1].id))
        );

        // A foreign opening for an existing commitment.
        let keys = recipient_keys(&participants);
        let (_, foreign) = gen_commitment_and_opening(rng, 2, &keys).unwrap();
        let mut openings = OpeningsMap::new();
        let _ = openings.insert(participants[0].id, foreign);
        let mismatched = SscPayload::Openings {
            openings,
            certificates: vec![],
        };
        let result =
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 4), &mismatched);
        assert_eq!(result, Err(TossError::BadOpening(participants[0].id)));

        // The genuine opening is admitted.
        let mut openings = OpeningsMap::new();
        let _ = openings.insert(participants[0].id, opening);
        let genuine = SscPayload::Openings {
            openings,
            certificates: vec![],
        };
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 4), &genuine).is_ok()
        );
        assert_eq!(state.openings().len(), 1);
    }

    #[test]
    fn shares_verify_against_the_original_commitment() {
        let rng = &mut init_testing();
        let (params, mut state, participants) = setup(rng, 3);

        let (payload, _) = commitment_payload(rng, &participants, 0);
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 0), &payload).is_ok()
        );

        // Participant 1 decrypts its share of participant 0's commitment.
        let author = participants[0].id;
        let decryptor = &participants[1];
        let encrypted = *state
            .commitments()
            .get(&author)
            .unwrap()
            .commitment()
            .find_share(&decryptor.vss_key.public_key())
            .unwrap();
        let decrypted = decrypt_share(rng, &decryptor.vss_key, &encrypted).unwrap();

        let mut inner = InnerSharesMap::new();
        let _ = inner.insert(author, decrypted);
        let mut shares = SharesMap::new();
        let _ = shares.insert(decryptor.id, inner.clone());
        let genuine = SscPayload::Shares {
            shares,
            certificates: vec![],
        };
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 8), &genuine).is_ok()
        );

        // Relaying the same inner map under a different decryptor fails: the
        // decrypted share does not verify under that stakeholder's key.
        let mut shares = SharesMap::new();
        let _ = shares.insert(participants[2].id, inner);
        let forged = SscPayload::Shares {
            shares,
            certificates: vec![],
        };
        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 9), &forged);
        assert_eq!(
            result,
            Err(TossError::BadShare(participants[2].id, author))
        );
    }

    #[test]
    fn certificates_ride_along_in_any_slot() {
        let rng = &mut init_testing();
        let (params, mut state, _) = setup(rng, 3);

        // A fresh stakeholder announcing a certificate mid-epoch.
        let signing_key = SigningKey::random(rng);
        let id = StakeholderId::from_verifying_key(signing_key.verifying_key());
        let certificate = VssCertificate::create(
            &signing_key,
            VssSecretKey::random(rng).unwrap().public_key(),
            EpochIndex(5),
        )
        .unwrap();
        let payload = SscPayload::Certificates {
            certificates: vec![certificate.clone()],
        };

        // Not a richman: rejected even though the certificate is valid.
        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(0, 3), &payload);
        assert_eq!(result, Err(TossError::UnknownParticipant(id)));

        // After the oracle extends the richmen set, an idle slot admits it.
        let mut richmen = state.richmen(EpochIndex(0)).unwrap().clone();
        let _ = richmen.insert(id);
        state.install_richmen(EpochIndex(0), richmen);
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 3), &payload).is_ok()
        );
        assert!(state.certificates().contains_key(&id));

        // A renewal replaces the held certificate: rotation to a fresh VSS
        // key with a later expiry is admissible while the old certificate is
        // still live.
        let renewed = VssCertificate::create(
            &signing_key,
            VssSecretKey::random(rng).unwrap().public_key(),
            EpochIndex(8),
        )
        .unwrap();
        let renewal = SscPayload::Certificates {
            certificates: vec![renewed.clone()],
        };
        assert!(
            verify_and_apply_payload(&mut state, &params, SlotId::new(0, 6), &renewal).is_ok()
        );
        let held = state.certificates().get(&id).unwrap();
        assert_eq!(held, &renewed);
        assert_eq!(held.expiry_epoch(), EpochIndex(8));

        // Expired certificates never pass.
        let stale = VssCertificate::create(
            &signing_key,
            VssSecretKey::random(rng).unwrap().public_key(),
            EpochIndex(0),
        )
        .unwrap();
        let mut state = TossState::new(EpochOrSlot::EpochBoundary(EpochIndex(2)));
        state.install_richmen(EpochIndex(2), RichmenSet::from([id]));
        let payload = SscPayload::Certificates {
            certificates: vec![stale],
        };
        let result = verify_and_apply_payload(&mut state, &params, SlotId::new(2, 3), &payload);
        assert_eq!(result, Err(TossError::BadCertificate(id)));
    }
}
