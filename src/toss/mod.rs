// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The per-epoch accumulator of protocol messages.
//!
//! The accumulator (the "toss") is operated single-threaded by the block
//! application pipeline. [`TossRead`] is the read-only view; [`Toss`] adds
//! the mutating operations. [`TossState`] is the in-memory implementation
//! and [`TossJournal`] layers a transactional undo log over any
//! implementation, so a driver can apply a block optimistically and either
//! commit or roll back atomically.
//!
//! The `put*` operations are unchecked, last-writer-wins inserts; callers
//! are expected to verify messages and participant eligibility first, either
//! by hand or through [`verify_and_apply_payload`].

mod journal;
mod logic;
mod seed;
mod state;

pub use journal::TossJournal;
pub use logic::{verify_and_apply_payload, TossError};
pub use seed::{calculate_seed, SeedError};
pub use state::TossState;

use crate::{
    errors::Result,
    keys::StakeholderId,
    messages::{
        CommitmentsMap, InnerSharesMap, Opening, OpeningsMap, SharesMap, SignedCommitment,
        VssCertificate, VssCertificatesMap,
    },
    phase::{EpochIndex, EpochOrSlot},
};
use std::collections::BTreeSet;

/// Stakeholders whose stake makes them eligible to participate in an
/// epoch's protocol run.
pub type RichmenSet = BTreeSet<StakeholderId>;

/// Read-only view of the per-epoch accumulator.
pub trait TossRead {
    /// All accumulated signed commitments.
    fn commitments(&self) -> &CommitmentsMap;

    /// All accumulated openings.
    fn openings(&self) -> &OpeningsMap;

    /// All accumulated relayed shares.
    fn shares(&self) -> &SharesMap;

    /// All known certificates.
    fn certificates(&self) -> &VssCertificatesMap;

    /// Certificates committed deeply enough in the chain to be immutable
    /// under reorganisation at `epoch`. The notion of stability is decided
    /// by the chain layer; this is a read of its verdict.
    fn stable_certificates(&self, epoch: EpochIndex) -> VssCertificatesMap;

    /// Stakeholders eligible to participate at `epoch`, or `None` when the
    /// stake distribution for that epoch is not yet known.
    fn richmen(&self, epoch: EpochIndex) -> Option<&RichmenSet>;

    /// The accumulator's position on the logical clock.
    fn epoch_or_slot(&self) -> EpochOrSlot;
}

/// Read-write interface to the per-epoch accumulator.
pub trait Toss: TossRead {
    /// Insert a signed commitment, keyed by its author. Overwrites.
    fn put_commitment(&mut self, commitment: SignedCommitment);

    /// Insert an opening for `id`. Overwrites.
    fn put_opening(&mut self, id: StakeholderId, opening: Opening);

    /// Insert the shares `id` has decrypted. Overwrites.
    fn put_shares(&mut self, id: StakeholderId, shares: InnerSharesMap);

    /// Insert a certificate, keyed by its signer. Overwrites.
    fn put_certificate(&mut self, certificate: VssCertificate);

    /// Remove `id`'s commitment, if any.
    fn del_commitment(&mut self, id: &StakeholderId);

    /// Remove `id`'s opening, if any.
    fn del_opening(&mut self, id: &StakeholderId);

    /// Remove `id`'s relayed shares, if any.
    fn del_shares(&mut self, id: &StakeholderId);

    /// Remove `id`'s certificate, if any. Certificates normally persist for
    /// their full validity window; this exists so a transactional layer can
    /// invert a certificate insert.
    fn del_certificate(&mut self, id: &StakeholderId);

    /// Clear commitments, openings and shares. Certificates persist across
    /// epoch rollover.
    fn reset_cos(&mut self);

    /// Advance the logical clock. The position may never decrease.
    fn set_epoch_or_slot(&mut self, position: EpochOrSlot) -> Result<()>;
}
