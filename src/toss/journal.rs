// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{RichmenSet, Toss, TossRead};
use crate::{
    errors::{CallerError, Result},
    keys::StakeholderId,
    messages::{
        CommitmentsMap, InnerSharesMap, Opening, OpeningsMap, SharesMap, SignedCommitment,
        VssCertificate, VssCertificatesMap,
    },
    phase::{EpochIndex, EpochOrSlot},
};
use tracing::error;

/// One recorded inverse of a mutation, replayed on rollback.
#[derive(Debug)]
enum UndoOp {
    Commitment(StakeholderId, Option<SignedCommitment>),
    Opening(StakeholderId, Option<Opening>),
    Shares(StakeholderId, Option<InnerSharesMap>),
    Certificate(StakeholderId, Option<VssCertificate>),
    ResetCos(CommitmentsMap, OpeningsMap, SharesMap),
}

/// A transactional layer over a [`Toss`] implementation.
///
/// Map mutations are applied to the underlying accumulator immediately, so
/// reads through the journal observe them, while an undo log records each
/// mutation's inverse. Clock advances are buffered in the journal and only
/// reach the underlying accumulator on commit, keeping its monotonicity
/// intact across a rollback. Dropping the journal rolls everything back in
/// reverse order; [`TossJournal::commit`] makes the mutations permanent.
/// Journals nest: layering one journal over another scopes rollback to the
/// inner transaction.
#[derive(Debug)]
pub struct TossJournal<'a, T: Toss> {
    inner: &'a mut T,
    undo: Vec<UndoOp>,
    pending_clock: Option<EpochOrSlot>,
}

impl<'a, T: Toss> TossJournal<'a, T> {
    /// Open a transaction over `inner`.
    pub fn new(inner: &'a mut T) -> Self {
        Self {
            inner,
            undo: Vec::new(),
            pending_clock: None,
        }
    }

    /// Make all mutations applied through this journal permanent.
    pub fn commit(mut self) {
        if let Some(position) = self.pending_clock.take() {
            // The position was validated against the effective clock when it
            // was buffered, so the inner accumulator accepts it.
            let _ = self.inner.set_epoch_or_slot(position);
        }
        self.undo.clear();
    }

    /// Undo all mutations applied through this journal. Equivalent to
    /// dropping it.
    pub fn rollback(self) {}
}

impl<T: Toss> Drop for TossJournal<'_, T> {
    fn drop(&mut self) {
        for op in std::mem::take(&mut self.undo).into_iter().rev() {
            match op {
                UndoOp::Commitment(_, Some(previous)) => self.inner.put_commitment(previous),
                UndoOp::Commitment(id, None) => self.inner.del_commitment(&id),
                UndoOp::Opening(id, Some(previous)) => self.inner.put_opening(id, previous),
                UndoOp::Opening(id, None) => self.inner.del_opening(&id),
                UndoOp::Shares(id, Some(previous)) => self.inner.put_shares(id, previous),
                UndoOp::Shares(id, None) => self.inner.del_shares(&id),
                UndoOp::Certificate(_, Some(previous)) => self.inner.put_certificate(previous),
                UndoOp::Certificate(id, None) => self.inner.del_certificate(&id),
                UndoOp::ResetCos(commitments, openings, shares) => {
                    for (_, commitment) in commitments {
                        self.inner.put_commitment(commitment);
                    }
                    for (id, opening) in openings {
                        self.inner.put_opening(id, opening);
                    }
                    for (id, inner_shares) in shares {
                        self.inner.put_shares(id, inner_shares);
                    }
                }
            }
        }
    }
}

impl<T: Toss> TossRead for TossJournal<'_, T> {
    fn commitments(&self) -> &CommitmentsMap {
        self.inner.commitments()
    }

    fn openings(&self) -> &OpeningsMap {
        self.inner.openings()
    }

    fn shares(&self) -> &SharesMap {
        self.inner.shares()
    }

    fn certificates(&self) -> &VssCertificatesMap {
        self.inner.certificates()
    }

    fn stable_certificates(&self, epoch: EpochIndex) -> VssCertificatesMap {
        self.inner.stable_certificates(epoch)
    }

    fn richmen(&self, epoch: EpochIndex) -> Option<&RichmenSet> {
        self.inner.richmen(epoch)
    }

    fn epoch_or_slot(&self) -> EpochOrSlot {
        self.pending_clock.unwrap_or_else(|| self.inner.epoch_or_slot())
    }
}

impl<T: Toss> Toss for TossJournal<'_, T> {
    fn put_commitment(&mut self, commitment: SignedCommitment) {
        let id = commitment.stakeholder_id();
        let previous = self.inner.commitments().get(&id).cloned();
        self.undo.push(UndoOp::Commitment(id, previous));
        self.inner.put_commitment(commitment);
    }

    fn put_opening(&mut self, id: StakeholderId, opening: Opening) {
        let previous = self.inner.openings().get(&id).cloned();
        self.undo.push(UndoOp::Opening(id, previous));
        self.inner.put_opening(id, opening);
    }

    fn put_shares(&mut self, id: StakeholderId, shares: InnerSharesMap) {
        let previous = self.inner.shares().get(&id).cloned();
        self.undo.push(UndoOp::Shares(id, previous));
        self.inner.put_shares(id, shares);
    }

    fn put_certificate(&mut self, certificate: VssCertificate) {
        let id = certificate.stakeholder_id();
        let previous = self.inner.certificates().get(&id).cloned();
        self.undo.push(UndoOp::Certificate(id, previous));
        self.inner.put_certificate(certificate);
    }

    fn del_commitment(&mut self, id: &StakeholderId) {
        let previous = self.inner.commitments().get(id).cloned();
        self.undo.push(UndoOp::Commitment(*id, previous));
        self.inner.del_commitment(id);
    }

    fn del_opening(&mut self, id: &StakeholderId) {
        let previous = self.inner.openings().get(id).cloned();
        self.undo.push(UndoOp::Opening(*id, previous));
        self.inner.del_opening(id);
    }

    fn del_shares(&mut self, id: &StakeholderId) {
        let previous = self.inner.shares().get(id).cloned();
        self.undo.push(UndoOp::Shares(*id, previous));
        self.inner.del_shares(id);
    }

    fn del_certificate(&mut self, id: &StakeholderId) {
        let previous = self.inner.certificates().get(id).cloned();
        self.undo.push(UndoOp::Certificate(*id, previous));
        self.inner.del_certificate(id);
    }

    fn reset_cos(&mut self) {
        self.undo.push(UndoOp::ResetCos(
            self.inner.commitments().clone(),
            self.inner.openings().clone(),
            self.inner.shares().clone(),
        ));
        self.inner.reset_cos();
    }

    fn set_epoch_or_slot(&mut self, position: EpochOrSlot) -> Result<()> {
        if position < self.epoch_or_slot() {
            error!(
                "Refusing to move the clock backwards from {} to {}",
                self.epoch_or_slot(),
                position
            );
            Err(CallerError::ClockRegression)?;
        }
        self.pending_clock = Some(position);
        Ok(())
    }
}
