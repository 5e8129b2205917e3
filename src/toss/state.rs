// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{RichmenSet, Toss, TossRead};
use crate::{
    codec::Canonical,
    errors::{CallerError, Result},
    keys::StakeholderId,
    messages::{
        CommitmentsMap, InnerSharesMap, Opening, OpeningsMap, SharesMap, SignedCommitment,
        VssCertificate, VssCertificatesMap,
    },
    phase::{EpochIndex, EpochOrSlot},
    utils::ParseBytes,
};
use std::collections::BTreeMap;
use tracing::error;

/// Schema tag of the snapshot encoding produced by [`TossState::snapshot`].
const SNAPSHOT_SCHEMA_VERSION: u8 = 0;

/// In-memory implementation of the per-epoch accumulator.
///
/// Besides the accumulated protocol messages, the state holds two read-only
/// oracle views installed by the driver: the per-epoch richmen sets and the
/// per-epoch stable certificates. Neither is part of the snapshot; the
/// driver re-installs them after a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TossState {
    commitments: CommitmentsMap,
    openings: OpeningsMap,
    shares: SharesMap,
    certificates: VssCertificatesMap,
    epoch_or_slot: EpochOrSlot,
    richmen: BTreeMap<EpochIndex, RichmenSet>,
    stable_certificates: BTreeMap<EpochIndex, VssCertificatesMap>,
}

impl TossState {
    /// Create an empty accumulator positioned at `position`.
    pub fn new(position: EpochOrSlot) -> Self {
        Self {
            epoch_or_slot: position,
            ..Default::default()
        }
    }

    /// Install the richmen set for `epoch`, as computed by the stake
    /// distribution oracle.
    pub fn install_richmen(&mut self, epoch: EpochIndex, richmen: RichmenSet) {
        let _ = self.richmen.insert(epoch, richmen);
    }

    /// Install the certificates considered stable at `epoch`, as decided by
    /// the chain layer.
    pub fn install_stable_certificates(
        &mut self,
        epoch: EpochIndex,
        certificates: VssCertificatesMap,
    ) {
        let _ = self.stable_certificates.insert(epoch, certificates);
    }

    /// Serialize the accumulated messages and the clock position.
    ///
    /// The encoding is the canonical codec behind a schema tag, so it is
    /// stable across minor versions of this crate.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = vec![SNAPSHOT_SCHEMA_VERSION];
        self.epoch_or_slot.append_to(&mut out);
        self.commitments.append_to(&mut out);
        self.openings.append_to(&mut out);
        self.shares.append_to(&mut out);
        self.certificates.append_to(&mut out);
        out
    }

    /// Restore an accumulator from a [`TossState::snapshot`]. Oracle views
    /// start empty.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let mut parser = ParseBytes::new(bytes);
        let version = parser.take_bytes(1)?[0];
        if version != SNAPSHOT_SCHEMA_VERSION {
            error!(
                "Unsupported snapshot schema version {} (expected {})",
                version, SNAPSHOT_SCHEMA_VERSION
            );
            Err(CallerError::DeserializationFailed)?;
        }
        let epoch_or_slot = EpochOrSlot::parse(&mut parser)?;
        let commitments = CommitmentsMap::parse(&mut parser)?;
        let openings = OpeningsMap::parse(&mut parser)?;
        let shares = SharesMap::parse(&mut parser)?;
        let certificates = VssCertificatesMap::parse(&mut parser)?;
        parser.finish()?;
        Ok(Self {
            commitments,
            openings,
            shares,
            certificates,
            epoch_or_slot,
            richmen: BTreeMap::new(),
            stable_certificates: BTreeMap::new(),
        })
    }
}

impl TossRead for TossState {
    fn commitments(&self) -> &CommitmentsMap {
        &self.commitments
    }

    fn openings(&self) -> &OpeningsMap {
        &self.openings
    }

    fn shares(&self) -> &SharesMap {
        &self.shares
    }

    fn certificates(&self) -> &VssCertificatesMap {
        &self.certificates
    }

    fn stable_certificates(&self, epoch: EpochIndex) -> VssCertificatesMap {
        self.stable_certificates
            .get(&epoch)
            .cloned()
            .unwrap_or_default()
    }

    fn richmen(&self, epoch: EpochIndex) -> Option<&RichmenSet> {
        self.richmen.get(&epoch)
    }

    fn epoch_or_slot(&self) -> EpochOrSlot {
        self.epoch_or_slot
    }
}

impl Toss for TossState {
    fn put_commitment(&mut self, commitment: SignedCommitment) {
        let _ = self
            .commitments
            .insert(commitment.stakeholder_id(), commitment);
    }

    fn put_opening(&mut self, id: StakeholderId, opening: Opening) {
        let _ = self.openings.insert(id, opening);
    }

    fn put_shares(&mut self, id: StakeholderId, shares: InnerSharesMap) {
        let _ = self.shares.insert(id, shares);
    }

    fn put_certificate(&mut self, certificate: VssCertificate) {
        let _ = self
            .certificates
            .insert(certificate.stakeholder_id(), certificate);
    }

    fn del_commitment(&mut self, id: &StakeholderId) {
        let _ = self.commitments.remove(id);
    }

    fn del_opening(&mut self, id: &StakeholderId) {
        let _ = self.openings.remove(id);
    }

    fn del_shares(&mut self, id: &StakeholderId) {
        let _ = self.shares.remove(id);
    }

    fn del_certificate(&mut self, id: &StakeholderId) {
        let _ = self.certificates.remove(id);
    }

    fn reset_cos(&mut self) {
        self.commitments.clear();
        self.openings.clear();
        self.shares.clear();
    }

    fn set_epoch_or_slot(&mut self, position: EpochOrSlot) -> Result<()> {
        if position < self.epoch_or_slot {
            error!(
                "Refusing to move the clock backwards from {} to {}",
                self.epoch_or_slot, position
            );
            Err(CallerError::ClockRegression)?;
        }
        self.epoch_or_slot = position;
        Ok(())
    }
}
