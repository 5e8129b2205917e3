// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Epoch-local slot positions and the phase schedule.
//!
//! An epoch spans `6k` slots and hosts one run of the three-phase protocol.
//! The commitment, opening and shares windows each occupy `k` slots and are
//! separated by idle gaps of the same length, which give the network time to
//! propagate the preceding phase's messages before the next phase admits any.

use crate::{codec::Canonical, errors::Result, parameters::ProtocolParams, utils::ParseBytes};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Index of an epoch, counted from genesis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EpochIndex(
    /// The raw epoch number.
    pub u64,
);

impl Display for EpochIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}

impl Canonical for EpochIndex {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.0.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        Ok(Self(u64::parse(parser)?))
    }
}

/// Slot position within an epoch, in `[0, 6k)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LocalSlotIndex(
    /// The raw slot position.
    pub u64,
);

/// A globally unique slot position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SlotId {
    /// The epoch this slot belongs to.
    pub epoch: EpochIndex,
    /// The slot's position within the epoch.
    pub slot: LocalSlotIndex,
}

impl SlotId {
    /// Construct a slot id from raw indices.
    pub fn new(epoch: u64, slot: u64) -> Self {
        Self {
            epoch: EpochIndex(epoch),
            slot: LocalSlotIndex(slot),
        }
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} of {}", self.slot.0, self.epoch)
    }
}

/// A position on the logical clock of the chain: either the boundary of an
/// epoch or a slot within it. The boundary of epoch `e` precedes every slot
/// of epoch `e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochOrSlot {
    /// The boundary preceding the first slot of an epoch.
    EpochBoundary(EpochIndex),
    /// A slot position.
    Slot(SlotId),
}

impl Default for EpochOrSlot {
    fn default() -> Self {
        EpochOrSlot::EpochBoundary(EpochIndex(0))
    }
}

impl EpochOrSlot {
    /// The epoch this position falls in.
    pub fn epoch(&self) -> EpochIndex {
        match self {
            EpochOrSlot::EpochBoundary(epoch) => *epoch,
            EpochOrSlot::Slot(slot_id) => slot_id.epoch,
        }
    }

    fn order_key(&self) -> (u64, u8, u64) {
        match self {
            EpochOrSlot::EpochBoundary(epoch) => (epoch.0, 0, 0),
            EpochOrSlot::Slot(slot_id) => (slot_id.epoch.0, 1, slot_id.slot.0),
        }
    }
}

impl PartialOrd for EpochOrSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EpochOrSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl Display for EpochOrSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EpochOrSlot::EpochBoundary(epoch) => write!(f, "boundary of {epoch}"),
            EpochOrSlot::Slot(slot_id) => write!(f, "{slot_id}"),
        }
    }
}

impl Canonical for EpochOrSlot {
    fn append_to(&self, out: &mut Vec<u8>) {
        match self {
            EpochOrSlot::EpochBoundary(epoch) => {
                out.push(0);
                epoch.append_to(out);
            }
            EpochOrSlot::Slot(slot_id) => {
                out.push(1);
                slot_id.epoch.append_to(out);
                slot_id.slot.0.append_to(out);
            }
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        match parser.take_bytes(1)?[0] {
            0 => Ok(EpochOrSlot::EpochBoundary(EpochIndex::parse(parser)?)),
            1 => {
                let epoch = EpochIndex::parse(parser)?;
                let slot = u64::parse(parser)?;
                Ok(EpochOrSlot::Slot(SlotId {
                    epoch,
                    slot: LocalSlotIndex(slot),
                }))
            }
            tag => {
                tracing::error!("Unknown epoch-or-slot tag {}", tag);
                Err(crate::errors::CallerError::DeserializationFailed)?
            }
        }
    }
}

/// The three active phases of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SscPhase {
    /// Stakeholders publish signed commitments.
    Commitment,
    /// Stakeholders open their commitments.
    Opening,
    /// Stakeholders relay decrypted shares of unopened commitments.
    Shares,
}

impl ProtocolParams {
    /// True iff `slot` falls in the commitment window `[0, k)`.
    pub fn is_commitment_slot(&self, slot: LocalSlotIndex) -> bool {
        slot.0 < self.security_param()
    }

    /// True iff `slot` falls in the opening window `[2k, 3k)`.
    pub fn is_opening_slot(&self, slot: LocalSlotIndex) -> bool {
        let k = self.security_param();
        (2 * k..3 * k).contains(&slot.0)
    }

    /// True iff `slot` falls in the shares window `[4k, 5k)`.
    pub fn is_shares_slot(&self, slot: LocalSlotIndex) -> bool {
        let k = self.security_param();
        (4 * k..5 * k).contains(&slot.0)
    }

    /// The phase `slot` falls in, or `None` for an idle gap.
    pub fn current_phase(&self, slot: LocalSlotIndex) -> Option<SscPhase> {
        if self.is_commitment_slot(slot) {
            Some(SscPhase::Commitment)
        } else if self.is_opening_slot(slot) {
            Some(SscPhase::Opening)
        } else if self.is_shares_slot(slot) {
            Some(SscPhase::Shares)
        } else {
            None
        }
    }

    /// [`ProtocolParams::is_commitment_slot`] on a full slot id.
    pub fn is_commitment_slot_id(&self, slot_id: SlotId) -> bool {
        self.is_commitment_slot(slot_id.slot)
    }

    /// [`ProtocolParams::is_opening_slot`] on a full slot id.
    pub fn is_opening_slot_id(&self, slot_id: SlotId) -> bool {
        self.is_opening_slot(slot_id.slot)
    }

    /// [`ProtocolParams::is_shares_slot`] on a full slot id.
    pub fn is_shares_slot_id(&self, slot_id: SlotId) -> bool {
        self.is_shares_slot(slot_id.slot)
    }
}
