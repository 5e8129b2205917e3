// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implementation of the shared seed computation (SSC) protocol
//!
//! A proof-of-stake chain needs an unbiasable random seed each epoch to
//! select slot leaders. This crate implements the core of a multi-party
//! computation in which every eligible stakeholder escrows a random secret
//! with a publicly verifiable secret sharing (PVSS) scheme; the epoch seed
//! is the XOR of all escrowed secrets, so it stays unpredictable unless a
//! threshold of participants collude.
//!
//! An epoch runs the protocol in three phases, separated by idle gaps that
//! let the network propagate each phase's messages:
//! - **Commitment**: stakeholders publish a signed [`Commitment`] escrowing
//!   a fresh secret, with one encrypted share per eligible participant.
//! - **Opening**: stakeholders reveal their secret with an [`Opening`],
//!   which anyone can check against the commitment.
//! - **Shares**: participants relay decrypted shares of the commitments
//!   whose authors withheld their opening, so those secrets can be
//!   recovered anyway.
//!
//! Note that this crate only provides the protocol core: message
//! construction and verification, the phase schedule, the per-epoch
//! accumulator ([`toss`]) and the final seed reduction. Networking,
//! consensus, block storage and the stake distribution oracle are the
//! calling application's concern; they feed verified blocks into
//! [`toss::verify_and_apply_payload`] and read the oracle views installed
//! on the accumulator.

#![warn(missing_docs)]

pub mod errors;

#[macro_use]
mod codec;
mod curve;
mod keys;
mod messages;
mod parameters;
mod phase;
pub mod pvss;
mod seed;
pub mod toss;
mod utils;

pub use codec::Canonical;
pub use keys::{StakeholderId, VssPublicKey, VssSecretKey};
pub use messages::{
    gen_commitment_and_opening, verify_opening, Commitment, CommitmentViolation,
    CommitmentViolations, CommitmentsMap, InnerSharesMap, Opening, OpeningsMap, SharesMap,
    SignedCommitment, SscPayload, VssCertificate, VssCertificatesMap,
};
pub use parameters::{vss_threshold, ProtocolParams};
pub use phase::{EpochIndex, EpochOrSlot, LocalSlotIndex, SlotId, SscPhase};
pub use seed::{secret_to_fts_seed, FtsSeed, SEED_LENGTH};
