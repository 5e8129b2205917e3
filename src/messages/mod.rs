// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Protocol message types and their construction and verification.

mod certificate;
mod commitment;
mod payload;

pub use certificate::VssCertificate;
pub use commitment::{
    gen_commitment_and_opening, verify_opening, Commitment, CommitmentViolation,
    CommitmentViolations, Opening, SignedCommitment,
};
pub use payload::SscPayload;

use crate::{
    keys::StakeholderId,
    pvss::DecryptedShare,
};
use std::collections::BTreeMap;

/// All signed commitments accumulated for an epoch, at most one per
/// stakeholder.
pub type CommitmentsMap = BTreeMap<StakeholderId, SignedCommitment>;

/// All openings accumulated for an epoch.
pub type OpeningsMap = BTreeMap<StakeholderId, Opening>;

/// Shares one stakeholder has decrypted, keyed by the stakeholder whose
/// commitment each share belongs to.
pub type InnerSharesMap = BTreeMap<StakeholderId, DecryptedShare>;

/// All relayed shares for an epoch: `shares[x][y]` is the share `x` has
/// decrypted of `y`'s commitment.
pub type SharesMap = BTreeMap<StakeholderId, InnerSharesMap>;

/// All known VSS certificates, keyed by their signer.
pub type VssCertificatesMap = BTreeMap<StakeholderId, VssCertificate>;
