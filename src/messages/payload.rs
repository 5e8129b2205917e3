// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{OpeningsMap, SharesMap, SignedCommitment, VssCertificate};
use crate::{
    codec::Canonical,
    errors::{CallerError, Result},
    phase::SscPhase,
    utils::ParseBytes,
};

/// The protocol data carried by one block.
///
/// Each active phase admits its own payload shape; fresh certificates may
/// ride along with any of them, and blocks in idle gaps may carry
/// certificates alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SscPayload {
    /// Commitment-phase payload.
    Commitments {
        /// Signed commitments, in block order.
        commitments: Vec<SignedCommitment>,
        /// Certificates announced alongside.
        certificates: Vec<VssCertificate>,
    },
    /// Opening-phase payload.
    Openings {
        /// Openings keyed by their author.
        openings: OpeningsMap,
        /// Certificates announced alongside.
        certificates: Vec<VssCertificate>,
    },
    /// Shares-phase payload.
    Shares {
        /// Relayed decrypted shares, keyed by decryptor then author.
        shares: SharesMap,
        /// Certificates announced alongside.
        certificates: Vec<VssCertificate>,
    },
    /// Certificates-only payload, admitted in any slot.
    Certificates {
        /// Certificates announced in this block.
        certificates: Vec<VssCertificate>,
    },
}

impl SscPayload {
    /// The phase window this payload is admitted in, or `None` if it is
    /// admitted anywhere.
    pub fn expected_phase(&self) -> Option<SscPhase> {
        match self {
            SscPayload::Commitments { .. } => Some(SscPhase::Commitment),
            SscPayload::Openings { .. } => Some(SscPhase::Opening),
            SscPayload::Shares { .. } => Some(SscPhase::Shares),
            SscPayload::Certificates { .. } => None,
        }
    }

    /// The certificates riding along with this payload.
    pub fn certificates(&self) -> &[VssCertificate] {
        match self {
            SscPayload::Commitments { certificates, .. }
            | SscPayload::Openings { certificates, .. }
            | SscPayload::Shares { certificates, .. }
            | SscPayload::Certificates { certificates } => certificates,
        }
    }
}

impl Canonical for SscPayload {
    fn append_to(&self, out: &mut Vec<u8>) {
        match self {
            SscPayload::Commitments {
                commitments,
                certificates,
            } => {
                out.push(0);
                commitments.append_to(out);
                certificates.append_to(out);
            }
            SscPayload::Openings {
                openings,
                certificates,
            } => {
                out.push(1);
                openings.append_to(out);
                certificates.append_to(out);
            }
            SscPayload::Shares {
                shares,
                certificates,
            } => {
                out.push(2);
                shares.append_to(out);
                certificates.append_to(out);
            }
            SscPayload::Certificates { certificates } => {
                out.push(3);
                certificates.append_to(out);
            }
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        match parser.take_bytes(1)?[0] {
            0 => Ok(SscPayload::Commitments {
                commitments: Vec::parse(parser)?,
                certificates: Vec::parse(parser)?,
            }),
            1 => Ok(SscPayload::Openings {
                openings: OpeningsMap::parse(parser)?,
                certificates: Vec::parse(parser)?,
            }),
            2 => Ok(SscPayload::Shares {
                shares: SharesMap::parse(parser)?,
                certificates: Vec::parse(parser)?,
            }),
            3 => Ok(SscPayload::Certificates {
                certificates: Vec::parse(parser)?,
            }),
            tag => {
                tracing::error!("Unknown payload tag {}", tag);
                Err(CallerError::DeserializationFailed)?
            }
        }
    }
}
