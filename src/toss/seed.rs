// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Reduction of a closed epoch's accumulator to the FTS seed.

use super::TossRead;
use crate::{
    errors::InternalError,
    pvss::{recover_secret, DecryptedShare, Secret},
    seed::{secret_to_fts_seed, FtsSeed},
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

/// Reasons the epoch seed could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    /// Not a single committed secret was opened or recoverable.
    #[error("no secrets could be extracted for this epoch")]
    NoSecretsFound,
    /// A crate-level invariant failed during reduction.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Reduce the accumulator's final state to the epoch's FTS seed.
///
/// Every stakeholder with a commitment contributes the secret it escrowed:
/// directly through its opening when it published one, otherwise by
/// recovering the secret from the decrypted shares other participants
/// relayed. A participant whose secret was neither opened nor backed by a
/// recovery threshold of shares is dropped from the epoch — with an honest
/// majority of share relayers this only happens to withheld commitments.
pub fn calculate_seed<T: TossRead>(toss: &T) -> std::result::Result<FtsSeed, SeedError> {
    let mut secrets = Vec::<Secret>::new();
    for (id, signed) in toss.commitments() {
        if let Some(opening) = toss.openings().get(id) {
            secrets.push(*opening.secret());
            continue;
        }

        let relayed: Vec<DecryptedShare> = toss
            .shares()
            .values()
            .filter_map(|inner| inner.get(id))
            .copied()
            .collect();
        let distinct: HashSet<u64> = relayed.iter().map(DecryptedShare::id).collect();
        // Recovery must use the threshold the commitment was actually dealt
        // with; interpolating from fewer points than its polynomial degree
        // requires would yield a different secret, not an error.
        let threshold = signed.commitment().extra().threshold();
        if distinct.len() < threshold {
            warn!(
                "Dropping stakeholder {}: no opening and only {} of {} shares needed for recovery",
                id,
                distinct.len(),
                threshold
            );
            continue;
        }
        secrets.push(recover_secret(threshold, &relayed)?);
    }

    if secrets.is_empty() {
        return Err(SeedError::NoSecretsFound);
    }
    info!("Calculated the epoch seed from {} secrets", secrets.len());

    let mut seed = FtsSeed::zero();
    for secret in &secrets {
        seed = seed.xor(&secret_to_fts_seed(secret))?;
    }
    Ok(seed)
}
