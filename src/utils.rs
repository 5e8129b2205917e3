// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{CallerError, Result};
use k256::{elliptic_curve::PrimeField, Scalar};
use merlin::Transcript;
use tracing::error;

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

/// Helper type for parsing a byte array into slices.
pub(crate) struct ParseBytes<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ParseBytes<'a> {
    /// Consume bytes for parsing.
    pub(crate) fn new(bytes: &'a [u8]) -> ParseBytes<'a> {
        ParseBytes { bytes, offset: 0 }
    }

    /// Take next `n` bytes from the array.
    pub(crate) fn take_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(n)
            .ok_or(CallerError::DeserializationFailed)?;
        let slice = &self
            .bytes
            .get(self.offset..end)
            .ok_or(CallerError::DeserializationFailed)?;
        self.offset = end;
        Ok(slice)
    }

    /// Parse the next 8 bytes as a little-endian encoded usize.
    pub(crate) fn take_len(&mut self) -> Result<usize> {
        const LENGTH_BYTES: usize = 8;

        let len_slice = self.take_bytes(LENGTH_BYTES)?;
        let len_bytes: [u8; LENGTH_BYTES] = len_slice.try_into().map_err(|_| {
            error!(
                "Failed to convert byte array (should always work because we
                   defined it to be exactly 8 bytes"
            );
            crate::errors::InternalError::InternalInvariantFailed
        })?;
        let len = u64::from_le_bytes(len_bytes);
        usize::try_from(len).map_err(|_| CallerError::DeserializationFailed.into())
    }

    /// Parse a length prefix that counts items still to be parsed.
    ///
    /// Each counted item occupies at least one byte, so a count exceeding the
    /// remaining input is malformed and rejected before any allocation.
    pub(crate) fn take_count(&mut self) -> Result<usize> {
        let count = self.take_len()?;
        if count > self.remaining() {
            error!("Item count {} exceeds the {} remaining input bytes", count, self.remaining());
            Err(CallerError::DeserializationFailed)?;
        }
        Ok(count)
    }

    /// Number of bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Assert that the input was consumed exactly; trailing bytes are
    /// malformed.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            error!("Decoded message has {} trailing bytes", self.remaining());
            Err(CallerError::DeserializationFailed)?;
        }
        Ok(())
    }
}

/// Derive a deterministic pseudorandom scalar from the [`Transcript`].
///
/// To avoid sampling bias we can't reduce a hash output modulo the curve
/// order, because that would bias smaller values. Instead we re-draw until
/// the challenge bytes are a canonical scalar encoding (the transcript state
/// advances on every draw, so retries produce fresh bytes).
pub(crate) fn scalar_challenge_from_transcript(transcript: &mut Transcript) -> Result<Scalar> {
    let mut challenge = [0u8; 32];
    for _ in 0..CRYPTOGRAPHIC_RETRY_MAX {
        transcript.challenge_bytes(b"sampling scalar challenge", &mut challenge);
        let candidate: Option<Scalar> = Scalar::from_repr(challenge.into()).into();
        if let Some(scalar) = candidate {
            return Ok(scalar);
        }
    }
    Err(CallerError::RetryFailed)?
}

////////////////////////////
// Test Utility Functions //
////////////////////////////

/// Returns an rng to be used for testing. This will print the rng seed
/// to stderr so that if a test fails, the failing seed can be recovered
/// and used for debugging.
#[cfg(test)]
pub(crate) mod testing {
    use rand::{
        rngs::{OsRng, StdRng},
        Rng, SeedableRng,
    };
    use tracing_subscriber::{
        filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    /// Initialize any fields necessary for our tests. This should be called at
    /// the top of all our tests. This function is idempotent.
    ///
    /// This will print the rng seed to stderr so that if a test fails, the
    /// failing seed can be recovered and used for debugging.
    pub(crate) fn init_testing() -> StdRng {
        let mut seeder = OsRng;
        let seed = seeder.gen();
        eprintln!(
            "To re-run test with the same randomness, use init_testing_with_seed() with the following seed:"
        );
        eprintln!("\t{seed:?}");
        StdRng::from_seed(seed)
    }

    /// A seeded version of [`init_testing`]. This function can be used when a
    /// test fails unexpectedly, and you want to reproduce the run using a
    /// specific RNG seed.
    ///
    /// **Additionally, turns on logging by default.**
    ///
    /// This function should only be called when debugging. Avoid calling as
    /// part of a normal unit test execution. Otherwise, it will turn on
    /// logging for all tests, which is confusing as some tests purposely give
    /// bad input to functions, triggering an error and a logging event for a
    /// test that then reports `ok`.
    #[allow(unused)]
    pub(crate) fn init_testing_with_seed(seed: [u8; 32]) -> StdRng {
        let logging_level = EnvFilter::from_default_env()
            .max_level_hint()
            .unwrap()
            .into_level()
            .unwrap();

        // Only capture logging events from this crate.
        let targets = Targets::new().with_target("ssc", logging_level);
        let stdout_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_filter(targets);

        // It's okay if this fails. It just means logging has already been set
        // up for this thread.
        let _ = tracing_subscriber::registry().with(stdout_layer).try_init();

        // Return RNG
        StdRng::from_seed(seed)
    }
}
