// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Errors for the shared seed computation protocol.

use thiserror::Error;

/// The default Result type used in this crate.
pub type Result<T> = std::result::Result<T, InternalError>;

/// Errors that can arise while running the protocol.
///
/// Errors that reflect misuse by the calling application are collected in
/// [`CallerError`] and wrapped by the
/// [`CallingApplicationMistake`](InternalError::CallingApplicationMistake)
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum InternalError {
    #[error("an internal invariant of the protocol was violated")]
    InternalInvariantFailed,
    #[error("could not serialize protocol message")]
    Serialization,
    #[error("the calling application made a mistake: {0}")]
    CallingApplicationMistake(CallerError),
}

/// Errors that are caused by incorrect behavior by the calling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallerError {
    /// Input to a function was ill-formed.
    #[error("input to a function was ill-formed")]
    BadInput,
    /// A message or stored value could not be decoded.
    #[error("tried to decode a malformed byte string")]
    DeserializationFailed,
    /// The sharing threshold was outside `1..=n` for `n` recipients.
    #[error("sharing threshold {threshold} is out of range for {participants} recipients")]
    BadThreshold {
        /// The requested recovery threshold.
        threshold: usize,
        /// The number of share recipients.
        participants: usize,
    },
    /// The recipient list passed to the dealer contained a repeated key.
    #[error("the recipient list contains a duplicate VSS public key")]
    DuplicateVssKey,
    /// Two byte strings that must have equal lengths did not.
    #[error("byte strings have mismatched lengths ({left} vs. {right})")]
    LengthMismatch {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },
    /// The logical clock was asked to move backwards.
    #[error("the epoch-or-slot position may not decrease")]
    ClockRegression,
    /// A bounded retry loop drew too many unusable random samples.
    #[error("cryptographic sampling failed after the maximum number of retries")]
    RetryFailed,
}

impl From<CallerError> for InternalError {
    fn from(error: CallerError) -> Self {
        Self::CallingApplicationMistake(error)
    }
}
