// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! secp256k1 group arithmetic used by the PVSS scheme.

use crate::errors::{CallerError, Result};
use k256::{
    elliptic_curve::{group::GroupEncoding, point::AffineCoordinates, Field, PrimeField},
    AffinePoint, FieldBytes, ProjectivePoint, Scalar,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::error;
use zeroize::Zeroize;

/// Byte length of a SEC1-compressed curve point.
pub(crate) const POINT_LENGTH: usize = 33;

/// Byte length of a canonical scalar encoding.
pub(crate) const SCALAR_LENGTH: usize = 32;

/// Wrapper around [`k256::ProjectivePoint`] so that we can define our own
/// serialization/deserialization for it.
///
/// Note that this type derives [`Debug`]; if a [`CurvePoint`] is used in a
/// private type, `Debug` should be manually implemented with the field of
/// this type explicitly redacted!
#[derive(Eq, PartialEq, Debug, Clone, Copy, Zeroize)]
pub struct CurvePoint(pub(crate) ProjectivePoint);

impl CurvePoint {
    pub(crate) const GENERATOR: Self = CurvePoint(ProjectivePoint::GENERATOR);
    pub(crate) const IDENTITY: Self = CurvePoint(ProjectivePoint::IDENTITY);

    /// Multiply `self` by a scalar.
    pub(crate) fn multiply_by_scalar(&self, scalar: &Scalar) -> Self {
        Self(self.0 * scalar)
    }

    /// Get the affine x-coordinate of the curve point.
    pub(crate) fn x_affine(&self) -> FieldBytes {
        self.0.to_affine().x()
    }

    /// Serialize the point as an affine-encoded secp256k1 byte array.
    pub(crate) fn to_bytes(self) -> Vec<u8> {
        let mut generic_array = AffinePoint::from(self.0).to_bytes();
        let bytes = generic_array.to_vec();
        generic_array.zeroize();
        bytes
    }

    pub(crate) fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut fixed_len_bytes: [u8; POINT_LENGTH] = bytes.try_into().map_err(|_| {
            error!("Failed to encode bytes as a curve point");
            CallerError::DeserializationFailed
        })?;

        let point: Option<AffinePoint> = AffinePoint::from_bytes(&fixed_len_bytes.into()).into();
        fixed_len_bytes.zeroize();

        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Failed to encode bytes as a curve point");
                Err(CallerError::DeserializationFailed)?
            }
        }
    }
}

impl std::ops::Add for CurvePoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for CurvePoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<ProjectivePoint> for CurvePoint {
    fn from(p: ProjectivePoint) -> Self {
        Self(p)
    }
}

impl Serialize for CurvePoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let afp = AffinePoint::from(self.0);
        afp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = AffinePoint::deserialize(deserializer)?;
        Ok(Self(p.into()))
    }
}

/// Sample a uniformly random scalar.
pub(crate) fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

/// Sample a uniformly random nonzero scalar.
///
/// This should virtually never need more than one draw, but the retry count
/// is bounded so a broken RNG surfaces as an error instead of a hang.
pub(crate) fn random_nonzero_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Scalar> {
    std::iter::repeat_with(|| Scalar::random(&mut *rng))
        .take(crate::utils::CRYPTOGRAPHIC_RETRY_MAX)
        .find(|scalar| scalar != &Scalar::ZERO)
        .ok_or_else(|| CallerError::RetryFailed.into())
}

/// Canonical 32-byte big-endian encoding of a scalar.
pub(crate) fn scalar_to_bytes(scalar: &Scalar) -> Vec<u8> {
    scalar.to_bytes().to_vec()
}

/// Decode a canonical 32-byte scalar encoding, rejecting values that are not
/// fully reduced.
pub(crate) fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let fixed_len_bytes: [u8; SCALAR_LENGTH] = bytes.try_into().map_err(|_| {
        error!("Failed to decode bytes as a scalar");
        CallerError::DeserializationFailed
    })?;
    let scalar: Option<Scalar> = Scalar::from_repr(fixed_len_bytes.into()).into();
    scalar.ok_or_else(|| {
        error!("Failed to decode bytes as a scalar");
        CallerError::DeserializationFailed.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;
    use k256::elliptic_curve::Group;

    #[test]
    fn curve_point_byte_conversion_works() {
        let rng = &mut init_testing();
        let point = CurvePoint(ProjectivePoint::random(rng));
        let bytes = point.to_bytes();
        let reconstructed = CurvePoint::try_from_bytes(&bytes).unwrap();
        assert_eq!(point, reconstructed);
    }

    #[test]
    fn scalar_byte_conversion_works() {
        let rng = &mut init_testing();
        let scalar = random_scalar(rng);
        let bytes = scalar_to_bytes(&scalar);
        let reconstructed = scalar_from_bytes(&bytes).unwrap();
        assert_eq!(scalar, reconstructed);
    }

    #[test]
    fn unreduced_scalar_encodings_are_rejected() {
        // The curve order minus one is valid; all-ones is far above the order.
        let bytes = [0xffu8; SCALAR_LENGTH];
        assert!(scalar_from_bytes(&bytes).is_err());
    }
}
