// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The follow-the-satoshi seed and its XOR algebra.
//!
//! Each participant's escrowed secret reduces to one [`FtsSeed`]; the
//! epoch's seed is the XOR of every contribution, so it is unpredictable
//! unless a threshold of participants collude and is reconstructible from
//! the contributions in any order.

use crate::{
    codec::Canonical,
    errors::{CallerError, Result},
    pvss::Secret,
    utils::ParseBytes,
};
use std::fmt::{self, Debug, Formatter};

/// Byte length of an [`FtsSeed`]: the canonical extraction width of a PVSS
/// secret.
pub const SEED_LENGTH: usize = 32;

/// The random seed driving follow-the-satoshi slot-leader selection.
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FtsSeed(Vec<u8>);

impl FtsSeed {
    /// The all-zeros seed, the identity of [`FtsSeed::xor`].
    pub fn zero() -> Self {
        Self(vec![0; SEED_LENGTH])
    }

    /// Wrap seed bytes, checking the length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SEED_LENGTH {
            tracing::error!("A seed must be {} bytes, got {}", SEED_LENGTH, bytes.len());
            Err(CallerError::LengthMismatch {
                left: SEED_LENGTH,
                right: bytes.len(),
            })?;
        }
        Ok(Self(bytes.to_vec()))
    }

    /// The raw seed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Element-wise XOR of two seeds. Commutative and associative, with
    /// [`FtsSeed::zero`] as identity and every seed its own inverse.
    pub fn xor(&self, other: &FtsSeed) -> Result<FtsSeed> {
        if self.0.len() != other.0.len() {
            tracing::error!(
                "Cannot combine seeds of lengths {} and {}",
                self.0.len(),
                other.0.len()
            );
            Err(CallerError::LengthMismatch {
                left: self.0.len(),
                right: other.0.len(),
            })?;
        }
        Ok(FtsSeed(
            self.0
                .iter()
                .zip(&other.0)
                .map(|(left, right)| left ^ right)
                .collect(),
        ))
    }
}

impl Debug for FtsSeed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "FtsSeed(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Reduce an escrowed secret to its seed contribution through the canonical
/// Diffie-Hellman byte extraction.
pub fn secret_to_fts_seed(secret: &Secret) -> FtsSeed {
    FtsSeed(secret.dh_bytes().to_vec())
}

impl Canonical for FtsSeed {
    fn append_to(&self, out: &mut Vec<u8>) {
        crate::codec::append_bytes(out, &self.0);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let len = parser.take_len()?;
        Self::from_bytes(parser.take_bytes(len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;
    use rand::Rng;

    fn random_seed(rng: &mut impl Rng) -> FtsSeed {
        let mut bytes = [0u8; SEED_LENGTH];
        rng.fill(&mut bytes);
        FtsSeed::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn xor_of_known_bytes() {
        let mut left = [0u8; SEED_LENGTH];
        left[0] = 0x01;
        left[1] = 0x02;
        let mut right = [0u8; SEED_LENGTH];
        right[0] = 0x03;
        right[1] = 0x04;

        let combined = FtsSeed::from_bytes(&left)
            .unwrap()
            .xor(&FtsSeed::from_bytes(&right).unwrap())
            .unwrap();
        assert_eq!(combined.as_bytes()[0], 0x02);
        assert_eq!(combined.as_bytes()[1], 0x06);
        assert!(combined.as_bytes()[2..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn xor_algebra_holds() {
        let rng = &mut init_testing();
        for _ in 0..100 {
            let a = random_seed(rng);
            let b = random_seed(rng);
            let c = random_seed(rng);

            // Commutativity and associativity.
            assert_eq!(a.xor(&b).unwrap(), b.xor(&a).unwrap());
            assert_eq!(
                a.xor(&b.xor(&c).unwrap()).unwrap(),
                a.xor(&b).unwrap().xor(&c).unwrap()
            );
            // Identity and self-inverse.
            assert_eq!(a.xor(&FtsSeed::zero()).unwrap(), a);
            assert_eq!(a.xor(&a).unwrap(), FtsSeed::zero());
        }
    }

    #[test]
    fn wrong_length_bytes_are_rejected() {
        assert!(FtsSeed::from_bytes(&[0u8; SEED_LENGTH - 1]).is_err());
        assert!(FtsSeed::from_bytes(&[0u8; SEED_LENGTH + 1]).is_err());
        assert!(FtsSeed::from_bytes(&[]).is_err());
    }

    #[test]
    fn canonical_round_trip() {
        let rng = &mut init_testing();
        let seed = random_seed(rng);
        let bytes = seed.to_canonical_bytes();
        assert_eq!(FtsSeed::from_canonical_bytes(&bytes).unwrap(), seed);
    }
}
