// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Canonical binary encoding of protocol messages.
//!
//! Every message type has exactly one canonical encoding: fields are
//! concatenated in declaration order, variable-width fields carry an 8-byte
//! little-endian length prefix, fixed-width integers are raw little-endian,
//! and maps are encoded as a count followed by entries in key order. Hashes
//! and signatures are always computed over canonical bytes, and decoders
//! reject trailing bytes.

use crate::{errors::Result, utils::ParseBytes};
use std::collections::BTreeMap;

/// A type with a single canonical byte encoding.
pub trait Canonical: Sized {
    /// Append the canonical encoding of `self` to `out`.
    fn append_to(&self, out: &mut Vec<u8>);

    /// Parse a value from the front of `parser`.
    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self>;

    /// The canonical encoding of `self`.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_to(&mut out);
        out
    }

    /// Decode a value from its canonical encoding, rejecting trailing bytes.
    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let mut parser = ParseBytes::new(bytes);
        let value = Self::parse(&mut parser)?;
        parser.finish()?;
        Ok(value)
    }
}

/// Append an 8-byte little-endian length prefix.
pub(crate) fn append_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

/// Append a length-prefixed byte string.
pub(crate) fn append_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    append_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

impl Canonical for u64 {
    fn append_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let bytes: [u8; 8] = parser
            .take_bytes(8)?
            .try_into()
            .map_err(|_| crate::errors::InternalError::InternalInvariantFailed)?;
        Ok(u64::from_le_bytes(bytes))
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn append_to(&self, out: &mut Vec<u8>) {
        append_len(out, self.len());
        for item in self {
            item.append_to(out);
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let count = parser.take_count()?;
        (0..count).map(|_| T::parse(parser)).collect()
    }
}

impl<K, V> Canonical for BTreeMap<K, V>
where
    K: Canonical + Ord,
    V: Canonical,
{
    fn append_to(&self, out: &mut Vec<u8>) {
        append_len(out, self.len());
        for (key, value) in self {
            key.append_to(out);
            value.append_to(out);
        }
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let count = parser.take_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::parse(parser)?;
            let value = V::parse(parser)?;
            if map.insert(key, value).is_some() {
                tracing::error!("Encoded map contains a duplicate key");
                Err(crate::errors::CallerError::DeserializationFailed)?;
            }
        }
        Ok(map)
    }
}

/// Implement serde for a type by delegating to its canonical encoding. This
/// keeps the serde representation byte-for-byte identical to the wire form.
macro_rules! impl_serde_via_canonical {
    ($type:ty) => {
        impl serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&$crate::codec::Canonical::to_canonical_bytes(self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bytes = <Vec<u8> as serde::Deserialize>::deserialize(deserializer)?;
                $crate::codec::Canonical::from_canonical_bytes(&bytes)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}
