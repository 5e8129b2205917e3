// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    codec::Canonical,
    errors::Result,
    keys::{sign_message, verify_message, StakeholderId, VssPublicKey},
    phase::EpochIndex,
    utils::ParseBytes,
};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// A stakeholder's announcement of its VSS public key: the key, an expiry
/// epoch, and a signature over both under the stakeholder's signing key.
///
/// Participation in any phase requires a currently valid certificate, so
/// peers know under which key to address encrypted shares to the
/// stakeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VssCertificate {
    vss_key: VssPublicKey,
    expiry_epoch: EpochIndex,
    signature: Signature,
    signing_key: VerifyingKey,
}

fn signing_bytes(vss_key: &VssPublicKey, expiry_epoch: EpochIndex) -> Vec<u8> {
    let mut message = Vec::new();
    vss_key.append_to(&mut message);
    expiry_epoch.append_to(&mut message);
    message
}

impl VssCertificate {
    /// Certify `vss_key` as belonging to the holder of `signing_key` until
    /// the end of `expiry_epoch`.
    pub fn create(
        signing_key: &SigningKey,
        vss_key: VssPublicKey,
        expiry_epoch: EpochIndex,
    ) -> Result<Self> {
        let signature = sign_message(signing_key, &signing_bytes(&vss_key, expiry_epoch))?;
        Ok(Self {
            vss_key,
            expiry_epoch,
            signature,
            signing_key: *signing_key.verifying_key(),
        })
    }

    /// The certified VSS public key.
    pub fn vss_key(&self) -> &VssPublicKey {
        &self.vss_key
    }

    /// The last epoch at which this certificate is valid.
    pub fn expiry_epoch(&self) -> EpochIndex {
        self.expiry_epoch
    }

    /// The certifying stakeholder's verifying key.
    pub fn signing_key(&self) -> &VerifyingKey {
        &self.signing_key
    }

    /// The certifying stakeholder's id.
    pub fn stakeholder_id(&self) -> StakeholderId {
        StakeholderId::from_verifying_key(&self.signing_key)
    }

    /// True iff the signature is valid and the certificate has not expired
    /// at `epoch`.
    pub fn verify(&self, epoch: EpochIndex) -> bool {
        self.expiry_epoch >= epoch
            && verify_message(
                &self.signing_key,
                &signing_bytes(&self.vss_key, self.expiry_epoch),
                &self.signature,
            )
    }
}

impl Canonical for VssCertificate {
    fn append_to(&self, out: &mut Vec<u8>) {
        self.vss_key.append_to(out);
        self.expiry_epoch.append_to(out);
        self.signature.append_to(out);
        self.signing_key.append_to(out);
    }

    fn parse(parser: &mut ParseBytes<'_>) -> Result<Self> {
        let vss_key = VssPublicKey::parse(parser)?;
        let expiry_epoch = EpochIndex::parse(parser)?;
        let signature = Signature::parse(parser)?;
        let signing_key = VerifyingKey::parse(parser)?;
        Ok(Self {
            vss_key,
            expiry_epoch,
            signature,
            signing_key,
        })
    }
}

impl_serde_via_canonical!(VssCertificate);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys::VssSecretKey, utils::testing::init_testing};

    #[test]
    fn valid_certificates_verify_until_expiry() {
        let rng = &mut init_testing();
        let signing_key = SigningKey::random(rng);
        let vss_key = VssSecretKey::random(rng).unwrap().public_key();

        let certificate =
            VssCertificate::create(&signing_key, vss_key, EpochIndex(10)).unwrap();
        assert!(certificate.verify(EpochIndex(0)));
        assert!(certificate.verify(EpochIndex(10)));
        assert!(!certificate.verify(EpochIndex(11)));
    }

    #[test]
    fn tampered_certificates_fail() {
        let rng = &mut init_testing();
        let signing_key = SigningKey::random(rng);
        let vss_key = VssSecretKey::random(rng).unwrap().public_key();

        let certificate = VssCertificate::create(&signing_key, vss_key, EpochIndex(3)).unwrap();
        let forged = VssCertificate {
            expiry_epoch: EpochIndex(1000),
            ..certificate.clone()
        };
        assert!(!forged.verify(EpochIndex(500)));

        let other_key = VssSecretKey::random(rng).unwrap().public_key();
        let forged = VssCertificate {
            vss_key: other_key,
            ..certificate
        };
        assert!(!forged.verify(EpochIndex(0)));
    }

    #[test]
    fn canonical_round_trip() {
        let rng = &mut init_testing();
        let signing_key = SigningKey::random(rng);
        let vss_key = VssSecretKey::random(rng).unwrap().public_key();
        let certificate = VssCertificate::create(&signing_key, vss_key, EpochIndex(7)).unwrap();

        let bytes = certificate.to_canonical_bytes();
        let decoded = VssCertificate::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(decoded, certificate);
        assert_eq!(decoded.to_canonical_bytes(), bytes);
    }
}
