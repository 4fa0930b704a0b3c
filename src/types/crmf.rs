// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CRMF request wire types (RFC 4211).
//!
//! These carry the certificate request payload of IR/CR/KUR bodies. The
//! proof-of-possession content beyond its outer structure is the business
//! of the protection/crypto layer; this module only round-trips it.

use der::asn1::{BitString, Null, ObjectIdentifier, OctetString};
use der::{Any, Choice, Decode, Encode, Enumerated, Sequence};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::Extensions;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

/// id-regCtrl-oldCertID (RFC 4211 Section 6.5), used in key-update requests.
pub const ID_REG_CTRL_OLD_CERT_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.5.1.5");

/// `CertReqMessages ::= SEQUENCE SIZE (1..MAX) OF CertReqMsg`
pub type CertReqMessages = Vec<CertReqMsg>;

/// `CertReqMsg` as defined in RFC 4211 Section 3.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertReqMsg {
    /// The certificate request proper.
    pub cert_req: CertRequest,

    /// Proof of possession of the private key, content depends on key type.
    pub popo: Option<ProofOfPossession>,

    /// Supplementary registration information.
    pub reg_info: Option<Vec<x509_cert::attr::Attribute>>,
}

/// `CertRequest` as defined in RFC 4211 Section 5.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertRequest {
    /// Matches request and reply within a transaction.
    pub cert_req_id: u32,

    /// Selected fields of the certificate to be issued.
    pub cert_template: CertTemplate,

    /// Attributes affecting issuance, e.g. the oldCertID control.
    pub controls: Option<Controls>,
}

/// `Controls ::= SEQUENCE SIZE (1..MAX) OF AttributeTypeAndValue`
pub type Controls = Vec<AttributeTypeAndValue>;

/// `CertTemplate` as defined in RFC 4211 Section 5.
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct CertTemplate {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub version: Option<x509_cert::Version>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub serial_number: Option<SerialNumber>,
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub signing_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub issuer: Option<Name>,
    #[asn1(context_specific = "4", tag_mode = "IMPLICIT", optional = "true")]
    pub validity: Option<OptionalValidity>,
    #[asn1(context_specific = "5", tag_mode = "EXPLICIT", optional = "true")]
    pub subject: Option<Name>,
    #[asn1(context_specific = "6", tag_mode = "IMPLICIT", optional = "true")]
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    #[asn1(context_specific = "7", tag_mode = "IMPLICIT", optional = "true")]
    pub issuer_uid: Option<BitString>,
    #[asn1(context_specific = "8", tag_mode = "IMPLICIT", optional = "true")]
    pub subject_uid: Option<BitString>,
    #[asn1(context_specific = "9", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// `OptionalValidity` as defined in RFC 4211 Section 5.
///
/// At least one of the two fields must be present.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct OptionalValidity {
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub not_before: Option<Time>,
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub not_after: Option<Time>,
}

/// `ProofOfPossession` as defined in RFC 4211 Section 4.
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum ProofOfPossession {
    /// The RA has verified possession on the requester's behalf.
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", constructed = "false")]
    RaVerified(Null),

    /// Signature over the certificate request with the subject key.
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Signature(PopoSigningKey),

    /// Indirect proof for key-encipherment keys.
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "true")]
    KeyEncipherment(PopoPrivKey),

    /// Indirect proof for key-agreement keys.
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", constructed = "true")]
    KeyAgreement(PopoPrivKey),
}

/// `POPOSigningKey` as defined in RFC 4211 Section 4.1.
///
/// The poposkInput alternative is not carried; senders here always
/// authenticate through the message protection.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PopoSigningKey {
    /// Signature algorithm used to produce [`Self::signature`].
    pub alg_id: AlgorithmIdentifierOwned,

    /// Signature computed over the DER-encoded CertRequest.
    pub signature: BitString,
}

/// `POPOPrivKey` as defined in RFC 4211 Section 4.2.
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum PopoPrivKey {
    /// Proof material included in this message.
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", constructed = "false")]
    ThisMessage(BitString),

    /// Proof deferred to a later exchange, e.g. via encrypted certificate.
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "false")]
    SubsequentMessage(SubsequentMessage),

    /// MAC over DH parameters.
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "false")]
    DhMac(BitString),
}

/// `SubsequentMessage` as defined in RFC 4211 Section 4.2.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum SubsequentMessage {
    /// The certificate will be returned encrypted for the subject key.
    EncrCert = 0,
    /// A challenge-response exchange will follow.
    ChallengeResp = 1,
}

/// `CertId` as defined in RFC 4211 Section 6.5.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertId {
    /// Issuer of the certificate being identified.
    pub issuer: GeneralName,

    /// Serial number of the certificate being identified.
    pub serial_number: SerialNumber,
}

/// `EncryptedValue` as defined in RFC 4211 Section 2.
///
/// Carried when a certificate is returned encrypted for indirect proof of
/// possession. Decryption is performed outside this crate.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct EncryptedValue {
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub intended_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub symm_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(
        context_specific = "2",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub enc_symm_key: Option<BitString>,
    #[asn1(
        context_specific = "3",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub key_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(
        context_specific = "4",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub value_hint: Option<OctetString>,
    /// The encrypted value itself.
    pub enc_value: BitString,
}

impl CertId {
    /// Build a CertId from an issuer name and serial number.
    pub fn new(issuer: Name, serial_number: SerialNumber) -> Self {
        Self {
            issuer: GeneralName::DirectoryName(issuer),
            serial_number,
        }
    }
}

impl CertRequest {
    /// Append the oldCertID control identifying the certificate being
    /// replaced (RFC 4211 Appendix D.6).
    pub fn set_old_cert_id(&mut self, cert_id: &CertId) -> der::Result<()> {
        let control = AttributeTypeAndValue {
            oid: ID_REG_CTRL_OLD_CERT_ID,
            value: Any::encode_from(cert_id)?,
        };
        self.controls.get_or_insert_with(Vec::new).push(control);
        Ok(())
    }

    /// Look up the oldCertID control, if present.
    pub fn old_cert_id(&self) -> Option<CertId> {
        let controls = self.controls.as_ref()?;
        let control = controls.iter().find(|c| c.oid == ID_REG_CTRL_OLD_CERT_ID)?;
        let der = control.value.to_der().ok()?;
        CertId::from_der(&der).ok()
    }
}
