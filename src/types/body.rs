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

//! PKIBody and the per-body content types (RFC 4210 Sections 5.1.2, 5.3).

use der::asn1::{Null, OctetString};
use der::{Choice, Sequence};
use x509_cert::crl::CertificateList;
use x509_cert::ext::Extensions;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use crate::status::PkiStatusInfo;
use crate::types::crmf::{CertId, CertReqMessages, CertTemplate, EncryptedValue};
use crate::types::header::PkiFreeText;
use crate::types::header::InfoTypeAndValue;

/// Body type discriminants as used on the wire (RFC 4210 Section 5.1.2)
/// and in log and error texts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum BodyType {
    Ir = 0,
    Ip = 1,
    Cr = 2,
    Cp = 3,
    P10cr = 4,
    Popdecc = 5,
    Popdecr = 6,
    Kur = 7,
    Kup = 8,
    Krr = 9,
    Krp = 10,
    Rr = 11,
    Rp = 12,
    Ccr = 13,
    Ccp = 14,
    Ckuann = 15,
    Cann = 16,
    Rann = 17,
    Crlann = 18,
    PkiConf = 19,
    Nested = 20,
    Genm = 21,
    Genp = 22,
    Error = 23,
    CertConf = 24,
    PollReq = 25,
    PollRep = 26,
}

impl BodyType {
    /// Short wire name, e.g. `"IR"` or `"POLLREP"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ir => "IR",
            Self::Ip => "IP",
            Self::Cr => "CR",
            Self::Cp => "CP",
            Self::P10cr => "P10CR",
            Self::Popdecc => "POPDECC",
            Self::Popdecr => "POPDECR",
            Self::Kur => "KUR",
            Self::Kup => "KUP",
            Self::Krr => "KRR",
            Self::Krp => "KRP",
            Self::Rr => "RR",
            Self::Rp => "RP",
            Self::Ccr => "CCR",
            Self::Ccp => "CCP",
            Self::Ckuann => "CKUANN",
            Self::Cann => "CANN",
            Self::Rann => "RANN",
            Self::Crlann => "CRLANN",
            Self::PkiConf => "PKICONF",
            Self::Nested => "NESTED",
            Self::Genm => "GENM",
            Self::Genp => "GENP",
            Self::Error => "ERROR",
            Self::CertConf => "CERTCONF",
            Self::PollReq => "POLLREQ",
            Self::PollRep => "POLLREP",
        }
    }
}

impl std::fmt::Display for BodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `PKIBody` as defined in RFC 4210 Section 5.1.2.
///
/// Only the body alternatives this crate drives are declared; the
/// announcement and cross-certification alternatives are out of scope and
/// fail decoding by their absence.
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
#[allow(clippy::large_enum_variant)]
pub enum PkiBody {
    /// Initialization request.
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", constructed = "true")]
    Ir(CertReqMessages),
    /// Initialization response.
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "true")]
    Ip(CertRepMessage),
    /// Certification request.
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "true")]
    Cr(CertReqMessages),
    /// Certification response.
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", constructed = "true")]
    Cp(CertRepMessage),
    /// PKCS#10 certification request.
    #[asn1(context_specific = "4", tag_mode = "EXPLICIT", constructed = "true")]
    P10cr(CertReq),
    /// Key-update request.
    #[asn1(context_specific = "7", tag_mode = "EXPLICIT", constructed = "true")]
    Kur(CertReqMessages),
    /// Key-update response.
    #[asn1(context_specific = "8", tag_mode = "EXPLICIT", constructed = "true")]
    Kup(CertRepMessage),
    /// Revocation request.
    #[asn1(context_specific = "11", tag_mode = "EXPLICIT", constructed = "true")]
    Rr(RevReqContent),
    /// Revocation response.
    #[asn1(context_specific = "12", tag_mode = "EXPLICIT", constructed = "true")]
    Rp(RevRepContent),
    /// Confirmation.
    #[asn1(context_specific = "19", tag_mode = "EXPLICIT", constructed = "true")]
    PkiConf(Null),
    /// General message.
    #[asn1(context_specific = "21", tag_mode = "EXPLICIT", constructed = "true")]
    Genm(GenMsgContent),
    /// General response.
    #[asn1(context_specific = "22", tag_mode = "EXPLICIT", constructed = "true")]
    Genp(GenRepContent),
    /// Error message.
    #[asn1(context_specific = "23", tag_mode = "EXPLICIT", constructed = "true")]
    Error(ErrorMsgContent),
    /// Certificate confirmation.
    #[asn1(context_specific = "24", tag_mode = "EXPLICIT", constructed = "true")]
    CertConf(CertConfirmContent),
    /// Polling request.
    #[asn1(context_specific = "25", tag_mode = "EXPLICIT", constructed = "true")]
    PollReq(PollReqContent),
    /// Polling response.
    #[asn1(context_specific = "26", tag_mode = "EXPLICIT", constructed = "true")]
    PollRep(PollRepContent),
}

impl PkiBody {
    /// The wire discriminant of this body.
    pub fn body_type(&self) -> BodyType {
        match self {
            Self::Ir(_) => BodyType::Ir,
            Self::Ip(_) => BodyType::Ip,
            Self::Cr(_) => BodyType::Cr,
            Self::Cp(_) => BodyType::Cp,
            Self::P10cr(_) => BodyType::P10cr,
            Self::Kur(_) => BodyType::Kur,
            Self::Kup(_) => BodyType::Kup,
            Self::Rr(_) => BodyType::Rr,
            Self::Rp(_) => BodyType::Rp,
            Self::PkiConf(_) => BodyType::PkiConf,
            Self::Genm(_) => BodyType::Genm,
            Self::Genp(_) => BodyType::Genp,
            Self::Error(_) => BodyType::Error,
            Self::CertConf(_) => BodyType::CertConf,
            Self::PollReq(_) => BodyType::PollReq,
            Self::PollRep(_) => BodyType::PollRep,
        }
    }

    /// The cert-response payload for IP/CP/KUP bodies.
    pub fn cert_rep(&self) -> Option<&CertRepMessage> {
        match self {
            Self::Ip(rep) | Self::Cp(rep) | Self::Kup(rep) => Some(rep),
            _ => None,
        }
    }
}

/// `CertRepMessage` as defined in RFC 4210 Section 5.3.4.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertRepMessage {
    /// CA certificates the client may want to store.
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub ca_pubs: Option<Vec<Certificate>>,

    /// One response per certificate request.
    pub response: Vec<CertResponse>,
}

/// `CertResponse` as defined in RFC 4210 Section 5.3.4.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertResponse {
    /// Matches this response with the corresponding request.
    pub cert_req_id: u32,

    /// Outcome for this request.
    pub status: PkiStatusInfo,

    /// The issued certificate material, when granted.
    pub certified_key_pair: Option<CertifiedKeyPair>,

    /// Analogous to the id-regInfo-utf8Pairs string of RFC 4211.
    pub rsp_info: Option<OctetString>,
}

/// `CertifiedKeyPair` as defined in RFC 4210 Section 5.3.4.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertifiedKeyPair {
    /// The certificate, in the clear or encrypted for indirect POP.
    pub cert_or_enc_cert: CertOrEncCert,

    /// Private key, present only for central key generation.
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub priv_key: Option<EncryptedValue>,

    /// Publication information.
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub publication_info: Option<der::Any>,
}

/// `CertOrEncCert` as defined in RFC 4210 Section 5.3.4.
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum CertOrEncCert {
    /// The certificate in the clear.
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", constructed = "true")]
    Certificate(Box<Certificate>),

    /// The certificate encrypted for the subject key (indirect POP).
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "true")]
    EncryptedCert(Box<EncryptedValue>),
}

/// `RevReqContent ::= SEQUENCE OF RevDetails` (RFC 4210 Section 5.3.9).
pub type RevReqContent = Vec<RevDetails>;

/// `RevDetails` as defined in RFC 4210 Section 5.3.9.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RevDetails {
    /// Identifies the certificate to revoke, as far as the requester can.
    pub cert_details: CertTemplate,

    /// Requested crlEntryExtensions, e.g. the CRL reason code.
    pub crl_entry_details: Option<Extensions>,
}

/// `RevRepContent` as defined in RFC 4210 Section 5.3.10.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RevRepContent {
    /// One status per RevDetails, in request order.
    pub status: Vec<PkiStatusInfo>,

    /// Identifies the certificates for which revocation was requested.
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub rev_certs: Option<Vec<CertId>>,

    /// The resulting CRLs.
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub crls: Option<Vec<CertificateList>>,
}

/// `CertConfirmContent ::= SEQUENCE OF CertStatus` (RFC 4210 Section 5.3.18).
pub type CertConfirmContent = Vec<CertStatus>;

/// `CertStatus` as defined in RFC 4210 Section 5.3.18.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertStatus {
    /// Hash of the certificate, computed with the algorithm that matches
    /// its signature algorithm.
    pub cert_hash: OctetString,

    /// Matches this confirmation with the corresponding request/response.
    pub cert_req_id: u32,

    /// Absent means acceptance.
    pub status_info: Option<PkiStatusInfo>,
}

/// `PollReqContent ::= SEQUENCE OF SEQUENCE { certReqId INTEGER }`
/// (RFC 4210 Section 5.3.22).
pub type PollReqContent = Vec<PollReqEntry>;

/// One entry of a polling request.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PollReqEntry {
    /// The request being polled for.
    pub cert_req_id: u32,
}

/// `PollRepContent ::= SEQUENCE OF SEQUENCE { certReqId INTEGER,
/// checkAfter INTEGER, reason PKIFreeText OPTIONAL }`
/// (RFC 4210 Section 5.3.22).
pub type PollRepContent = Vec<PollRepEntry>;

/// One entry of a polling response.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PollRepEntry {
    /// The request being polled for.
    pub cert_req_id: u32,

    /// Seconds the client should wait before the next poll.
    pub check_after: u64,

    /// Free-text explanation of the delay.
    pub reason: Option<PkiFreeText>,
}

/// `ErrorMsgContent` as defined in RFC 4210 Section 5.3.21.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ErrorMsgContent {
    /// The outcome being reported.
    pub pki_status_info: PkiStatusInfo,

    /// Implementation-specific error code.
    pub error_code: Option<u64>,

    /// Implementation-specific error details.
    pub error_details: Option<PkiFreeText>,
}

/// `GenMsgContent ::= SEQUENCE OF InfoTypeAndValue` (RFC 4210 Section 5.3.19).
pub type GenMsgContent = Vec<InfoTypeAndValue>;

/// `GenRepContent ::= SEQUENCE OF InfoTypeAndValue` (RFC 4210 Section 5.3.20).
pub type GenRepContent = Vec<InfoTypeAndValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PkiStatus;
    use der::{Decode, Encode};

    #[test]
    fn body_type_names() {
        assert_eq!(BodyType::Ir.as_str(), "IR");
        assert_eq!(BodyType::PollRep.as_str(), "POLLREP");
        assert_eq!(BodyType::PkiConf as u8, 19);
        assert_eq!(BodyType::PollRep as u8, 26);
    }

    #[test]
    fn minimal_cert_rep_round_trip() {
        // Same shape as the ip body of a rejection response.
        let body = PkiBody::Ip(CertRepMessage {
            ca_pubs: None,
            response: vec![CertResponse {
                cert_req_id: 0,
                status: PkiStatusInfo::new(
                    PkiStatus::Accepted,
                    Default::default(),
                    None,
                ),
                certified_key_pair: None,
                rsp_info: None,
            }],
        });

        let der = body.to_der().unwrap();
        let back = PkiBody::from_der(&der).unwrap();
        assert_eq!(body, back);
        assert_eq!(back.body_type(), BodyType::Ip);
        assert!(back.cert_rep().is_some());
    }

    #[test]
    fn poll_rep_round_trip() {
        let body = PkiBody::PollRep(vec![PollRepEntry {
            cert_req_id: 0,
            check_after: 5,
            reason: None,
        }]);
        let der = body.to_der().unwrap();
        assert_eq!(body, PkiBody::from_der(&der).unwrap());
    }

    #[test]
    fn pkiconf_is_null() {
        let body = PkiBody::PkiConf(Null);
        let der = body.to_der().unwrap();
        // [19] EXPLICIT NULL
        assert_eq!(der, [0xb3, 0x02, 0x05, 0x00]);
        assert_eq!(body, PkiBody::from_der(&der).unwrap());
    }
}
