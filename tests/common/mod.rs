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

//! Shared fixtures: hand-built certificates and a wired client/responder
//! pair with a recording transfer for discipline assertions.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use der::asn1::BitString;
use der::DateTime;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

use cmp_client::transfer::{LocalResponder, Transfer};
use cmp_client::{
    CmpContext, CmpResponder, DigestAlg, PasswordMac, PkiMessage, PopoMethod, Result,
    ServerContext,
};

pub const SECRET: &[u8] = b"0123-shared-secret";

fn fixture_time(year: u16) -> Time {
    let dt = DateTime::new(year, 1, 1, 0, 0, 0).expect("valid fixture date");
    Time::GeneralTime(der::asn1::GeneralizedTime::from_date_time(dt))
}

/// Build a syntactically valid certificate; signatures are placeholders
/// since nothing in these tests verifies certificate chains.
pub fn make_cert(subject: &str, issuer: &str, serial: u8) -> Certificate {
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[serial]).expect("valid serial"),
        signature: AlgorithmIdentifierOwned {
            oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        },
        issuer: Name::from_str(issuer).expect("valid issuer"),
        validity: Validity {
            not_before: fixture_time(2024),
            not_after: fixture_time(2034),
        },
        subject: Name::from_str(subject).expect("valid subject"),
        subject_public_key_info: SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.2.1"),
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&[0x04, 0x11, 0x22, 0x33])
                .expect("valid key"),
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    Certificate {
        tbs_certificate: tbs,
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        },
        signature: BitString::from_bytes(&[0xde, 0xad, 0xbe, 0xef]).expect("valid sig"),
    }
}

/// The certificate the mock responder issues.
pub fn cert_out() -> Certificate {
    make_cert("CN=device.test", "CN=Mock CA", 0x2a)
}

/// The responder's own certificate, also used as caPubs entry.
pub fn server_cert() -> Certificate {
    make_cert("CN=Mock CA", "CN=Mock CA", 0x01)
}

pub fn mac() -> Arc<PasswordMac> {
    Arc::new(PasswordMac::new(SECRET, DigestAlg::Sha256))
}

/// A responder issuing [`cert_out`], protected with the shared MAC.
pub fn mock_server() -> ServerContext {
    let mac = mac();
    let mut srv = ServerContext::new();
    srv.ctx.client_cert = Some(server_cert());
    srv.ctx.protection = Some(mac.clone());
    srv.ctx.verifier = Some(mac);
    srv.accept_ra_verified = true;
    srv.cert_out = Some(cert_out());
    srv
}

/// A client context identified by a reference value, protected with the
/// shared MAC, requesting with raVerified POP.
pub fn client_ctx() -> CmpContext {
    let mac = mac();
    let mut ctx = CmpContext::new();
    ctx.reference_value = Some(b"client-1".to_vec());
    ctx.subject = Some(Name::from_str("CN=device.test").expect("valid subject"));
    ctx.expected_sender = Some(Name::from_str("CN=Mock CA").expect("valid name"));
    ctx.protection = Some(mac.clone());
    ctx.verifier = Some(mac);
    ctx.options.popo_method = PopoMethod::RaVerified;
    ctx.new_public_key = Some(cert_out().tbs_certificate.subject_public_key_info);
    ctx
}

/// A pre-built PKCS#10 CSR matching [`cert_out`]'s subject and key.
pub fn p10_csr() -> x509_cert::request::CertReq {
    let issued = cert_out();
    x509_cert::request::CertReq {
        info: x509_cert::request::CertReqInfo {
            version: x509_cert::request::Version::V1,
            subject: issued.tbs_certificate.subject,
            public_key: issued.tbs_certificate.subject_public_key_info,
            attributes: der::asn1::SetOfVec::new(),
        },
        algorithm: AlgorithmIdentifierOwned {
            oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        },
        signature: BitString::from_bytes(&[0x30, 0x00]).expect("valid csr sig"),
    }
}

/// Transfer wrapper recording every exchanged message.
pub struct Recording {
    inner: LocalResponder,
    pub sent: Vec<PkiMessage>,
    pub received: Vec<PkiMessage>,
}

impl Recording {
    pub fn new(responder: CmpResponder) -> Self {
        Self {
            inner: LocalResponder::new(responder),
            sent: Vec::new(),
            received: Vec::new(),
        }
    }

    pub fn responder_mut(&mut self) -> &mut CmpResponder {
        self.inner.responder_mut()
    }

    pub fn sent_types(&self) -> Vec<cmp_client::BodyType> {
        self.sent.iter().map(|m| m.body_type()).collect()
    }

    pub fn received_types(&self) -> Vec<cmp_client::BodyType> {
        self.received.iter().map(|m| m.body_type()).collect()
    }
}

#[async_trait]
impl Transfer for Recording {
    async fn transfer(&mut self, req: &PkiMessage) -> Result<PkiMessage> {
        self.sent.push(req.clone());
        let rsp = self.inner.transfer(req).await?;
        self.received.push(rsp.clone());
        Ok(rsp)
    }
}
