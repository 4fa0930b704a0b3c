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

//! The top-level PKIMessage type (RFC 4210 Section 5.1).

use der::asn1::BitString;
use der::{Decode, Encode, Sequence};
use x509_cert::Certificate;

use crate::error::{CmpError, Result};
use crate::types::body::{BodyType, PkiBody};
use crate::types::header::PkiHeader;

/// `PKIMessage` as defined in RFC 4210 Section 5.1.
///
/// ```text
/// PKIMessage ::= SEQUENCE {
///     header           PKIHeader,
///     body             PKIBody,
///     protection   [0] PKIProtection OPTIONAL,
///     extraCerts   [1] SEQUENCE SIZE (1..MAX) OF CMPCertificate OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiMessage {
    /// Common header fields.
    pub header: PkiHeader,

    /// The message-specific body.
    pub body: PkiBody,

    /// Protection bits computed over the DER of header and body.
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub protection: Option<BitString>,

    /// Certificates useful to the recipient, e.g. the protection chain.
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub extra_certs: Option<Vec<Certificate>>,
}

/// `ProtectedPart` as defined in RFC 4210 Section 5.1.3: the input to
/// protection computation and verification.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ProtectedPart {
    /// Header of the message being protected.
    pub header: PkiHeader,

    /// Body of the message being protected.
    pub body: PkiBody,
}

impl PkiMessage {
    /// The wire discriminant of this message's body.
    pub fn body_type(&self) -> BodyType {
        self.body.body_type()
    }

    /// DER-encode this message.
    pub fn to_der_vec(&self) -> Result<Vec<u8>> {
        self.to_der()
            .map_err(|e| CmpError::decoding(format!("encoding PKIMessage: {e}")))
    }

    /// Decode a message from DER bytes.
    pub fn from_der_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_der(bytes)
            .map_err(|e| CmpError::decoding(format!("decoding PKIMessage: {e}")))
    }

    /// Structural duplicate through an encode/decode round trip.
    ///
    /// The round trip doubles as a wire-validity check: a message that
    /// cannot survive it is malformed.
    pub fn dup(&self) -> Result<Self> {
        Self::from_der_bytes(&self.to_der_vec()?)
    }

    /// DER encoding of the protected part (header plus body).
    pub fn protected_part_der(&self) -> Result<Vec<u8>> {
        let part = ProtectedPart {
            header: self.header.clone(),
            body: self.body.clone(),
        };
        part.to_der()
            .map_err(|e| CmpError::decoding(format!("encoding ProtectedPart: {e}")))
    }
}
