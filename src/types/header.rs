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

//! PKIHeader and general-info wire types (RFC 4210 Section 5.1.1).

use der::asn1::{GeneralizedTime, ObjectIdentifier, OctetString};
use der::{Any, Enumerated, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralName;

/// Protocol version number.
///
/// ```text
/// pvno  INTEGER  { cmp1999(1), cmp2000(2) }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum Pvno {
    /// RFC 2510 version.
    Cmp1999 = 1,
    /// RFC 4210 version. All messages built by this crate use this value.
    Cmp2000 = 2,
}

/// `PKIFreeText ::= SEQUENCE SIZE (1..MAX) OF UTF8String`
pub type PkiFreeText = Vec<String>;

/// `InfoTypeAndValue` as defined in RFC 4210 Section 5.3.19.
///
/// ```text
/// InfoTypeAndValue ::= SEQUENCE {
///     infoType    OBJECT IDENTIFIER,
///     infoValue   ANY DEFINED BY infoType  OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct InfoTypeAndValue {
    /// Identifies the kind of information carried.
    pub info_type: ObjectIdentifier,

    /// The information itself, absent for pure capability queries.
    pub info_value: Option<Any>,
}

/// id-it-implicitConfirm (RFC 4210 Section 5.1.1.1).
pub const ID_IT_IMPLICIT_CONFIRM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.4.13");

impl InfoTypeAndValue {
    /// Build the implicitConfirm marker ITAV (NULL value).
    pub fn implicit_confirm() -> der::Result<Self> {
        Ok(Self {
            info_type: ID_IT_IMPLICIT_CONFIRM,
            info_value: Some(Any::encode_from(&der::asn1::Null)?),
        })
    }

    /// Returns true if this ITAV is the implicitConfirm marker.
    pub fn is_implicit_confirm(&self) -> bool {
        self.info_type == ID_IT_IMPLICIT_CONFIRM
    }
}

/// `PKIHeader` as defined in RFC 4210 Section 5.1.1.
///
/// ```text
/// PKIHeader ::= SEQUENCE {
///     pvno                INTEGER     { cmp1999(1), cmp2000(2) },
///     sender              GeneralName,
///     recipient           GeneralName,
///     messageTime     [0] GeneralizedTime         OPTIONAL,
///     protectionAlg   [1] AlgorithmIdentifier     OPTIONAL,
///     senderKID       [2] KeyIdentifier           OPTIONAL,
///     recipKID        [3] KeyIdentifier           OPTIONAL,
///     transactionID   [4] OCTET STRING            OPTIONAL,
///     senderNonce     [5] OCTET STRING            OPTIONAL,
///     recipNonce      [6] OCTET STRING            OPTIONAL,
///     freeText        [7] PKIFreeText             OPTIONAL,
///     generalInfo     [8] SEQUENCE SIZE (1..MAX) OF
///                             InfoTypeAndValue    OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiHeader {
    /// Protocol version; always [`Pvno::Cmp2000`] on the wire produced here.
    pub pvno: Pvno,

    /// Identifies the originator of the message.
    pub sender: GeneralName,

    /// Identifies the intended recipient.
    pub recipient: GeneralName,

    /// Time of production of this message.
    #[asn1(
        context_specific = "0",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub message_time: Option<GeneralizedTime>,

    /// Algorithm used for calculation of the protection bits.
    #[asn1(
        context_specific = "1",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub protection_alg: Option<AlgorithmIdentifierOwned>,

    /// Identifies the specific key used by the sender for protection.
    #[asn1(
        context_specific = "2",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub sender_kid: Option<OctetString>,

    /// Identifies the specific key expected at the recipient.
    #[asn1(
        context_specific = "3",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub recip_kid: Option<OctetString>,

    /// Same value in every message of one transaction, both directions.
    #[asn1(
        context_specific = "4",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub transaction_id: Option<OctetString>,

    /// Fresh per outbound message; provides replay protection.
    #[asn1(
        context_specific = "5",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub sender_nonce: Option<OctetString>,

    /// Echo of the senderNonce of the previous related message.
    #[asn1(
        context_specific = "6",
        tag_mode = "EXPLICIT",
        constructed = "false",
        optional = "true"
    )]
    pub recip_nonce: Option<OctetString>,

    /// Context-specific instructions intended for human consumption.
    #[asn1(
        context_specific = "7",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub free_text: Option<PkiFreeText>,

    /// Context-specific information, e.g. the implicitConfirm marker.
    #[asn1(
        context_specific = "8",
        tag_mode = "EXPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub general_info: Option<Vec<InfoTypeAndValue>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};

    #[test]
    fn implicit_confirm_itav_round_trip() {
        let itav = InfoTypeAndValue::implicit_confirm().unwrap();
        assert!(itav.is_implicit_confirm());

        let der = itav.to_der().unwrap();
        let back = InfoTypeAndValue::from_der(&der).unwrap();
        assert_eq!(itav, back);
    }

    #[test]
    fn pvno_values() {
        assert_eq!(Pvno::Cmp1999 as u8, 1);
        assert_eq!(Pvno::Cmp2000 as u8, 2);
    }
}
