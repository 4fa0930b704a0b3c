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

//! PKIHeader initialization and binding.
//!
//! Nonce and transaction-ID discipline lives here: the transactionID is
//! created once per session and reused for every message of it, while the
//! senderNonce is drawn fresh for every outbound message.

use std::time::SystemTime;

use der::asn1::{GeneralizedTime, OctetString};
use rand::RngCore;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::types::{InfoTypeAndValue, PkiHeader, Pvno};

/// Length in bytes of senderNonce and recipNonce values.
pub const NONCE_LENGTH: usize = 16;

/// Length in bytes of transactionID values.
pub const TRANSACTION_ID_LENGTH: usize = 16;

fn random_octet_string(len: usize) -> Result<OctetString> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    OctetString::new(bytes).map_err(CmpError::from)
}

/// Generate a fresh 16-byte nonce.
pub fn new_nonce() -> Result<OctetString> {
    random_octet_string(NONCE_LENGTH)
}

/// Generate a fresh 16-byte transaction ID.
pub fn new_transaction_id() -> Result<OctetString> {
    random_octet_string(TRANSACTION_ID_LENGTH)
}

/// Initialize a header from the context.
///
/// Creates the session's transactionID on first use and reuses it
/// afterwards; draws a fresh senderNonce and records it as the last sent
/// one; echoes the peer's previous senderNonce as recipNonce.
///
/// Fails when the context carries nothing that identifies the sender:
/// neither a client certificate, nor a subject override, nor a reference
/// value.
pub fn init_header(ctx: &mut CmpContext) -> Result<PkiHeader> {
    let sender = if let Some(cert) = &ctx.client_cert {
        cert.tbs_certificate.subject.clone()
    } else if let Some(subject) = &ctx.subject {
        subject.clone()
    } else if ctx.reference_value.is_some() {
        Name::default()
    } else {
        return Err(CmpError::null_argument(
            "no client certificate, subject or reference value to identify the sender",
        ));
    };

    let recipient = if let Some(name) = &ctx.expected_sender {
        name.clone()
    } else if let Some(cert) = &ctx.client_cert {
        cert.tbs_certificate.issuer.clone()
    } else {
        Name::default()
    };

    let transaction_id = match &ctx.transaction_id {
        Some(tid) => tid.clone(),
        None => {
            let tid = new_transaction_id()?;
            ctx.transaction_id = Some(tid.clone());
            tid
        }
    };

    let sender_nonce = new_nonce()?;
    ctx.sender_nonce = Some(sender_nonce.clone());

    let message_time = GeneralizedTime::try_from(SystemTime::now())
        .map_err(|e| CmpError::invalid_args(format!("message time: {e}")))?;

    let sender_kid = match &ctx.reference_value {
        Some(reference) => Some(OctetString::new(reference.clone())?),
        None => None,
    };

    Ok(PkiHeader {
        pvno: Pvno::Cmp2000,
        sender: GeneralName::DirectoryName(sender),
        recipient: GeneralName::DirectoryName(recipient),
        message_time: Some(message_time),
        protection_alg: None,
        sender_kid,
        recip_kid: None,
        transaction_id: Some(transaction_id),
        sender_nonce: Some(sender_nonce),
        recip_nonce: ctx.recip_nonce.clone(),
        free_text: None,
        general_info: if ctx.geninfo_itavs.is_empty() {
            None
        } else {
            Some(ctx.geninfo_itavs.clone())
        },
    })
}

/// Returns true if the header's generalInfo carries the implicitConfirm
/// marker.
pub fn check_implicit_confirm(hdr: &PkiHeader) -> bool {
    hdr.general_info
        .as_ref()
        .map(|itavs| itavs.iter().any(InfoTypeAndValue::is_implicit_confirm))
        .unwrap_or(false)
}

/// Add the implicitConfirm marker to the header's generalInfo.
///
/// Idempotent: the marker is pushed at most once.
pub fn set_implicit_confirm(hdr: &mut PkiHeader) -> Result<()> {
    if check_implicit_confirm(hdr) {
        return Ok(());
    }
    let itav = InfoTypeAndValue::implicit_confirm()?;
    hdr.general_info.get_or_insert_with(Vec::new).push(itav);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ID_IT_IMPLICIT_CONFIRM;

    fn identified_ctx() -> CmpContext {
        let mut ctx = CmpContext::new();
        ctx.reference_value = Some(b"client-ref".to_vec());
        ctx
    }

    #[test]
    fn init_header_requires_sender_identity() {
        let mut ctx = CmpContext::new();
        let err = init_header(&mut ctx).unwrap_err();
        assert!(matches!(err, CmpError::NullArgument(_)));
    }

    #[test]
    fn transaction_id_is_stable_within_session() {
        let mut ctx = identified_ctx();
        let first = init_header(&mut ctx).unwrap();
        let second = init_header(&mut ctx).unwrap();
        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(
            first.transaction_id.as_ref().unwrap().as_bytes().len(),
            TRANSACTION_ID_LENGTH
        );

        ctx.end_session();
        let third = init_header(&mut ctx).unwrap();
        assert_ne!(first.transaction_id, third.transaction_id);
    }

    #[test]
    fn sender_nonce_is_fresh_per_message_and_recorded() {
        let mut ctx = identified_ctx();
        let first = init_header(&mut ctx).unwrap();
        assert_eq!(ctx.sender_nonce, first.sender_nonce);
        assert_eq!(
            first.sender_nonce.as_ref().unwrap().as_bytes().len(),
            NONCE_LENGTH
        );

        let second = init_header(&mut ctx).unwrap();
        assert_ne!(first.sender_nonce, second.sender_nonce);
        assert_eq!(ctx.sender_nonce, second.sender_nonce);
    }

    #[test]
    fn recip_nonce_is_echoed_when_present() {
        let mut ctx = identified_ctx();
        let peer_nonce = OctetString::new(vec![7u8; NONCE_LENGTH]).unwrap();
        ctx.recip_nonce = Some(peer_nonce.clone());

        let hdr = init_header(&mut ctx).unwrap();
        assert_eq!(hdr.recip_nonce, Some(peer_nonce));
    }

    #[test]
    fn set_implicit_confirm_is_idempotent() {
        let mut ctx = identified_ctx();
        let mut hdr = init_header(&mut ctx).unwrap();
        assert!(!check_implicit_confirm(&hdr));

        set_implicit_confirm(&mut hdr).unwrap();
        set_implicit_confirm(&mut hdr).unwrap();
        assert!(check_implicit_confirm(&hdr));

        let markers = hdr
            .general_info
            .as_ref()
            .unwrap()
            .iter()
            .filter(|itav| itav.info_type == ID_IT_IMPLICIT_CONFIRM)
            .count();
        assert_eq!(markers, 1);
    }
}
