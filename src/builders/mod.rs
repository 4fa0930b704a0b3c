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

//! Message builders.
//!
//! [`request`] holds the client-side builders, [`response`] the
//! responder-side ones. Shared here: header finalization with protection,
//! the certConf hash and the ERROR body builder used from both sides.

pub mod request;
pub mod response;

use der::asn1::{BitString, OctetString};
use der::Encode;
use tracing::debug;

use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::header::init_header;
use crate::protect::DigestAlg;
use crate::status::PkiStatusInfo;
use crate::types::{
    ErrorMsgContent, PkiBody, PkiFreeText, PkiHeader, PkiMessage, ProtectedPart,
};
use x509_cert::Certificate;

/// The canonical certReqId; one certificate request per session.
pub const CERT_REQ_ID: u32 = 0;

/// Assemble a message from header and body, applying protection and the
/// context's outbound extraCerts.
///
/// When the context has no protection provider, or unprotected sending is
/// selected, the message goes out without protectionAlg and protection.
/// `force_unprotected` is the responder-side override for error responses.
pub(crate) fn finalize(
    ctx: &CmpContext,
    mut header: PkiHeader,
    body: PkiBody,
    kind: &'static str,
    force_unprotected: bool,
) -> Result<PkiMessage> {
    let provider = if force_unprotected || ctx.options.unprotected_send {
        None
    } else {
        ctx.protection.as_ref()
    };

    let protection = if let Some(provider) = provider {
        header.protection_alg = Some(provider.algorithm());
        let part = ProtectedPart {
            header: header.clone(),
            body: body.clone(),
        };
        let part_der = part
            .to_der()
            .map_err(|e| CmpError::build(kind, format!("encoding protected part: {e}")))?;
        let bits = provider
            .compute(&part_der)
            .map_err(|e| CmpError::build(kind, format!("computing protection: {e}")))?;
        Some(
            BitString::from_bytes(&bits)
                .map_err(|e| CmpError::build(kind, format!("protection bits: {e}")))?,
        )
    } else {
        debug!("sending {} without protection", kind);
        None
    };

    let extra_certs = if ctx.extra_certs_out.is_empty() {
        None
    } else {
        Some(ctx.extra_certs_out.clone())
    };

    Ok(PkiMessage {
        header,
        body,
        protection,
        extra_certs,
    })
}

/// Hash a certificate for certConf, with the digest configured on the
/// context.
pub fn cert_hash(digest: DigestAlg, cert: &Certificate) -> Result<OctetString> {
    let der = cert
        .to_der()
        .map_err(|e| CmpError::decoding(format!("encoding certificate for hashing: {e}")))?;
    OctetString::new(digest.digest(&der)).map_err(CmpError::from)
}

/// Build an ERROR message carrying the given status, optional
/// implementation-specific error code and detail strings.
///
/// Used by the client for the error exchange and by the responder to
/// report processing failures.
pub fn error_new(
    ctx: &mut CmpContext,
    si: PkiStatusInfo,
    error_code: Option<u64>,
    error_details: Option<PkiFreeText>,
    unprotected: bool,
) -> Result<PkiMessage> {
    let header = init_header(ctx).map_err(|e| CmpError::build("ERROR", e.to_string()))?;
    let body = PkiBody::Error(ErrorMsgContent {
        pki_status_info: si,
        error_code,
        error_details,
    });
    finalize(ctx, header, body, "ERROR", unprotected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::PasswordMac;
    use crate::status::{PkiFailureInfo, PkiStatus};
    use std::sync::Arc;

    fn ctx_with_mac() -> CmpContext {
        let mut ctx = CmpContext::new();
        ctx.reference_value = Some(b"ref".to_vec());
        ctx.protection = Some(Arc::new(PasswordMac::new(
            &b"secret"[..],
            DigestAlg::Sha256,
        )));
        ctx
    }

    #[test]
    fn error_message_is_protected_by_default() {
        let mut ctx = ctx_with_mac();
        let msg = error_new(
            &mut ctx,
            PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None),
            Some(7),
            Some(vec!["went wrong".to_string()]),
            false,
        )
        .unwrap();

        assert!(msg.header.protection_alg.is_some());
        assert!(msg.protection.is_some());
    }

    #[test]
    fn force_unprotected_strips_protection() {
        let mut ctx = ctx_with_mac();
        let msg = error_new(
            &mut ctx,
            PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None),
            None,
            None,
            true,
        )
        .unwrap();

        assert!(msg.header.protection_alg.is_none());
        assert!(msg.protection.is_none());
    }

    #[test]
    fn unprotected_send_option_strips_protection() {
        let mut ctx = ctx_with_mac();
        ctx.options.unprotected_send = true;
        let msg = error_new(
            &mut ctx,
            PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None),
            None,
            None,
            false,
        )
        .unwrap();

        assert!(msg.protection.is_none());
    }
}
