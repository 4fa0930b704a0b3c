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

//! Responder-side message builders.
//!
//! These run over the responder's own context, whose transaction state was
//! bound to the request during validation: the transactionID mirrors the
//! request's and the recipNonce echoes the request's senderNonce.

use der::asn1::Null;

use crate::builders::finalize;
use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::header::{init_header, set_implicit_confirm};
use crate::status::{PkiStatus, PkiStatusInfo};
use crate::types::{
    BodyType, CertId, CertOrEncCert, CertRepMessage, CertResponse, CertifiedKeyPair,
    InfoTypeAndValue, PkiBody, PkiMessage, PollRepEntry, RevRepContent,
};
use x509_cert::Certificate;

/// Build an IP, CP or KUP response.
///
/// The certificate is attached only when the status grants one. An
/// ungranted response goes out unprotected when `unprotected_errors` asks
/// for that.
#[allow(clippy::too_many_arguments)]
pub fn cert_rep(
    ctx: &mut CmpContext,
    body_type: BodyType,
    cert_req_id: u32,
    si: PkiStatusInfo,
    cert: Option<Certificate>,
    chain: Vec<Certificate>,
    ca_pubs: Vec<Certificate>,
    grant_implicit_confirm: bool,
    unprotected_errors: bool,
) -> Result<PkiMessage> {
    let kind = body_type.as_str();
    let granted = si.is_granted();

    let certified_key_pair = match (granted, cert) {
        (true, Some(cert)) => Some(CertifiedKeyPair {
            cert_or_enc_cert: CertOrEncCert::Certificate(Box::new(cert)),
            priv_key: None,
            publication_info: None,
        }),
        _ => None,
    };

    let rep = CertRepMessage {
        ca_pubs: if ca_pubs.is_empty() {
            None
        } else {
            Some(ca_pubs)
        },
        response: vec![CertResponse {
            cert_req_id,
            status: si.clone(),
            certified_key_pair,
            rsp_info: None,
        }],
    };

    let body = match body_type {
        BodyType::Ip => PkiBody::Ip(rep),
        BodyType::Cp => PkiBody::Cp(rep),
        BodyType::Kup => PkiBody::Kup(rep),
        other => {
            return Err(CmpError::invalid_args(format!(
                "{other} is not a certificate response body"
            )))
        }
    };

    let mut header = init_header(ctx).map_err(|e| CmpError::build("CertRep", e.to_string()))?;
    if grant_implicit_confirm {
        set_implicit_confirm(&mut header)
            .map_err(|e| CmpError::build("CertRep", e.to_string()))?;
    }

    let force_unprotected = unprotected_errors && si.status == PkiStatus::Rejection;
    let mut msg = finalize(ctx, header, body, kind, force_unprotected)?;

    // The issuing chain rides in extraCerts, outside the protected part.
    if !chain.is_empty() {
        msg.extra_certs
            .get_or_insert_with(Vec::new)
            .extend(chain);
    }
    Ok(msg)
}

/// Build a revocation response echoing the CertId of the target.
pub fn rp(
    ctx: &mut CmpContext,
    si: PkiStatusInfo,
    cert_id: CertId,
    unprotected_errors: bool,
) -> Result<PkiMessage> {
    let force_unprotected = unprotected_errors && si.status == PkiStatus::Rejection;
    let body = PkiBody::Rp(RevRepContent {
        status: vec![si],
        rev_certs: Some(vec![cert_id]),
        crls: None,
    });
    let header = init_header(ctx).map_err(|e| CmpError::build("RP", e.to_string()))?;
    finalize(ctx, header, body, "RP", force_unprotected)
}

/// Build a PKI confirmation message.
pub fn pkiconf(ctx: &mut CmpContext) -> Result<PkiMessage> {
    let header = init_header(ctx).map_err(|e| CmpError::build("PKICONF", e.to_string()))?;
    finalize(ctx, header, PkiBody::PkiConf(Null), "PKICONF", false)
}

/// Build a polling response telling the client to come back later.
pub fn poll_rep(
    ctx: &mut CmpContext,
    cert_req_id: u32,
    check_after: u64,
) -> Result<PkiMessage> {
    let body = PkiBody::PollRep(vec![PollRepEntry {
        cert_req_id,
        check_after,
        reason: None,
    }]);
    let header = init_header(ctx).map_err(|e| CmpError::build("POLLREP", e.to_string()))?;
    finalize(ctx, header, body, "POLLREP", false)
}

/// Build a general response carrying the given ITAVs.
pub fn genp(ctx: &mut CmpContext, itavs: Vec<InfoTypeAndValue>) -> Result<PkiMessage> {
    let header = init_header(ctx).map_err(|e| CmpError::build("GENP", e.to_string()))?;
    finalize(ctx, header, PkiBody::Genp(itavs), "GENP", false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::check_implicit_confirm;
    use crate::status::PkiFailureInfo;

    fn srv_ctx() -> CmpContext {
        let mut ctx = CmpContext::new();
        ctx.subject = Some(x509_cert::name::Name::default());
        ctx.reference_value = Some(b"mock-ca".to_vec());
        ctx
    }

    #[test]
    fn granted_response_carries_certificate() {
        let mut ctx = srv_ctx();
        let msg = cert_rep(
            &mut ctx,
            BodyType::Ip,
            0,
            PkiStatusInfo::accepted(),
            Some(crate::test_support::dummy_cert()),
            Vec::new(),
            Vec::new(),
            false,
            false,
        )
        .unwrap();

        let rep = msg.body.cert_rep().unwrap();
        assert!(rep.response[0].certified_key_pair.is_some());
        assert!(!check_implicit_confirm(&msg.header));
    }

    #[test]
    fn rejection_response_drops_certificate() {
        let mut ctx = srv_ctx();
        let msg = cert_rep(
            &mut ctx,
            BodyType::Cp,
            0,
            PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None),
            Some(crate::test_support::dummy_cert()),
            Vec::new(),
            Vec::new(),
            false,
            false,
        )
        .unwrap();

        let rep = msg.body.cert_rep().unwrap();
        assert!(rep.response[0].certified_key_pair.is_none());
    }

    #[test]
    fn implicit_confirm_grant_marks_header() {
        let mut ctx = srv_ctx();
        let msg = cert_rep(
            &mut ctx,
            BodyType::Ip,
            0,
            PkiStatusInfo::accepted(),
            Some(crate::test_support::dummy_cert()),
            Vec::new(),
            Vec::new(),
            true,
            false,
        )
        .unwrap();
        assert!(check_implicit_confirm(&msg.header));
    }

    #[test]
    fn chain_rides_in_extra_certs() {
        let mut ctx = srv_ctx();
        let msg = cert_rep(
            &mut ctx,
            BodyType::Ip,
            0,
            PkiStatusInfo::accepted(),
            Some(crate::test_support::dummy_cert()),
            vec![crate::test_support::dummy_cert()],
            Vec::new(),
            false,
            false,
        )
        .unwrap();
        assert_eq!(msg.extra_certs.as_ref().unwrap().len(), 1);
    }
}
