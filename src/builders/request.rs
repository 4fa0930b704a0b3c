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

//! Client-side request builders.
//!
//! Each builder initializes the header from the context, fills the
//! RFC-prescribed body and finalizes with protection. Template defaulting
//! follows the reference certificate (oldCert when set, the current client
//! certificate otherwise).

use std::time::{Duration, SystemTime};

use der::asn1::{BitString, Null, OctetString};
use der::{Any, Encode, Tag};
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::builders::{cert_hash, finalize, CERT_REQ_ID};
use crate::context::{CmpContext, PopoMethod};
use crate::error::{CmpError, Result};
use crate::header::{init_header, set_implicit_confirm};
use crate::status::{PkiStatus, PkiStatusInfo};
use crate::types::{
    BodyType, CertId, CertReqMsg, CertRequest, CertStatus, CertTemplate, InfoTypeAndValue,
    OptionalValidity, PkiBody, PkiMessage, PollReqEntry, PopoPrivKey, PopoSigningKey,
    ProofOfPossession, SubsequentMessage,
};

const ID_CE_SUBJECT_ALT_NAME: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.5.29.17");
const ID_CE_CRL_REASONS: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.5.29.21");

fn issuer_and_serial(cert: &Certificate) -> (Name, x509_cert::serial_number::SerialNumber) {
    (
        cert.tbs_certificate.issuer.clone(),
        cert.tbs_certificate.serial_number.clone(),
    )
}

/// Decide the template subject the way the original does: an explicit
/// subject wins; KUR falls back to the reference certificate, and so do
/// IR/CR when no subjectAltNames are configured.
fn determine_subject(
    ctx: &CmpContext,
    refcert: Option<&Certificate>,
    body_type: BodyType,
) -> Option<Name> {
    if let Some(subject) = &ctx.subject {
        return Some(subject.clone());
    }
    match refcert {
        Some(cert) if body_type == BodyType::Kur || ctx.subject_alt_names.is_empty() => {
            Some(cert.tbs_certificate.subject.clone())
        }
        _ => None,
    }
}

fn san_extension(ctx: &CmpContext, critical: bool) -> Result<Extension> {
    let san = SubjectAltName(ctx.subject_alt_names.clone());
    let value = san
        .to_der()
        .map_err(|e| CmpError::invalid_args(format!("encoding subjectAltName: {e}")))?;
    Ok(Extension {
        extn_id: ID_CE_SUBJECT_ALT_NAME,
        critical,
        extn_value: OctetString::new(value)?,
    })
}

fn default_san_from(refcert: &Certificate, critical: bool) -> Option<Extension> {
    let exts = refcert.tbs_certificate.extensions.as_ref()?;
    exts.iter()
        .find(|e| e.extn_id == ID_CE_SUBJECT_ALT_NAME)
        .map(|e| {
            let mut ext = e.clone();
            ext.critical = critical;
            ext
        })
}

/// Build the CRMF request message for IR/CR/KUR.
fn crm_new(ctx: &CmpContext, body_type: BodyType) -> Result<CertReqMsg> {
    let kind = body_type.as_str();
    let refcert = ctx.reference_cert();

    if body_type == BodyType::Kur && refcert.is_none() {
        return Err(CmpError::invalid_args(
            "key update needs a reference certificate",
        ));
    }

    let subject = determine_subject(ctx, refcert, body_type);
    // RFC 5280: subjectAltName must be critical if the subject is empty.
    let san_critical = ctx.options.san_critical || subject.is_none();

    let public_key = match &ctx.new_public_key {
        Some(spki) => Some(spki.clone()),
        None => refcert.map(|c| c.tbs_certificate.subject_public_key_info.clone()),
    };
    let public_key = public_key.ok_or_else(|| {
        CmpError::null_argument("no public key to certify and no reference certificate")
    })?;

    let validity = if ctx.options.validity_days > 0 {
        let not_before = SystemTime::now();
        let not_after =
            not_before + Duration::from_secs(60 * 60 * 24 * u64::from(ctx.options.validity_days));
        Some(OptionalValidity {
            not_before: Some(
                Time::try_from(not_before)
                    .map_err(|e| CmpError::build(kind, format!("notBefore: {e}")))?,
            ),
            not_after: Some(
                Time::try_from(not_after)
                    .map_err(|e| CmpError::build(kind, format!("notAfter: {e}")))?,
            ),
        })
    } else {
        None
    };

    let mut extensions = ctx.req_extensions.clone().unwrap_or_default();
    let has_requested_san = !ctx.subject_alt_names.is_empty()
        || extensions.iter().any(|e| e.extn_id == ID_CE_SUBJECT_ALT_NAME);
    if !ctx.subject_alt_names.is_empty() {
        extensions.push(san_extension(ctx, san_critical)?);
    } else if !has_requested_san && !ctx.options.san_nodefault {
        if let Some(ext) = refcert.and_then(|c| default_san_from(c, san_critical)) {
            extensions.push(ext);
        }
    }
    if let Some(policies) = &ctx.policies {
        extensions.push(policies.clone());
    }

    let template = CertTemplate {
        issuer: ctx.issuer.clone(),
        subject,
        public_key: Some(public_key),
        validity,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
        ..Default::default()
    };

    let mut cert_req = CertRequest {
        cert_req_id: CERT_REQ_ID,
        cert_template: template,
        controls: None,
    };

    // For KUR, identify the certificate being replaced (RFC 4211 D.6).
    if body_type == BodyType::Kur {
        let refcert = refcert.ok_or_else(|| {
            CmpError::invalid_args("key update needs a reference certificate")
        })?;
        let (issuer, serial) = issuer_and_serial(refcert);
        cert_req
            .set_old_cert_id(&CertId::new(issuer, serial))
            .map_err(|e| CmpError::build(kind, format!("oldCertID control: {e}")))?;
    }

    let popo = match ctx.options.popo_method {
        PopoMethod::RaVerified => ProofOfPossession::RaVerified(Null),
        PopoMethod::KeyEncipherment => ProofOfPossession::KeyEncipherment(
            PopoPrivKey::SubsequentMessage(SubsequentMessage::EncrCert),
        ),
        PopoMethod::Signature => {
            let signer = ctx.pop_signer.as_ref().ok_or_else(|| {
                CmpError::build(kind, "signature proof of possession needs a signer")
            })?;
            let req_der = cert_req
                .to_der()
                .map_err(|e| CmpError::build(kind, format!("encoding CertRequest: {e}")))?;
            let signature = signer
                .compute(&req_der)
                .map_err(|e| CmpError::build(kind, format!("signing CertRequest: {e}")))?;
            ProofOfPossession::Signature(PopoSigningKey {
                alg_id: signer.algorithm(),
                signature: BitString::from_bytes(&signature)
                    .map_err(|e| CmpError::build(kind, format!("signature bits: {e}")))?,
            })
        }
    };

    Ok(CertReqMsg {
        cert_req,
        popo: Some(popo),
        reg_info: None,
    })
}

/// Build an IR, CR, KUR or P10CR request from the context.
pub fn cert_req(ctx: &mut CmpContext, body_type: BodyType) -> Result<PkiMessage> {
    let kind = body_type.as_str();

    let body = match body_type {
        BodyType::Ir => PkiBody::Ir(vec![crm_new(ctx, body_type)?]),
        BodyType::Cr => PkiBody::Cr(vec![crm_new(ctx, body_type)?]),
        BodyType::Kur => PkiBody::Kur(vec![crm_new(ctx, body_type)?]),
        BodyType::P10cr => {
            let csr = ctx
                .p10_csr
                .clone()
                .ok_or_else(|| CmpError::build(kind, "no PKCS#10 CSR in context"))?;
            PkiBody::P10cr(csr)
        }
        other => {
            return Err(CmpError::invalid_args(format!(
                "{other} is not a certificate request body"
            )))
        }
    };

    let mut header = init_header(ctx).map_err(|e| CmpError::build(kind, e.to_string()))?;
    if ctx.options.implicit_confirm {
        set_implicit_confirm(&mut header).map_err(|e| CmpError::build(kind, e.to_string()))?;
    }

    let msg = finalize(ctx, header, body, kind, false)?;
    ctx.last_sent = Some(body_type);
    Ok(msg)
}

/// Build a revocation request for the context's oldCert.
pub fn rr(ctx: &mut CmpContext) -> Result<PkiMessage> {
    let old_cert = ctx
        .old_cert
        .clone()
        .ok_or_else(|| CmpError::null_argument("no certificate to revoke"))?;
    let (issuer, serial) = issuer_and_serial(&old_cert);

    let crl_entry_details = match ctx.options.revocation_reason {
        Some(reason) => {
            let reason_byte = u8::try_from(reason)
                .map_err(|_| CmpError::invalid_args(format!("CRL reason {reason} out of range")))?;
            let value = Any::new(Tag::Enumerated, vec![reason_byte])
                .and_then(|any| any.to_der())
                .map_err(|e| CmpError::build("RR", format!("reason code: {e}")))?;
            Some(vec![Extension {
                extn_id: ID_CE_CRL_REASONS,
                critical: false,
                extn_value: OctetString::new(value)?,
            }])
        }
        None => None,
    };

    let body = PkiBody::Rr(vec![crate::types::RevDetails {
        cert_details: CertTemplate {
            issuer: Some(issuer),
            serial_number: Some(serial),
            ..Default::default()
        },
        crl_entry_details,
    }]);

    let header = init_header(ctx).map_err(|e| CmpError::build("RR", e.to_string()))?;
    let msg = finalize(ctx, header, body, "RR", false)?;
    ctx.last_sent = Some(BodyType::Rr);
    Ok(msg)
}

/// Build a general message carrying the caller's ITAVs.
pub fn genm(ctx: &mut CmpContext, itavs: Vec<InfoTypeAndValue>) -> Result<PkiMessage> {
    let header = init_header(ctx).map_err(|e| CmpError::build("GENM", e.to_string()))?;
    let msg = finalize(ctx, header, PkiBody::Genm(itavs), "GENM", false)?;
    ctx.last_sent = Some(BodyType::Genm);
    Ok(msg)
}

/// Build a certificate confirmation for the newly obtained certificate.
///
/// The pre-confirmation hook may turn the acceptance into a rejection
/// carried in the CertStatus.
pub fn cert_conf(ctx: &mut CmpContext) -> Result<PkiMessage> {
    let new_cert = ctx
        .new_cert
        .clone()
        .ok_or_else(|| CmpError::null_argument("no newly enrolled certificate to confirm"))?;

    let status_info = match &ctx.cert_conf_hook {
        Some(hook) => match hook(&new_cert) {
            Ok(()) => None,
            Err((fail_info, text)) => Some(PkiStatusInfo::new(
                PkiStatus::Rejection,
                fail_info,
                Some(&text),
            )),
        },
        None => None,
    };

    let body = PkiBody::CertConf(vec![CertStatus {
        cert_hash: cert_hash(ctx.options.digest, &new_cert)
            .map_err(|e| CmpError::build("CERTCONF", e.to_string()))?,
        cert_req_id: CERT_REQ_ID,
        status_info,
    }]);

    let header = init_header(ctx).map_err(|e| CmpError::build("CERTCONF", e.to_string()))?;
    let msg = finalize(ctx, header, body, "CERTCONF", false)?;
    ctx.last_sent = Some(BodyType::CertConf);
    Ok(msg)
}

/// Build a polling request for the given certReqId.
pub fn poll_req(ctx: &mut CmpContext, cert_req_id: u32) -> Result<PkiMessage> {
    let header = init_header(ctx).map_err(|e| CmpError::build("POLLREQ", e.to_string()))?;
    let body = PkiBody::PollReq(vec![PollReqEntry { cert_req_id }]);
    let msg = finalize(ctx, header, body, "POLLREQ", false)?;
    ctx.last_sent = Some(BodyType::PollReq);
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::check_implicit_confirm;
    use crate::status::PkiFailureInfoValues;

    fn ctx() -> CmpContext {
        let mut ctx = CmpContext::new();
        ctx.reference_value = Some(b"ref".to_vec());
        ctx.options.popo_method = PopoMethod::RaVerified;
        ctx.new_public_key = Some(test_spki());
        ctx
    }

    fn test_spki() -> spki::SubjectPublicKeyInfoOwned {
        spki::SubjectPublicKeyInfoOwned {
            algorithm: spki::AlgorithmIdentifierOwned {
                oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.2.1"),
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&[0x04, 0x01, 0x02]).unwrap(),
        }
    }

    #[test]
    fn ir_carries_one_request_with_id_zero() {
        let mut ctx = ctx();
        let msg = cert_req(&mut ctx, BodyType::Ir).unwrap();
        match &msg.body {
            PkiBody::Ir(reqs) => {
                assert_eq!(reqs.len(), 1);
                assert_eq!(reqs[0].cert_req.cert_req_id, CERT_REQ_ID);
                assert!(matches!(
                    reqs[0].popo,
                    Some(ProofOfPossession::RaVerified(_))
                ));
            }
            other => panic!("expected IR body, got {:?}", other.body_type()),
        }
        assert_eq!(ctx.last_sent, Some(BodyType::Ir));
    }

    #[test]
    fn implicit_confirm_option_marks_header() {
        let mut ctx = ctx();
        ctx.options.implicit_confirm = true;
        let msg = cert_req(&mut ctx, BodyType::Ir).unwrap();
        assert!(check_implicit_confirm(&msg.header));
    }

    #[test]
    fn kur_needs_reference_certificate() {
        let mut ctx = ctx();
        let err = cert_req(&mut ctx, BodyType::Kur).unwrap_err();
        assert!(matches!(err, CmpError::InvalidArgs(_)));
    }

    #[test]
    fn p10cr_needs_csr() {
        let mut ctx = ctx();
        let err = cert_req(&mut ctx, BodyType::P10cr).unwrap_err();
        assert!(matches!(err, CmpError::MessageBuild { kind: "P10CR", .. }));
    }

    #[test]
    fn signature_popo_needs_signer() {
        let mut ctx = ctx();
        ctx.options.popo_method = PopoMethod::Signature;
        let err = cert_req(&mut ctx, BodyType::Ir).unwrap_err();
        assert!(matches!(err, CmpError::MessageBuild { kind: "IR", .. }));
    }

    #[test]
    fn rr_needs_old_cert() {
        let mut ctx = ctx();
        let err = rr(&mut ctx).unwrap_err();
        assert!(matches!(err, CmpError::NullArgument(_)));
    }

    #[test]
    fn cert_conf_needs_new_cert() {
        let mut ctx = ctx();
        let err = cert_conf(&mut ctx).unwrap_err();
        assert!(matches!(err, CmpError::NullArgument(_)));
    }

    #[test]
    fn poll_req_carries_id() {
        let mut ctx = ctx();
        let msg = poll_req(&mut ctx, CERT_REQ_ID).unwrap();
        match &msg.body {
            PkiBody::PollReq(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].cert_req_id, CERT_REQ_ID);
            }
            other => panic!("expected POLLREQ body, got {:?}", other.body_type()),
        }
    }

    #[test]
    fn genm_echo_payload() {
        let mut ctx = ctx();
        let itav = InfoTypeAndValue::implicit_confirm().unwrap();
        let msg = genm(&mut ctx, vec![itav.clone()]).unwrap();
        match &msg.body {
            PkiBody::Genm(itavs) => assert_eq!(itavs, &vec![itav]),
            other => panic!("expected GENM body, got {:?}", other.body_type()),
        }
    }

    #[test]
    fn hook_rejection_lands_in_cert_status() {
        let mut ctx = ctx();
        ctx.new_cert = Some(crate::test_support::dummy_cert());
        ctx.cert_conf_hook = Some(Box::new(|_| {
            Err((
                PkiFailureInfoValues::BadCertTemplate.into(),
                "not the key we asked for".to_string(),
            ))
        }));

        let msg = cert_conf(&mut ctx).unwrap();
        match &msg.body {
            PkiBody::CertConf(statuses) => {
                let si = statuses[0].status_info.as_ref().unwrap();
                assert_eq!(si.status, PkiStatus::Rejection);
                assert!(si.has_failure(PkiFailureInfoValues::BadCertTemplate));
            }
            other => panic!("expected CERTCONF body, got {:?}", other.body_type()),
        }
    }
}
