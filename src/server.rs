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

//! Responder engine: validates an inbound message, dispatches on its body
//! type and assembles the response with mirrored transaction binding.
//!
//! The built-in processors implement the mock behaviors used to exercise a
//! client offline: a fixed certificate to issue, simulated polling, and
//! fault injection through plain knobs. Each dispatch slot is replaceable
//! for custom processing.

use tracing::{debug, info, warn};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::Certificate;

use crate::builders::response::{cert_rep, genp, pkiconf, poll_rep, rp};
use crate::builders::{cert_hash, error_new, CERT_REQ_ID};
use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::header::check_implicit_confirm;
use crate::status::{PkiFailureInfoValues, PkiStatus, PkiStatusInfo};
use crate::types::{BodyType, CertId, CertReqMessages, PkiBody, PkiMessage};
use crate::verify::validate_received;

/// Responder-side state: fixed outputs, fault injection and polling
/// simulation. The embedded [`CmpContext`] carries the responder's own
/// identity and the per-request transaction binding.
pub struct ServerContext {
    /// The responder's own context (identity, protection, binding state).
    pub ctx: CmpContext,

    /// Certificate issued in response to cert requests.
    pub cert_out: Option<Certificate>,

    /// Chain accompanying the issued certificate, sent as extraCerts.
    pub chain_out: Vec<Certificate>,

    /// caPubs attached to cert responses.
    pub ca_pubs_out: Vec<Certificate>,

    /// Status template for cert and revocation responses.
    pub pki_status_out: PkiStatusInfo,

    /// Respond to everything with an ERROR carrying the status template.
    pub send_error: bool,

    /// Accept requests without protection.
    pub accept_unprotected: bool,

    /// Accept raVerified proof of possession.
    pub accept_ra_verified: bool,

    /// Send rejection and error responses without protection.
    pub send_unprotected_errors: bool,

    /// Grant implicit confirmation when the client requests it.
    pub grant_implicit_confirm: bool,

    /// Number of PollRep answers to give before the final response.
    pub poll_count: u32,

    /// checkAfter seconds told to the polling client.
    pub check_after_time: u64,

    /// The cert request retained while polling is simulated.
    pub cert_req: Option<PkiMessage>,

    /// certReqId of the retained request.
    pub cert_req_id: u32,
}

impl ServerContext {
    /// Create a server context with an accepted status template and a
    /// one-second checkAfter.
    pub fn new() -> Self {
        Self {
            ctx: CmpContext::new(),
            cert_out: None,
            chain_out: Vec::new(),
            ca_pubs_out: Vec::new(),
            pki_status_out: PkiStatusInfo::accepted(),
            send_error: false,
            accept_unprotected: false,
            accept_ra_verified: false,
            send_unprotected_errors: false,
            grant_implicit_confirm: false,
            poll_count: 0,
            check_after_time: 1,
            cert_req: None,
            cert_req_id: CERT_REQ_ID,
        }
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A dispatch slot of the responder.
pub type ProcessFn = fn(&mut CmpResponder, &PkiMessage) -> Result<PkiMessage>;

/// The responder engine.
///
/// Stateless across requests apart from the retained cert request used for
/// polling simulation; processes one message at a time.
pub struct CmpResponder {
    /// Responder state and knobs.
    pub srv: ServerContext,

    process_ir: ProcessFn,
    process_cr: ProcessFn,
    process_p10cr: ProcessFn,
    process_kur: ProcessFn,
    process_pollreq: ProcessFn,
    process_rr: ProcessFn,
    process_error: ProcessFn,
    process_certconf: ProcessFn,
    process_genm: ProcessFn,
}

impl CmpResponder {
    /// Create a responder with the built-in mock processors.
    pub fn new(srv: ServerContext) -> Self {
        Self {
            srv,
            process_ir: process_cert_request,
            process_cr: process_cert_request,
            process_p10cr: process_cert_request,
            process_kur: process_cert_request,
            process_pollreq: process_poll_req,
            process_rr: process_rr,
            process_error: process_error,
            process_certconf: process_cert_conf,
            process_genm: process_genm,
        }
    }

    /// Replace the GENM processor, e.g. with a real information service.
    pub fn set_genm_processor(&mut self, f: ProcessFn) {
        self.process_genm = f;
    }

    /// Validate the request, dispatch on its body type and build the
    /// response.
    pub fn process_request(&mut self, req: &PkiMessage) -> Result<PkiMessage> {
        let sender = match &req.header.sender {
            GeneralName::DirectoryName(name) => name.clone(),
            _ => return Err(CmpError::SenderGeneralNameTypeNotSupported),
        };
        // Respond to whoever asked.
        self.srv.ctx.expected_sender = Some(sender);

        // Fresh transaction binding per request; the responder keeps no
        // cross-request nonce state.
        self.srv.ctx.transaction_id = None;
        self.srv.ctx.sender_nonce = None;
        self.srv.ctx.recip_nonce = None;

        let accept_unprotected = self.srv.accept_unprotected;
        validate_received(&mut self.srv.ctx, req, accept_unprotected)
            .map_err(|e| CmpError::FailedToReceivePkiMessage(e.to_string()))?;

        if self.srv.send_error {
            debug!("answering {} with injected error", req.body_type());
            let si = self.srv.pki_status_out.clone();
            let unprotected = self.srv.send_unprotected_errors;
            return error_new(&mut self.srv.ctx, si, None, None, unprotected);
        }

        let process = match req.body_type() {
            BodyType::Ir => self.process_ir,
            BodyType::Cr => self.process_cr,
            BodyType::P10cr => self.process_p10cr,
            BodyType::Kur => self.process_kur,
            BodyType::PollReq => self.process_pollreq,
            BodyType::Rr => self.process_rr,
            BodyType::Error => self.process_error,
            BodyType::CertConf => self.process_certconf,
            BodyType::Genm => self.process_genm,
            other => {
                return Err(CmpError::UnexpectedPkiBody {
                    expected: BodyType::Ir,
                    got: other,
                })
            }
        };
        process(self, req)
    }

    /// Answer a request, reporting processing failures to the client as an
    /// ERROR message.
    ///
    /// The inbound and outbound messages are both passed through a DER
    /// round trip; malformed messages surface as decode faults instead of
    /// protocol answers.
    pub fn respond(&mut self, req: &PkiMessage) -> Result<PkiMessage> {
        let wire_req = req.dup()?;

        let rsp = match self.process_request(&wire_req) {
            Ok(rsp) => rsp,
            Err(e @ (CmpError::ErrorDecodingMessage(_) | CmpError::Der(_))) => return Err(e),
            Err(e) => {
                info!("reporting processing failure to client: {e}");
                let si = PkiStatusInfo::new(
                    PkiStatus::Rejection,
                    PkiFailureInfoValues::BadRequest.into(),
                    None,
                );
                let unprotected = self.srv.send_unprotected_errors;
                error_new(
                    &mut self.srv.ctx,
                    si,
                    None,
                    Some(vec![e.to_string()]),
                    unprotected,
                )?
            }
        };

        rsp.dup()
    }
}

fn req_messages(req: &PkiMessage) -> Option<&CertReqMessages> {
    match &req.body {
        PkiBody::Ir(reqs) | PkiBody::Cr(reqs) | PkiBody::Kur(reqs) => Some(reqs),
        _ => None,
    }
}

/// Proof-of-possession gate: raVerified passes only when allowed, a
/// missing POP never does. Signature verification itself is the business
/// of the crypto seam behind the protection verifier.
fn popo_acceptable(req: &PkiMessage, accept_ra_verified: bool) -> bool {
    use crate::types::ProofOfPossession;

    match &req.body {
        PkiBody::P10cr(_) => true,
        _ => match req_messages(req).and_then(|reqs| reqs.first()) {
            Some(crm) => match &crm.popo {
                Some(ProofOfPossession::RaVerified(_)) => accept_ra_verified,
                Some(_) => true,
                None => false,
            },
            None => false,
        },
    }
}

/// Built-in processor for IR/CR/P10CR/KUR.
fn process_cert_request(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    let body_type = match req.body_type() {
        BodyType::Ir => BodyType::Ip,
        BodyType::Cr | BodyType::P10cr => BodyType::Cp,
        BodyType::Kur => BodyType::Kup,
        other => {
            return Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::Ir,
                got: other,
            })
        }
    };

    let cert_req_id = match &req.body {
        PkiBody::P10cr(_) => CERT_REQ_ID,
        _ => {
            let reqs = req_messages(req).ok_or(CmpError::CertResponseNotFound)?;
            reqs.first()
                .ok_or_else(|| CmpError::body_error("no CertReqMsg in request"))?
                .cert_req
                .cert_req_id
        }
    };
    responder.srv.cert_req_id = cert_req_id;

    let mut grant_implicit = false;
    let (si, cert, chain, ca_pubs) =
        if !popo_acceptable(req, responder.srv.accept_ra_verified) {
            let si = PkiStatusInfo::new(
                PkiStatus::Rejection,
                PkiFailureInfoValues::BadPop.into(),
                None,
            );
            (si, None, Vec::new(), Vec::new())
        } else if responder.srv.poll_count > 0 {
            // Hold the request and make the client poll; the counter is
            // consumed by the pollReq processor.
            responder.srv.cert_req = Some(req.clone());
            (PkiStatusInfo::waiting(), None, Vec::new(), Vec::new())
        } else {
            grant_implicit =
                check_implicit_confirm(&req.header) && responder.srv.grant_implicit_confirm;
            (
                responder.srv.pki_status_out.clone(),
                responder.srv.cert_out.clone(),
                responder.srv.chain_out.clone(),
                responder.srv.ca_pubs_out.clone(),
            )
        };

    let unprotected = responder.srv.send_unprotected_errors;
    cert_rep(
        &mut responder.srv.ctx,
        body_type,
        cert_req_id,
        si,
        cert,
        chain,
        ca_pubs,
        grant_implicit,
        unprotected,
    )
}

/// Built-in processor for POLLREQ: replay the retained request once the
/// poll counter is exhausted, otherwise tell the client to come back.
fn process_poll_req(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    let entries = match &req.body {
        PkiBody::PollReq(entries) => entries,
        other => {
            return Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::PollReq,
                got: other.body_type(),
            })
        }
    };
    let entry = entries
        .first()
        .ok_or_else(|| CmpError::body_error("empty pollReq"))?;
    if entry.cert_req_id != responder.srv.cert_req_id {
        return Err(CmpError::UnexpectedRequestId {
            expected: responder.srv.cert_req_id,
            got: entry.cert_req_id,
        });
    }

    if responder.srv.poll_count == 0 {
        let stored = responder
            .srv
            .cert_req
            .clone()
            .ok_or_else(|| CmpError::body_error("no certificate request is pending"))?;
        process_cert_request(responder, &stored)
    } else {
        responder.srv.poll_count -= 1;
        let check_after = responder.srv.check_after_time;
        debug!(
            "telling client to poll again in {} s ({} pollRep left)",
            check_after, responder.srv.poll_count
        );
        poll_rep(&mut responder.srv.ctx, entry.cert_req_id, check_after)
    }
}

/// Built-in processor for RR: revocation is accepted only for the
/// certificate this responder issues.
fn process_rr(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    let details = match &req.body {
        PkiBody::Rr(details) => details,
        other => {
            return Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::Rr,
                got: other.body_type(),
            })
        }
    };
    let detail = details
        .first()
        .ok_or_else(|| CmpError::body_error("empty revocation request"))?;

    let cert_out = responder
        .srv
        .cert_out
        .as_ref()
        .ok_or_else(|| CmpError::null_argument("no certificate configured to revoke"))?;

    let issuer = detail.cert_details.issuer.as_ref();
    let serial = detail.cert_details.serial_number.as_ref();
    let matches_cert_out = issuer == Some(&cert_out.tbs_certificate.issuer)
        && serial == Some(&cert_out.tbs_certificate.serial_number);
    if !matches_cert_out {
        return Err(CmpError::RequestNotAccepted(
            "revocation target does not match the issued certificate".to_string(),
        ));
    }

    let cert_id = CertId::new(
        cert_out.tbs_certificate.issuer.clone(),
        cert_out.tbs_certificate.serial_number.clone(),
    );
    let si = responder.srv.pki_status_out.clone();
    let unprotected = responder.srv.send_unprotected_errors;
    rp(&mut responder.srv.ctx, si, cert_id, unprotected)
}

/// Built-in processor for CERTCONF: recompute the hash over the issued
/// certificate and compare.
fn process_cert_conf(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    let statuses = match &req.body {
        PkiBody::CertConf(statuses) => statuses,
        other => {
            return Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::CertConf,
                got: other.body_type(),
            })
        }
    };

    match statuses.first() {
        None => info!("certificate rejected by client"),
        Some(status) => {
            if statuses.len() > 1 {
                warn!("all CertStatus but the first will be ignored");
            }
            if status.cert_req_id != responder.srv.cert_req_id {
                return Err(CmpError::UnexpectedRequestId {
                    expected: responder.srv.cert_req_id,
                    got: status.cert_req_id,
                });
            }

            let cert_out = responder
                .srv
                .cert_out
                .as_ref()
                .ok_or_else(|| CmpError::null_argument("no issued certificate to confirm"))?;
            let expected = cert_hash(responder.srv.ctx.options.digest, cert_out)?;
            if status.cert_hash != expected {
                return Err(CmpError::WrongCertHash);
            }

            if let Some(si) = &status.status_info {
                if si.status != PkiStatus::Accepted {
                    info!("certificate rejected by client with {}", si.render());
                }
            }
        }
    }

    pkiconf(&mut responder.srv.ctx)
}

/// Built-in processor for ERROR: log and acknowledge.
fn process_error(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    if let PkiBody::Error(err) = &req.body {
        info!(
            "client reported an error: {}",
            err.pki_status_info.render()
        );
    }
    pkiconf(&mut responder.srv.ctx)
}

/// Built-in processor for GENM: echo the ITAVs back.
fn process_genm(responder: &mut CmpResponder, req: &PkiMessage) -> Result<PkiMessage> {
    let itavs = match &req.body {
        PkiBody::Genm(itavs) => itavs.clone(),
        other => {
            return Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::Genm,
                got: other.body_type(),
            })
        }
    };
    genp(&mut responder.srv.ctx, itavs)
}
