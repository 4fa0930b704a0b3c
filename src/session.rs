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

//! Client session engine.
//!
//! Drives one transaction at a time from first request to terminal state:
//! send, validate, poll through `waiting`, extract the certificate,
//! confirm unless confirmation is implicit or disabled. The only suspension
//! points are the transfer call and the polling sleep.

use std::time::Duration;

use tracing::{debug, info, warn};
use x509_cert::Certificate;

use crate::builders::{error_new, request, CERT_REQ_ID};
use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::header::check_implicit_confirm;
use crate::status::{PkiStatus, PkiStatusInfo};
use crate::transfer::Transfer;
use crate::types::{BodyType, CertOrEncCert, InfoTypeAndValue, PkiBody, PkiFreeText, PkiMessage};
use crate::verify::{expect_body_type, validate_received};

/// Outcome of a revocation transaction.
///
/// `Rejected` is a negative answer, not a protocol error: the server
/// declined to revoke but the exchange itself completed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevocationOutcome {
    /// The revocation was performed.
    Accepted,
    /// The revocation was performed with modifications.
    GrantedWithMods,
    /// The server declined the revocation.
    Rejected,
    /// A revocation is imminent.
    RevocationWarning,
    /// A revocation has already occurred.
    RevocationNotification,
}

impl RevocationOutcome {
    /// Returns true when the certificate is (or will be) revoked.
    pub fn is_revoked(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// CMP client driving sessions over a [`Transfer`].
///
/// Owns the context; one logical session runs at a time.
pub struct CmpClient<T: Transfer> {
    ctx: CmpContext,
    transfer: T,
    confirmed: bool,
}

impl<T: Transfer> CmpClient<T> {
    /// Create a client over the given context and transfer.
    pub fn new(ctx: CmpContext, transfer: T) -> Self {
        Self {
            ctx,
            transfer,
            confirmed: false,
        }
    }

    /// The client context.
    pub fn context(&self) -> &CmpContext {
        &self.ctx
    }

    /// Mutable access to the client context, for configuration between
    /// sessions.
    pub fn context_mut(&mut self) -> &mut CmpContext {
        &mut self.ctx
    }

    /// Mutable access to the transfer, e.g. to reconfigure an in-process
    /// responder between sessions.
    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    /// Consume the client, returning the context with its results.
    pub fn into_context(self) -> CmpContext {
        self.ctx
    }

    /// Run an Initialization Request transaction.
    pub async fn execute_ir(&mut self) -> Result<Certificate> {
        self.execute_cert_request(BodyType::Ir, BodyType::Ip).await
    }

    /// Run a Certification Request transaction.
    pub async fn execute_cr(&mut self) -> Result<Certificate> {
        self.execute_cert_request(BodyType::Cr, BodyType::Cp).await
    }

    /// Run a Key-Update Request transaction.
    pub async fn execute_kur(&mut self) -> Result<Certificate> {
        self.execute_cert_request(BodyType::Kur, BodyType::Kup).await
    }

    /// Run a PKCS#10-wrapped request transaction.
    pub async fn execute_p10cr(&mut self) -> Result<Certificate> {
        self.execute_cert_request(BodyType::P10cr, BodyType::Cp).await
    }

    /// Run a Revocation Request transaction over the context's oldCert.
    pub async fn execute_rr(&mut self) -> Result<RevocationOutcome> {
        self.ctx.begin_session();
        let result = self.rr_exchange().await;
        self.ctx.end_session();
        result
    }

    /// Run a General Message transaction; the answered ITAVs are handed to
    /// the caller.
    pub async fn execute_genm(
        &mut self,
        itavs: Vec<InfoTypeAndValue>,
    ) -> Result<Vec<InfoTypeAndValue>> {
        self.ctx.begin_session();
        let result = self.genm_exchange(itavs).await;
        self.ctx.end_session();
        result
    }

    /// Send an ERROR message to the server; the acknowledging PKIConf is
    /// validated like any other response.
    pub async fn exchange_error(
        &mut self,
        si: PkiStatusInfo,
        error_code: Option<u64>,
        details: Option<PkiFreeText>,
    ) -> Result<()> {
        let unprotected = false;
        let req = error_new(&mut self.ctx, si, error_code, details, unprotected)?;
        self.ctx.last_sent = Some(BodyType::Error);
        self.send_receive_check(&req, BodyType::PkiConf).await?;
        Ok(())
    }

    /// Send the certificate confirmation for the enrolled certificate.
    ///
    /// Fails without sending when there is nothing to confirm or when the
    /// confirmation already happened (explicitly or implicitly).
    pub async fn exchange_cert_conf(&mut self) -> Result<()> {
        if self.ctx.new_cert.is_none() {
            return Err(CmpError::null_argument(
                "no newly enrolled certificate to confirm",
            ));
        }
        if self.confirmed {
            return Err(CmpError::invalid_args(
                "certificate confirmation was already exchanged",
            ));
        }
        self.send_cert_conf().await
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// One send/receive round: transfer the request, validate the response
    /// against the context and check its body type.
    async fn send_receive_check(
        &mut self,
        req: &PkiMessage,
        expected: BodyType,
    ) -> Result<PkiMessage> {
        debug!("sending {}", req.body_type());
        let rsp = self.transfer.transfer(req).await?;
        debug!("got response {}", rsp.body_type());

        validate_received(&mut self.ctx, &rsp, false)?;

        if let PkiBody::Error(err) = &rsp.body {
            // Keep the reported status so the caller can render it.
            self.ctx.save_status(&err.pki_status_info);
        }
        expect_body_type(&rsp, expected)?;
        Ok(rsp)
    }

    /// Full certificate-issuance transaction for IR/CR/KUR/P10CR.
    async fn execute_cert_request(
        &mut self,
        req_type: BodyType,
        rep_type: BodyType,
    ) -> Result<Certificate> {
        self.ctx.begin_session();
        self.confirmed = false;

        let result = async {
            let req = request::cert_req(&mut self.ctx, req_type)?;
            let rsp = self.send_receive_check(&req, rep_type).await?;
            self.cert_response(rsp).await
        }
        .await;

        self.ctx.end_session();
        result
    }

    /// Handle a cert response: polling, extraction, result capture and
    /// the optional confirmation exchange.
    async fn cert_response(&mut self, rsp: PkiMessage) -> Result<Certificate> {
        let mut rsp = rsp;

        let status = first_response_status(&rsp)?;
        if status == PkiStatus::Waiting {
            rsp = self.poll_for_response().await?;
        }

        let rep = rsp.body.cert_rep().ok_or(CmpError::UnexpectedPkiBody {
            expected: BodyType::Ip,
            got: rsp.body_type(),
        })?;
        let response = rep.response.first().ok_or(CmpError::CertResponseNotFound)?;
        self.ctx.save_status(&response.status);

        if response.status.status == PkiStatus::Waiting {
            return Err(CmpError::UnexpectedPkiStatus(PkiStatus::Waiting));
        }
        if response.cert_req_id != CERT_REQ_ID {
            return Err(CmpError::BadRequestId(response.cert_req_id));
        }

        let cert = match &response.certified_key_pair {
            Some(kp) => match &kp.cert_or_enc_cert {
                CertOrEncCert::Certificate(cert) => (**cert).clone(),
                CertOrEncCert::EncryptedCert(enc) => match &self.ctx.cert_decrypter {
                    Some(decrypter) => decrypter.decrypt(enc)?,
                    None => {
                        return Err(CmpError::UnknownCertType(
                            "certificate is encrypted and no decrypter is configured"
                                .to_string(),
                        ))
                    }
                },
            },
            None => {
                return Err(CmpError::CertificateNotFound(
                    self.ctx
                        .status_text()
                        .unwrap_or_else(|| "no status in response".to_string()),
                ))
            }
        };

        self.ctx.new_cert = Some(cert.clone());
        self.ctx.ca_pubs = rep.ca_pubs.clone().unwrap_or_default();
        self.ctx.extra_certs_in = rsp.extra_certs.clone().unwrap_or_default();

        if check_implicit_confirm(&rsp.header) {
            info!("server granted implicit confirmation");
            self.confirmed = true;
        } else if self.ctx.options.disable_confirm {
            debug!("certificate confirmation disabled");
        } else {
            self.send_cert_conf().await?;
        }

        Ok(cert)
    }

    /// Poll until a final cert response arrives, sleeping `checkAfter`
    /// seconds between rounds and accounting the sleeps against the
    /// session's total timeout.
    async fn poll_for_response(&mut self) -> Result<PkiMessage> {
        info!("received 'waiting' PKIStatus, polling for the response");
        let mut budget = self.ctx.options.total_timeout;

        loop {
            let req = request::poll_req(&mut self.ctx, CERT_REQ_ID)?;
            let rsp = self.send_receive_check(&req, BodyType::PollRep).await?;

            let entry = match &rsp.body {
                PkiBody::PollRep(entries) => entries
                    .first()
                    .cloned()
                    .ok_or_else(|| CmpError::body_error("empty pollRep"))?,
                _ => {
                    info!("got final response on polling request");
                    return Ok(rsp);
                }
            };
            if entry.cert_req_id != CERT_REQ_ID {
                return Err(CmpError::UnexpectedRequestId {
                    expected: CERT_REQ_ID,
                    got: entry.cert_req_id,
                });
            }

            let mut check_after = entry.check_after;
            if self.ctx.options.total_timeout != 0 {
                if budget == 0 {
                    warn!("polling budget exhausted before a final response");
                    return Err(CmpError::TotalTimeoutExceeded);
                }
                if budget > check_after {
                    budget -= check_after;
                } else {
                    // Sleep only for the remaining budget and poll one
                    // last time when it runs out.
                    check_after = budget;
                    budget = 0;
                }
            }

            info!(
                "received pollRep, waiting checkAfter = {} s before the next poll",
                check_after
            );
            tokio::time::sleep(Duration::from_secs(check_after)).await;
        }
    }

    /// Send certConf and accept the PKIConf answer.
    async fn send_cert_conf(&mut self) -> Result<()> {
        let req = request::cert_conf(&mut self.ctx)?;
        self.send_receive_check(&req, BodyType::PkiConf).await?;
        self.confirmed = true;
        Ok(())
    }

    /// The RR exchange proper.
    async fn rr_exchange(&mut self) -> Result<RevocationOutcome> {
        let req = request::rr(&mut self.ctx)?;
        let rsp = self.send_receive_check(&req, BodyType::Rp).await?;

        let rp = match &rsp.body {
            PkiBody::Rp(rp) => rp,
            other => {
                return Err(CmpError::UnexpectedPkiBody {
                    expected: BodyType::Rp,
                    got: other.body_type(),
                })
            }
        };
        let si = rp.status.first().ok_or(CmpError::PkiStatusInfoNotFound)?;
        self.ctx.save_status(si);

        match si.status {
            PkiStatus::Accepted => {
                info!("revocation accepted (PKIStatus=accepted)");
                Ok(RevocationOutcome::Accepted)
            }
            PkiStatus::GrantedWithMods => {
                info!("revocation accepted (PKIStatus=grantedWithMods)");
                Ok(RevocationOutcome::GrantedWithMods)
            }
            PkiStatus::Rejection => {
                warn!("revocation rejected (PKIStatus=rejection)");
                Ok(RevocationOutcome::Rejected)
            }
            PkiStatus::RevocationWarning => {
                info!("revocation accepted (PKIStatus=revocationWarning)");
                Ok(RevocationOutcome::RevocationWarning)
            }
            PkiStatus::RevocationNotification => {
                info!("revocation accepted (PKIStatus=revocationNotification)");
                Ok(RevocationOutcome::RevocationNotification)
            }
            status @ (PkiStatus::Waiting | PkiStatus::KeyUpdateWarning) => {
                Err(CmpError::UnexpectedPkiStatus(status))
            }
        }
    }

    /// The GENM exchange proper.
    async fn genm_exchange(
        &mut self,
        itavs: Vec<InfoTypeAndValue>,
    ) -> Result<Vec<InfoTypeAndValue>> {
        let req = request::genm(&mut self.ctx, itavs)?;
        let rsp = self.send_receive_check(&req, BodyType::Genp).await?;

        match rsp.body {
            PkiBody::Genp(itavs) => Ok(itavs),
            other => Err(CmpError::UnexpectedPkiBody {
                expected: BodyType::Genp,
                got: other.body_type(),
            }),
        }
    }
}

/// PKIStatus of the first CertResponse of a cert response message.
fn first_response_status(msg: &PkiMessage) -> Result<PkiStatus> {
    let rep = msg.body.cert_rep().ok_or(CmpError::UnexpectedPkiBody {
        expected: BodyType::Ip,
        got: msg.body_type(),
    })?;
    let response = rep.response.first().ok_or(CmpError::CertResponseNotFound)?;
    Ok(response.status.status)
}
