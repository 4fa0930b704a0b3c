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

//! Validation of received messages against the session context.
//!
//! Both engines run the same checks: sender form, transaction binding,
//! protection (with the unprotected-exception rule), and the nonce echo.
//! On success the peer's senderNonce is captured for echoing in the next
//! outbound message.

use tracing::warn;
use x509_cert::ext::pkix::name::GeneralName;

use crate::context::CmpContext;
use crate::error::{CmpError, Result};
use crate::status::PkiStatus;
use crate::types::{BodyType, PkiBody, PkiMessage};

/// Returns true when a missing protection is explicitly permitted for this
/// message.
///
/// `accept_unprotected` unconditionally allows it (responder-side knob);
/// otherwise the `unprotected_errors` option allows ERROR bodies, PKIConf,
/// rejection revocation responses and rejection cert responses.
fn unprotected_exception(
    ctx: &CmpContext,
    msg: &PkiMessage,
    accept_unprotected: bool,
) -> bool {
    if accept_unprotected {
        warn!("ignoring missing protection of {} message", msg.body_type());
        return true;
    }
    if !ctx.options.unprotected_errors {
        return false;
    }

    match &msg.body {
        PkiBody::Error(_) => {
            warn!("ignoring missing protection of error response");
            true
        }
        PkiBody::PkiConf(_) => {
            warn!("ignoring missing protection of PKI confirmation message");
            true
        }
        PkiBody::Rp(rp)
            if rp
                .status
                .first()
                .map(|si| si.status == PkiStatus::Rejection)
                .unwrap_or(false) =>
        {
            warn!(
                "ignoring missing protection of revocation response message \
                 with rejection status"
            );
            true
        }
        body => match body.cert_rep() {
            Some(rep)
                if rep
                    .response
                    .first()
                    .map(|r| r.status.status == PkiStatus::Rejection)
                    .unwrap_or(false) =>
            {
                warn!(
                    "ignoring missing protection of CertRepMessage with \
                     rejection status"
                );
                true
            }
            _ => false,
        },
    }
}

/// Validate a received message against the context.
///
/// Enforces, in order: the sender must be a directory name; the
/// transactionID must match the session (a context without one adopts the
/// message's, the responder case); the protection must verify or fall under
/// an exception; the recipNonce must echo the last sent senderNonce. On
/// success the message's senderNonce is stored for the next outbound echo.
pub fn validate_received(
    ctx: &mut CmpContext,
    msg: &PkiMessage,
    accept_unprotected: bool,
) -> Result<()> {
    if !matches!(msg.header.sender, GeneralName::DirectoryName(_)) {
        return Err(CmpError::SenderGeneralNameTypeNotSupported);
    }

    match (&ctx.transaction_id, &msg.header.transaction_id) {
        (Some(expected), Some(got)) if expected == got => {}
        (Some(_), _) => return Err(CmpError::TransactionIdUnmatched),
        (None, Some(got)) => ctx.transaction_id = Some(got.clone()),
        (None, None) => return Err(CmpError::TransactionIdUnmatched),
    }

    if msg.header.protection_alg.is_some() {
        let protection = msg.protection.as_ref().ok_or_else(|| {
            CmpError::protection("protectionAlg present but protection bits missing")
        })?;
        let verifier = ctx
            .verifier
            .as_ref()
            .ok_or_else(|| CmpError::protection("no protection verifier configured"))?;
        let protected = msg.protected_part_der()?;
        let bits = protection
            .as_bytes()
            .ok_or_else(|| CmpError::protection("protection is not an octet-aligned BIT STRING"))?;
        verifier.verify(msg, &protected, bits)?;
    } else if !unprotected_exception(ctx, msg, accept_unprotected) {
        return Err(CmpError::protection(format!(
            "{} message is not protected",
            msg.body_type()
        )));
    }

    if let Some(sent_nonce) = &ctx.sender_nonce {
        match &msg.header.recip_nonce {
            Some(echoed) if echoed == sent_nonce => {}
            _ => return Err(CmpError::NoncesDoNotMatch),
        }
    }

    // RFC 4210 5.1.1: recipNonce of the next message is copied from the
    // senderNonce of the previous one.
    ctx.recip_nonce = msg.header.sender_nonce.clone();
    ctx.last_received = Some(msg.body_type());

    Ok(())
}

/// Check that the received body is the expected one.
///
/// A cert response (IP/CP/KUP) is also acceptable where a POLLREP is
/// expected, since polling completes with the final response.
pub fn expect_body_type(msg: &PkiMessage, expected: BodyType) -> Result<()> {
    let got = msg.body_type();
    if got == expected {
        return Ok(());
    }
    if expected == BodyType::PollRep
        && matches!(got, BodyType::Ip | BodyType::Cp | BodyType::Kup)
    {
        return Ok(());
    }
    if let PkiBody::Error(err) = &msg.body {
        return Err(CmpError::body_error(format!(
            "received error message: {}",
            err.pki_status_info.render()
        )));
    }
    Err(CmpError::UnexpectedPkiBody { expected, got })
}
