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

//! Client-side context: identity material, request template, options,
//! per-transaction state and accumulated results.
//!
//! One context serves one client/server pair. It is not meant for
//! concurrent mutation; one logical session runs at a time and the trust
//! material may only be changed between sessions.

use std::sync::Arc;

use der::asn1::OctetString;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::Extensions;
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use crate::protect::{CertDecrypter, DigestAlg, MessageProtection, ProtectionVerifier};
use crate::status::{PkiFailureInfo, PkiStatus, PkiStatusInfo};
use crate::types::{BodyType, InfoTypeAndValue};

/// Proof-of-possession variant selected for IR/CR/KUR requests.
///
/// The cryptography behind the variants lives outside this crate; the
/// engine only selects the wire form.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PopoMethod {
    /// `raVerified`: the RA vouches for possession.
    RaVerified,
    /// Signature with the subject key (default).
    #[default]
    Signature,
    /// Indirect proof: the certificate comes back encrypted.
    KeyEncipherment,
}

/// Behavioral options of a client context.
///
/// Mirrors the option set of the original implementation; each field is an
/// independent knob with a conservative default.
#[derive(Clone, Debug)]
pub struct CmpOptions {
    /// Advertise and accept implicit certificate confirmation.
    pub implicit_confirm: bool,

    /// Skip certConf even when the server did not grant implicit confirm.
    pub disable_confirm: bool,

    /// Send outbound messages without protection.
    pub unprotected_send: bool,

    /// Accept unprotected ERROR/PKICONF/rejection responses.
    pub unprotected_errors: bool,

    /// Relax verifier policy on the key usage of the signer certificate.
    pub ignore_key_usage: bool,

    /// Allow trust anchors taken from extraCerts during initialization.
    pub permit_ta_in_extra_certs: bool,

    /// Session wall-clock bound in seconds; 0 disables.
    pub total_timeout: u64,

    /// Per-transfer bound in seconds, enforced by the transfer seam.
    pub message_timeout: u64,

    /// Proof-of-possession variant for certificate requests.
    pub popo_method: PopoMethod,

    /// Digest used for certConf hashes and related digesting.
    pub digest: DigestAlg,

    /// CRL reason code to request in revocation requests.
    pub revocation_reason: Option<u32>,

    /// Requested validity period in days; 0 leaves validity to the CA.
    pub validity_days: u32,

    /// Do not default subjectAltNames from the reference certificate.
    pub san_nodefault: bool,

    /// Mark the subjectAltName extension critical.
    pub san_critical: bool,
}

impl Default for CmpOptions {
    fn default() -> Self {
        Self {
            implicit_confirm: false,
            disable_confirm: false,
            unprotected_send: false,
            unprotected_errors: false,
            ignore_key_usage: false,
            permit_ta_in_extra_certs: false,
            total_timeout: 0,
            message_timeout: 120,
            popo_method: PopoMethod::default(),
            digest: DigestAlg::default(),
            revocation_reason: None,
            validity_days: 0,
            san_nodefault: false,
            san_critical: false,
        }
    }
}

/// Pre-confirmation hook: inspect the issued certificate before certConf is
/// sent. Returning `Err` turns the confirmation into a rejection carrying
/// the given failure bits and text.
pub type CertConfHook =
    dyn Fn(&Certificate) -> std::result::Result<(), (PkiFailureInfo, String)> + Send + Sync;

/// Long-lived client-side state for one client/server pair.
pub struct CmpContext {
    // --- own identity ---
    /// The client's current certificate, if it already has one.
    pub client_cert: Option<Certificate>,

    /// The client's certificate chain to attach as extraCerts.
    pub extra_certs_out: Vec<Certificate>,

    /// Reference value identifying the client before it has a certificate;
    /// sent as senderKID.
    pub reference_value: Option<Vec<u8>>,

    /// Shared secret for MAC-based protection providers.
    pub secret_value: Option<Vec<u8>>,

    /// Protection provider for outbound messages.
    pub protection: Option<Arc<dyn MessageProtection>>,

    /// Verifier for inbound message protection.
    pub verifier: Option<Arc<dyn ProtectionVerifier>>,

    /// Signer for signature proof-of-possession over the CertRequest.
    pub pop_signer: Option<Arc<dyn MessageProtection>>,

    /// Decrypter for certificates returned via indirect POP.
    pub cert_decrypter: Option<Arc<dyn CertDecrypter>>,

    // --- peer identity & trust ---
    /// Name the server is expected to use as sender; also the default
    /// recipient of outbound messages.
    pub expected_sender: Option<Name>,

    /// Pinned server certificate, if any.
    pub server_cert: Option<Certificate>,

    /// Trust anchors for protection validation.
    pub trusted: Vec<Certificate>,

    /// Additional untrusted certificates usable for chain building.
    pub untrusted: Vec<Certificate>,

    // --- request template ---
    /// Certificate being updated (KUR) or revoked (RR).
    pub old_cert: Option<Certificate>,

    /// Issuer to request, overriding the reference certificate's issuer.
    pub issuer: Option<Name>,

    /// Subject to request, overriding any reference certificate subject.
    pub subject: Option<Name>,

    /// Subject alternative names to request.
    pub subject_alt_names: Vec<GeneralName>,

    /// Extensions to request verbatim.
    pub req_extensions: Option<Extensions>,

    /// Certificate policies extension to request.
    pub policies: Option<x509_cert::ext::Extension>,

    /// Pre-built PKCS#10 CSR for P10CR transactions.
    pub p10_csr: Option<CertReq>,

    /// Public key to certify; defaults to the reference certificate's key.
    pub new_public_key: Option<SubjectPublicKeyInfoOwned>,

    // --- options ---
    /// Behavioral knobs.
    pub options: CmpOptions,

    /// ITAVs appended to the generalInfo of every outbound header.
    pub geninfo_itavs: Vec<InfoTypeAndValue>,

    /// Pre-confirmation user hook.
    pub cert_conf_hook: Option<Box<CertConfHook>>,

    // --- per-transaction state ---
    /// Transaction ID of the running session.
    pub transaction_id: Option<OctetString>,

    /// senderNonce of the last outbound message.
    pub sender_nonce: Option<OctetString>,

    /// senderNonce of the last inbound message, echoed as recipNonce.
    pub recip_nonce: Option<OctetString>,

    /// Body type of the last message sent.
    pub last_sent: Option<BodyType>,

    /// Body type of the last message received.
    pub last_received: Option<BodyType>,

    // --- results ---
    /// Certificate obtained by the last successful enrollment.
    pub new_cert: Option<Certificate>,

    /// caPubs received with the last cert response, order preserved.
    pub ca_pubs: Vec<Certificate>,

    /// extraCerts received with the last cert response.
    pub extra_certs_in: Vec<Certificate>,

    /// Status of the last received PKIStatusInfo.
    pub last_status: Option<PkiStatus>,

    /// Failure bits of the last received PKIStatusInfo.
    pub last_fail_info: PkiFailureInfo,

    /// Accumulated statusString entries of the session.
    pub last_status_string: Vec<String>,
}

impl CmpContext {
    /// Create a context with default options and no identity material.
    pub fn new() -> Self {
        Self {
            client_cert: None,
            extra_certs_out: Vec::new(),
            reference_value: None,
            secret_value: None,
            protection: None,
            verifier: None,
            pop_signer: None,
            cert_decrypter: None,
            expected_sender: None,
            server_cert: None,
            trusted: Vec::new(),
            untrusted: Vec::new(),
            old_cert: None,
            issuer: None,
            subject: None,
            subject_alt_names: Vec::new(),
            req_extensions: None,
            policies: None,
            p10_csr: None,
            new_public_key: None,
            options: CmpOptions::default(),
            geninfo_itavs: Vec::new(),
            cert_conf_hook: None,
            transaction_id: None,
            sender_nonce: None,
            recip_nonce: None,
            last_sent: None,
            last_received: None,
            new_cert: None,
            ca_pubs: Vec::new(),
            extra_certs_in: Vec::new(),
            last_status: None,
            last_fail_info: PkiFailureInfo::default(),
            last_status_string: Vec::new(),
        }
    }

    /// Prepare the context for a new transaction: drop stale binding state
    /// and the results of any previous session.
    pub fn begin_session(&mut self) {
        self.transaction_id = None;
        self.sender_nonce = None;
        self.recip_nonce = None;
        self.last_sent = None;
        self.last_received = None;
        self.new_cert = None;
        self.ca_pubs.clear();
        self.extra_certs_in.clear();
        self.last_status = None;
        self.last_fail_info = PkiFailureInfo::default();
        self.last_status_string.clear();
    }

    /// Terminate the session: binding state is dropped, results and
    /// identity material persist.
    pub fn end_session(&mut self) {
        self.transaction_id = None;
        self.sender_nonce = None;
        self.recip_nonce = None;
        self.last_sent = None;
        self.last_received = None;
    }

    /// Record a received PKIStatusInfo; statusString entries accumulate
    /// over the session.
    pub fn save_status(&mut self, si: &PkiStatusInfo) {
        self.last_status = Some(si.status);
        self.last_fail_info = si.fail_info.unwrap_or_default();
        if let Some(strings) = &si.status_string {
            self.last_status_string.extend(strings.iter().cloned());
        }
    }

    /// The last received status assembled back into a PKIStatusInfo.
    pub fn last_status_info(&self) -> Option<PkiStatusInfo> {
        let status = self.last_status?;
        Some(PkiStatusInfo {
            status,
            status_string: if self.last_status_string.is_empty() {
                None
            } else {
                Some(self.last_status_string.clone())
            },
            fail_info: if self.last_fail_info.is_empty() {
                None
            } else {
                Some(self.last_fail_info)
            },
        })
    }

    /// Human-readable rendering of the last received status, if any.
    pub fn status_text(&self) -> Option<String> {
        self.last_status_info().map(|si| si.render())
    }

    /// The reference certificate for template defaulting: oldCert when
    /// set, otherwise the current client certificate.
    pub fn reference_cert(&self) -> Option<&Certificate> {
        self.old_cert.as_ref().or(self.client_cert.as_ref())
    }
}

impl Default for CmpContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CmpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmpContext")
            .field("client_cert", &self.client_cert.is_some())
            .field("expected_sender", &self.expected_sender)
            .field("trusted", &self.trusted.len())
            .field("options", &self.options)
            .field("transaction_id", &self.transaction_id)
            .field("last_status", &self.last_status)
            .field("new_cert", &self.new_cert.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PkiFailureInfoValues;

    #[test]
    fn begin_session_clears_results_and_binding() {
        let mut ctx = CmpContext::new();
        ctx.transaction_id = Some(der::asn1::OctetString::new(vec![1; 16]).unwrap());
        ctx.last_status = Some(PkiStatus::Rejection);
        ctx.last_status_string.push("stale".into());

        ctx.begin_session();
        assert!(ctx.transaction_id.is_none());
        assert!(ctx.last_status.is_none());
        assert!(ctx.last_status_string.is_empty());
    }

    #[test]
    fn end_session_keeps_results() {
        let mut ctx = CmpContext::new();
        ctx.last_status = Some(PkiStatus::Accepted);
        ctx.sender_nonce = Some(der::asn1::OctetString::new(vec![2; 16]).unwrap());

        ctx.end_session();
        assert!(ctx.sender_nonce.is_none());
        assert_eq!(ctx.last_status, Some(PkiStatus::Accepted));
    }

    #[test]
    fn status_strings_accumulate() {
        let mut ctx = CmpContext::new();
        ctx.save_status(&PkiStatusInfo::new(
            PkiStatus::Rejection,
            PkiFailureInfoValues::SignerNotTrusted.into(),
            Some("first"),
        ));
        ctx.save_status(&PkiStatusInfo::new(
            PkiStatus::Rejection,
            PkiFailureInfoValues::SignerNotTrusted.into(),
            Some("second"),
        ));

        let text = ctx.status_text().unwrap();
        assert!(text.contains("rejection"));
        assert!(text.contains("signerNotTrusted"));
        assert!(text.contains("\"first\", \"second\""));
    }
}
