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

//! # cmp-client
//!
//! A Rust implementation of the Certificate Management Protocol (CMP,
//! RFC 4210/4211) request/response core: a client session engine driving
//! enrollment, renewal, revocation and general-message transactions, and a
//! symmetric mock responder for exercising the client offline.
//!
//! ## Features
//!
//! - **Async-first design** using Tokio; the engine suspends only at the
//!   transfer seam and the polling sleep
//! - **Six transaction types**: IR, CR, KUR, P10CR, RR, GENM, plus the
//!   certConf/PKIConf confirmation exchange
//! - **Polling** through `waiting` responses with total-timeout accounting
//! - **Strict session binding**: transactionID, fresh senderNonce per
//!   message, recipNonce echo
//! - **Pluggable protection**: signature and MAC schemes live behind
//!   traits; a shared-secret MAC provider is built in
//! - **Mock responder** with simulated polling and fault injection
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cmp_client::{
//!     CmpClient, CmpContext, CmpResponder, DigestAlg, LocalResponder, PasswordMac,
//!     ServerContext,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mac = Arc::new(PasswordMac::new(&b"shared-secret"[..], DigestAlg::Sha256));
//!
//!     // The responder side: issues `cert` for every request.
//!     let mut srv = ServerContext::new();
//!     srv.ctx.reference_value = Some(b"mock-ca".to_vec());
//!     srv.ctx.protection = Some(mac.clone());
//!     srv.ctx.verifier = Some(mac.clone());
//!     srv.accept_ra_verified = true;
//!     # let cert: cmp_client::Certificate = todo!();
//!     srv.cert_out = Some(cert);
//!
//!     // The client side.
//!     let mut ctx = CmpContext::new();
//!     ctx.reference_value = Some(b"client-1".to_vec());
//!     ctx.protection = Some(mac.clone());
//!     ctx.verifier = Some(mac);
//!
//!     let transfer = LocalResponder::new(CmpResponder::new(srv));
//!     let mut client = CmpClient::new(ctx, transfer);
//!
//!     let issued = client.execute_ir().await?;
//!     println!("enrolled: {:?}", issued.tbs_certificate.subject);
//!     Ok(())
//! }
//! ```
//!
//! ## Scope
//!
//! The ASN.1 codec is the `der` crate; X.509 structures come from
//! `x509-cert`. Transport is abstracted behind [`Transfer`]: an HTTP
//! binding would POST DER as `application/pkixcmp`, while
//! [`LocalResponder`] wires a client to an in-process responder.
//! Signature cryptography, chain building and POP verification live behind
//! the protection traits and are not implemented here.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builders;
pub mod context;
pub mod error;
pub mod header;
pub mod protect;
pub mod server;
pub mod session;
pub mod status;
pub mod transfer;
pub mod types;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types at crate root for convenience
pub use builders::CERT_REQ_ID;
pub use context::{CmpContext, CmpOptions, PopoMethod};
pub use error::{CmpError, Result};
pub use header::{NONCE_LENGTH, TRANSACTION_ID_LENGTH};
pub use protect::{DigestAlg, MessageProtection, PasswordMac, ProtectionVerifier};
pub use server::{CmpResponder, ServerContext};
pub use session::{CmpClient, RevocationOutcome};
pub use status::{PkiFailureInfo, PkiFailureInfoValues, PkiStatus, PkiStatusInfo};
pub use transfer::{LocalResponder, Transfer};
pub use types::{BodyType, InfoTypeAndValue, PkiBody, PkiHeader, PkiMessage};

// Re-export x509_cert::Certificate for convenience
pub use x509_cert::Certificate;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
