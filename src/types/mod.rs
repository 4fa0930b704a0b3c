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

//! Wire model for the RFC 4210/4211 structures.
//!
//! Declared in-tree over the `der` codec; every type round-trips through
//! canonical DER and compares structurally.

pub mod body;
pub mod crmf;
pub mod header;
pub mod message;

pub use body::{
    BodyType, CertConfirmContent, CertOrEncCert, CertRepMessage, CertResponse, CertStatus,
    CertifiedKeyPair, ErrorMsgContent, GenMsgContent, GenRepContent, PkiBody, PollRepContent,
    PollRepEntry, PollReqContent, PollReqEntry, RevDetails, RevRepContent, RevReqContent,
};
pub use crmf::{
    CertId, CertReqMessages, CertReqMsg, CertRequest, CertTemplate, Controls, EncryptedValue,
    OptionalValidity, PopoPrivKey, PopoSigningKey, ProofOfPossession, SubsequentMessage,
};
pub use header::{InfoTypeAndValue, PkiFreeText, PkiHeader, Pvno, ID_IT_IMPLICIT_CONFIRM};
pub use message::{PkiMessage, ProtectedPart};
