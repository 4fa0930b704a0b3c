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

//! Responder-level tests driving the engine with hand-built requests.

mod common;

use cmp_client::builders::request;
use cmp_client::{BodyType, CmpError, CmpResponder, DigestAlg, PkiBody, PkiStatus};
use common::{cert_out, client_ctx, make_cert, mock_server};

#[test]
fn cert_conf_with_matching_hash_is_confirmed() {
    let mut responder = CmpResponder::new(mock_server());

    let mut ctx = client_ctx();
    ctx.new_cert = Some(cert_out());
    let req = request::cert_conf(&mut ctx).expect("building certConf");

    let rsp = responder.process_request(&req).expect("certConf refused");
    assert_eq!(rsp.body_type(), BodyType::PkiConf);
}

#[test]
fn cert_conf_with_wrong_hash_is_refused() {
    let mut responder = CmpResponder::new(mock_server());

    // Confirm a hash over a different certificate than the issued one.
    let mut ctx = client_ctx();
    ctx.new_cert = Some(make_cert("CN=somebody.else", "CN=Mock CA", 0x03));
    let req = request::cert_conf(&mut ctx).expect("building certConf");

    let err = responder.process_request(&req).unwrap_err();
    assert!(matches!(err, CmpError::WrongCertHash));
}

#[test]
fn cert_conf_with_wrong_digest_is_refused() {
    let mut responder = CmpResponder::new(mock_server());

    let mut ctx = client_ctx();
    ctx.options.digest = DigestAlg::Sha384;
    ctx.new_cert = Some(cert_out());
    let req = request::cert_conf(&mut ctx).expect("building certConf");

    let err = responder.process_request(&req).unwrap_err();
    assert!(matches!(err, CmpError::WrongCertHash));
}

#[test]
fn poll_req_without_pending_request_is_an_error() {
    let mut responder = CmpResponder::new(mock_server());

    let mut ctx = client_ctx();
    let req = request::poll_req(&mut ctx, 0).expect("building pollReq");

    let err = responder.process_request(&req).unwrap_err();
    assert!(matches!(err, CmpError::PkiBodyError(_)));

    // Through respond() the failure reaches the client as an ERROR body.
    let mut ctx = client_ctx();
    let req = request::poll_req(&mut ctx, 0).expect("building pollReq");
    let rsp = responder.respond(&req).expect("responding");
    assert_eq!(rsp.body_type(), BodyType::Error);
    match &rsp.body {
        PkiBody::Error(err) => {
            assert_eq!(err.pki_status_info.status, PkiStatus::Rejection);
            assert!(err.error_details.is_some());
        }
        other => panic!("expected ERROR body, got {:?}", other.body_type()),
    }
}

#[test]
fn poll_req_with_wrong_id_is_refused() {
    let mut srv = mock_server();
    srv.poll_count = 1;
    let mut responder = CmpResponder::new(srv);

    // Seed the retained request.
    let mut ctx = client_ctx();
    let ir = request::cert_req(&mut ctx, BodyType::Ir).expect("building IR");
    let rsp = responder.process_request(&ir).expect("IR refused");
    let rep = rsp.body.cert_rep().expect("cert response expected");
    assert_eq!(rep.response[0].status.status, PkiStatus::Waiting);

    let req = request::poll_req(&mut ctx, 5).expect("building pollReq");
    let err = responder.process_request(&req).unwrap_err();
    assert!(matches!(err, CmpError::UnexpectedRequestId { got: 5, .. }));
}

#[test]
fn waiting_is_returned_while_poll_count_lasts() {
    let mut srv = mock_server();
    srv.poll_count = 1;
    let mut responder = CmpResponder::new(srv);

    let mut ctx = client_ctx();
    let ir = request::cert_req(&mut ctx, BodyType::Ir).expect("building IR");
    let rsp = responder.process_request(&ir).expect("IR refused");
    assert_eq!(
        rsp.body.cert_rep().unwrap().response[0].status.status,
        PkiStatus::Waiting
    );

    // First poll consumes the counter, second poll completes.
    let poll = request::poll_req(&mut ctx, 0).expect("building pollReq");
    let rsp = responder.process_request(&poll).expect("poll refused");
    assert_eq!(rsp.body_type(), BodyType::PollRep);

    let poll = request::poll_req(&mut ctx, 0).expect("building pollReq");
    let rsp = responder.process_request(&poll).expect("poll refused");
    assert_eq!(rsp.body_type(), BodyType::Ip);
    assert!(rsp.body.cert_rep().unwrap().response[0]
        .certified_key_pair
        .is_some());
}

#[test]
fn genm_is_echoed_by_default() {
    let mut responder = CmpResponder::new(mock_server());

    let mut ctx = client_ctx();
    let itav = cmp_client::InfoTypeAndValue::implicit_confirm().unwrap();
    let req = request::genm(&mut ctx, vec![itav.clone()]).expect("building GENM");

    let rsp = responder.process_request(&req).expect("GENM refused");
    match &rsp.body {
        PkiBody::Genp(itavs) => assert_eq!(itavs, &vec![itav]),
        other => panic!("expected GENP body, got {:?}", other.body_type()),
    }
}

#[test]
fn unprotected_request_needs_permission() {
    let mut ctx = client_ctx();
    ctx.options.unprotected_send = true;
    let req = request::cert_req(&mut ctx, BodyType::Ir).expect("building IR");

    let mut responder = CmpResponder::new(mock_server());
    let err = responder.process_request(&req).unwrap_err();
    assert!(matches!(err, CmpError::FailedToReceivePkiMessage(_)));

    let mut srv = mock_server();
    srv.accept_unprotected = true;
    let mut responder = CmpResponder::new(srv);
    let rsp = responder.process_request(&req).expect("IR refused");
    assert_eq!(rsp.body_type(), BodyType::Ip);
}

#[test]
fn response_mirrors_request_binding() {
    let mut responder = CmpResponder::new(mock_server());

    let mut ctx = client_ctx();
    let req = request::cert_req(&mut ctx, BodyType::Cr).expect("building CR");
    let rsp = responder.process_request(&req).expect("CR refused");

    assert_eq!(rsp.header.transaction_id, req.header.transaction_id);
    assert_eq!(rsp.header.recip_nonce, req.header.sender_nonce);
    // The responder's sender is its own certificate subject.
    match &rsp.header.sender {
        x509_cert::ext::pkix::name::GeneralName::DirectoryName(name) => {
            assert_eq!(name, &common::server_cert().tbs_certificate.subject);
        }
        other => panic!("unexpected sender {other:?}"),
    }
}
