//! End-to-end pipeline tests.
//!
//! These tests drive the receiving and sending pipelines with in-memory
//! services: plain messages with and without receipt requests, enveloped
//! data that cannot be decrypted, signatures that fail or pass with
//! warnings, compressed layers inside and outside the signature, negative
//! MDNs, and a full signed, compressed and encrypted exchange between two
//! stations with synchronous and asynchronous MDNs.

use std::sync::Arc;

use as2::config::LocalConfig;
use as2::crypto::certificate::certificate_from_pem;
use as2::crypto::{
    DigestAlgorithm, InMemoryCertificateManager, KeyPair, MicAlgorithmStyle, PrivateKey, SigningAlgorithm,
};
use as2::message::{
    generate_message_id, DispositionType, ErrorKind, GenericMessageInfo, MdnInfo, MdnRequestOptions,
    MessageUnit, Severity, UserMessage,
};
use as2::mime::{ContentType, Headers, MimePart};
use as2::pipeline::outbound::{compress_part, sign_part};
use as2::pipeline::{As2Response, InboundRequest, OutboundMessage, Pipeline, ProcessingState, SendOutcome};
use as2::As2Error;
use as2::pmode::{EncryptionConfig, PMode, PModeSet, ReplyPattern, SigningConfig};
use as2::services::{As2Event, CollectingEventSink, Services};
use http::StatusCode;

const SENDER_CRT: &str = include_str!("fixtures/sender.crt");
const SENDER_KEY: &str = include_str!("fixtures/sender.key");
const RECEIVER_CRT: &str = include_str!("fixtures/receiver.crt");
const RECEIVER_KEY: &str = include_str!("fixtures/receiver.key");
const CONTENT: &[u8] = include_bytes!("fixtures/content.txt");

// ============================================================================
// Helpers
// ============================================================================

/// P-Mode for SenderX -> ReceiverY with no security.
fn plain_pmode(receipt: ReplyPattern) -> PMode {
    let mut pmode = PMode::new("sender-to-receiver");
    pmode.initiator.party_ids = vec!["SenderX".into()];
    pmode.responder.party_ids = vec!["ReceiverY".into()];
    pmode.reporting.receipt = receipt;
    pmode.address = Some("http://receiver.example/as2".into());
    pmode
}

/// P-Mode signing, compressing and encrypting, with a signed receipt.
fn secure_pmode(receipt: ReplyPattern) -> PMode {
    let mut pmode = plain_pmode(receipt);
    pmode.initiator.security.key_pair_alias = Some("sender".into());
    pmode.initiator.security.certificate_alias = Some("sender".into());
    pmode.initiator.security.signing = Some(SigningConfig::default());
    pmode.initiator.security.compress = true;
    pmode.responder.security.key_pair_alias = Some("receiver".into());
    pmode.responder.security.certificate_alias = Some("receiver".into());
    pmode.responder.security.encryption = Some(EncryptionConfig::default());
    pmode.reporting.signed_receipt = true;
    pmode.reporting.mic_algorithms = vec!["sha-256".into()];
    pmode
}

/// P-Mode signing only, receipts unsigned.
fn signed_pmode(receipt: ReplyPattern) -> PMode {
    let mut pmode = plain_pmode(receipt);
    pmode.initiator.security.key_pair_alias = Some("sender".into());
    pmode.initiator.security.certificate_alias = Some("sender".into());
    pmode.initiator.security.signing = Some(SigningConfig::default());
    pmode
}

struct Station {
    pipeline: Pipeline,
    events: Arc<CollectingEventSink>,
}

fn station(certificates: InMemoryCertificateManager, pmode: PMode) -> Station {
    let events = Arc::new(CollectingEventSink::new());
    let services = Services::new(Arc::new(certificates), Arc::new(PModeSet::new(vec![pmode]).unwrap()))
        .with_events(events.clone());
    Station {
        pipeline: Pipeline::new(services, LocalConfig::default()),
        events,
    }
}

fn sender_station(pmode: PMode) -> Station {
    let mut certificates = InMemoryCertificateManager::new();
    certificates
        .add_key_pair_pem("sender", SENDER_CRT, SENDER_KEY, None)
        .unwrap();
    certificates.add_certificate_pem("receiver", RECEIVER_CRT).unwrap();
    station(certificates, pmode)
}

fn receiver_station(pmode: PMode) -> Station {
    let mut certificates = InMemoryCertificateManager::new();
    certificates
        .add_key_pair_pem("receiver", RECEIVER_CRT, RECEIVER_KEY, None)
        .unwrap();
    certificates.add_certificate_pem("sender", SENDER_CRT).unwrap();
    station(certificates, pmode)
}

/// Receiver whose store holds only its own key pair.
fn receiver_without_sender_certificate(pmode: PMode, trust_unknown: bool) -> Station {
    let mut certificates = InMemoryCertificateManager::new().with_trust_unknown(trust_unknown);
    certificates
        .add_key_pair_pem("receiver", RECEIVER_CRT, RECEIVER_KEY, None)
        .unwrap();
    station(certificates, pmode)
}

fn sender_key_pair() -> KeyPair {
    KeyPair {
        certificate: certificate_from_pem(SENDER_CRT).unwrap(),
        private_key: PrivateKey::from_pkcs8_pem(SENDER_KEY).unwrap(),
    }
}

/// AS2 headers for a hand-built request from SenderX to ReceiverY.
fn as2_headers(message_id: &str) -> Headers {
    Headers::new()
        .with("Message-ID", format!("<{message_id}>"))
        .with("AS2-From", "SenderX")
        .with("AS2-To", "ReceiverY")
        .with("AS2-Version", "1.2")
        .with("Disposition-Notification-To", "mdn@senderx.example")
}

/// Signed user message prepared by a sending station.
fn signed_outbound() -> OutboundMessage {
    let sender = sender_station(signed_pmode(ReplyPattern::Sync));
    let outbound = sender.pipeline.prepare_send(&user_message("sender-to-receiver")).unwrap();
    assert!(outbound.headers.get("Content-Type").unwrap().contains("multipart/signed"));
    outbound
}

fn plain_request(extra: &[(&str, &str)]) -> InboundRequest {
    let mut headers = Headers::new()
        .with("Message-ID", "<plain-1@senderx>")
        .with("AS2-From", "SenderX")
        .with("AS2-To", "ReceiverY")
        .with("AS2-Version", "1.2")
        .with("Content-Type", "text/plain");
    for (name, value) in extra {
        headers.add(*name, *value);
    }
    InboundRequest::new(headers, b"Hello AS2\r\n".to_vec())
}

fn user_message(pmode_id: &str) -> UserMessage {
    UserMessage {
        info: GenericMessageInfo::new(generate_message_id("senderx.example")).with_subject("invoice"),
        pmode_id: Some(pmode_id.to_string()),
        payload: MimePart::binary(&ContentType::new("application/edi-x12"), CONTENT.to_vec()),
        mdn_request: None,
    }
}

fn to_request(message: &OutboundMessage) -> InboundRequest {
    InboundRequest::new(message.headers.clone(), message.body.clone())
}

fn to_send_outcome(response: As2Response) -> SendOutcome {
    SendOutcome::Response {
        status: response.status,
        response: InboundRequest::new(response.headers, response.body),
    }
}

fn parse_mdn(response: &As2Response) -> MdnInfo {
    let request = InboundRequest::new(response.headers.clone(), response.body.clone());
    MdnInfo::parse(&request.entity(), GenericMessageInfo::from_headers(&response.headers)).unwrap()
}

// ============================================================================
// Receiving
// ============================================================================

#[test]
fn test_plain_message_without_receipt_request() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::None));
    let outcome = receiver.pipeline.receive(plain_request(&[]));

    let user = outcome.user_message().expect("user message");
    assert_eq!(user.info.from_party_id.as_deref(), Some("SenderX"));
    assert_eq!(user.info.to_party_id.as_deref(), Some("ReceiverY"));
    assert_eq!(user.info.message_id, "plain-1@senderx");
    assert_eq!(user.pmode_id.as_deref(), Some("sender-to-receiver"));
    assert_eq!(user.payload.body(), b"Hello AS2\r\n");

    assert!(outcome.reply.is_none());
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.state, ProcessingState::Delivered);
    assert_eq!(outcome.response.status, StatusCode::OK);
    assert!(!outcome.response.has_mdn());
    assert!(outcome.pending_mdn.is_none());

    let stored = receiver.pipeline.services().messages.find_incoming("plain-1@senderx").unwrap();
    assert_eq!(stored.state, ProcessingState::Delivered);
}

#[test]
fn test_sync_receipt_returned_in_response_body() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::Sync));
    let outcome = receiver
        .pipeline
        .receive(plain_request(&[("Disposition-Notification-To", "mdn@example.com")]));

    assert!(outcome.errors.is_empty());
    assert!(matches!(outcome.reply, Some(MessageUnit::Receipt(_))));
    assert!(outcome.pending_mdn.is_none());
    assert!(outcome.response.has_mdn());

    let mdn = parse_mdn(&outcome.response);
    assert_eq!(mdn.disposition_type, DispositionType::Processed);
    assert!(mdn.modifier.is_none());
    assert_eq!(mdn.info.ref_to_message_id.as_deref(), Some("plain-1@senderx"));
    // No MIC algorithm was requested, signed or configured.
    assert!(mdn.mic.is_none());

    let reply_id = outcome.reply.as_ref().unwrap().message_id().to_string();
    let stored = receiver.pipeline.services().messages.find_outgoing(&reply_id).unwrap();
    assert_eq!(stored.state, ProcessingState::Done);
}

#[test]
fn test_enveloped_data_without_key_pair() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::Sync));
    let request = InboundRequest::new(
        Headers::new()
            .with("Message-ID", "<enc-1@senderx>")
            .with("AS2-From", "SenderX")
            .with("AS2-To", "ReceiverY")
            .with("Disposition-Notification-To", "mdn@example.com")
            .with("Content-Type", "application/pkcs7-mime; smime-type=enveloped-data; name=smime.p7m")
            .with("Content-Transfer-Encoding", "binary"),
        vec![0x30, 0x80, 0x06, 0x09],
    );
    let outcome = receiver.pipeline.receive(request);

    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::DecryptionConfiguration);
    assert_eq!(outcome.errors[0].ref_to_message_id.as_deref(), Some("enc-1@senderx"));
    assert!(matches!(outcome.reply, Some(MessageUnit::Error(_))));

    let mdn = parse_mdn(&outcome.response);
    let modifier = mdn.modifier.expect("modifier");
    assert_eq!(modifier.severity, Severity::Error);
    assert_eq!(modifier.text, "decryption-failed");
    assert!(mdn.mic.is_none());

    assert!(receiver
        .events
        .events()
        .iter()
        .any(|e| matches!(e, As2Event::DecryptionFailed { message_id, .. } if message_id == "enc-1@senderx")));
    let stored = receiver.pipeline.services().messages.find_incoming("enc-1@senderx").unwrap();
    assert_eq!(stored.state, ProcessingState::Failure);
}

#[test]
fn test_enveloped_data_without_receipt_request_is_rejected() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::None));
    let request = InboundRequest::new(
        Headers::new()
            .with("Message-ID", "<enc-2@senderx>")
            .with("AS2-From", "SenderX")
            .with("AS2-To", "ReceiverY")
            .with("Content-Type", "application/pkcs7-mime; smime-type=enveloped-data"),
        vec![0x30, 0x00],
    );
    let outcome = receiver.pipeline.receive(request);

    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&outcome.response.body).contains("AS2:0101"));
}

#[test]
fn test_unknown_parties_are_a_pmode_mismatch() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::None));
    let request = InboundRequest::new(
        Headers::new()
            .with("Message-ID", "<who-1@elsewhere>")
            .with("AS2-From", "Stranger")
            .with("AS2-To", "ReceiverY")
            .with("Content-Type", "text/plain"),
        b"hi".to_vec(),
    );
    let outcome = receiver.pipeline.receive(request);

    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::ProcessingModeMismatch);
    assert!(outcome.user_message().unwrap().pmode_id.is_none());
}

#[test]
fn test_missing_content_type() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::None));
    let request = InboundRequest::new(
        Headers::new()
            .with("Message-ID", "<noct@senderx>")
            .with("AS2-From", "SenderX")
            .with("AS2-To", "ReceiverY"),
        b"hi".to_vec(),
    );
    let outcome = receiver.pipeline.receive(request);

    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::InvalidHeader);
    assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Sending and round trips
// ============================================================================

#[test]
fn test_secured_round_trip_with_sync_signed_receipt() {
    let sender = sender_station(secure_pmode(ReplyPattern::Sync));
    let receiver = receiver_station(secure_pmode(ReplyPattern::Sync));

    let message = user_message("sender-to-receiver");
    let message_id = message.info.message_id.clone();
    let outbound = sender.pipeline.prepare_send(&message).unwrap();

    assert_eq!(outbound.url.as_deref(), Some("http://receiver.example/as2"));
    assert!(outbound.headers.get("Content-Type").unwrap().contains("enveloped-data"));
    assert!(outbound.headers.contains("Disposition-Notification-Options"));
    let sent = sender.pipeline.services().messages.find_outgoing(&message_id).unwrap();
    assert_eq!(sent.state, ProcessingState::Sending);
    let expected_mic = sent.expected_mic.expect("expected MIC");

    // Receiver peels every layer and answers with a signed MDN.
    let inbound = receiver.pipeline.receive(to_request(&outbound));
    assert!(inbound.errors.is_empty(), "errors: {:?}", inbound.errors);
    assert_eq!(inbound.state, ProcessingState::Delivered);
    let user = inbound.user_message().unwrap();
    assert_eq!(user.payload.body(), CONTENT);
    assert!(inbound.response.has_mdn());
    assert!(inbound.response.headers.get("Content-Type").unwrap().contains("multipart/signed"));

    let events = receiver.events.events();
    assert!(events.iter().any(|e| matches!(e, As2Event::Decrypted { .. })));
    assert!(events.iter().any(|e| matches!(e, As2Event::SignatureVerified { .. })));
    assert!(events.iter().any(|e| matches!(e, As2Event::Signed { .. })));

    let receipt_mic = match &inbound.reply {
        Some(MessageUnit::Receipt(receipt)) => receipt.content.as_ref().and_then(|c| c.mic.clone()).unwrap(),
        other => panic!("expected receipt, got {other:?}"),
    };
    assert!(expected_mic.matches(&receipt_mic));

    // Sender processes the synchronous MDN.
    let state = sender
        .pipeline
        .complete_send(&message_id, to_send_outcome(inbound.response))
        .unwrap();
    assert_eq!(state, ProcessingState::Delivered);
    assert!(!sender
        .events
        .events()
        .iter()
        .any(|e| matches!(e, As2Event::MicMismatch { .. })));
}

#[test]
fn test_async_receipt_is_pushed_and_settles_message() {
    let mut pmode = secure_pmode(ReplyPattern::Callback);
    pmode.reporting.callback_url = Some("http://sender.example/mdn".into());
    let sender = sender_station(pmode.clone());
    let receiver = receiver_station(pmode);

    let message = user_message("sender-to-receiver");
    let message_id = message.info.message_id.clone();
    let outbound = sender.pipeline.prepare_send(&message).unwrap();
    assert_eq!(outbound.headers.get("Receipt-Delivery-Option"), Some("http://sender.example/mdn"));

    let inbound = receiver.pipeline.receive(to_request(&outbound));
    assert_eq!(inbound.response.status, StatusCode::OK);
    assert!(inbound.response.body.is_empty());
    let mdn = inbound.pending_mdn.expect("pending MDN");
    assert_eq!(mdn.url.as_deref(), Some("http://sender.example/mdn"));
    let queued = receiver.pipeline.services().messages.find_outgoing(&mdn.message_id).unwrap();
    assert_eq!(queued.state, ProcessingState::ReadyToPush);

    // HTTP 200 without MDN: the sender waits.
    let state = sender
        .pipeline
        .complete_send(&message_id, to_send_outcome(As2Response::ok()))
        .unwrap();
    assert_eq!(state, ProcessingState::AwaitingReceipt);

    // The MDN arrives in its own request.
    let received = sender.pipeline.receive(to_request(&mdn));
    assert!(matches!(received.received, Some(MessageUnit::Receipt(_))));
    assert_eq!(received.state, ProcessingState::Done);
    assert_eq!(received.response.status, StatusCode::OK);
    let settled = sender.pipeline.services().messages.find_outgoing(&message_id).unwrap();
    assert_eq!(settled.state, ProcessingState::Delivered);

    // The receiver records the push.
    let pushed = receiver
        .pipeline
        .complete_send(&mdn.message_id, to_send_outcome(As2Response::ok()))
        .unwrap();
    assert_eq!(pushed, ProcessingState::Done);
}

#[test]
fn test_unsupported_encryption_algorithm_suspends() {
    let mut pmode = secure_pmode(ReplyPattern::Sync);
    pmode.responder.security.encryption = Some(EncryptionConfig {
        algorithm: Some("ROT13".into()),
        ..EncryptionConfig::default()
    });
    let sender = sender_station(pmode);

    let message = user_message("sender-to-receiver");
    let err = sender.pipeline.prepare_send(&message).unwrap_err();
    assert!(err.is_configuration());

    let stored = sender
        .pipeline
        .services()
        .messages
        .find_outgoing(&message.info.message_id)
        .unwrap();
    assert_eq!(stored.state, ProcessingState::Suspended);
    assert!(sender
        .events
        .events()
        .iter()
        .any(|e| matches!(e, As2Event::EncryptionFailed { .. })));
}

#[test]
fn test_transport_failure_marks_message_failed() {
    let sender = sender_station(plain_pmode(ReplyPattern::Sync));
    let message = user_message("sender-to-receiver");
    let outbound = sender.pipeline.prepare_send(&message).unwrap();

    let state = sender
        .pipeline
        .complete_send(&outbound.message_id, SendOutcome::Failed("connection refused".into()))
        .unwrap();
    assert_eq!(state, ProcessingState::Failure);
}

#[test]
fn test_sync_receipt_missing_from_response() {
    let sender = sender_station(plain_pmode(ReplyPattern::Sync));
    let message = user_message("sender-to-receiver");
    let outbound = sender.pipeline.prepare_send(&message).unwrap();

    let state = sender
        .pipeline
        .complete_send(&outbound.message_id, to_send_outcome(As2Response::ok()))
        .unwrap();
    assert_eq!(state, ProcessingState::Failure);
}

#[test]
fn test_no_receipt_requested_completes_on_success() {
    let sender = sender_station(plain_pmode(ReplyPattern::None));
    let message = user_message("sender-to-receiver");
    let outbound = sender.pipeline.prepare_send(&message).unwrap();
    assert!(!outbound.headers.contains("Disposition-Notification-To"));

    let state = sender
        .pipeline
        .complete_send(&outbound.message_id, to_send_outcome(As2Response::ok()))
        .unwrap();
    assert_eq!(state, ProcessingState::Done);
}

#[test]
fn test_unknown_pmode_fails_send() {
    let sender = sender_station(plain_pmode(ReplyPattern::None));
    let message = user_message("nope");
    let err = sender.pipeline.prepare_send(&message).unwrap_err();
    assert!(err.is_configuration());
    let stored = sender
        .pipeline
        .services()
        .messages
        .find_outgoing(&message.info.message_id)
        .unwrap();
    assert_eq!(stored.state, ProcessingState::Failure);
}

#[test]
fn test_sync_receipt_without_pmode_is_a_mismatch() {
    let sender = sender_station(plain_pmode(ReplyPattern::Sync));
    let mut message = user_message("sender-to-receiver");
    message.pmode_id = None;
    message.mdn_request = Some(MdnRequestOptions::sync("mdn@senderx.example"));
    let message_id = message.info.message_id.clone();
    let messages = &sender.pipeline.services().messages;
    messages
        .store_outgoing(&MessageUnit::User(message), ProcessingState::Sending)
        .unwrap();

    let response = InboundRequest::new(
        Headers::new().with("Content-Type", "message/disposition-notification"),
        b"Disposition: automatic-action/MDN-sent-automatically; processed\r\n".to_vec(),
    );
    let err = sender
        .pipeline
        .complete_send(&message_id, SendOutcome::Response {
            status: StatusCode::OK,
            response,
        })
        .unwrap_err();
    assert!(matches!(err, As2Error::ProcessingModeMismatch(_)));
    assert_eq!(messages.find_outgoing(&message_id).unwrap().state, ProcessingState::Failure);
}

// ============================================================================
// Signature and compression layers
// ============================================================================

#[test]
fn test_micalg_mismatch_fails_integrity_check() {
    let receiver = receiver_station(signed_pmode(ReplyPattern::Sync));
    let mut outbound = signed_outbound();
    let content_type = ContentType::parse(outbound.headers.get("Content-Type").unwrap())
        .unwrap()
        .with_param("micalg", "sha-512");
    outbound.headers.set("Content-Type", content_type.to_string());

    let outcome = receiver.pipeline.receive(to_request(&outbound));
    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::IntegrityCheckFailed);
    assert!(matches!(outcome.reply, Some(MessageUnit::Error(_))));

    let mdn = parse_mdn(&outcome.response);
    assert_eq!(mdn.modifier.expect("modifier").text, "integrity-check-failed");
}

#[test]
fn test_untrusted_signer_fails_authentication() {
    let receiver = receiver_without_sender_certificate(signed_pmode(ReplyPattern::Sync), false);
    let outbound = signed_outbound();

    let outcome = receiver.pipeline.receive(to_request(&outbound));
    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::AuthenticationFailed);
    assert!(outcome.errors[0].description.as_deref().unwrap().contains("not trusted"));

    let mdn = parse_mdn(&outcome.response);
    let modifier = mdn.modifier.expect("modifier");
    assert_eq!(modifier.severity, Severity::Error);
    assert_eq!(modifier.text, "authentication-failed");
    assert!(receiver
        .events
        .events()
        .iter()
        .any(|e| matches!(e, As2Event::SignatureVerificationFailed { .. })));
}

#[test]
fn test_tampered_signed_content_fails_authentication() {
    let receiver = receiver_station(signed_pmode(ReplyPattern::Sync));
    let mut outbound = signed_outbound();
    let at = outbound
        .body
        .windows(CONTENT.len())
        .position(|w| w == CONTENT)
        .expect("payload travels in the clear");
    outbound.body[at] = if outbound.body[at] == b'X' { b'Y' } else { b'X' };

    let outcome = receiver.pipeline.receive(to_request(&outbound));
    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::AuthenticationFailed);
    assert_eq!(parse_mdn(&outcome.response).modifier.unwrap().text, "authentication-failed");
    // The MIC cannot be vouched for once the body is rejected.
    assert!(parse_mdn(&outcome.response).mic.is_none());
}

#[test]
fn test_trust_warnings_raise_event_and_deliver() {
    let receiver = receiver_without_sender_certificate(signed_pmode(ReplyPattern::Sync), true);
    let outbound = signed_outbound();

    let outcome = receiver.pipeline.receive(to_request(&outbound));
    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.state, ProcessingState::Delivered);
    assert_eq!(outcome.user_message().unwrap().payload.body(), CONTENT);
    assert!(matches!(outcome.reply, Some(MessageUnit::Receipt(_))));

    let events = receiver.events.events();
    assert!(events.iter().any(|e| matches!(
        e,
        As2Event::SignatureTrustWarning { warnings, .. } if !warnings.is_empty()
    )));
    assert!(events.iter().any(|e| matches!(e, As2Event::SignatureVerified { .. })));
}

#[test]
fn test_compressed_content_inside_signature() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::None));
    let payload = MimePart::binary(&ContentType::new("application/edi-x12"), CONTENT.to_vec());
    let compressed = compress_part(&payload).unwrap();
    let signed = sign_part(
        &compressed,
        &sender_key_pair(),
        SigningAlgorithm::rsa(DigestAlgorithm::Sha256),
        true,
        MicAlgorithmStyle::Rfc3851,
    )
    .unwrap();
    let mut headers = as2_headers("zs-1@senderx");
    headers.remove("Disposition-Notification-To");
    let outbound = OutboundMessage::from_entity("zs-1@senderx", &signed, headers);

    let outcome = receiver.pipeline.receive(to_request(&outbound));
    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.state, ProcessingState::Delivered);
    let user = outcome.user_message().unwrap();
    assert_eq!(user.payload.body(), CONTENT);
    assert!(receiver
        .events
        .events()
        .iter()
        .any(|e| matches!(e, As2Event::SignatureVerified { digest: DigestAlgorithm::Sha256, .. })));
}

#[test]
fn test_corrupt_compressed_data_fails_decompression() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::Sync));
    let headers = as2_headers("z-1@senderx")
        .with("Content-Type", "application/pkcs7-mime; smime-type=compressed-data; name=smime.p7z")
        .with("Content-Transfer-Encoding", "binary");
    let outcome = receiver
        .pipeline
        .receive(InboundRequest::new(headers, vec![0x30, 0x03, 0x02, 0x01, 0x00]));

    assert_eq!(outcome.state, ProcessingState::Failure);
    assert_eq!(outcome.errors[0].kind, ErrorKind::DecompressionFailed);
    let mdn = parse_mdn(&outcome.response);
    assert_eq!(mdn.modifier.expect("modifier").text, "decompression-failed");
}

// ============================================================================
// Receipt delivery edge cases
// ============================================================================

#[test]
fn test_async_receipt_without_message_id_is_not_pushed() {
    let receiver = receiver_station(plain_pmode(ReplyPattern::Callback));
    let request = InboundRequest::new(
        Headers::new()
            .with("AS2-From", "SenderX")
            .with("AS2-To", "ReceiverY")
            .with("Disposition-Notification-To", "mdn@senderx.example")
            .with("Receipt-Delivery-Option", "http://sender.example/mdn")
            .with("Content-Type", "text/plain"),
        b"no id".to_vec(),
    );
    let outcome = receiver.pipeline.receive(request);

    assert_eq!(outcome.response.status, StatusCode::OK);
    assert!(!outcome.response.has_mdn());
    assert!(outcome.pending_mdn.is_none());
    let reply = outcome.reply.expect("reply");
    assert!(reply.ref_to_message_id().is_none());
    let stored = receiver
        .pipeline
        .services()
        .messages
        .find_outgoing(reply.message_id())
        .unwrap();
    assert_eq!(stored.state, ProcessingState::Done);
}

#[test]
fn test_negative_async_receipt_fails_sent_message() {
    let mut pmode = plain_pmode(ReplyPattern::Callback);
    pmode.reporting.callback_url = Some("http://sender.example/mdn".into());
    let sender = sender_station(pmode.clone());
    // The receiver knows no agreement with SenderX.
    pmode.initiator.party_ids = vec!["SomeoneElse".into()];
    let receiver = receiver_station(pmode);

    let message = user_message("sender-to-receiver");
    let message_id = message.info.message_id.clone();
    let outbound = sender.pipeline.prepare_send(&message).unwrap();
    let state = sender
        .pipeline
        .complete_send(&message_id, to_send_outcome(As2Response::ok()))
        .unwrap();
    assert_eq!(state, ProcessingState::AwaitingReceipt);

    let inbound = receiver.pipeline.receive(to_request(&outbound));
    assert_eq!(inbound.errors[0].kind, ErrorKind::ProcessingModeMismatch);
    let mdn = inbound.pending_mdn.expect("pending MDN");

    let received = sender.pipeline.receive(to_request(&mdn));
    let signal = match &received.received {
        Some(MessageUnit::Error(signal)) => signal,
        other => panic!("expected error signal, got {other:?}"),
    };
    assert_eq!(signal.info.ref_to_message_id.as_deref(), Some(message_id.as_str()));
    assert_eq!(signal.errors[0].severity, Severity::Error);
    assert_eq!(received.state, ProcessingState::Done);

    let settled = sender.pipeline.services().messages.find_outgoing(&message_id).unwrap();
    assert_eq!(settled.state, ProcessingState::Failure);
}
