//! Receiving pipeline.
//!
//! The stage list is data: [`INBOUND_STAGES`] names every step, and the
//! decompression step appears twice with a different target. Each stage is
//! a no-op when the current body does not call for it, so a plain message
//! passes the security stages untouched.
//!
//! Failures never abort the run. The stage records a typed
//! [`ErrorEntry`], the state becomes FAILURE, and once the body is unusable
//! the remaining security stages skip. `CreateResponse` then turns the
//! collected errors into a negative MDN or an HTTP error status.

use std::fmt;

use http::StatusCode;

use super::outbound::{self, MdnSecurity};
use super::wire::{As2Response, InboundRequest, OutboundMessage};
use super::{Pipeline, ProcessingState};
use crate::crypto::certificate::certificate_signing_algorithm;
use crate::crypto::{compressed, enveloped, mic, signed, Mic, SigningAlgorithm, TrustResult};
use crate::message::{
    generate_message_id, header, ErrorEntry, ErrorKind, ErrorSignal, GenericMessageInfo, MdnInfo,
    MdnRequestOptions, MessageUnit, Receipt, UserMessage,
};
use crate::mime::{multipart, MimeEnvelope, MimePart};
use crate::pmode::{self, PMode};
use crate::services::As2Event;

// ============================================================================
// Stage descriptors
// ============================================================================

/// Which layer a decompression step inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressTarget {
    /// Outer envelope, after decryption
    Envelope,
    /// Signed content, after verification
    Content,
}

/// One step of the receiving pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundStage {
    /// Header metadata and MDN request
    ParseHeaders,
    /// P-Mode by party ids
    ResolvePMode,
    /// Enveloped data
    Decrypt,
    /// Compressed data
    Decompress(DecompressTarget),
    /// Detached signature
    VerifySignature,
    /// User message or MDN
    Classify,
    /// MDN to Receipt or Error signal
    ConvertMdn,
    /// MDN generation and HTTP response
    CreateResponse,
}

impl fmt::Display for InboundStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundStage::ParseHeaders => f.write_str("parse-headers"),
            InboundStage::ResolvePMode => f.write_str("resolve-pmode"),
            InboundStage::Decrypt => f.write_str("decrypt"),
            InboundStage::Decompress(DecompressTarget::Envelope) => f.write_str("decompress-envelope"),
            InboundStage::Decompress(DecompressTarget::Content) => f.write_str("decompress-content"),
            InboundStage::VerifySignature => f.write_str("verify-signature"),
            InboundStage::Classify => f.write_str("classify"),
            InboundStage::ConvertMdn => f.write_str("convert-mdn"),
            InboundStage::CreateResponse => f.write_str("create-response"),
        }
    }
}

/// Receiving stages in execution order.
pub const INBOUND_STAGES: [InboundStage; 9] = [
    InboundStage::ParseHeaders,
    InboundStage::ResolvePMode,
    InboundStage::Decrypt,
    InboundStage::Decompress(DecompressTarget::Envelope),
    InboundStage::VerifySignature,
    InboundStage::Decompress(DecompressTarget::Content),
    InboundStage::Classify,
    InboundStage::ConvertMdn,
    InboundStage::CreateResponse,
];

// ============================================================================
// Context and outcome
// ============================================================================

/// Mutable state of one receiving run.
#[derive(Debug)]
struct InboundContext {
    request: InboundRequest,
    info: GenericMessageInfo,
    /// Whether the sender supplied a Message-ID
    identified: bool,
    mdn_request: Option<MdnRequestOptions>,
    pmode: Option<PMode>,
    /// P-Mode of the request this message answers synchronously
    sync_request_pmode: Option<String>,
    /// `None` once the body is unusable
    envelope: Option<MimeEnvelope>,
    mdn: Option<MdnInfo>,
    received: Option<MessageUnit>,
    errors: Vec<ErrorEntry>,
    state: ProcessingState,
    outcome: Option<InboundOutcome>,
}

impl InboundContext {
    fn new(request: InboundRequest, sync_request_pmode: Option<String>) -> Self {
        Self {
            request,
            info: GenericMessageInfo::new(String::new()),
            identified: false,
            mdn_request: None,
            pmode: None,
            sync_request_pmode,
            envelope: None,
            mdn: None,
            received: None,
            errors: Vec::new(),
            state: ProcessingState::Received,
            outcome: None,
        }
    }

    fn message_id(&self) -> &str {
        &self.info.message_id
    }

    /// Message the recorded errors refer to, when the sender named it.
    fn ref_id(&self) -> Option<String> {
        self.identified.then(|| self.info.message_id.clone())
    }

    fn fail(&mut self, kind: ErrorKind, description: impl Into<String>) {
        let description = description.into();
        tracing::warn!(
            message_id = %self.info.message_id,
            code = kind.code(),
            error = %description,
            "inbound processing failed"
        );
        let entry = ErrorEntry::new(kind)
            .with_description(description)
            .with_ref_to(self.ref_id());
        self.errors.push(entry);
        self.state = ProcessingState::Failure;
    }

    /// Record a failure and give up on the body.
    fn fail_body(&mut self, kind: ErrorKind, description: impl Into<String>) {
        self.fail(kind, description);
        self.envelope = None;
    }
}

/// Result of a receiving run.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    /// Received unit: the user message or the signal built from an MDN
    pub received: Option<MessageUnit>,
    /// Signal generated in answer, if any
    pub reply: Option<MessageUnit>,
    /// Final state of the received unit
    pub state: ProcessingState,
    /// Errors recorded while processing
    pub errors: Vec<ErrorEntry>,
    /// HTTP response to return
    pub response: As2Response,
    /// Asynchronous MDN waiting for delivery
    pub pending_mdn: Option<OutboundMessage>,
}

impl InboundOutcome {
    /// Received user message, when the request carried one.
    pub fn user_message(&self) -> Option<&UserMessage> {
        match &self.received {
            Some(MessageUnit::User(m)) => Some(m),
            _ => None,
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

impl Pipeline {
    /// Process a received AS2 request.
    pub fn receive(&self, request: InboundRequest) -> InboundOutcome {
        self.run_inbound(InboundContext::new(request, None))
    }

    /// Process the synchronous MDN returned for a request sent under
    /// `pmode_id`.
    pub fn receive_sync_mdn(&self, response: InboundRequest, pmode_id: &str) -> InboundOutcome {
        self.run_inbound(InboundContext::new(response, Some(pmode_id.to_string())))
    }

    fn run_inbound(&self, mut ctx: InboundContext) -> InboundOutcome {
        for stage in INBOUND_STAGES {
            tracing::debug!(message_id = %ctx.info.message_id, %stage, "inbound stage");
            self.run_stage(stage, &mut ctx);
        }

        ctx.outcome.unwrap_or_else(|| InboundOutcome {
            received: ctx.received,
            reply: None,
            state: ctx.state,
            errors: ctx.errors,
            response: As2Response::error(StatusCode::INTERNAL_SERVER_ERROR, "no response produced"),
            pending_mdn: None,
        })
    }

    fn run_stage(&self, stage: InboundStage, ctx: &mut InboundContext) {
        match stage {
            InboundStage::ParseHeaders => self.parse_headers(ctx),
            InboundStage::ResolvePMode => self.resolve_pmode(ctx),
            InboundStage::Decrypt => self.decrypt(ctx),
            InboundStage::Decompress(_) => self.decompress(ctx),
            InboundStage::VerifySignature => self.verify_signature(ctx),
            InboundStage::Classify => self.classify(ctx),
            InboundStage::ConvertMdn => self.convert_mdn(ctx),
            InboundStage::CreateResponse => self.create_response(ctx),
        }
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    fn parse_headers(&self, ctx: &mut InboundContext) {
        let headers = &ctx.request.headers;
        ctx.identified = headers.contains(header::MESSAGE_ID);
        ctx.info = GenericMessageInfo::from_headers(headers);

        match MdnRequestOptions::from_headers(headers) {
            Ok(request) => ctx.mdn_request = request,
            Err(e) => {
                // An MDN was asked for; answer it unsigned.
                ctx.mdn_request = Some(MdnRequestOptions {
                    notification_to: headers.get(header::DISPOSITION_NOTIFICATION_TO).map(str::to_string),
                    reply_to: headers.get(header::RECEIPT_DELIVERY_OPTION).map(str::to_string),
                    ..MdnRequestOptions::default()
                });
                ctx.fail(ErrorKind::InvalidHeader, e.to_string());
            },
        }

        let entity = ctx.request.entity();
        if entity.headers().contains(crate::mime::part::CONTENT_TYPE) {
            ctx.envelope = Some(MimeEnvelope::new(entity));
        } else {
            ctx.fail(ErrorKind::InvalidHeader, "missing Content-Type");
        }
    }

    fn resolve_pmode(&self, ctx: &mut InboundContext) {
        let store = self.services.pmodes.as_ref();
        let from = ctx.info.from_party_id.as_deref();
        let to = ctx.info.to_party_id.as_deref();

        let found = pmode::find_for_message(store, from, to, false)
            .or_else(|| pmode::find_for_message(store, from, to, true))
            .or_else(|| ctx.sync_request_pmode.as_deref().and_then(|id| store.get(id)));
        if let Some(found) = found {
            tracing::debug!(message_id = %ctx.info.message_id, pmode = %found.id, "P-Mode matched by party ids");
        }
        ctx.pmode = found.cloned();
    }

    fn decrypt(&self, ctx: &mut InboundContext) {
        let Some(envelope) = &ctx.envelope else { return };
        let current = envelope.current();
        if !current.content_type().is_ok_and(|ct| ct.is_enveloped()) {
            return;
        }

        let security = ctx.pmode.as_ref().map(|p| &p.responder.security);
        let key_pair = security.and_then(|s| {
            let alias = s.key_pair_alias.as_deref()?;
            self.services.certificates.key_pair(alias, s.key_pair_password.as_deref())
        });
        let Some(key_pair) = key_pair else {
            let reason = "no key pair configured for decryption".to_string();
            self.services.events.raise(As2Event::DecryptionFailed {
                message_id: ctx.message_id().to_string(),
                reason: reason.clone(),
            });
            ctx.fail_body(ErrorKind::DecryptionConfiguration, reason);
            return;
        };

        let result = current
            .decoded_body()
            .and_then(|der| Ok(enveloped::decrypt(&der, &key_pair)?))
            .and_then(|(plain, algorithm)| Ok((MimePart::parse(&plain)?, algorithm)));
        match result {
            Ok((content, algorithm)) => {
                self.services.events.raise(As2Event::Decrypted {
                    message_id: ctx.message_id().to_string(),
                    algorithm,
                });
                if let Some(envelope) = &mut ctx.envelope {
                    envelope.decrypted(content, algorithm);
                }
            },
            Err(e) => {
                self.services.events.raise(As2Event::DecryptionFailed {
                    message_id: ctx.message_id().to_string(),
                    reason: e.to_string(),
                });
                ctx.fail_body(ErrorKind::DecryptionFailed, e.to_string());
            },
        }
    }

    fn decompress(&self, ctx: &mut InboundContext) {
        let Some(envelope) = &mut ctx.envelope else { return };
        let current = envelope.current();
        if !current.content_type().is_ok_and(|ct| ct.is_compressed()) {
            return;
        }

        let result = current
            .decoded_body()
            .and_then(|der| Ok(compressed::decompress(&der)?))
            .and_then(|plain| MimePart::parse(&plain));
        match result {
            Ok(content) => envelope.decompressed(content),
            Err(e) => ctx.fail_body(ErrorKind::DecompressionFailed, e.to_string()),
        }
    }

    fn verify_signature(&self, ctx: &mut InboundContext) {
        let Some(envelope) = &ctx.envelope else { return };
        let current = envelope.current();
        let content_type = match current.content_type() {
            Ok(ct) if ct.is_signed() => ct,
            _ => return,
        };
        let message_id = ctx.message_id().to_string();

        let Some(boundary) = content_type.boundary() else {
            ctx.fail_body(ErrorKind::AuthenticationFailed, "multipart/signed without boundary");
            return;
        };
        let parts: Vec<Vec<u8>> = match multipart::split(current.body(), boundary) {
            Ok(parts) => parts.into_iter().map(<[u8]>::to_vec).collect(),
            Err(e) => {
                ctx.fail_body(ErrorKind::AuthenticationFailed, e.to_string());
                return;
            },
        };
        let [content_raw, signature_raw, ..] = parts.as_slice() else {
            ctx.fail_body(ErrorKind::AuthenticationFailed, "multipart/signed without signature part");
            return;
        };

        let verified = MimePart::parse(signature_raw)
            .and_then(|sig| {
                if sig.content_type()?.is_signature() {
                    sig.decoded_body()
                } else {
                    Err(crate::error::As2Error::Mime("second part is not a signature".into()))
                }
            })
            .and_then(|der| Ok(signed::verify_detached(content_raw, &der, self.services.certificates.as_ref())?));
        let verified = match verified {
            Ok(v) => v,
            Err(e) => {
                self.services.events.raise(As2Event::SignatureVerificationFailed {
                    message_id,
                    reason: e.to_string(),
                });
                ctx.fail_body(ErrorKind::AuthenticationFailed, e.to_string());
                return;
            },
        };

        match self.services.certificates.validate_trust(std::slice::from_ref(&verified.signer)) {
            TrustResult::Ok => {},
            TrustResult::WithWarnings(warnings) => {
                tracing::warn!(message_id = %message_id, ?warnings, "signer trusted with warnings");
                self.services.events.raise(As2Event::SignatureTrustWarning {
                    message_id: message_id.clone(),
                    warnings,
                });
            },
            TrustResult::Nok(reason) => {
                self.services.events.raise(As2Event::SignatureVerificationFailed {
                    message_id,
                    reason: reason.clone(),
                });
                ctx.fail_body(ErrorKind::AuthenticationFailed, format!("signer not trusted: {reason}"));
                return;
            },
        }

        if let Some(micalg) = content_type.param("micalg") {
            let declared = crate::crypto::DigestAlgorithm::from_name(micalg);
            if declared != Some(verified.digest) {
                ctx.fail_body(
                    ErrorKind::IntegrityCheckFailed,
                    format!("micalg {micalg} does not match signature digest {}", verified.digest),
                );
                return;
            }
        }

        let content = match MimePart::parse(content_raw) {
            Ok(content) => content,
            Err(e) => {
                ctx.fail_body(ErrorKind::AuthenticationFailed, e.to_string());
                return;
            },
        };
        self.services.events.raise(As2Event::SignatureVerified {
            message_id,
            digest: verified.digest,
        });
        if let Some(envelope) = &mut ctx.envelope {
            envelope.verified(content, verified.digest);
        }
    }

    fn classify(&self, ctx: &mut InboundContext) {
        let main = ctx.envelope.as_ref().map(MimeEnvelope::main_part);
        let main = match main {
            Some(Ok(main)) => Some(main),
            Some(Err(e)) => {
                ctx.fail_body(ErrorKind::UnsupportedFormat, e.to_string());
                None
            },
            None => None,
        };

        match &main {
            Some(main) if main.content_type().is_ok_and(|ct| ct.is_mdn()) => {
                match MdnInfo::parse(main, ctx.info.clone()) {
                    Ok(mdn) => ctx.mdn = Some(mdn),
                    Err(e) => ctx.fail(ErrorKind::ProcessingError, e.to_string()),
                }
                return;
            },
            // An MDN whose security layer failed is not a user message.
            None if ctx.sync_request_pmode.is_some() || looks_like_mdn(&ctx.request.entity()) => return,
            _ => {},
        }

        if ctx.info.from_party_id.is_none() || ctx.info.to_party_id.is_none() {
            ctx.fail(ErrorKind::InvalidHeader, "AS2-From and AS2-To are required");
        }

        let is_user_pmode = ctx.pmode.as_ref().is_some_and(|p| {
            let store = self.services.pmodes.as_ref();
            pmode::find_for_message(store, ctx.info.from_party_id.as_deref(), ctx.info.to_party_id.as_deref(), false)
                .is_some_and(|found| found.id == p.id)
        });
        if !is_user_pmode {
            let description = format!(
                "no P-Mode for user message from {} to {}",
                ctx.info.from_party_id.as_deref().unwrap_or("<none>"),
                ctx.info.to_party_id.as_deref().unwrap_or("<none>"),
            );
            ctx.pmode = None;
            ctx.fail(ErrorKind::ProcessingModeMismatch, description);
        }

        let payload = main.unwrap_or_else(|| ctx.request.entity());
        ctx.received = Some(MessageUnit::User(UserMessage {
            info: ctx.info.clone(),
            pmode_id: ctx.pmode.as_ref().map(|p| p.id.clone()),
            payload,
            mdn_request: ctx.mdn_request.clone(),
        }));
    }

    fn convert_mdn(&self, ctx: &mut InboundContext) {
        let Some(mdn) = ctx.mdn.take() else { return };

        match pmode::resolve(
            self.services.pmodes.as_ref(),
            self.services.messages.as_ref(),
            &mdn.info,
            true,
            ctx.sync_request_pmode.as_deref(),
        ) {
            Ok(p) => ctx.pmode = Some(p),
            Err(e) => {
                ctx.pmode = None;
                ctx.fail(ErrorKind::ProcessingModeMismatch, e.to_string());
            },
        }

        let signal = mdn.into_signal(ctx.pmode.as_ref().map(|p| p.id.clone()), None);
        tracing::info!(
            message_id = %signal.message_id(),
            ref_to = ?signal.ref_to_message_id(),
            kind = signal.kind(),
            "received MDN"
        );
        if ctx.state != ProcessingState::Failure {
            self.settle_acknowledged(&signal);
        }
        ctx.received = Some(signal);
    }

    /// Move the referenced outgoing message to its final state.
    fn settle_acknowledged(&self, signal: &MessageUnit) {
        let messages = self.services.messages.as_ref();
        let Some(ref_to) = signal.ref_to_message_id() else {
            tracing::warn!(message_id = %signal.message_id(), "MDN without Original-Message-ID");
            return;
        };
        let Some(sent) = messages.find_outgoing(ref_to) else {
            tracing::warn!(message_id = %signal.message_id(), ref_to, "MDN for unknown message");
            return;
        };

        let state = match signal {
            MessageUnit::Receipt(receipt) => {
                let received = receipt.content.as_ref().and_then(|c| c.mic.as_ref());
                match (&sent.expected_mic, received) {
                    (Some(expected), Some(received)) if !expected.matches(received) => {
                        self.services.events.raise(As2Event::MicMismatch {
                            message_id: ref_to.to_string(),
                            expected: expected.to_string(),
                            received: received.to_string(),
                        });
                        ProcessingState::Failure
                    },
                    (Some(_), None) => {
                        tracing::warn!(ref_to, "receipt without Received-Content-MIC");
                        ProcessingState::Delivered
                    },
                    _ => ProcessingState::Delivered,
                }
            },
            MessageUnit::Error(_) => ProcessingState::Failure,
            MessageUnit::User(_) => return,
        };
        if let Err(e) = messages.set_processing_state(ref_to, state) {
            tracing::error!(ref_to, error = %e, "failed to update acknowledged message");
        }
    }

    fn create_response(&self, ctx: &mut InboundContext) {
        let Some(received) = ctx.received.take() else {
            // Neither classified nor converted: the request had no usable body.
            let status = if ctx.identified {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let response = As2Response::error(status, error_text(&ctx.errors));
            ctx.outcome = Some(InboundOutcome {
                received: None,
                reply: None,
                state: ProcessingState::Failure,
                errors: std::mem::take(&mut ctx.errors),
                response,
                pending_mdn: None,
            });
            return;
        };

        let final_state = if ctx.state == ProcessingState::Failure {
            ProcessingState::Failure
        } else if received.is_signal() {
            ProcessingState::Done
        } else {
            ProcessingState::Delivered
        };
        if let Err(e) = self.services.messages.store_incoming(&received, final_state) {
            tracing::error!(message_id = %received.message_id(), error = %e, "failed to store received message");
        }

        let mdn_request = match &received {
            MessageUnit::User(_) => ctx.mdn_request.clone(),
            _ => None,
        };
        let Some(request) = mdn_request else {
            let response = if ctx.errors.is_empty() {
                As2Response::ok()
            } else if ctx.identified {
                As2Response::error(StatusCode::BAD_REQUEST, error_text(&ctx.errors))
            } else {
                As2Response::error(StatusCode::INTERNAL_SERVER_ERROR, error_text(&ctx.errors))
            };
            ctx.outcome = Some(InboundOutcome {
                received: Some(received),
                reply: None,
                state: final_state,
                errors: std::mem::take(&mut ctx.errors),
                response,
                pending_mdn: None,
            });
            return;
        };

        let reply = self.build_reply(ctx, &request);
        let (response, pending_mdn) = self.deliver_reply(ctx, &reply, &request);
        ctx.outcome = Some(InboundOutcome {
            received: Some(received),
            reply: Some(reply),
            state: final_state,
            errors: std::mem::take(&mut ctx.errors),
            response,
            pending_mdn,
        });
    }

    // ------------------------------------------------------------------------
    // Reply
    // ------------------------------------------------------------------------

    /// Receipt or Error signal answering the received user message.
    fn build_reply(&self, ctx: &InboundContext, request: &MdnRequestOptions) -> MessageUnit {
        let mut info = GenericMessageInfo::new(generate_message_id(&self.local.message_id_domain))
            .with_subject("Message Disposition Notification");
        info.ref_to_message_id = ctx.ref_id();
        info.from_party_id.clone_from(&ctx.info.to_party_id);
        info.to_party_id.clone_from(&ctx.info.from_party_id);
        info.original_recipient.clone_from(&ctx.info.to_party_id);
        info.final_recipient.clone_from(&ctx.info.to_party_id);
        let pmode_id = ctx.pmode.as_ref().map(|p| p.id.clone());
        let mic = self.received_mic(ctx, request);

        if ctx.errors.is_empty() {
            let mut mdn = MdnInfo::processed(info.clone());
            mdn.mic = mic;
            mdn.reporting_ua = Some(self.local.reporting_ua.clone());
            return MessageUnit::Receipt(Receipt {
                info,
                pmode_id,
                content: Some(mdn.metadata(Some(request))),
            });
        }

        let errors = ctx.errors.clone();
        let signal = ErrorSignal {
            info: info.clone(),
            pmode_id: pmode_id.clone(),
            errors,
        };
        let mut mdn = MdnInfo::from_error(&signal, &self.local.reporting_ua);
        mdn.mic = mic;
        let mut errors = signal.errors;
        if let Some(first) = errors.first_mut() {
            first.detail = Some(mdn.metadata(Some(request)));
        }
        MessageUnit::Error(ErrorSignal { info, pmode_id, errors })
    }

    /// MIC over the received content, when the body survived processing.
    fn received_mic(&self, ctx: &InboundContext, request: &MdnRequestOptions) -> Option<Mic> {
        let envelope = ctx.envelope.as_ref()?;
        let main = envelope.main_part().ok()?;
        let configured = ctx.pmode.as_ref().and_then(|p| {
            p.initiator
                .security
                .signing
                .as_ref()
                .and_then(|s| s.algorithm.as_deref())
                .and_then(SigningAlgorithm::from_name)
                .or_else(|| {
                    let alias = p.initiator.security.certificate_alias.as_deref()?;
                    certificate_signing_algorithm(&self.services.certificates.certificate(alias)?)
                })
        });
        let (digest, style) = mic::select_algorithm(
            envelope.signature_digest(),
            &request.preferred_hashing_algorithms,
            configured,
            self.local.mic_style,
        )?;
        Some(Mic::compute(&main, envelope.mic_includes_headers(), digest, style))
    }

    /// Render the reply as an MDN and decide how it travels.
    fn deliver_reply(
        &self,
        ctx: &InboundContext,
        reply: &MessageUnit,
        request: &MdnRequestOptions,
    ) -> (As2Response, Option<OutboundMessage>) {
        let messages = self.services.messages.as_ref();
        let mdn = match reply {
            MessageUnit::Receipt(r) => MdnInfo::from_receipt(r, &self.local.reporting_ua),
            MessageUnit::Error(e) => MdnInfo::from_error(e, &self.local.reporting_ua),
            MessageUnit::User(_) => return (As2Response::ok(), None),
        };

        if !request.is_sync() && reply.ref_to_message_id().is_none() {
            tracing::warn!(
                message_id = %reply.message_id(),
                "asynchronous MDN impossible without the original Message-ID"
            );
            store_reply(messages, reply, ProcessingState::Done);
            return (As2Response::ok(), None);
        }

        let security = MdnSecurity::for_reply(ctx.pmode.as_ref(), request);
        let wire = match outbound::render_mdn(self, &mdn, &security) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::error!(message_id = %reply.message_id(), error = %e, "failed to render MDN");
                store_reply(messages, reply, ProcessingState::Failure);
                return (As2Response::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()), None);
            },
        };

        match &request.reply_to {
            None => {
                store_reply(messages, reply, ProcessingState::Done);
                (As2Response::with_mdn(wire), None)
            },
            Some(url) => {
                store_reply(messages, reply, ProcessingState::ReadyToPush);
                (As2Response::ok(), Some(wire.with_url(url.clone())))
            },
        }
    }
}

fn store_reply(messages: &dyn crate::services::MessageStore, reply: &MessageUnit, state: ProcessingState) {
    if let Err(e) = messages.store_outgoing(reply, state) {
        tracing::error!(message_id = %reply.message_id(), error = %e, "failed to store MDN");
    }
}

/// Whether `entity` is an MDN, looking through a signed wrapper.
fn looks_like_mdn(entity: &MimePart) -> bool {
    let Ok(content_type) = entity.content_type() else {
        return false;
    };
    if content_type.is_mdn() {
        return true;
    }
    content_type.is_signed()
        && multipart::parse_parts(entity)
            .ok()
            .and_then(|parts| parts.into_iter().next())
            .is_some_and(|first| first.content_type().is_ok_and(|ct| ct.is_mdn()))
}

fn error_text(errors: &[ErrorEntry]) -> String {
    errors
        .iter()
        .map(|e| match &e.description {
            Some(d) => format!("{}: {d}", e.code()),
            None => e.code().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_list_decompresses_twice() {
        let decompress: Vec<_> = INBOUND_STAGES
            .iter()
            .filter_map(|s| match s {
                InboundStage::Decompress(target) => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(decompress, vec![DecompressTarget::Envelope, DecompressTarget::Content]);
        assert_eq!(INBOUND_STAGES[0], InboundStage::ParseHeaders);
        assert_eq!(INBOUND_STAGES[8], InboundStage::CreateResponse);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(InboundStage::Decompress(DecompressTarget::Content).to_string(), "decompress-content");
        assert_eq!(InboundStage::VerifySignature.to_string(), "verify-signature");
    }

    #[test]
    fn test_error_text() {
        let errors = vec![
            ErrorEntry::new(ErrorKind::InvalidHeader).with_description("missing Content-Type"),
            ErrorEntry::new(ErrorKind::ProcessingError),
        ];
        assert_eq!(error_text(&errors), "AS2:0201: missing Content-Type\nAS2:0001");
    }
}
