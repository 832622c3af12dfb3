//! Sending pipeline.
//!
//! User messages are signed with the initiator's key, compressed when the
//! initiator asks for it, then encrypted for the responder. MDNs are signed
//! with the responder's key when the request asks for a signed receipt
//! and are never encrypted.
//!
//! | Failure                                   | State     |
//! |-------------------------------------------|-----------|
//! | encryption (certificate, algorithm, CMS)  | SUSPENDED |
//! | anything else                             | FAILURE   |

use http::StatusCode;
use x509_cert::Certificate;

use super::wire::{InboundRequest, OutboundMessage};
use super::{Pipeline, ProcessingState};
use crate::crypto::algorithm::KeyAlgorithm;
use crate::crypto::certificate::{certificate_key_algorithm, certificate_signing_algorithm};
use crate::crypto::{
    compressed, enveloped, mic, signed, CryptoError, DigestAlgorithm, EncryptionAlgorithm, KeyPair,
    Mic, MicAlgorithmStyle, SigningAlgorithm,
};
use crate::error::{As2Error, Result};
use crate::message::{header, MdnInfo, MdnRequestOptions, MessageUnit, SignatureRequest, UserMessage};
use crate::mime::{multipart, types, ContentType, Headers, MimePart};
use crate::pmode::{PMode, SecurityConfig, SigningConfig};
use crate::services::As2Event;

// ============================================================================
// Building blocks
// ============================================================================

/// Signature algorithm and `micalg` style for a signer.
///
/// An explicit configuration wins; otherwise the first supported digest
/// of the MDN request, then the certificate's own signature algorithm
/// when it fits the certificate's key. The key family always follows the
/// signer's public key.
/// The style is RFC5751 whenever the request spelled its choice that way.
pub(crate) fn signing_algorithm(
    config: &SigningConfig,
    request: Option<&MdnRequestOptions>,
    certificate: &Certificate,
    default_style: MicAlgorithmStyle,
) -> Result<(SigningAlgorithm, MicAlgorithmStyle)> {
    let requested = request.and_then(|r| {
        r.preferred_hashing_algorithms
            .iter()
            .find_map(|name| DigestAlgorithm::from_name(name).map(|d| (d, MicAlgorithmStyle::of(name))))
    });
    let style = match requested {
        Some((_, MicAlgorithmStyle::Rfc5751)) => MicAlgorithmStyle::Rfc5751,
        _ => config.mic_style.unwrap_or(default_style),
    };

    let key = certificate_key_algorithm(certificate).unwrap_or(KeyAlgorithm::Rsa);
    let algorithm = match (&config.algorithm, requested) {
        (Some(name), _) => SigningAlgorithm::from_name(name)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(name.clone()))?,
        (None, Some((digest, _))) => SigningAlgorithm { digest, key },
        (None, None) => certificate_signing_algorithm(certificate)
            .filter(|a| a.key == key)
            .unwrap_or(SigningAlgorithm {
                digest: DigestAlgorithm::Sha256,
                key,
            }),
    };
    Ok((algorithm, style))
}

/// Wrap `part` in `multipart/signed` with a detached CMS signature.
pub fn sign_part(
    part: &MimePart,
    key_pair: &KeyPair,
    algorithm: SigningAlgorithm,
    include_certificate: bool,
    style: MicAlgorithmStyle,
) -> Result<MimePart> {
    let der = signed::sign_detached(&part.to_bytes(), key_pair, algorithm, include_certificate)?;
    let signature = MimePart::base64(
        &ContentType::new(types::PKCS7_SIGNATURE).with_param("name", "smime.p7s"),
        &der,
    )
    .with_header("Content-Disposition", "attachment; filename=\"smime.p7s\"");

    let content_type = ContentType::new(types::MULTIPART_SIGNED)
        .with_param("protocol", types::PKCS7_SIGNATURE)
        .with_param("micalg", algorithm.digest.mic_name(style));
    Ok(multipart::build(content_type, &[part.clone(), signature]))
}

/// `application/pkcs7-mime` part carrying CMS bytes.
fn pkcs7_part(smime_type: &str, file_name: &str, der: Vec<u8>) -> MimePart {
    MimePart::binary(
        &ContentType::new(types::PKCS7_MIME)
            .with_param("smime-type", smime_type)
            .with_param("name", file_name),
        der,
    )
    .with_header("Content-Disposition", format!("attachment; filename=\"{file_name}\""))
}

/// Compress a part into compressed-data.
pub fn compress_part(part: &MimePart) -> Result<MimePart> {
    let der = compressed::compress(&part.to_bytes())?;
    Ok(pkcs7_part("compressed-data", "smime.p7z", der))
}

/// Encrypt a part for `recipient` into enveloped-data.
pub fn encrypt_part(
    part: &MimePart,
    recipient: &Certificate,
    algorithm: EncryptionAlgorithm,
    key_reference: enveloped::KeyReference,
) -> Result<MimePart> {
    let der = enveloped::encrypt(&part.to_bytes(), recipient, algorithm, key_reference)?;
    Ok(pkcs7_part("enveloped-data", "smime.p7m", der))
}

/// Signing inputs for an MDN answering `request`.
#[derive(Debug)]
pub(crate) struct MdnSecurity<'a> {
    pmode: Option<&'a PMode>,
    request: &'a MdnRequestOptions,
}

impl<'a> MdnSecurity<'a> {
    /// The receiver signs with the responder's key.
    pub(crate) fn for_reply(pmode: Option<&'a PMode>, request: &'a MdnRequestOptions) -> Self {
        Self { pmode, request }
    }
}

/// Render an MDN as a wire message, signed when requested and possible.
///
/// A required signature that cannot be produced is an error; an optional
/// one degrades to an unsigned MDN.
pub(crate) fn render_mdn(
    pipeline: &Pipeline,
    mdn: &MdnInfo,
    security: &MdnSecurity<'_>,
) -> Result<OutboundMessage> {
    let mut entity = mdn.to_mime();
    let message_id = mdn.info.message_id.as_str();

    if security.request.signature_request.is_signed() {
        let party = security.pmode.map(|p| &p.responder.security);
        match party.and_then(|s| pipeline.key_pair(s)) {
            Some(key_pair) => {
                let config = party
                    .and_then(|s| s.signing.clone())
                    .unwrap_or_default();
                let signed = signing_algorithm(
                    &config,
                    Some(security.request),
                    &key_pair.certificate,
                    pipeline.local.mic_style,
                )
                .and_then(|(algorithm, style)| {
                    let part = sign_part(&entity, &key_pair, algorithm, config.include_certificate, style)?;
                    Ok((part, algorithm))
                });
                match signed {
                    Ok((part, algorithm)) => {
                        pipeline.services.events.raise(As2Event::Signed {
                            message_id: message_id.to_string(),
                            algorithm: algorithm.name(),
                        });
                        entity = part;
                    },
                    Err(e) => {
                        pipeline.services.events.raise(As2Event::SigningFailed {
                            message_id: message_id.to_string(),
                            reason: e.to_string(),
                        });
                        return Err(e);
                    },
                }
            },
            None if security.request.signature_request == SignatureRequest::Required => {
                return Err(As2Error::Config("signed MDN required but no key pair is configured".into()));
            },
            None => {
                tracing::warn!(message_id, "signed MDN requested but no key pair is configured; sending unsigned");
            },
        }
    }

    let mut headers = Headers::new();
    mdn.info.write_headers(&mut headers);
    headers.set(header::AS2_VERSION, pipeline.local.as2_version.as_str());
    headers.set(header::MIME_VERSION, "1.0");
    Ok(OutboundMessage::from_entity(message_id, &entity, headers))
}

// ============================================================================
// User messages
// ============================================================================

/// Failure while securing, with the state it leaves the message in.
struct Abort {
    state: ProcessingState,
    error: As2Error,
}

impl Abort {
    fn fail(error: impl Into<As2Error>) -> Self {
        Self {
            state: ProcessingState::Failure,
            error: error.into(),
        }
    }

    fn suspend(error: impl Into<As2Error>) -> Self {
        Self {
            state: ProcessingState::Suspended,
            error: error.into(),
        }
    }
}

/// What the transport made of a send attempt.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The peer answered
    Response {
        /// HTTP status
        status: StatusCode,
        /// Response headers and body
        response: InboundRequest,
    },
    /// No answer (connection, TLS, timeout)
    Failed(String),
}

impl Pipeline {
    pub(crate) fn key_pair(&self, security: &SecurityConfig) -> Option<KeyPair> {
        let alias = security.key_pair_alias.as_deref()?;
        self.services
            .certificates
            .key_pair(alias, security.key_pair_password.as_deref())
    }

    /// Secure a user message for sending and record it as outgoing.
    ///
    /// The message is stored READY_TO_SEND, then SENDING once the wire
    /// form exists. A failure leaves it FAILURE, or SUSPENDED when
    /// encryption could not be performed.
    pub fn prepare_send(&self, message: &UserMessage) -> Result<OutboundMessage> {
        let messages = self.services.messages.as_ref();
        let pmode = message
            .pmode_id
            .as_deref()
            .and_then(|id| self.services.pmodes.get(id))
            .cloned();

        let mut message = message.clone();
        if let Some(pmode) = &pmode {
            if message.mdn_request.is_none() {
                message.mdn_request = pmode.mdn_request();
            }
            if message.info.from_party_id.is_none() {
                message.info.from_party_id = pmode.initiator.party_ids.first().cloned();
            }
            if message.info.to_party_id.is_none() {
                message.info.to_party_id = pmode.responder.party_ids.first().cloned();
            }
        }
        let message_id = message.info.message_id.clone();
        messages.store_outgoing(&MessageUnit::User(message.clone()), ProcessingState::ReadyToSend)?;

        let result = match &pmode {
            Some(pmode) => self.secure_user_message(&message, pmode),
            None => Err(Abort::fail(As2Error::Config(format!(
                "unknown P-Mode {}",
                message.pmode_id.as_deref().unwrap_or("<none>")
            )))),
        };
        match result {
            Ok(wire) => {
                messages.set_processing_state(&message_id, ProcessingState::Sending)?;
                tracing::info!(message_id = %message_id, url = ?wire.url, "user message ready to send");
                Ok(wire)
            },
            Err(abort) => {
                tracing::error!(message_id = %message_id, state = %abort.state, error = %abort.error, "cannot send");
                messages.set_processing_state(&message_id, abort.state)?;
                Err(abort.error)
            },
        }
    }

    fn secure_user_message(
        &self,
        message: &UserMessage,
        pmode: &PMode,
    ) -> std::result::Result<OutboundMessage, Abort> {
        let events = self.services.events.as_ref();
        let message_id = message.info.message_id.as_str();
        let initiator = &pmode.initiator.security;
        let url = pmode
            .address
            .clone()
            .ok_or_else(|| Abort::fail(As2Error::Config(format!("P-Mode {} has no address", pmode.id))))?;

        let mut entity = message.payload.clone();
        let mut signature_digest = None;
        if let Some(signing) = &initiator.signing {
            let key_pair = self
                .key_pair(initiator)
                .ok_or_else(|| Abort::fail(As2Error::Config("no key pair configured for signing".into())))?;
            let signed = signing_algorithm(signing, None, &key_pair.certificate, self.local.mic_style)
                .and_then(|(algorithm, style)| {
                    Ok((sign_part(&entity, &key_pair, algorithm, signing.include_certificate, style)?, algorithm))
                });
            match signed {
                Ok((part, algorithm)) => {
                    events.raise(As2Event::Signed {
                        message_id: message_id.to_string(),
                        algorithm: algorithm.name(),
                    });
                    signature_digest = Some(algorithm.digest);
                    entity = part;
                },
                Err(e) => {
                    events.raise(As2Event::SigningFailed {
                        message_id: message_id.to_string(),
                        reason: e.to_string(),
                    });
                    return Err(Abort::fail(e));
                },
            }
        }

        if initiator.compress {
            entity = compress_part(&entity).map_err(Abort::fail)?;
        }

        let responder = &pmode.responder.security;
        let encrypted = match &responder.encryption {
            Some(encryption) => {
                let result = self.encrypt_for(responder, encryption, &entity);
                match result {
                    Ok((part, algorithm)) => {
                        events.raise(As2Event::Encrypted {
                            message_id: message_id.to_string(),
                            algorithm,
                        });
                        entity = part;
                        true
                    },
                    Err(e) => {
                        events.raise(As2Event::EncryptionFailed {
                            message_id: message_id.to_string(),
                            reason: e.to_string(),
                        });
                        return Err(Abort::suspend(e));
                    },
                }
            },
            None => false,
        };

        if let Some(request) = &message.mdn_request {
            let selected = mic::select_algorithm(
                signature_digest,
                &request.preferred_hashing_algorithms,
                None,
                self.local.mic_style,
            );
            if let Some((digest, style)) = selected {
                let expected = Mic::compute(&message.payload, signature_digest.is_some() || encrypted, digest, style);
                tracing::debug!(message_id, mic = %expected, "expected MIC");
                self.services
                    .messages
                    .set_expected_mic(message_id, expected)
                    .map_err(Abort::fail)?;
            }
        }

        let mut headers = Headers::new();
        message.info.write_headers(&mut headers);
        headers.set(header::AS2_VERSION, self.local.as2_version.as_str());
        headers.set(header::MIME_VERSION, "1.0");
        if let Some(request) = &message.mdn_request {
            request.write_headers(&mut headers);
        }
        Ok(OutboundMessage::from_entity(message_id, &entity, headers).with_url(url))
    }

    fn encrypt_for(
        &self,
        responder: &SecurityConfig,
        encryption: &crate::pmode::EncryptionConfig,
        entity: &MimePart,
    ) -> Result<(MimePart, EncryptionAlgorithm)> {
        let alias = responder
            .certificate_alias
            .as_deref()
            .ok_or_else(|| As2Error::Config("no partner certificate configured for encryption".into()))?;
        let certificate = self
            .services
            .certificates
            .certificate(alias)
            .ok_or_else(|| CryptoError::CertificateNotFound(alias.to_string()))?;
        let algorithm = match &encryption.algorithm {
            Some(name) => EncryptionAlgorithm::from_name(name)
                .ok_or_else(|| CryptoError::UnsupportedAlgorithm(name.clone()))?,
            None => EncryptionAlgorithm::default(),
        };
        let part = encrypt_part(entity, &certificate, algorithm, encryption.key_reference)?;
        Ok((part, algorithm))
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Record what happened to a sent message and return its new state.
    ///
    /// User messages: no receipt requested gives DONE, an asynchronous
    /// receipt AWAITING_RECEIPT, and a synchronous one is processed from
    /// the response body. Pushed MDNs end DONE. Any transport failure or
    /// non-success status gives FAILURE.
    pub fn complete_send(&self, message_id: &str, outcome: SendOutcome) -> Result<ProcessingState> {
        let messages = self.services.messages.as_ref();
        let stored = messages
            .find_outgoing(message_id)
            .ok_or_else(|| As2Error::Validation(format!("unknown outgoing message {message_id}")))?;

        let state = match outcome {
            SendOutcome::Failed(reason) => {
                tracing::warn!(message_id, error = %reason, "send failed");
                ProcessingState::Failure
            },
            SendOutcome::Response { status, .. } if !status.is_success() => {
                tracing::warn!(message_id, %status, "peer rejected message");
                ProcessingState::Failure
            },
            SendOutcome::Response { response, .. } => match &stored.unit {
                MessageUnit::User(user) => match &user.mdn_request {
                    None => ProcessingState::Done,
                    Some(request) if !request.is_sync() => ProcessingState::AwaitingReceipt,
                    Some(_) => return self.complete_sync_receipt(message_id, user, response),
                },
                MessageUnit::Receipt(_) | MessageUnit::Error(_) => ProcessingState::Done,
            },
        };
        messages.set_processing_state(message_id, state)?;
        Ok(state)
    }

    fn complete_sync_receipt(
        &self,
        message_id: &str,
        user: &UserMessage,
        response: InboundRequest,
    ) -> Result<ProcessingState> {
        let messages = self.services.messages.as_ref();
        if response.body.is_empty() {
            tracing::warn!(message_id, "synchronous MDN expected but response is empty");
            messages.set_processing_state(message_id, ProcessingState::Failure)?;
            return Ok(ProcessingState::Failure);
        }

        let Some(pmode_id) = user.pmode_id.as_deref() else {
            messages.set_processing_state(message_id, ProcessingState::Failure)?;
            return Err(As2Error::ProcessingModeMismatch(format!(
                "synchronous MDN for {message_id} but the message has no P-Mode"
            )));
        };
        let outcome = self.receive_sync_mdn(response, pmode_id);
        let acknowledges = outcome
            .received
            .as_ref()
            .is_some_and(|unit| unit.ref_to_message_id() == Some(message_id));

        let state = messages
            .find_outgoing(message_id)
            .map_or(ProcessingState::Failure, |m| m.state);
        if !acknowledges || state == ProcessingState::Sending {
            tracing::warn!(message_id, errors = outcome.errors.len(), "synchronous MDN not usable");
            messages.set_processing_state(message_id, ProcessingState::Failure)?;
            return Ok(ProcessingState::Failure);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::certificate::certificate_from_pem;

    fn certificate() -> Certificate {
        certificate_from_pem(include_str!("../../tests/fixtures/sender.crt")).unwrap()
    }

    #[test]
    fn test_explicit_signing_algorithm_wins() {
        let config = SigningConfig {
            algorithm: Some("SHA384withRSA".into()),
            ..SigningConfig::default()
        };
        let request = MdnRequestOptions::sync("a").signed(false, vec!["sha-256".into()]);
        let (algorithm, style) =
            signing_algorithm(&config, Some(&request), &certificate(), MicAlgorithmStyle::Rfc3851).unwrap();
        assert_eq!(algorithm, SigningAlgorithm::rsa(DigestAlgorithm::Sha384));
        assert_eq!(style, MicAlgorithmStyle::Rfc5751);
    }

    #[test]
    fn test_request_preference_then_certificate() {
        let config = SigningConfig::default();
        let request = MdnRequestOptions::sync("a").signed(false, vec!["md2".into(), "sha1".into()]);
        let (algorithm, style) =
            signing_algorithm(&config, Some(&request), &certificate(), MicAlgorithmStyle::Rfc5751).unwrap();
        assert_eq!(algorithm.digest, DigestAlgorithm::Sha1);
        assert_eq!(algorithm.key, KeyAlgorithm::Rsa);
        assert_eq!(style, MicAlgorithmStyle::Rfc5751);

        let (algorithm, _) =
            signing_algorithm(&config, None, &certificate(), MicAlgorithmStyle::Rfc3851).unwrap();
        assert_eq!(algorithm, SigningAlgorithm::rsa(DigestAlgorithm::Sha256));
    }

    #[test]
    fn test_ec_certificate_selects_ecdsa() {
        let ec = certificate_from_pem(include_str!("../../tests/fixtures/ec_sender.crt")).unwrap();
        let config = SigningConfig::default();
        let request = MdnRequestOptions::sync("a").signed(false, vec!["sha-384".into()]);
        let (algorithm, _) =
            signing_algorithm(&config, Some(&request), &ec, MicAlgorithmStyle::Rfc3851).unwrap();
        assert_eq!(algorithm.key, KeyAlgorithm::Ecdsa);
        assert_eq!(algorithm.digest, DigestAlgorithm::Sha384);

        let (algorithm, _) = signing_algorithm(&config, None, &ec, MicAlgorithmStyle::Rfc3851).unwrap();
        assert_eq!(algorithm.name(), "SHA256withECDSA");
    }

    #[test]
    fn test_unknown_signing_algorithm_is_configuration_error() {
        let config = SigningConfig {
            algorithm: Some("SHA3withFOO".into()),
            ..SigningConfig::default()
        };
        let err = signing_algorithm(&config, None, &certificate(), MicAlgorithmStyle::Rfc3851).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_compress_part_headers() {
        let part = MimePart::new(&ContentType::new("text/plain"), b"hello".to_vec());
        let compressed = compress_part(&part).unwrap();
        let content_type = compressed.content_type().unwrap();
        assert!(content_type.is_compressed());
        assert_eq!(compressed.transfer_encoding().as_deref(), Some("binary"));
        assert_eq!(compressed::decompress(compressed.body()).unwrap(), part.to_bytes());
    }
}
