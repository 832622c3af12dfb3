//! P-Mode selection for received messages.
//!
//! Party identifiers are mapped to P-Mode roles first: a user message goes
//! from initiator to responder, a signal travels the other way. Every AS2
//! P-Mode is then scored per role:
//!
//! | P-Mode ids for the role | id matches | id differs  |
//! |-------------------------|------------|-------------|
//! | none                    | 0          | 0           |
//! | exactly one             | +1         | eliminated  |
//! | several                 | 0          | eliminated  |
//!
//! The single P-Mode with the strictly highest score wins. A tie is no
//! match; the matcher never guesses.

use super::{PMode, PModeParty, PModeStore};
use crate::error::{As2Error, Result};
use crate::message::GenericMessageInfo;
use crate::services::MessageStore;

/// Score of one role, `None` when the P-Mode is eliminated.
fn score_party(party: &PModeParty, id: Option<&str>) -> Option<u32> {
    match party.party_ids.as_slice() {
        [] => Some(0),
        [only] => (id == Some(only.as_str())).then_some(1),
        many => id.is_some_and(|id| many.iter().any(|p| p == id)).then_some(0),
    }
}

fn score(pmode: &PMode, initiator: Option<&str>, responder: Option<&str>) -> Option<u32> {
    Some(score_party(&pmode.initiator, initiator)? + score_party(&pmode.responder, responder)?)
}

/// Find the P-Mode for a message from `from` to `to`.
pub fn find_for_message<'a>(
    store: &'a dyn PModeStore,
    from: Option<&str>,
    to: Option<&str>,
    is_signal: bool,
) -> Option<&'a PMode> {
    let (initiator, responder) = if is_signal { (to, from) } else { (from, to) };

    let mut best: Option<(u32, &PMode)> = None;
    let mut tied = false;
    for pmode in store.iter().filter(|p| p.is_as2()) {
        let Some(s) = score(pmode, initiator, responder) else {
            continue;
        };
        match best {
            Some((top, _)) if s < top => {},
            Some((top, _)) if s == top => tied = true,
            _ => {
                best = Some((s, pmode));
                tied = false;
            },
        }
    }

    match best {
        Some((_, pmode)) if !tied => Some(pmode),
        Some((s, _)) => {
            tracing::debug!(score = s, ?initiator, ?responder, "several P-Modes match equally");
            None
        },
        None => None,
    }
}

/// Find a signal's P-Mode through the message it refers to.
///
/// A synchronous reply to a request this process just sent uses that
/// request's P-Mode. Otherwise the P-Mode recorded on the referenced
/// outgoing message applies.
pub fn find_by_reference<'a>(
    store: &'a dyn PModeStore,
    messages: &dyn MessageStore,
    ref_to_message_id: Option<&str>,
    sync_request_pmode: Option<&str>,
) -> Option<&'a PMode> {
    if let Some(id) = sync_request_pmode {
        return store.get(id);
    }
    let outgoing = messages.find_outgoing(ref_to_message_id?)?;
    store.get(outgoing.unit.pmode_id()?)
}

/// Resolve the P-Mode of a received message or fail with
/// [`As2Error::ProcessingModeMismatch`].
pub fn resolve(
    store: &dyn PModeStore,
    messages: &dyn MessageStore,
    info: &GenericMessageInfo,
    is_signal: bool,
    sync_request_pmode: Option<&str>,
) -> Result<PMode> {
    let from = info.from_party_id.as_deref();
    let to = info.to_party_id.as_deref();

    if let Some(pmode) = find_for_message(store, from, to, is_signal) {
        return Ok(pmode.clone());
    }
    if is_signal {
        let by_reference = find_by_reference(
            store,
            messages,
            info.ref_to_message_id.as_deref(),
            sync_request_pmode,
        );
        if let Some(pmode) = by_reference {
            return Ok(pmode.clone());
        }
    }
    Err(As2Error::ProcessingModeMismatch(format!(
        "no P-Mode for {} from {} to {}",
        if is_signal { "signal" } else { "user message" },
        from.unwrap_or("<none>"),
        to.unwrap_or("<none>"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageUnit, Receipt};
    use crate::pipeline::ProcessingState;
    use crate::pmode::{MepBinding, PModeSet};
    use crate::services::InMemoryMessageStore;

    fn pmode(id: &str, initiator: &[&str], responder: &[&str]) -> PMode {
        let mut p = PMode::new(id);
        p.initiator.party_ids = initiator.iter().map(|s| s.to_string()).collect();
        p.responder.party_ids = responder.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn test_highest_score_wins() {
        let set = PModeSet::new(vec![
            pmode("one", &["SenderX"], &[]),
            pmode("two", &["SenderX"], &["ReceiverY"]),
        ])
        .unwrap();
        let found = find_for_message(&set, Some("SenderX"), Some("ReceiverY"), false).unwrap();
        assert_eq!(found.id, "two");
    }

    #[test]
    fn test_tie_is_no_match() {
        let set = PModeSet::new(vec![
            pmode("a", &["SenderX"], &[]),
            pmode("b", &["SenderX"], &[]),
        ])
        .unwrap();
        assert!(find_for_message(&set, Some("SenderX"), Some("ReceiverY"), false).is_none());
    }

    #[test]
    fn test_mismatch_eliminates() {
        let set = PModeSet::new(vec![
            pmode("wrong", &["Other"], &["ReceiverY"]),
            pmode("open", &[], &[]),
        ])
        .unwrap();
        let found = find_for_message(&set, Some("SenderX"), Some("ReceiverY"), false).unwrap();
        assert_eq!(found.id, "open");
    }

    #[test]
    fn test_several_ids_neutral_when_contained() {
        let set = PModeSet::new(vec![
            pmode("multi", &["A", "SenderX"], &["ReceiverY"]),
            pmode("single", &["SenderX"], &[]),
        ])
        .unwrap();
        // multi: 0 + 1, single: 1 + 0
        assert!(find_for_message(&set, Some("SenderX"), Some("ReceiverY"), false).is_none());
        // unknown sender eliminates both
        assert!(find_for_message(&set, Some("Z"), Some("ReceiverY"), false).is_none());
    }

    #[test]
    fn test_signals_are_reversed() {
        let set = PModeSet::new(vec![pmode("p", &["SenderX"], &["ReceiverY"])]).unwrap();
        assert!(find_for_message(&set, Some("ReceiverY"), Some("SenderX"), true).is_some());
        assert!(find_for_message(&set, Some("ReceiverY"), Some("SenderX"), false).is_none());
    }

    #[test]
    fn test_non_as2_ignored() {
        let mut other = pmode("x", &["SenderX"], &["ReceiverY"]);
        other.binding = MepBinding::Other;
        let set = PModeSet::new(vec![other]).unwrap();
        assert!(find_for_message(&set, Some("SenderX"), Some("ReceiverY"), false).is_none());
    }

    #[test]
    fn test_reference_fallback() {
        let set = PModeSet::new(vec![
            pmode("a", &["SenderX"], &["ReceiverY"]),
            pmode("b", &["SenderX"], &["ReceiverY"]),
        ])
        .unwrap();
        let messages = InMemoryMessageStore::new();
        let sent = MessageUnit::Receipt(Receipt {
            info: GenericMessageInfo::new("orig@x"),
            pmode_id: Some("b".into()),
            content: None,
        });
        messages.store_outgoing(&sent, ProcessingState::AwaitingReceipt).unwrap();

        let info = GenericMessageInfo::new("mdn@y")
            .with_from("ReceiverY")
            .with_to("SenderX")
            .with_ref_to("orig@x");
        assert_eq!(resolve(&set, &messages, &info, true, None).unwrap().id, "b");
        assert_eq!(resolve(&set, &messages, &info, true, Some("a")).unwrap().id, "a");

        let user = resolve(&set, &messages, &info, false, None).unwrap_err();
        assert!(matches!(user, As2Error::ProcessingModeMismatch(_)));
    }
}
