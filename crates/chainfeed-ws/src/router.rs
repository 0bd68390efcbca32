//! Inbound frame routing: decode the envelope, map `type` to an event name,
//! hand the payload to the registry.

use chainfeed_core::{Envelope, ErrorEvent, ErrorKind, EventName, FeedError, FeedEvent};
use serde_json::Value;

use crate::subscriptions::{DispatchReport, SubscriberRegistry};

/// Result of decoding one inbound frame.
#[derive(Debug)]
pub enum Routed {
    /// A known domain event.
    Event(FeedEvent),
    /// Valid envelope, `type` outside the known vocabulary.
    Unrecognized(String),
    /// Not a valid envelope.
    Malformed(FeedError),
}

/// Decode and classify a text frame without dispatching it.
pub fn route(text: &str) -> Routed {
    let Envelope { kind, payload } = match Envelope::decode(text) {
        Ok(env) => env,
        Err(e) => return Routed::Malformed(e),
    };
    let event = EventName::from_wire(&kind)
        .and_then(|name| FeedEvent::domain(name, payload.unwrap_or(Value::Null)));
    match event {
        Some(event) => Routed::Event(event),
        None => Routed::Unrecognized(kind),
    }
}

/// What happened to a frame handed to [`dispatch_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Dispatched { event: EventName, report: DispatchReport },
    Unrecognized(String),
    DecodeFailed,
}

/// Route a frame and deliver it.
///
/// Malformed frames surface as one `error` event with kind `DecodeError`;
/// unrecognized types only leave a diagnostic.
pub fn dispatch_frame(text: &str, registry: &SubscriberRegistry) -> FrameOutcome {
    match route(text) {
        Routed::Event(event) => {
            let name = event.name();
            let report = registry.dispatch(&event);
            tracing::trace!(event = %name, invoked = report.invoked, "frame dispatched");
            FrameOutcome::Dispatched { event: name, report }
        }
        Routed::Unrecognized(kind) => {
            tracing::debug!(
                kind = %ErrorKind::UnrecognizedType,
                wire_type = %kind,
                "dropping frame"
            );
            FrameOutcome::Unrecognized(kind)
        }
        Routed::Malformed(err) => {
            tracing::warn!(
                kind = %err.kind(),
                error = %err,
                frame = preview(text),
                "dropping malformed frame"
            );
            registry.dispatch(&FeedEvent::Error(ErrorEvent::from(&err)));
            FrameOutcome::DecodeFailed
        }
    }
}

fn preview(text: &str) -> &str {
    const MAX: usize = 120;
    if text.len() <= MAX {
        return text;
    }
    let end = (0..=MAX).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::handler;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn capture(reg: &SubscriberRegistry, name: EventName) -> Arc<Mutex<Vec<FeedEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reg.subscribe(
            name,
            handler(move |ev| {
                sink.lock().unwrap().push(ev.clone());
                Ok(())
            }),
        );
        seen
    }

    #[test]
    fn route_known_types() {
        match route(r#"{"type":"new_transaction","payload":{"id":"ab"}}"#) {
            Routed::Event(FeedEvent::NewTransaction(p)) => assert_eq!(p["id"], "ab"),
            other => panic!("unexpected {other:?}"),
        }
        match route(r#"{"type":"peer_update"}"#) {
            Routed::Event(FeedEvent::PeerUpdate(p)) => assert_eq!(p, Value::Null),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lifecycle_names_are_not_accepted_from_the_wire() {
        assert!(matches!(route(r#"{"type":"connected"}"#), Routed::Unrecognized(_)));
        assert!(matches!(route(r#"{"type":"error","payload":"x"}"#), Routed::Unrecognized(_)));
    }

    #[test]
    fn new_block_reaches_only_block_subscribers() {
        let reg = SubscriberRegistry::new();
        let blocks = capture(&reg, EventName::NewBlock);
        let txs = capture(&reg, EventName::NewTransaction);

        let outcome = dispatch_frame(r#"{"type":"new_block","payload":{"index":7}}"#, &reg);

        assert_eq!(
            outcome,
            FrameOutcome::Dispatched {
                event: EventName::NewBlock,
                report: DispatchReport { invoked: 1, failed: 0 },
            }
        );
        assert_eq!(*blocks.lock().unwrap(), vec![FeedEvent::NewBlock(json!({"index": 7}))]);
        assert!(txs.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_frame_emits_one_decode_error() {
        let reg = SubscriberRegistry::new();
        let blocks = capture(&reg, EventName::NewBlock);
        let errors = capture(&reg, EventName::Error);

        assert_eq!(dispatch_frame("{\"type\":\"new_block\",", &reg), FrameOutcome::DecodeFailed);

        assert!(blocks.lock().unwrap().is_empty());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            FeedEvent::Error(detail) => assert_eq!(detail.kind, ErrorKind::DecodeError),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_is_not_an_error() {
        let reg = SubscriberRegistry::new();
        let errors = capture(&reg, EventName::Error);

        let outcome = dispatch_frame(r#"{"type":"chain_reorg","payload":{}}"#, &reg);

        assert_eq!(outcome, FrameOutcome::Unrecognized("chain_reorg".into()));
        assert!(errors.lock().unwrap().is_empty());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert!(p.len() <= 120);
        assert!(long.starts_with(p));
    }
}
