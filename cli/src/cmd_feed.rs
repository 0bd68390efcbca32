//! `chainfeed watch` and `chainfeed send`.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use chainfeed_core::{EventName, FeedConfig, FeedEvent};
use chainfeed_store::{KvStore, DEFAULT_PREFIX};
use chainfeed_ws::{handler, FeedClient, HandlerError};

/// Store key holding the payload of the last `newBlock` seen.
const LAST_BLOCK_KEY: &str = "last_block";

/// Time given to the background task to flush and close after `disconnect`.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Forward `names` from the client into a channel the command loop reads.
fn forward(client: &FeedClient, names: &[EventName]) -> mpsc::UnboundedReceiver<FeedEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &name in names {
        let tx = tx.clone();
        client.subscribe(
            name,
            handler(move |event| {
                tx.send(event.clone())
                    .map_err(|_| HandlerError::from("command loop has stopped"))
            }),
        );
    }
    rx
}

/// Print events until Ctrl-C or the client gives up.
pub async fn watch(config: FeedConfig, as_json: bool, state: Option<&Path>) -> Result<()> {
    let store = state
        .map(|path| {
            KvStore::open(path, DEFAULT_PREFIX)
                .with_context(|| format!("open state file '{}'", path.display()))
        })
        .transpose()?;
    if let Some(last) = store.as_ref().and_then(|s| s.get(LAST_BLOCK_KEY)) {
        eprintln!("last block seen: {last}");
    }

    let client = FeedClient::new(config).context("build feed client")?;
    let mut events = forward(&client, &EventName::ALL);
    client.connect();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                client.disconnect();
                return Ok(());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                print_event(&event, as_json)?;

                if let (Some(store), FeedEvent::NewBlock(payload)) = (&store, &event) {
                    store.set(LAST_BLOCK_KEY, payload).context("record last block")?;
                }
                if event == FeedEvent::MaxReconnectAttemptsReached {
                    bail!(
                        "gave up on {} after {} failed attempts",
                        client.endpoint(),
                        client.retry_count()
                    );
                }
            }
        }
    }
}

/// Connect, send one envelope, disconnect.
pub async fn send(config: FeedConfig, kind: &str, payload: Option<Value>) -> Result<()> {
    let client = FeedClient::new(config).context("build feed client")?;
    let mut events = forward(
        &client,
        &[
            EventName::Connected,
            EventName::Error,
            EventName::MaxReconnectAttemptsReached,
        ],
    );
    client.connect();

    let mut payload = payload;
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Connected => {
                client
                    .send(kind, payload.take())
                    .with_context(|| format!("send '{kind}'"))?;
                client.disconnect();
                tokio::time::sleep(CLOSE_GRACE).await;
                println!("sent '{kind}' to {}", client.endpoint());
                return Ok(());
            }
            FeedEvent::Error(e) => tracing::warn!(error = %e, "feed error"),
            FeedEvent::MaxReconnectAttemptsReached => {
                bail!("could not connect to {}", client.endpoint())
            }
            _ => {}
        }
    }
    bail!("feed client stopped before connecting")
}

fn print_event(event: &FeedEvent, as_json: bool) -> Result<()> {
    if as_json {
        let line = json!({
            "event": event.name().as_str(),
            "payload": event_body(event),
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }
    match event {
        FeedEvent::Error(e) => println!("{:<28} {e}", event.name().as_str()),
        _ => match event.payload() {
            Some(payload) => println!("{:<28} {payload}", event.name().as_str()),
            None => println!("{}", event.name()),
        },
    }
    Ok(())
}

fn event_body(event: &FeedEvent) -> Value {
    match event {
        FeedEvent::Error(e) => json!({ "kind": e.kind.to_string(), "message": e.message }),
        _ => event.payload().cloned().unwrap_or(Value::Null),
    }
}
