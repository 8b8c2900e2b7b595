//! Websocket relay client: connect, publish, fetch.
//!
//! Thin wrapper over the relay wire protocol (`REQ`/`EVENT`/`EOSE`/`OK`).
//! Every call runs under a fixed timeout and a bounded retry budget;
//! failures surface as [`RelayError`] values at the call site instead of
//! tearing down the session.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use powstr_core::Event;

/// Relays the public deployment publishes to. The first entry is the
/// dedicated labour relay; the rest are general-purpose public relays.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://labour.fiatjaf.com/",
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
    "wss://relay.snort.social",
    "wss://eden.nostr.land",
];

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay URLs to maintain sessions with.
    pub relays: Vec<String>,
    /// Rounds of connection attempts before giving up.
    pub connect_attempts: u32,
    /// Rounds of publish attempts before giving up.
    pub publish_attempts: u32,
    /// Fixed delay between retry rounds.
    pub retry_delay: Duration,
    /// Budget for any single network exchange.
    pub call_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            connect_attempts: 5,
            publish_attempts: 5,
            retry_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no relay reachable after {attempts} attempts")]
    ConnectExhausted { attempts: u32 },
    #[error("no relay accepted the event after {attempts} attempts")]
    PublishExhausted { attempts: u32 },
    #[error("not connected to any relay")]
    NotConnected,
    #[error("relay call timed out after {0:?}")]
    Timeout(Duration),
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("relay closed the connection mid-exchange")]
    ConnectionClosed,
}

/// Connection lifecycle, driven by call outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    Idle,
    Connecting,
    Connected(usize),
    Retrying(u32),
    Failed,
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Session {
    url: String,
    ws: Socket,
}

/// Multi-relay client. Holds one websocket session per reachable relay.
pub struct RelayClient {
    config: RelayConfig,
    sessions: Vec<Session>,
    state: ConnectState,
    sub_counter: u64,
}

impl RelayClient {
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            config,
            sessions: Vec::new(),
            state: ConnectState::Idle,
            sub_counter: 0,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    pub fn connected_relays(&self) -> usize {
        self.sessions.len()
    }

    /// Establish sessions, retrying the whole round on a fixed delay
    /// until at least one relay is up or the attempt budget is spent.
    pub async fn connect(&mut self) -> Result<usize, RelayError> {
        for attempt in 1..=self.config.connect_attempts {
            self.state = if attempt == 1 {
                ConnectState::Connecting
            } else {
                ConnectState::Retrying(attempt)
            };
            self.sessions.clear();

            for url in self.config.relays.clone() {
                match timeout(self.config.call_timeout, connect_async(url.as_str())).await {
                    Ok(Ok((ws, _))) => {
                        debug!("connected to {url}");
                        self.sessions.push(Session { url, ws });
                    }
                    Ok(Err(e)) => warn!("connect failed ({url}): {e}"),
                    Err(_) => warn!("connect timed out ({url})"),
                }
            }

            if !self.sessions.is_empty() {
                self.state = ConnectState::Connected(self.sessions.len());
                return Ok(self.sessions.len());
            }
            if attempt < self.config.connect_attempts {
                sleep(self.config.retry_delay).await;
            }
        }

        self.state = ConnectState::Failed;
        Err(RelayError::ConnectExhausted {
            attempts: self.config.connect_attempts,
        })
    }

    /// Broadcast a finalized event. Succeeds when at least one relay
    /// acknowledges it with `OK`; the whole round is retried on a fixed
    /// delay up to the publish budget. The event is borrowed, never
    /// consumed, so a caller can retry manually after exhaustion.
    pub async fn publish(&mut self, event: &Event) -> Result<usize, RelayError> {
        if self.sessions.is_empty() {
            return Err(RelayError::NotConnected);
        }
        let frame = json!(["EVENT", event]).to_string();

        for attempt in 1..=self.config.publish_attempts {
            let mut accepted = 0;
            for session in &mut self.sessions {
                match publish_one(session, &frame, &event.id, self.config.call_timeout).await {
                    Ok(true) => accepted += 1,
                    Ok(false) => warn!("relay {} rejected event {}", session.url, event.id),
                    Err(e) => warn!("publish failed ({}): {e}", session.url),
                }
            }
            if accepted > 0 {
                return Ok(accepted);
            }
            if attempt < self.config.publish_attempts {
                sleep(self.config.retry_delay).await;
            }
        }

        Err(RelayError::PublishExhausted {
            attempts: self.config.publish_attempts,
        })
    }

    /// Query every session, merging results until each reports `EOSE`.
    /// Events are deduplicated by id across relays. Per-relay failures
    /// are logged and skipped; only a total lack of sessions is an error.
    pub async fn fetch_events(&mut self, filter: &Filter) -> Result<Vec<Event>, RelayError> {
        if self.sessions.is_empty() {
            return Err(RelayError::NotConnected);
        }
        self.sub_counter += 1;
        let sub_id = format!("powstr-{}", self.sub_counter);
        let req = json!(["REQ", sub_id, filter]).to_string();
        let close = json!(["CLOSE", sub_id]).to_string();

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for session in &mut self.sessions {
            match fetch_one(session, &req, &sub_id, self.config.call_timeout).await {
                Ok(batch) => {
                    for ev in batch {
                        if seen.insert(ev.id.clone()) {
                            events.push(ev);
                        }
                    }
                    if let Err(e) = session.ws.send(Message::Text(close.clone())).await {
                        debug!("close failed ({}): {e}", session.url);
                    }
                }
                Err(e) => warn!("fetch failed ({}): {e}", session.url),
            }
        }
        Ok(events)
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription filter, serialized into the `REQ` frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn kind(kind: u32) -> Self {
        Self {
            kinds: vec![kind],
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }
}

/// Send one `EVENT` frame and wait for the matching `OK`.
async fn publish_one(
    session: &mut Session,
    frame: &str,
    id: &str,
    budget: Duration,
) -> Result<bool, RelayError> {
    session.ws.send(Message::Text(frame.to_string())).await?;

    let wait_ok = async {
        while let Some(msg) = session.ws.next().await {
            match msg? {
                Message::Text(txt) => {
                    let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                        continue;
                    };
                    let Some(arr) = val.as_array() else { continue };
                    if arr.first().and_then(Value::as_str) == Some("OK")
                        && arr.get(1).and_then(Value::as_str) == Some(id)
                    {
                        return Ok(arr.get(2).and_then(Value::as_bool).unwrap_or(false));
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(RelayError::ConnectionClosed)
    };

    timeout(budget, wait_ok)
        .await
        .map_err(|_| RelayError::Timeout(budget))?
}

/// Issue one subscription and collect events until `EOSE`.
async fn fetch_one(
    session: &mut Session,
    req: &str,
    sub_id: &str,
    budget: Duration,
) -> Result<Vec<Event>, RelayError> {
    session.ws.send(Message::Text(req.to_string())).await?;

    let collect = async {
        let mut events = Vec::new();
        while let Some(msg) = session.ws.next().await {
            match msg? {
                Message::Text(txt) => {
                    let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                        continue;
                    };
                    let Some(arr) = val.as_array() else { continue };
                    match arr.first().and_then(Value::as_str) {
                        Some("EVENT") if arr.len() >= 3 => {
                            if arr.get(1).and_then(Value::as_str) == Some(sub_id) {
                                if let Ok(ev) = serde_json::from_value::<Event>(arr[2].clone()) {
                                    events.push(ev);
                                }
                            }
                        }
                        Some("EOSE") if arr.get(1).and_then(Value::as_str) == Some(sub_id) => {
                            break;
                        }
                        _ => {}
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(events)
    };

    timeout(budget, collect)
        .await
        .map_err(|_| RelayError::Timeout(budget))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serializes_sparsely() {
        let filter = Filter::kind(1).limit(500);
        assert_eq!(
            serde_json::to_string(&filter).unwrap(),
            r#"{"kinds":[1],"limit":500}"#
        );

        let filter = Filter::kind(0).authors(vec!["ab".into()]);
        assert_eq!(
            serde_json::to_string(&filter).unwrap(),
            r#"{"kinds":[0],"authors":["ab"]}"#
        );
    }

    #[test]
    fn default_config_carries_budgets() {
        let config = RelayConfig::default();
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.publish_attempts, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.call_timeout, Duration::from_secs(10));
        assert!(!config.relays.is_empty());
    }
}
