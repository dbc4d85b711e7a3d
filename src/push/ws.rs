use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Url;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::TransportError;

use super::{PushEvent, PushIdentity, PushStream, PushTransport};

/// Push connection over a websocket. Each text frame is one JSON
/// `PushEvent`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn request_url(&self, identity: &PushIdentity) -> Result<Url, TransportError> {
        Url::parse_with_params(
            &self.url,
            &[
                ("userId", identity.user_id.as_str()),
                ("token", identity.token.secret()),
            ],
        )
        .map_err(|err| TransportError::Connect(format!("bad push url {}: {err}", self.url)))
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self, identity: &PushIdentity) -> Result<PushStream, TransportError> {
        let url = self.request_url(identity)?;
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        debug!("push socket open for u/{}", identity.user_id);

        let events = stream::unfold(Some(ws), |ws| async move {
            let mut ws = ws?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<PushEvent>(&text) {
                        Ok(event) => return Some((Ok(event), Some(ws))),
                        Err(err) => warn!("skipping push frame: {err}"),
                    },
                    Some(Ok(Message::Close(_))) | None => return None,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        return Some((Err(TransportError::Stream(err.to_string())), None));
                    }
                }
            }
        });

        Ok(events.boxed())
    }
}
