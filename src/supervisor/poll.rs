//! HTTP polling transport.
//!
//! Polls `GET {base_url}/subtitles/{room}` every `poll_interval`.  The first
//! successful response is the handshake; any later HTTP error closes the
//! channel, which sends the supervisor back through its reconnect path.

use std::time::Duration;

use async_trait::async_trait;

use super::transport::{SubtitleChannel, SubtitleTransport, TransportError};
use crate::bus::{resume_point, LatestSubtitle, SubtitleEvent};
use crate::config::SupervisorConfig;
use crate::room::RoomId;

pub struct HttpPollTransport {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpPollTransport {
    pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(poll_interval.max(Duration::from_secs(5)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    /// Transport polling at `supervisor.poll_interval_ms`.
    pub fn from_config(base_url: impl Into<String>, config: &SupervisorConfig) -> Self {
        Self::new(base_url, config.poll_interval())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn url(&self, room: RoomId) -> String {
        format!("{}/subtitles/{}", self.base_url, room.as_str())
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<LatestSubtitle, TransportError> {
    client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| TransportError::Http(e.to_string()))?
        .json::<LatestSubtitle>()
        .await
        .map_err(|e| TransportError::Http(e.to_string()))
}

#[async_trait]
impl SubtitleTransport for HttpPollTransport {
    async fn connect(
        &self,
        room: RoomId,
        resume_after: Option<u64>,
    ) -> Result<Box<dyn SubtitleChannel>, TransportError> {
        let url = self.url(room);
        let first = fetch(&self.client, &url)
            .await
            .map_err(|e| TransportError::Handshake {
                room,
                reason: e.to_string(),
            })?;

        let latest = first.latest.map(SubtitleEvent::from);
        let newest = latest.as_ref().map(|event| event.sequence);
        let resume_after = resume_point(resume_after, newest);
        let pending = latest.filter(|event| resume_after.map_or(true, |seen| event.sequence > seen));

        Ok(Box::new(PollChannel {
            client: self.client.clone(),
            url,
            poll_interval: self.poll_interval,
            last_sequence: resume_after,
            pending,
        }))
    }
}

struct PollChannel {
    client: reqwest::Client,
    url: String,
    poll_interval: Duration,
    last_sequence: Option<u64>,
    pending: Option<SubtitleEvent>,
}

impl PollChannel {
    fn accept(&mut self, event: SubtitleEvent) -> Option<SubtitleEvent> {
        if self.last_sequence.is_some_and(|last| event.sequence <= last) {
            return None;
        }
        self.last_sequence = Some(event.sequence);
        Some(event)
    }
}

#[async_trait]
impl SubtitleChannel for PollChannel {
    async fn recv(&mut self) -> Option<SubtitleEvent> {
        if let Some(event) = self.pending.take() {
            if let Some(event) = self.accept(event) {
                return Some(event);
            }
        }
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match fetch(&self.client, &self.url).await {
                Ok(LatestSubtitle {
                    latest: Some(payload),
                    ..
                }) => {
                    if let Some(event) = self.accept(payload.into()) {
                        return Some(event);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("supervisor: poll of {} failed: {e}", self.url);
                    return None;
                }
            }
        }
    }
}
