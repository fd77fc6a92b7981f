//! Listener-side health verdict over a polled [`StatusResponse`].

use std::time::Duration;

use super::StatusResponse;

/// Both the server's own flag and the client's staleness check must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthVerdict {
    pub worker_alive: bool,
    pub fresh: bool,
}

impl HealthVerdict {
    /// Default client-side staleness threshold.
    pub const THRESHOLD: Duration = Duration::from_secs(60);

    /// Judge `response` at epoch seconds `now_secs`.
    pub fn evaluate(response: &StatusResponse, now_secs: u64, threshold: Duration) -> Self {
        let fresh = response.last_heartbeat != 0
            && now_secs.saturating_sub(response.last_heartbeat) < threshold.as_secs();
        Self {
            worker_alive: response.worker_alive,
            fresh,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.worker_alive && self.fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RoomNames;

    fn response(worker_alive: bool, last_heartbeat: u64) -> StatusResponse {
        StatusResponse {
            worker_alive,
            last_heartbeat,
            rooms: RoomNames::default(),
            pipelines: Default::default(),
        }
    }

    #[test]
    fn healthy_only_when_both_agree() {
        let t = 1_700_000_000;
        let ok = HealthVerdict::evaluate(&response(true, t), t + 59, HealthVerdict::THRESHOLD);
        assert!(ok.is_healthy());

        let stale = HealthVerdict::evaluate(&response(true, t), t + 60, HealthVerdict::THRESHOLD);
        assert!(stale.worker_alive);
        assert!(!stale.fresh);
        assert!(!stale.is_healthy());

        let down = HealthVerdict::evaluate(&response(false, t), t + 1, HealthVerdict::THRESHOLD);
        assert!(down.fresh);
        assert!(!down.is_healthy());
    }

    #[test]
    fn zero_heartbeat_is_never_fresh() {
        let v = HealthVerdict::evaluate(&response(true, 0), 10, HealthVerdict::THRESHOLD);
        assert!(!v.fresh);
    }

    #[test]
    fn parses_minimal_status_body() {
        let body = r#"{"worker_alive":true,"last_heartbeat":100,
            "rooms":{"chinese":"room_zh","korean":"room_kr","vietnamese":"room_vn"}}"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert!(HealthVerdict::evaluate(&parsed, 130, HealthVerdict::THRESHOLD).is_healthy());
    }
}
