/// HTTP endpoint paths for the KTS protocol.
pub mod endpoints {
    pub const BATCH: &str = "/v1/batch";
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
}

/// Health check response. Carries the limits a client must respect when
/// sizing its batches.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
    /// Most calls the server accepts in one batch.
    pub max_batch_calls: usize,
    /// Largest encoded batch body, in bytes.
    pub max_message_size: usize,
}

impl HealthResponse {
    pub fn ok(max_batch_calls: usize) -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
            max_batch_calls,
            max_message_size: super::message::MAX_MESSAGE_SIZE,
        }
    }

    /// Whether a client batching up to `max_batch_size` calls stays within
    /// the server's limit.
    pub fn accepts_batches_of(&self, max_batch_size: usize) -> bool {
        max_batch_size <= self.max_batch_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_batch_limits() {
        let h = HealthResponse::ok(256);
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, 1);
        assert_eq!(h.max_message_size, 16 * 1024 * 1024);
        assert!(h.accepts_batches_of(256));
        assert!(!h.accepts_batches_of(257));

        let wire = serde_json::to_value(&h).unwrap();
        assert_eq!(wire["max_batch_calls"], 256);
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::BATCH, "/v1/batch");
        assert_eq!(endpoints::HEALTH, "/v1/health");
    }
}
