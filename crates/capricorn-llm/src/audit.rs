//! Audit records for model calls.
//!
//! Every completion issued by the pipeline leaves one structured log line with
//! the model, token counts, latency and a SHA-256 of the output so a
//! questionable extraction can be traced back to the exact call.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub purpose: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    pub fn new(purpose: &str, response: &LlmResponse, latency_ms: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(response.content.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            purpose: purpose.to_string(),
            model: response.model.clone(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            output_hash,
            latency_ms,
            called_at: Utc::now(),
        }
    }

    pub fn emit(&self) {
        tracing::info!(
            target: "capricorn_llm::audit",
            id = %self.id,
            purpose = %self.purpose,
            model = %self.model,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            "llm call"
        );
    }
}

/// Issue a completion and log its audit entry on success.
pub async fn complete_with_audit(
    backend: &dyn LlmBackend,
    req: LlmRequest,
    purpose: &str,
) -> Result<LlmResponse, LlmError> {
    let started = Instant::now();
    let resp = backend.complete(req).await?;
    let latency_ms = started.elapsed().as_millis() as u64;
    LlmAuditEntry::new(purpose, &resp, latency_ms).emit();
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_hash_is_sha256_hex() {
        let resp = LlmResponse {
            content: "abc".to_string(),
            model: "gemini-2.0-flash-001".to_string(),
            prompt_tokens: 12,
            completion_tokens: 1,
        };
        let entry = LlmAuditEntry::new("metadata_extraction", &resp, 40);
        assert_eq!(
            entry.output_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(entry.purpose, "metadata_extraction");
        assert_eq!(entry.latency_ms, 40);
    }
}
