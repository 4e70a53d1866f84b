//! Payload encoding for the external adapter: raw bytes → base64.
//!
//! Multimodal APIs take inline file data as base64 inside the JSON request
//! body, so PDFs and images are encoded once here, before handoff, and the
//! adapter never sees raw bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Standard (padded) base64 of `bytes`.
pub fn encode_payload(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_small_payload() {
        let encoded = encode_payload(b"%PDF-1.7\n");
        let decoded = STANDARD.decode(&encoded).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.7\n");
    }

    #[test]
    fn encode_empty_payload() {
        assert_eq!(encode_payload(&[]), "");
    }
}
