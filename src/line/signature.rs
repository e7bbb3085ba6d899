use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;

/// Verify the `X-Line-Signature` header: the base64-encoded HMAC-SHA256 of
/// the raw request body keyed with the channel secret.
pub fn verify_line_signature(request_body: &str, signature: &str, channel_secret: &str) -> bool {
    let computed = compute_signature(request_body, channel_secret);

    if computed == signature {
        true
    } else {
        error!(
            "Signature verification failed. Computed: '{}', Received: '{}'",
            computed, signature
        );
        false
    }
}

pub fn compute_signature(request_body: &str, channel_secret: &str) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("Failed to create HMAC: {}", e);
            return String::new();
        }
    };
    mac.update(request_body.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}
