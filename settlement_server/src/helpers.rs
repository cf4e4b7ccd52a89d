use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The base64-encoded HMAC-SHA256 of `data`, keyed with `secret`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Checks a base64-encoded HMAC-SHA256 `signature` over `data` in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::decode(signature.trim()) else {
        warn!("🔐️ Signature is not valid base64");
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!())
}
