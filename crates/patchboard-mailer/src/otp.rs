//! One-time code generation, independent of transport.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Generate a 6-digit verification code (000000-999999).
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(0..1_000_000);
    format!("{:06}", code)
}

/// Absolute expiry for a freshly issued code.
pub fn otp_expiry(ttl_minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(ttl_minutes)
}
