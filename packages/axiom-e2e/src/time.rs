//! Platform-aware time utilities.
//!
//! On native platforms, this uses `chrono::Utc::now()`.
//! On WASM, this uses `js_sys::Date::now()` since `std::time::SystemTime`
//! is not available on `wasm32-unknown-unknown`.

/// Returns the current Unix timestamp in milliseconds.
///
/// Legacy envelopes carry this value in their `timestamp` field.
pub fn now_timestamp_millis() -> i64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as i64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Returns the current Unix timestamp in microseconds.
///
/// Stored blobs are stamped with this value so the newest copy can be told
/// apart from a stale one.
pub fn now_timestamp_micros() -> i64 {
    #[cfg(target_arch = "wasm32")]
    {
        (js_sys::Date::now() * 1000.0) as i64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Utc::now().timestamp_micros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_agree_with_millis() {
        let millis = now_timestamp_millis();
        let micros = now_timestamp_micros();
        assert!(micros / 1000 >= millis);
        assert!(micros / 1000 - millis < 1000);
    }

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ts = now_timestamp_millis();
        // Should be after 2024-01-01 in millis
        assert!(ts > 1_704_067_200_000, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 in millis
        assert!(ts < 4_102_444_800_000, "Timestamp {} is too far in future", ts);
    }
}
