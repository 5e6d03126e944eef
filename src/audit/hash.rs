//! Diagnostic fingerprint hashing for signature payloads.
//!
//! The hash is a 32-bit rolling hash (`h = 31 * h + unit`) over UTF-16 code
//! units. It identifies a payload in audit trails; it is not collision
//! resistant and must not be used as a security primitive.

/// 32-bit rolling hash of `input`, wrapping on overflow.
pub fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Length of `input` in UTF-16 code units, which is how signature payload
/// lengths have always been reported.
pub fn utf16_len(input: &str) -> usize {
    input.encode_utf16().count()
}

/// Rendered form stored in `signatureHash`.
pub fn signature_hash(input: &str) -> String {
    rolling_hash(input).to_string()
}
