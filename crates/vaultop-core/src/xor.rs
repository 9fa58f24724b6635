//! XOR codec used to recover a generate-root token from its OTP-masked
//! encoding.
//!
//! Vault returns the new root token XOR'd with a one-time pad it handed
//! out at `generate-root/attempt` time. Legacy servers (OTP length 0)
//! base64-encode both sides and the recovered bytes are a 16-byte UUID.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Errors from the XOR codec.
#[derive(Debug, thiserror::Error)]
pub enum XorError {
    /// The two inputs decode to different lengths.
    #[error("length of byte slices is not equivalent: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    /// One of the base64 inputs failed to decode.
    #[error("error decoding {which} base64 value: {reason}")]
    Decode { which: &'static str, reason: String },

    /// One of the base64 inputs decoded to nothing.
    #[error("decoded {which} base64 value is empty")]
    Empty { which: &'static str },

    /// The recovered token is not a 16-byte UUID.
    #[error("cannot format {len} bytes as a UUID, need 16")]
    NotAUuid { len: usize },
}

/// XOR two equal-length byte slices together.
///
/// # Errors
///
/// [`XorError::LengthMismatch`] if the slices differ in length.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Result<Vec<u8>, XorError> {
    if a.len() != b.len() {
        return Err(XorError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}

/// Base64-decode two strings and XOR the results together.
///
/// # Errors
///
/// Returns an error if either input fails to decode, decodes to an empty
/// buffer, or the decoded lengths differ.
pub fn xor_base64(a: &str, b: &str) -> Result<Vec<u8>, XorError> {
    let a_bytes = BASE64.decode(a).map_err(|err| XorError::Decode {
        which: "first",
        reason: err.to_string(),
    })?;
    if a_bytes.is_empty() {
        return Err(XorError::Empty { which: "first" });
    }

    let b_bytes = BASE64.decode(b).map_err(|err| XorError::Decode {
        which: "second",
        reason: err.to_string(),
    })?;
    if b_bytes.is_empty() {
        return Err(XorError::Empty { which: "second" });
    }

    xor_bytes(&a_bytes, &b_bytes)
}

/// Format 16 raw bytes as a hyphenated UUID string. Legacy generate-root
/// tokens have this shape.
///
/// # Errors
///
/// [`XorError::NotAUuid`] if `bytes` is not exactly 16 bytes long.
pub fn format_uuid(bytes: &[u8]) -> Result<String, XorError> {
    let uuid =
        uuid::Uuid::from_slice(bytes).map_err(|_| XorError::NotAUuid { len: bytes.len() })?;
    Ok(uuid.as_hyphenated().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn xor_bytes_is_self_inverse() {
        let a = b"some secret token bytes";
        let b = b"a one-time pad of equal";
        let masked = xor_bytes(a, b).unwrap();
        let unmasked = xor_bytes(&masked, b).unwrap();
        assert_eq!(unmasked, a);
    }

    #[test]
    fn xor_bytes_rejects_length_mismatch() {
        let err = xor_bytes(b"abc", b"ab").unwrap_err();
        assert!(matches!(
            err,
            XorError::LengthMismatch { left: 3, right: 2 }
        ));
    }

    #[test]
    fn xor_bytes_empty_inputs_are_fine() {
        assert_eq!(xor_bytes(b"", b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn xor_base64_roundtrip() {
        let a = BASE64.encode([0x0f, 0xf0, 0xaa]);
        let b = BASE64.encode([0xff, 0x0f, 0x55]);
        assert_eq!(xor_base64(&a, &b).unwrap(), vec![0xf0, 0xff, 0xff]);
    }

    #[test]
    fn xor_base64_rejects_bad_encoding() {
        let good = BASE64.encode(b"x");
        let err = xor_base64("not!!base64", &good).unwrap_err();
        assert!(matches!(err, XorError::Decode { which: "first", .. }));
    }

    #[test]
    fn xor_base64_rejects_empty_decode() {
        let good = BASE64.encode(b"x");
        let err = xor_base64("", &good).unwrap_err();
        assert!(matches!(err, XorError::Empty { which: "first" }));
        let err = xor_base64(&good, "").unwrap_err();
        assert!(matches!(err, XorError::Empty { which: "second" }));
    }

    #[test]
    fn format_uuid_formats_sixteen_bytes() {
        let bytes = [0u8; 16];
        assert_eq!(
            format_uuid(&bytes).unwrap(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn format_uuid_rejects_other_lengths() {
        let err = format_uuid(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, XorError::NotAUuid { len: 3 }));
    }
}
