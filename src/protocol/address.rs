//! WebSocket address parsing.
//!
//! Accepted forms are `ws://host[:port][/path][?query]` and the `wss://`
//! equivalent. Fragments are stripped, since they are never sent on the wire.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Plaintext WebSocket scheme.
pub const SCHEME_WS: &str = "ws";

/// TLS WebSocket scheme.
pub const SCHEME_WSS: &str = "wss";

// ============================================================================
// Parsing
// ============================================================================

/// Parses and validates a WebSocket address.
///
/// # Errors
///
/// - [`Error::InvalidAddress`] if the address is not an absolute URL or has no host
/// - [`Error::UnsupportedScheme`] if the scheme is not `ws` or `wss`
pub fn parse_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_address(address, "address is empty"));
    }

    let mut url = Url::parse(trimmed).map_err(|e| Error::invalid_address(address, e.to_string()))?;

    match url.scheme() {
        SCHEME_WS | SCHEME_WSS => {}
        other => return Err(Error::unsupported_scheme(other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_address(address, "address has no host"));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns `true` if the address requires TLS.
#[inline]
#[must_use]
pub fn is_secure(url: &Url) -> bool {
    url.scheme() == SCHEME_WSS
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ws() {
        let url = parse_address("ws://127.0.0.1:9001/chat?room=1").expect("valid");
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(9001));
        assert_eq!(url.path(), "/chat");
        assert!(!is_secure(&url));
    }

    #[test]
    fn test_parse_wss() {
        let url = parse_address("wss://example.com/socket").expect("valid");
        assert!(is_secure(&url));
    }

    #[test]
    fn test_fragment_is_stripped() {
        let url = parse_address("ws://localhost/path#frag").expect("valid");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert!(parse_address("  ws://localhost:80  ").is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        for address in ["", "   ", "not a url", "127.0.0.1:9001", "ws://"] {
            let err = parse_address(address).unwrap_err();
            assert!(err.is_connect_error(), "{address:?} gave {err}");
        }
    }

    #[test]
    fn test_rejects_other_schemes() {
        let err = parse_address("http://example.com").unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "http"));
    }
}
