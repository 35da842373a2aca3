//! Log Redaction Layer
//!
//! Keeps public keys, ciphertexts and signatures out of log output.

use regex::Regex;
use std::sync::LazyLock;

static PEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN [A-Z ]+-----[\s\S]*?-----END [A-Z ]+-----").unwrap()
});
static BLOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/_\-]{40,}={0,2}").unwrap());

/// Number of leading characters of a key kept by [`fingerprint`].
const FINGERPRINT_LEN: usize = 12;

/// Redacts key material and encoded blobs in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = PEM_RE.replace_all(input, "[REDACTED_PEM]");
    BLOB_RE.replace_all(&redacted, "[REDACTED_BLOB]").to_string()
}

/// Short, log-safe label for a public key.
pub fn fingerprint(key: &str) -> String {
    let body = key
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>();
    let body = if body.is_empty() { key } else { body.as_str() };

    let head: String = body.chars().take(FINGERPRINT_LEN).collect();
    if body.chars().count() > FINGERPRINT_LEN {
        format!("{head}…({} chars)", body.chars().count())
    } else {
        head
    }
}
