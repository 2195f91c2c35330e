// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction for log output and error messages.
//!
//! Two complementary mechanisms:
//! 1. **Regex-based**: catches DigitalOcean token shapes and Bearer headers.
//! 2. **Exact-match**: catches caller-registered values that have no fixed shape.

use std::io::Write;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;
use tracing_subscriber::fmt::MakeWriter;

/// Known secret patterns to redact from output.
static REDACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // DigitalOcean personal access, OAuth, and refresh tokens: dop_v1_<64 hex>
        Regex::new(r"do[opr]_v1_[a-fA-F0-9]{16,}").unwrap(),
        // Bearer tokens in headers
        Regex::new(r"Bearer\s+[a-zA-Z0-9._\-]{10,}").unwrap(),
        // Legacy unprefixed DigitalOcean tokens: bare 64-char hex
        Regex::new(r"\b[a-fA-F0-9]{64}\b").unwrap(),
    ]
});

/// The redaction placeholder.
const REDACTED: &str = "[REDACTED]";

/// Redact secrets from a string using regex patterns and optional exact-match values.
pub fn redact(input: &str, known_values: &[String]) -> String {
    let mut result = input.to_string();

    for pattern in REDACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).to_string();
    }

    // Longest first so a value containing another is replaced whole.
    let mut sorted_values: Vec<&String> = known_values.iter().collect();
    sorted_values.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in sorted_values {
        if !value.is_empty() {
            result = result.replace(value.as_str(), REDACTED);
        }
    }

    result
}

/// A writer wrapper that redacts secrets from output.
pub struct RedactingWriter<W> {
    inner: W,
    known_values: Arc<RwLock<Vec<String>>>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, known_values: Arc<RwLock<Vec<String>>>) -> Self {
        Self {
            inner,
            known_values,
        }
    }

    /// Register another exact value to scrub.
    pub fn add_known_value(known_values: &Arc<RwLock<Vec<String>>>, value: String) {
        if let Ok(mut values) = known_values.write()
            && !values.contains(&value)
        {
            values.push(value);
        }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        let known = self
            .known_values
            .read()
            .map(|v| v.clone())
            .unwrap_or_default();
        let redacted = redact(&input, &known);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// [`MakeWriter`] for `tracing-subscriber` that hands out stderr writers
/// sharing one exact-match list.
#[derive(Clone, Default)]
pub struct SharedRedactingWriter {
    known_values: Arc<RwLock<Vec<String>>>,
}

impl SharedRedactingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for registering exact values after the subscriber is installed.
    pub fn known_values(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.known_values)
    }

    /// Scrub `value` from every line written from now on.
    pub fn add_known_value(&self, value: impl Into<String>) {
        RedactingWriter::<std::io::Stderr>::add_known_value(&self.known_values, value.into());
    }
}

impl<'a> MakeWriter<'a> for SharedRedactingWriter {
    type Writer = RedactingWriter<std::io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(std::io::stderr(), Arc::clone(&self.known_values))
    }
}
