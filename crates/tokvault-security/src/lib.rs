// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction for Tokvault log output and error messages.

pub mod redact;

pub use redact::{RedactingWriter, SharedRedactingWriter, redact};
