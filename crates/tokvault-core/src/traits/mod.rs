// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the vault and its collaborators.
//!
//! Persistence backends implement [`TokenStore`]; token format checks
//! implement [`TokenValidator`].

pub mod store;
pub mod validator;

pub use store::TokenStore;
pub use validator::TokenValidator;
