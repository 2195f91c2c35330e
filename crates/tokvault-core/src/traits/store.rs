// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for per-user token sets.

use async_trait::async_trait;

use crate::error::VaultError;
use crate::types::UserTokenSet;

/// Backend that persists [`UserTokenSet`]s keyed by user id.
///
/// Implementations must make [`save_user`](TokenStore::save_user) atomic: a
/// concurrent [`load_user`](TokenStore::load_user) observes either the old
/// complete set or the new one, never a partial write. Callers serialize
/// writers for the same user; implementations serialize whatever they share
/// across users.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Load one user's set. Unknown users yield an empty set.
    async fn load_user(&self, user_id: &str) -> Result<UserTokenSet, VaultError>;

    /// Replace one user's set. An empty set removes the user entry.
    async fn save_user(&self, user_id: &str, set: &UserTokenSet) -> Result<(), VaultError>;

    /// Every user id that currently has a stored set.
    async fn user_ids(&self) -> Result<Vec<String>, VaultError>;
}
