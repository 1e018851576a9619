// ABOUTME: Injected store traits for clients, identities, and authorization codes
// ABOUTME: The engine holds trait objects only, so backends can be swapped and tests use fakes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

//! # Store Boundary
//!
//! The engine has no process-wide mutable state; all persistence goes
//! through these traits. Expiry-sensitive operations take an explicit `now`
//! so callers (and tests) control the clock. Expiry is enforced by timestamp
//! comparison at read time; implementations may clean up lazily but must
//! never rely on a sweep for correctness.

pub mod memory;

use crate::errors::AppResult;
use crate::models::{AuthorizationCode, FederatedProfile, Identity, RegisteredClient, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::{MemoryAuthCodeStore, MemoryClientRegistry, MemoryUserDirectory};

/// Read-only registry of provisioned OAuth clients
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Resolve a client by id. `None` means the client is not registered.
    async fn get_client(&self, client_id: &str) -> AppResult<Option<RegisteredClient>>;
}

/// Account identity resolution and credential verification boundary
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>>;

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Identity>>;

    async fn find_by_subject(&self, subject: &str) -> AppResult<Option<Identity>>;

    /// Look up the identity bound to a remote subject id, creating one on
    /// first federated login. Must behave as an atomic upsert keyed by
    /// `remote_subject_id`: concurrent duplicate callbacks resolve to the
    /// same local subject.
    async fn resolve_or_create_federated(
        &self,
        remote_subject_id: &str,
        profile: &FederatedProfile,
        user_type: UserType,
    ) -> AppResult<Identity>;

    /// Last-seen bookkeeping after a successful login
    async fn record_login(&self, subject: &str, at: DateTime<Utc>) -> AppResult<()>;
}

/// Pending authorization code storage with TTL and one-time-use semantics
#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    /// Create an unbound code for a validated client. Returns the opaque
    /// code value. Lifetime is fixed at creation, independent of binding.
    async fn create(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scope: Vec<String>,
        state: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<String>;

    /// Bind a code to a subject. Last-writer-wins and idempotent for
    /// retried submissions of the same login. Returns `false` if the code
    /// does not exist or has expired.
    async fn bind(&self, code: &str, subject: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Fetch a code, treating expired entries as absent. Implementations
    /// may delete expired entries as a side effect of the read.
    async fn get(&self, code: &str, now: DateTime<Utc>) -> AppResult<Option<AuthorizationCode>>;

    /// Atomically consume a bound, unexpired code. At most one caller ever
    /// receives the record; concurrent redemption attempts for the same
    /// code must not both succeed. Unbound or expired codes are not
    /// consumable and are left for expiry.
    async fn consume(&self, code: &str, now: DateTime<Utc>)
        -> AppResult<Option<AuthorizationCode>>;
}
