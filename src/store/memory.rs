// ABOUTME: In-memory store backends on dashmap with atomic one-time code consumption
// ABOUTME: Serve as both the shipping storage for single-node deployments and the test fakes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use super::{AuthCodeStore, ClientRegistry, UserDirectory};
use crate::crypto;
use crate::errors::AppResult;
use crate::models::{AuthorizationCode, FederatedProfile, Identity, RegisteredClient, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Default authorization code lifetime in seconds
pub const DEFAULT_AUTH_CODE_TTL_SECS: i64 = 600;

/// Client registry seeded once at startup; read-only afterwards
pub struct MemoryClientRegistry {
    clients: DashMap<String, RegisteredClient>,
}

impl MemoryClientRegistry {
    #[must_use]
    pub fn new(clients: Vec<RegisteredClient>) -> Self {
        let map = DashMap::new();
        for client in clients {
            map.insert(client.client_id.clone(), client);
        }
        Self { clients: map }
    }
}

#[async_trait]
impl ClientRegistry for MemoryClientRegistry {
    async fn get_client(&self, client_id: &str) -> AppResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.clone()))
    }
}

/// In-memory user directory with a secondary index for federated ids
pub struct MemoryUserDirectory {
    users: DashMap<String, Identity>,
    /// remote subject id -> local subject
    federated_index: DashMap<String, String>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            federated_index: DashMap::new(),
        }
    }

    /// Insert a provisioned identity. Registration itself is an external
    /// concern; this exists for startup seeding and tests.
    pub fn insert(&self, identity: Identity) {
        if let Some(remote_id) = &identity.federated_id {
            self.federated_index
                .insert(remote_id.clone(), identity.subject.clone());
        }
        self.users.insert(identity.subject.clone(), identity);
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email.as_deref() == Some(email))
            .map(|entry| entry.clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Identity>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.phone.as_deref() == Some(phone))
            .map(|entry| entry.clone()))
    }

    async fn find_by_subject(&self, subject: &str) -> AppResult<Option<Identity>> {
        Ok(self.users.get(subject).map(|entry| entry.clone()))
    }

    async fn resolve_or_create_federated(
        &self,
        remote_subject_id: &str,
        profile: &FederatedProfile,
        user_type: UserType,
    ) -> AppResult<Identity> {
        // Hash the placeholder credential before taking the shard lock;
        // bcrypt is slow and only needed on the vacant path.
        let placeholder_hash = crypto::generate_placeholder_credential()?;

        // The entry guard makes create-if-absent atomic per remote id, so
        // duplicate concurrent callbacks resolve to one local subject.
        let subject = match self.federated_index.entry(remote_subject_id.to_owned()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                let now = Utc::now();
                let identity = Identity {
                    subject: Uuid::new_v4().to_string(),
                    email: None,
                    phone: None,
                    display_name: profile.display_name.clone(),
                    avatar_url: profile.avatar_url.clone(),
                    user_type,
                    credential_hash: Some(placeholder_hash),
                    is_active: true,
                    federated_id: Some(remote_subject_id.to_owned()),
                    created_at: now,
                    last_login_at: None,
                };
                let subject = identity.subject.clone();
                self.users.insert(subject.clone(), identity);
                vacant.insert(subject.clone());
                subject
            }
        };

        self.users
            .get(&subject)
            .map(|entry| entry.clone())
            .ok_or_else(|| crate::errors::AppError::store("Federated identity index out of sync"))
    }

    async fn record_login(&self, subject: &str, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(mut identity) = self.users.get_mut(subject) {
            identity.last_login_at = Some(at);
        }
        Ok(())
    }
}

/// In-memory authorization code store with fixed TTL
pub struct MemoryAuthCodeStore {
    codes: DashMap<String, AuthorizationCode>,
    ttl: Duration,
}

impl MemoryAuthCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_AUTH_CODE_TTL_SECS))
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
        }
    }

    /// Drop expired entries. Called opportunistically on reads; never
    /// required for correctness because every read checks `expires_at`.
    fn sweep_expired(&self, now: DateTime<Utc>) {
        self.codes.retain(|_, code| now < code.expires_at);
    }
}

impl Default for MemoryAuthCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthCodeStore for MemoryAuthCodeStore {
    async fn create(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scope: Vec<String>,
        state: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let code = crypto::generate_auth_code()?;
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: client_id.to_owned(),
            subject: None,
            redirect_uri: redirect_uri.to_owned(),
            scope,
            state,
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.codes.insert(code.clone(), record);
        Ok(code)
    }

    async fn bind(&self, code: &str, subject: &str, now: DateTime<Utc>) -> AppResult<bool> {
        match self.codes.get_mut(code) {
            Some(mut record) if now < record.expires_at => {
                record.subject = Some(subject.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, code: &str, now: DateTime<Utc>) -> AppResult<Option<AuthorizationCode>> {
        let found = self.codes.get(code).map(|record| record.clone());
        match found {
            Some(record) if now < record.expires_at => Ok(Some(record)),
            Some(_) => {
                // Lazy deletion on read; correctness comes from the
                // timestamp check above.
                self.sweep_expired(now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AuthorizationCode>> {
        // Single conditional check-and-delete under the shard lock. Two
        // concurrent redemption attempts cannot both get the record back.
        let removed = self
            .codes
            .remove_if(code, |_, record| {
                record.subject.is_some() && now < record.expires_at
            })
            .map(|(_, record)| record);
        Ok(removed)
    }
}
