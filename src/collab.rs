//! External collaborator boundaries.
//!
//! The platform's account system and provider directory live outside this
//! service. The engine only needs two narrow capabilities from them, so
//! each is a trait; the in-memory implementations stand in at the boundary
//! for the server binary and the test suites.

use std::collections::HashMap;

use crate::model::UserId;

/// Primary-account credential check, consulted before a PIN reset.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, user: UserId, password: &str) -> bool;
}

/// Display-name lookup for request and receipt rendering.
pub trait ProviderDirectory: Send + Sync {
    fn display_name(&self, user: UserId) -> Option<String>;
}

/// Credential table held in memory.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    passwords: HashMap<UserId, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserId, password: impl Into<String>) {
        self.passwords.insert(user, password.into());
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, user: UserId, password: &str) -> bool {
        self.passwords.get(&user).is_some_and(|p| p == password)
    }
}

/// Name table held in memory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    names: HashMap<UserId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserId, name: impl Into<String>) {
        self.names.insert(user, name.into());
    }
}

impl ProviderDirectory for StaticDirectory {
    fn display_name(&self, user: UserId) -> Option<String> {
        self.names.get(&user).cloned()
    }
}
