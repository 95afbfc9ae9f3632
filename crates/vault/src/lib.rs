//! Credential vault for third-party integration secrets.
//!
//! [`CredentialVault`] is the only entry point for storing and reading
//! integration credentials. It scopes every operation to the calling
//! principal, funnels every write through an [`EncryptionBoundary`] that holds
//! the key, and upgrades records written in the old base64-JSON format the
//! first time they are read.

pub mod boundary;
pub mod error;
pub mod legacy;
pub mod service;
pub mod validator;

pub use {
    boundary::{CREDENTIALS_AAD, EncryptionBoundary, LocalBoundary, StoreRequest, UpdateRequest},
    error::VaultError,
    legacy::{LEGACY_MAX_LEN, decode_legacy, is_legacy_base64},
    service::{CredentialUpdate, CredentialVault, NewCredential},
    validator::{ConnectionValidator, Endpoints, HttpConnectionValidator, ValidationOutcome},
};
