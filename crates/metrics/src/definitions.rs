//! Metric name and label definitions.

/// Credential vault metrics
pub mod vault {
    /// Credentials created, labelled by integration
    pub const CREDENTIALS_CREATED_TOTAL: &str = "strongbox_credentials_created_total";
    /// Calls to read decrypted credentials
    pub const DECRYPT_REQUESTS_TOTAL: &str = "strongbox_decrypt_requests_total";
    /// Decrypt calls that failed (tampering, wrong key, corrupt payload)
    pub const DECRYPT_FAILURES_TOTAL: &str = "strongbox_decrypt_failures_total";
    /// Legacy records re-encrypted, labelled by status
    pub const LEGACY_MIGRATIONS_TOTAL: &str = "strongbox_legacy_migrations_total";
    /// Connection tests run, labelled by outcome
    pub const VALIDATIONS_TOTAL: &str = "strongbox_validations_total";
}

/// Common label keys
pub mod labels {
    pub const INTEGRATION: &str = "integration";
    pub const STATUS: &str = "status";
    pub const VALID: &str = "valid";
}

#[cfg(test)]
mod tests {
    use super::vault;

    #[test]
    fn names_are_prefixed_counters() {
        for name in [
            vault::CREDENTIALS_CREATED_TOTAL,
            vault::DECRYPT_REQUESTS_TOTAL,
            vault::DECRYPT_FAILURES_TOTAL,
            vault::LEGACY_MIGRATIONS_TOTAL,
            vault::VALIDATIONS_TOTAL,
        ] {
            assert!(name.starts_with("strongbox_"), "{name}");
            assert!(name.ends_with("_total"), "{name}");
        }
    }
}
