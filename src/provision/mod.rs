// ============================================================================
// File: src/provision/mod.rs
// ----------------------------------------------------------------------------
// Setup steps run before the playbook: key material, the vault password
// file, role content and collections. Each step either performs its side
// effect or detects prior satisfaction and returns.
// ============================================================================

mod collections;
mod keys;
mod roles;
mod secrets;

pub use collections::ensure_collections;
pub use keys::{KeyMaterial, provision_keys};
pub use roles::ensure_roles;
pub use secrets::{DEFAULT_VAULT_PASSWORD, ensure_secrets_file};
