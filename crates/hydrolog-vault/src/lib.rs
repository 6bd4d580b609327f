use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use time::OffsetDateTime;

pub const MASTER_KEY: &str = "master_key";
pub const DATA_CHECKSUM: &str = "data_checksum";
pub const LAST_INTEGRITY_CHECK: &str = "last_integrity_check";

const MASTER_KEY_BYTES: usize = 32;
const DEFAULT_SALT_BYTES: usize = 16;

/// Device secure-credential storage boundary: single string values by key.
pub trait SecretStore {
    /// # Errors
    /// Returns an error when the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// File-backed secret store: one JSON document holding all entries. Stands
/// in for the platform keychain on systems without one.
pub struct FileSecretStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileSecretStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error when an existing store file cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read secret store {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse secret store {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path: path.to_path_buf(), entries })
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create secret store directory {}", parent.display())
            })?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .context("failed to serialize secret store")?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("failed to write secret store {}", self.path.display()))
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// In-memory secret store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: BTreeMap<String, String>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cryptographic primitives
// ---------------------------------------------------------------------------

#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[must_use]
pub fn sha512_hex(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// SHA-512 digest over `data` concatenated with `salt`.
#[must_use]
pub fn salted_digest(data: &str, salt: &str) -> String {
    sha512_hex(format!("{data}{salt}").as_bytes())
}

#[must_use]
pub fn generate_salt() -> String {
    secure_random_hex(DEFAULT_SALT_BYTES)
}

/// Hex-encoded secure random bytes from the OS generator.
#[must_use]
pub fn secure_random_hex(byte_len: usize) -> String {
    let mut bytes = vec![0_u8; byte_len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checksum of any serializable value: canonical JSON hashed with SHA-256.
/// Struct field order is fixed at compile time, so equal values always hash
/// to equal digests.
///
/// # Errors
/// Returns an error when the value cannot be serialized.
pub fn checksum_of<T: Serialize>(value: &T) -> Result<String> {
    let canonical = serde_json::to_string(value).context("failed to serialize checksum input")?;
    Ok(sha256_hex(canonical.as_bytes()))
}

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// Load the master key, generating and persisting a fresh one on first use.
///
/// # Errors
/// Returns an error when the secret store cannot be read or written.
pub fn ensure_master_key<S: SecretStore>(secrets: &mut S) -> Result<String> {
    if let Some(existing) = secrets.get(MASTER_KEY)? {
        return Ok(existing);
    }
    let key = secure_random_hex(MASTER_KEY_BYTES);
    secrets.set(MASTER_KEY, &key)?;
    Ok(key)
}

/// Replace the master key with a newly generated one.
///
/// # Errors
/// Returns an error when the secret store cannot be written.
pub fn rotate_master_key<S: SecretStore>(secrets: &mut S) -> Result<String> {
    let key = secure_random_hex(MASTER_KEY_BYTES);
    secrets.set(MASTER_KEY, &key)?;
    Ok(key)
}

// ---------------------------------------------------------------------------
// Tamper detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IntegrityVerdict {
    pub is_valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IntegrityStatus {
    pub has_checksum: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_check: Option<OffsetDateTime>,
    pub needs_verification: bool,
}

/// Advisory tamper detector over a critical-state snapshot. A mismatch is
/// reported, never enforced: the verdict carries the outcome and callers
/// decide how to surface it.
pub struct TamperDetector<S: SecretStore> {
    secrets: S,
}

impl<S: SecretStore> TamperDetector<S> {
    pub fn new(secrets: S) -> Self {
        Self { secrets }
    }

    pub fn secrets_mut(&mut self) -> &mut S {
        &mut self.secrets
    }

    /// Compute, persist, and return the checksum of `snapshot`, stamping the
    /// verification timestamp.
    ///
    /// # Errors
    /// Returns an error when hashing or secret-store writes fail.
    pub fn generate_checksum<T: Serialize>(&mut self, snapshot: &T) -> Result<String> {
        let checksum = checksum_of(snapshot)?;
        self.secrets.set(DATA_CHECKSUM, &checksum)?;
        self.secrets.set(LAST_INTEGRITY_CHECK, &now_rfc3339()?)?;
        Ok(checksum)
    }

    /// Refresh the stored checksum after a legitimate mutation of critical
    /// state.
    ///
    /// # Errors
    /// Returns an error when hashing or secret-store writes fail.
    pub fn update_checksum<T: Serialize>(&mut self, snapshot: &T) -> Result<String> {
        self.generate_checksum(snapshot)
    }

    /// Compare `snapshot` against the stored checksum. The first run stores
    /// an initial checksum and reports valid.
    ///
    /// # Errors
    /// Returns an error when hashing or secret-store access fails; a checksum
    /// mismatch is a verdict, not an error.
    pub fn verify<T: Serialize>(&mut self, snapshot: &T) -> Result<IntegrityVerdict> {
        let Some(stored) = self.secrets.get(DATA_CHECKSUM)? else {
            self.generate_checksum(snapshot)?;
            return Ok(IntegrityVerdict {
                is_valid: true,
                message: "initial checksum generated".to_string(),
            });
        };

        let current = checksum_of(snapshot)?;
        if current != stored {
            return Ok(IntegrityVerdict {
                is_valid: false,
                message: "data integrity check failed - data may have been tampered with"
                    .to_string(),
            });
        }

        self.secrets.set(LAST_INTEGRITY_CHECK, &now_rfc3339()?)?;
        Ok(IntegrityVerdict { is_valid: true, message: "data integrity verified".to_string() })
    }

    /// Whether the last verification is older than `max_hours` (or missing).
    ///
    /// # Errors
    /// Returns an error when the secret store cannot be read or the stored
    /// timestamp cannot be parsed.
    pub fn needs_verification(&self, max_hours: i64) -> Result<bool> {
        let Some(raw) = self.secrets.get(LAST_INTEGRITY_CHECK)? else {
            return Ok(true);
        };
        let last = parse_rfc3339(&raw)?;
        let age = OffsetDateTime::now_utc() - last;
        Ok(age.whole_hours() >= max_hours)
    }

    /// # Errors
    /// Returns an error when the secret store cannot be read.
    pub fn status(&self) -> Result<IntegrityStatus> {
        let has_checksum = self.secrets.get(DATA_CHECKSUM)?.is_some();
        let last_check = match self.secrets.get(LAST_INTEGRITY_CHECK)? {
            Some(raw) => Some(parse_rfc3339(&raw)?),
            None => None,
        };
        Ok(IntegrityStatus {
            has_checksum,
            last_check,
            needs_verification: self.needs_verification(24)?,
        })
    }

    /// Drop the stored checksum and verification timestamp.
    ///
    /// # Errors
    /// Returns an error when the secret store cannot be written.
    pub fn reset(&mut self) -> Result<()> {
        self.secrets.delete(DATA_CHECKSUM)?;
        self.secrets.delete(LAST_INTEGRITY_CHECK)?;
        Ok(())
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}
