use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

use facegate_core::types::{FeatureVectorError, FEATURE_BYTE_LEN};
use facegate_core::{EnrollmentRecord, FeatureVector};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::OptionalExtension;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("encoding encryption failed")]
    EncryptionFailed,
    #[error("encoding decryption failed: key mismatch or corrupted data")]
    DecryptionFailed,
    #[error("invalid encoding blob size: {0} bytes")]
    InvalidBlob(usize),
    #[error("invalid stored encoding: {0}")]
    InvalidEncoding(#[from] FeatureVectorError),
    #[error("encryption key I/O error: {0}")]
    KeyIo(#[source] std::io::Error),
}

/// SQLite-backed enrollment storage with AES-256-GCM encryption.
///
/// One row per user: re-enrollment overwrites the encoding in place (the
/// row keeps its position, so gallery order is first-enrollment order).
/// Encodings are stored as the fixed 512-byte little-endian layout, sealed
/// with a per-installation 32-byte key kept at `{db_dir}/.key` (mode 0600).
///
/// Plaintext 512-byte blobs are accepted transparently on read and are
/// sealed on the next enrollment for that user.
#[derive(Clone)]
pub struct EnrollmentStore {
    conn: Connection,
    enc_key: [u8; 32],
}

impl EnrollmentStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let enc_key = if db_path == Path::new(":memory:") {
            // In-memory DB (tests): use a fixed all-zeros key
            [0u8; 32]
        } else {
            let key_path = db_path
                .parent()
                .unwrap_or(Path::new("/var/lib/facegate"))
                .join(".key");
            load_or_generate_key(&key_path)?
        };

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS enrollments (
                     user_id TEXT PRIMARY KEY,
                     encoding BLOB NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL
                 );",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, enc_key })
    }

    /// Store (or replace) the encoding for a user.
    pub async fn save(&self, user_id: &str, encoding: &FeatureVector) -> Result<(), StoreError> {
        let blob = self.encrypt_encoding(encoding)?;
        let now = chrono::Utc::now().to_rfc3339();
        let user_id = user_id.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO enrollments (user_id, encoding, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT(user_id) DO UPDATE SET
                         encoding = excluded.encoding,
                         updated_at = excluded.updated_at",
                    rusqlite::params![user_id, blob, now],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    /// Encoding for one user, if enrolled.
    pub async fn load(&self, user_id: &str) -> Result<Option<FeatureVector>, StoreError> {
        let user_id = user_id.to_string();
        let blob: Option<Vec<u8>> = self
            .conn
            .call(move |conn| {
                let blob = conn
                    .query_row(
                        "SELECT encoding FROM enrollments WHERE user_id = ?1",
                        [&user_id],
                        |row| row.get::<_, Vec<u8>>(0),
                    )
                    .optional()?;
                Ok(blob)
            })
            .await?;

        blob.map(|b| self.decrypt_encoding(&b)).transpose()
    }

    /// Every enrollment, in first-enrollment order (the login gallery).
    pub async fn all_enrolled(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        // Fetch raw rows from SQLite; decrypt outside the blocking closure
        let rows: Vec<(String, Vec<u8>, String, String)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, encoding, created_at, updated_at
                     FROM enrollments ORDER BY rowid",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (user_id, blob, created_at, updated_at) in rows {
            let encoding = match self.decrypt_encoding(&blob) {
                Ok(encoding) => encoding,
                Err(e) => {
                    tracing::error!(user_id, error = %e, "skipping unreadable enrollment");
                    continue;
                }
            };
            records.push(EnrollmentRecord {
                user_id,
                encoding,
                created_at,
                updated_at,
            });
        }
        Ok(records)
    }

    /// Enrollment metadata (no encodings).
    pub async fn list(&self) -> Result<Vec<EnrollmentInfo>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, created_at, updated_at
                     FROM enrollments ORDER BY rowid",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(EnrollmentInfo {
                        user_id: row.get(0)?,
                        created_at: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Revoke a user's enrollment. Returns whether one existed.
    pub async fn clear(&self, user_id: &str) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let affected = conn.execute("DELETE FROM enrollments WHERE user_id = ?1", [&user_id])?;
                Ok(affected > 0)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Remove every enrollment. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| Ok(conn.execute("DELETE FROM enrollments", [])?))
            .await
            .map_err(StoreError::from)
    }

    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM enrollments", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    // ── Encryption helpers ────────────────────────────────────────────────────

    /// Seal an encoding with AES-256-GCM.
    ///
    /// Output: 12-byte random nonce || ciphertext || 16-byte GCM tag.
    fn encrypt_encoding(&self, encoding: &FeatureVector) -> Result<Vec<u8>, StoreError> {
        let plaintext = encoding.to_le_bytes();

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| StoreError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Open an encoding blob (sealed, or legacy plaintext of exactly 512 bytes).
    fn decrypt_encoding(&self, blob: &[u8]) -> Result<FeatureVector, StoreError> {
        if blob.len() == FEATURE_BYTE_LEN {
            return Ok(FeatureVector::from_le_bytes(blob)?);
        }

        if blob.len() <= NONCE_LEN {
            return Err(StoreError::InvalidBlob(blob.len()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| StoreError::DecryptionFailed)?;

        Ok(FeatureVector::from_le_bytes(&plaintext)?)
    }
}

// ── Key management ────────────────────────────────────────────────────────────

/// Load the encryption key from disk, or generate and persist a new one.
/// Written with mode 0600 (owner-readable only).
fn load_or_generate_key(key_path: &Path) -> Result<[u8; 32], StoreError> {
    if key_path.exists() {
        let bytes = std::fs::read(key_path).map_err(StoreError::KeyIo)?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            StoreError::KeyIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "encryption key file has wrong length ({} bytes, expected 32)",
                    bytes.len()
                ),
            ))
        })?;
        tracing::debug!(path = %key_path.display(), "loaded encryption key");
        Ok(key)
    } else {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(key_path)
            .map_err(StoreError::KeyIo)?;
        f.write_all(&key).map_err(StoreError::KeyIo)?;

        tracing::info!(path = %key_path.display(), "generated new AES-256 encryption key");
        Ok(key)
    }
}

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata about an enrollment (no encoding data).
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrollmentInfo {
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
