//! File-backed local cache
//!
//! One file per record under the cache directory. Every file carries an
//! explicit versioned envelope so the layout stays under our control:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "PSAC"
//!      4     1  schema version
//!      5     1  record tag
//!      6     8  first 8 bytes of SHA-256(payload)
//!     14     4  payload length (u32, little-endian)
//!     18     n  payload (bincode, standard config)
//! ```
//!
//! Records that fail the magic, version, length or checksum checks are
//! treated as cache misses and removed; the server can always repopulate
//! them. A tag mismatch is reported as an error.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Session, Settings, Transaction, User, Wallet};
use crate::ports::LocalCache;

const MAGIC: &[u8; 4] = b"PSAC";

/// Bump when any cached struct changes shape
pub const SCHEMA_VERSION: u8 = 1;

const HEADER_LEN: usize = 18;
const LOCK_FILE: &str = ".lock";

/// Which record a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordTag {
    User = 1,
    Wallet = 2,
    Transactions = 3,
    Settings = 4,
    Session = 5,
}

impl RecordTag {
    const ALL: [RecordTag; 5] = [
        RecordTag::User,
        RecordTag::Wallet,
        RecordTag::Transactions,
        RecordTag::Settings,
        RecordTag::Session,
    ];

    fn file_name(&self) -> &'static str {
        match self {
            Self::User => "user.bin",
            Self::Wallet => "wallet.bin",
            Self::Transactions => "transactions.bin",
            Self::Settings => "settings.bin",
            Self::Session => "session.bin",
        }
    }
}

/// Why an envelope could not be read
#[derive(Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    Truncated,
    BadMagic,
    UnsupportedVersion(u8),
    ChecksumMismatch,
    TagMismatch { expected: u8, found: u8 },
}

fn checksum(payload: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Wrap a payload in the versioned envelope
pub fn encode_envelope(tag: RecordTag, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(SCHEMA_VERSION);
    out.push(tag as u8);
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validate an envelope and return its payload
pub fn decode_envelope(tag: RecordTag, bytes: &[u8]) -> std::result::Result<&[u8], EnvelopeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EnvelopeError::Truncated);
    }
    if &bytes[0..4] != MAGIC {
        return Err(EnvelopeError::BadMagic);
    }
    if bytes[4] != SCHEMA_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(bytes[4]));
    }
    if bytes[5] != tag as u8 {
        return Err(EnvelopeError::TagMismatch {
            expected: tag as u8,
            found: bytes[5],
        });
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[14..18]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    let payload = bytes.get(HEADER_LEN..HEADER_LEN + len).ok_or(EnvelopeError::Truncated)?;
    if bytes.len() != HEADER_LEN + len {
        return Err(EnvelopeError::Truncated);
    }
    if checksum(payload) != bytes[6..14] {
        return Err(EnvelopeError::ChecksumMismatch);
    }
    Ok(payload)
}

/// Cache stored as envelope files in a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, tag: RecordTag) -> PathBuf {
        self.dir.join(tag.file_name())
    }

    fn lock_file(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        Ok(file)
    }

    fn read_record<T: DeserializeOwned>(&self, tag: RecordTag) -> Result<Option<T>> {
        let path = self.path_for(tag);
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let read = fs::read(&path);
        lock.unlock()?;

        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let payload = match decode_envelope(tag, &bytes) {
            Ok(payload) => payload,
            Err(EnvelopeError::TagMismatch { expected, found }) => {
                return Err(Error::cache(format!(
                    "{} holds record tag {}, expected {}",
                    tag.file_name(),
                    found,
                    expected
                )));
            }
            Err(reason) => {
                warn!(record = tag.file_name(), ?reason, "discarding unreadable cache record");
                self.remove_record(tag)?;
                return Ok(None);
            }
        };

        match bincode::serde::decode_from_slice::<T, _>(payload, bincode::config::standard()) {
            Ok((value, _)) => Ok(Some(value)),
            Err(e) => {
                warn!(record = tag.file_name(), error = %e, "discarding undecodable cache record");
                self.remove_record(tag)?;
                Ok(None)
            }
        }
    }

    fn write_record<T: Serialize + ?Sized>(&self, tag: RecordTag, value: &T) -> Result<()> {
        let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| Error::cache(format!("failed to encode {}: {}", tag.file_name(), e)))?;
        let bytes = encode_envelope(tag, &payload);

        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        let result = self.write_atomic(tag, &bytes);
        lock.unlock()?;
        result?;

        debug!(record = tag.file_name(), bytes = bytes.len(), "cache record written");
        Ok(())
    }

    fn write_atomic(&self, tag: RecordTag, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(tag))
            .map_err(|e| Error::cache(format!("failed to persist {}: {}", tag.file_name(), e)))?;
        Ok(())
    }

    fn remove_record(&self, tag: RecordTag) -> Result<()> {
        match fs::remove_file(self.path_for(tag)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl LocalCache for FileCache {
    fn load_user(&self) -> Result<Option<User>> {
        self.read_record(RecordTag::User)
    }

    fn store_user(&self, user: &User) -> Result<()> {
        self.write_record(RecordTag::User, user)
    }

    fn load_wallet(&self) -> Result<Option<Wallet>> {
        self.read_record(RecordTag::Wallet)
    }

    fn store_wallet(&self, wallet: &Wallet) -> Result<()> {
        self.write_record(RecordTag::Wallet, wallet)
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .read_record::<Vec<Transaction>>(RecordTag::Transactions)?
            .unwrap_or_default())
    }

    fn store_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        self.write_record(RecordTag::Transactions, transactions)
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.read_record(RecordTag::Settings)?.unwrap_or_default())
    }

    fn store_settings(&self, settings: &Settings) -> Result<()> {
        self.write_record(RecordTag::Settings, settings)
    }

    fn load_session(&self) -> Result<Option<Session>> {
        self.read_record(RecordTag::Session)
    }

    fn store_session(&self, session: &Session) -> Result<()> {
        self.write_record(RecordTag::Session, session)
    }

    fn clear_session(&self) -> Result<()> {
        self.remove_record(RecordTag::Session)
    }

    fn clear(&self) -> Result<()> {
        for tag in RecordTag::ALL {
            if tag != RecordTag::Settings {
                self.remove_record(tag)?;
            }
        }
        Ok(())
    }
}
