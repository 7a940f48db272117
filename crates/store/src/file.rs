//! Single-file label storage with zstd compression.
//!
//! The file is a 14-byte header (magic, version, CRC32, payload length)
//! followed by a zstd-compressed bincode map of records. Every mutation
//! rewrites the whole file through a temp file and a rename, so a failed
//! write leaves the previous contents intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use texter_core::EntityId;
use tracing::{debug, info};

use crate::{LabelRecord, LabelStore, StoreError};

/// Magic number for label files ("TXLB").
const LABEL_FILE_MAGIC: u32 = 0x5458_4C42;

/// Current label file format version.
const LABEL_FILE_VERSION: u16 = 1;

/// Header length in bytes.
const HEADER_LEN: usize = 14;

/// zstd level (3 is the library default balance).
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone)]
struct LabelFileHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl LabelFileHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: LABEL_FILE_MAGIC,
            version: LABEL_FILE_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, StoreError> {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != LABEL_FILE_MAGIC {
            return Err(StoreError::Corrupt(format!(
                "invalid magic: expected 0x{LABEL_FILE_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != LABEL_FILE_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported version {version}"
            )));
        }

        Ok(Self {
            magic,
            version,
            crc32: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            payload_len: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
        })
    }
}

/// Label store persisted to one file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: BTreeMap<EntityId, LabelRecord>,
}

impl FileStore {
    /// Open the store at `path`, loading existing records if the file exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            read_label_file(&path)?
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), labels = records.len(), "Opened label store");

        Ok(Self { path, records })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write `next` to disk and adopt it only if the write succeeded.
    fn commit(&mut self, next: BTreeMap<EntityId, LabelRecord>) -> Result<(), StoreError> {
        write_label_file(&self.path, &next)?;
        self.records = next;
        Ok(())
    }
}

impl LabelStore for FileStore {
    fn insert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        match self.records.get(&record.entity_id) {
            Some(existing) if existing == record => Ok(()),
            Some(_) => Err(StoreError::Duplicate(record.entity_id)),
            None => self.upsert(record),
        }
    }

    fn upsert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        let mut next = self.records.clone();
        next.insert(record.entity_id, record.clone());
        self.commit(next)?;
        debug!(entity_id = record.entity_id, "Stored label");
        Ok(())
    }

    fn delete(&mut self, entity_id: EntityId) -> Result<(), StoreError> {
        if !self.records.contains_key(&entity_id) {
            return Ok(());
        }
        let mut next = self.records.clone();
        next.remove(&entity_id);
        self.commit(next)?;
        debug!(entity_id, "Deleted label");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<LabelRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }
}

fn read_label_file(path: &Path) -> Result<BTreeMap<EntityId, LabelRecord>, StoreError> {
    let mut file = File::open(path)?;

    let mut header_bytes = [0u8; HEADER_LEN];
    file.read_exact(&mut header_bytes)?;
    let header = LabelFileHeader::from_bytes(&header_bytes)?;

    let mut compressed = vec![0u8; header.payload_len as usize];
    file.read_exact(&mut compressed)?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let computed_crc = hasher.finalize();
    if computed_crc != header.crc32 {
        return Err(StoreError::Corrupt(format!(
            "CRC32 mismatch: expected {:08X}, got {:08X}",
            header.crc32, computed_crc
        )));
    }

    let decompressed = zstd::decode_all(&compressed[..])?;
    let records = bincode::deserialize(&decompressed)?;
    Ok(records)
}

fn write_label_file(
    path: &Path,
    records: &BTreeMap<EntityId, LabelRecord>,
) -> Result<(), StoreError> {
    let serialized = bincode::serialize(records)?;
    let compressed = zstd::encode_all(&serialized[..], COMPRESSION_LEVEL)?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let payload_len = u32::try_from(compressed.len())
        .map_err(|_| StoreError::Rejected("label file exceeds 4 GiB".into()))?;
    let header = LabelFileHeader::new(hasher.finalize(), payload_len);

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&header.to_bytes())?;
        file.write_all(&compressed)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
