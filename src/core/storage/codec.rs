// src/core/storage/codec.rs

//! The versioned wire format for persisted cache entities.
//!
//! Snapshot layout: magic, 4-byte ASCII version, length-encoded entity
//! count, the entities, then a CRC-64 trailer over everything before it.
//! Each entity is a sequence of length-prefixed fields; optional fields sit
//! behind a flags byte. The format is self-contained and inspectable, with
//! no language-specific encoding.

use crate::core::storage::entity::CacheEntity;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{CRC_64_REDIS, Crc};
use std::io::{self, Error, ErrorKind};
use std::time::{Duration, UNIX_EPOCH};

pub const SNAPSHOT_MAGIC: &[u8] = b"PULLCDN\0";
pub const SNAPSHOT_VERSION: &[u8] = b"0001";

const FLAG_HAS_LAST_MODIFIED: u8 = 1 << 0;

const CHECKSUM_ALGO: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Serializes all entities into a single snapshot image.
pub fn encode_snapshot(entities: &[CacheEntity]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(SNAPSHOT_MAGIC);
    buf.put_slice(SNAPSHOT_VERSION);
    write_length_encoding(&mut buf, entities.len() as u64);
    for entity in entities {
        write_entity(&mut buf, entity);
    }
    let checksum = CHECKSUM_ALGO.checksum(&buf);
    buf.put_u64_le(checksum);
    buf.freeze()
}

/// Parses a snapshot image back into its entities.
///
/// Verifies the checksum before touching any field, then the magic and
/// version, then requires the payload to contain exactly the declared
/// number of entities with no trailing bytes.
pub fn decode_snapshot(data: &Bytes) -> io::Result<Vec<CacheEntity>> {
    let header_len = SNAPSHOT_MAGIC.len() + SNAPSHOT_VERSION.len();
    if data.len() < header_len + 8 {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Snapshot is too short for header and checksum",
        ));
    }

    let (data_part, checksum_part) = data.split_at(data.len() - 8);
    let expected_checksum = CHECKSUM_ALGO.checksum(data_part);
    let file_checksum = (&checksum_part[..]).get_u64_le();
    if expected_checksum != file_checksum {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Snapshot checksum mismatch. File may be corrupt.",
        ));
    }

    let mut cursor = Bytes::copy_from_slice(data_part);
    let magic = cursor.split_to(SNAPSHOT_MAGIC.len());
    if magic != SNAPSHOT_MAGIC {
        return Err(Error::new(ErrorKind::InvalidData, "Invalid snapshot magic"));
    }
    let version = cursor.split_to(SNAPSHOT_VERSION.len());
    if version != SNAPSHOT_VERSION {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Unsupported snapshot version",
        ));
    }

    let count = read_length_encoding(&mut cursor)? as usize;
    let mut entities = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        entities.push(read_entity(&mut cursor)?);
    }
    if cursor.has_remaining() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Trailing bytes after final snapshot entity",
        ));
    }
    Ok(entities)
}

fn write_entity(buf: &mut BytesMut, entity: &CacheEntity) {
    write_string(buf, entity.uri.as_bytes());
    buf.put_u16(entity.status);

    // Pre-epoch expiries clamp to zero; such an entity is stale regardless.
    let expires_ms = entity
        .expires
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    buf.put_u64_le(expires_ms);

    let mut flags = 0u8;
    if entity.last_modified.is_some() {
        flags |= FLAG_HAS_LAST_MODIFIED;
    }
    buf.put_u8(flags);
    if let Some(last_modified) = &entity.last_modified {
        write_string(buf, last_modified.as_bytes());
    }

    write_length_encoding(buf, entity.headers.len() as u64);
    for (name, value) in &entity.headers {
        write_string(buf, name.as_bytes());
        write_string(buf, value.as_bytes());
    }

    write_string(buf, &entity.content);
}

fn read_entity(cursor: &mut Bytes) -> io::Result<CacheEntity> {
    let uri = read_utf8_string(cursor)?;
    if cursor.remaining() < 2 {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            "Not enough data for entity status",
        ));
    }
    let status = cursor.get_u16();
    if cursor.remaining() < 8 {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            "Not enough data for entity expiry",
        ));
    }
    let expires = UNIX_EPOCH + Duration::from_millis(cursor.get_u64_le());

    if !cursor.has_remaining() {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            "Not enough data for entity flags",
        ));
    }
    let flags = cursor.get_u8();
    let last_modified = if flags & FLAG_HAS_LAST_MODIFIED != 0 {
        Some(read_utf8_string(cursor)?)
    } else {
        None
    };

    let header_count = read_length_encoding(cursor)? as usize;
    let mut headers = Vec::with_capacity(header_count.min(256));
    for _ in 0..header_count {
        let name = read_utf8_string(cursor)?;
        let value = read_utf8_string(cursor)?;
        headers.push((name, value));
    }

    let content = read_string(cursor)?;

    Ok(CacheEntity {
        uri,
        headers,
        expires,
        last_modified,
        status,
        content,
    })
}

// --- Length and String Encoding/Decoding Helpers ---

fn write_string(buf: &mut BytesMut, s: &[u8]) {
    write_length_encoding(buf, s.len() as u64);
    buf.put_slice(s);
}

fn read_string(cursor: &mut Bytes) -> io::Result<Bytes> {
    let len = read_length_encoding(cursor)? as usize;
    if cursor.remaining() < len {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            "Not enough data for string",
        ));
    }
    Ok(cursor.split_to(len))
}

fn read_utf8_string(cursor: &mut Bytes) -> io::Result<String> {
    let bytes = read_string(cursor)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::new(ErrorKind::InvalidData, "Invalid UTF-8 in snapshot string"))
}

fn write_length_encoding(buf: &mut BytesMut, len: u64) {
    if len < (1 << 6) {
        buf.put_u8(len as u8);
    } else if len < (1 << 14) {
        let val = (len | (1 << 14)) as u16;
        buf.put_u16(val);
    } else if len < (1 << 32) {
        buf.put_u8(0x80);
        buf.put_u32(len as u32);
    } else {
        buf.put_u8(0x81);
        buf.put_u64(len);
    }
}

fn read_length_encoding(cursor: &mut Bytes) -> io::Result<u64> {
    if !cursor.has_remaining() {
        return Err(Error::new(ErrorKind::UnexpectedEof, "Cannot read length"));
    }
    let first_byte = cursor.get_u8();
    match (first_byte & 0xC0) >> 6 {
        0b00 => Ok(u64::from(first_byte & 0x3F)),
        0b01 => {
            if !cursor.has_remaining() {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    "Cannot read 14-bit length",
                ));
            }
            let next_byte = cursor.get_u8();
            Ok(u64::from(
                ((first_byte as u16 & 0x3F) << 8) | next_byte as u16,
            ))
        }
        0b10 => match first_byte & 0x3F {
            0 => {
                if cursor.remaining() < 4 {
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "Cannot read 32-bit length",
                    ));
                }
                Ok(u64::from(cursor.get_u32()))
            }
            1 => {
                if cursor.remaining() < 8 {
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "Cannot read 64-bit length",
                    ));
                }
                Ok(cursor.get_u64())
            }
            _ => Err(Error::new(
                ErrorKind::InvalidData,
                "Unknown length encoding format",
            )),
        },
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            "Special encoding not supported as length",
        )),
    }
}
