// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::GenericError;

#[derive(Debug, thiserror::Error)]
pub enum StorageEncodeError {
    #[error("encoding failed: {0}")]
    EncodeValue(GenericError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageDecodeError {
    #[error("failed reading codec: {0}")]
    ReadingCodec(String),
    #[error("decoding failed: {0}")]
    DecodeValue(GenericError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr, derive_more::Display)]
#[repr(u8)]
pub enum StorageCodecKind {
    // json + serde
    JsonSerde = 1,
}

impl From<StorageCodecKind> for u8 {
    fn from(value: StorageCodecKind) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for StorageCodecKind {
    type Error = StorageDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        StorageCodecKind::from_repr(value).ok_or(StorageDecodeError::ReadingCodec(format!(
            "unknown discriminant '{value}'"
        )))
    }
}

/// Codec which encodes [`StorageEncode`] implementations by first writing the
/// [`StorageEncode::DEFAULT_CODEC`] byte and then encoding the value part via
/// [`StorageEncode::encode`].
///
/// To decode a value, the codec first reads the codec byte and then calls
/// [`StorageDecode::decode`] providing the read codec.
pub struct StorageCodec;

impl StorageCodec {
    pub fn encode<T: StorageEncode, B: BufMut>(
        value: &T,
        buf: &mut B,
    ) -> Result<(), StorageEncodeError> {
        buf.put_u8(T::DEFAULT_CODEC.into());
        value.encode(buf)
    }

    /// Convenience wrapper around [`StorageCodec::encode`] which returns the encoded bytes.
    pub fn encode_to_bytes<T: StorageEncode>(value: &T) -> Result<Bytes, StorageEncodeError> {
        let mut buf = BytesMut::new();
        Self::encode(value, &mut buf)?;
        Ok(buf.freeze())
    }

    pub fn decode<T: StorageDecode, B: Buf>(buf: &mut B) -> Result<T, StorageDecodeError> {
        if buf.remaining() < mem::size_of::<u8>() {
            return Err(StorageDecodeError::ReadingCodec(format!(
                "remaining bytes in buf '{}' < codec bytes '{}'",
                buf.remaining(),
                mem::size_of::<u8>()
            )));
        }

        let codec = StorageCodecKind::try_from(buf.get_u8())?;
        T::decode(buf, codec)
    }
}

/// Trait to encode a value using the specified [`Self::DEFAULT_CODEC`].
pub trait StorageEncode {
    /// Codec which is used when encode new values.
    const DEFAULT_CODEC: StorageCodecKind;

    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), StorageEncodeError>;
}

/// Trait to decode a value given the [`StorageCodecKind`].
///
/// # Important
/// To support codec evolution, this trait implementation needs to be able to decode values encoded
/// with any previously used codec.
pub trait StorageDecode {
    fn decode<B: Buf>(buf: &mut B, kind: StorageCodecKind) -> Result<Self, StorageDecodeError>
    where
        Self: Sized;
}

impl<T: StorageEncode> StorageEncode for &T {
    const DEFAULT_CODEC: StorageCodecKind = T::DEFAULT_CODEC;

    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), StorageEncodeError> {
        (*self).encode(buf)
    }
}

/// Implements [`StorageEncode`] and [`StorageDecode`] by encoding/decoding the implementing
/// type as JSON using [`serde`]. JSON keeps the payloads readable with the store's own tooling.
#[macro_export]
macro_rules! json_storage_encode_decode {
    ($name:ty) => {
        impl $crate::storage::StorageEncode for $name {
            const DEFAULT_CODEC: $crate::storage::StorageCodecKind =
                $crate::storage::StorageCodecKind::JsonSerde;

            fn encode<B: ::bytes::BufMut>(
                &self,
                buf: &mut B,
            ) -> ::std::result::Result<(), $crate::storage::StorageEncodeError> {
                $crate::storage::encode_as_json(self, buf)
            }
        }

        impl $crate::storage::StorageDecode for $name {
            fn decode<B: ::bytes::Buf>(
                buf: &mut B,
                kind: $crate::storage::StorageCodecKind,
            ) -> ::std::result::Result<Self, $crate::storage::StorageDecodeError>
            where
                Self: Sized,
            {
                match kind {
                    $crate::storage::StorageCodecKind::JsonSerde => {
                        $crate::storage::decode_from_json(buf)
                    }
                }
            }
        }
    };
}

pub fn encode_as_json<T: Serialize, B: BufMut>(
    value: &T,
    buf: &mut B,
) -> Result<(), StorageEncodeError> {
    serde_json::to_writer(buf.writer(), value)
        .map_err(|err| StorageEncodeError::EncodeValue(err.into()))
}

pub fn decode_from_json<T: DeserializeOwned, B: Buf>(buf: &mut B) -> Result<T, StorageDecodeError> {
    serde_json::from_reader(buf.reader()).map_err(|err| StorageDecodeError::DecodeValue(err.into()))
}

json_storage_encode_decode!(u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Payload {
        name: String,
        value: u32,
    }

    json_storage_encode_decode!(Payload);

    #[test]
    fn encoded_values_carry_codec_byte() {
        let payload = Payload {
            name: "orders".to_owned(),
            value: 3,
        };
        let mut bytes = StorageCodec::encode_to_bytes(&payload).unwrap();
        assert_eq!(u8::from(StorageCodecKind::JsonSerde), bytes[0]);
        assert_eq!(payload, StorageCodec::decode::<Payload, _>(&mut bytes).unwrap());
    }

    #[test]
    fn empty_and_unknown_payloads_fail() {
        let mut empty = Bytes::new();
        assert!(matches!(
            StorageCodec::decode::<Payload, _>(&mut empty),
            Err(StorageDecodeError::ReadingCodec(_))
        ));

        let mut unknown = Bytes::from_static(&[42, b'{', b'}']);
        assert!(matches!(
            StorageCodec::decode::<Payload, _>(&mut unknown),
            Err(StorageDecodeError::ReadingCodec(_))
        ));
    }
}
