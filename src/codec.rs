//! The primitive and composite field codecs packets are built from.
//!
//! Every codec here packs into / unpacks from plain byte buffers rather than
//! tagged TLV structs: PPL and ERCI fields are positional, not tagged, so
//! there's no type byte on the wire the way there is in a tagstruct protocol.
//! Each codec is a zero-sized marker type implementing [`Codec`], mirroring
//! the source's `create_struct_fmt_type`/`create_array_type`/etc. factories,
//! but resolved at compile time instead of constructed dynamically.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};
use std::io::Write;
use std::net::Ipv4Addr;

use crate::error::{DeserializeError, SerializeError};

/// A fixed-shape field codec: packs a `Value` to bytes and back.
pub trait Codec {
    /// The Rust type this codec moves to and from the wire.
    type Value;

    /// The value used when a field is omitted from an input document.
    fn default_value() -> Self::Value;

    /// Append the wire encoding of `value` to `buf`.
    fn pack(value: &Self::Value, buf: &mut Vec<u8>) -> Result<(), SerializeError>;

    /// Decode a value from the front of `data`, returning the value and the
    /// number of bytes consumed.
    fn unpack(data: &[u8]) -> Result<(Self::Value, usize), DeserializeError>;
}

fn need(data: &[u8], len: usize) -> Result<(), DeserializeError> {
    if data.len() < len {
        Err(DeserializeError::UnexpectedEof {
            needed: len,
            available: data.len(),
        })
    } else {
        Ok(())
    }
}

macro_rules! int_codec {
    ($name:ident, $ty:ty, $order:ty, $read:ident, $write:ident, $size:expr) => {
        /// Fixed-width integer codec.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Codec for $name {
            type Value = $ty;

            fn default_value() -> $ty {
                0
            }

            fn pack(value: &$ty, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
                buf.$write::<$order>(*value)?;
                Ok(())
            }

            fn unpack(data: &[u8]) -> Result<($ty, usize), DeserializeError> {
                need(data, $size)?;
                let mut cur = &data[..$size];
                let v = cur.$read::<$order>()?;
                Ok((v, $size))
            }
        }
    };
}

macro_rules! byte_codec {
    ($name:ident, $ty:ty, $read:ident, $write:ident) => {
        /// Single-byte integer codec (no byte order to speak of).
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Codec for $name {
            type Value = $ty;

            fn default_value() -> $ty {
                0
            }

            fn pack(value: &$ty, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
                buf.$write(*value)?;
                Ok(())
            }

            fn unpack(data: &[u8]) -> Result<($ty, usize), DeserializeError> {
                need(data, 1)?;
                let mut cur = &data[..1];
                let v = cur.$read()?;
                Ok((v, 1))
            }
        }
    };
}

byte_codec!(U8, u8, read_u8, write_u8);
byte_codec!(I8, i8, read_i8, write_i8);

int_codec!(U16Be, u16, BigEndian, read_u16, write_u16, 2);
int_codec!(U16Le, u16, LittleEndian, read_u16, write_u16, 2);
int_codec!(I16Be, i16, BigEndian, read_i16, write_i16, 2);
int_codec!(I16Le, i16, LittleEndian, read_i16, write_i16, 2);
int_codec!(U32Be, u32, BigEndian, read_u32, write_u32, 4);
int_codec!(U32Le, u32, LittleEndian, read_u32, write_u32, 4);
int_codec!(I32Be, i32, BigEndian, read_i32, write_i32, 4);
int_codec!(I32Le, i32, LittleEndian, read_i32, write_i32, 4);
int_codec!(U64Be, u64, BigEndian, read_u64, write_u64, 8);
int_codec!(U64Le, u64, LittleEndian, read_u64, write_u64, 8);
int_codec!(I64Be, i64, BigEndian, read_i64, write_i64, 8);
int_codec!(I64Le, i64, LittleEndian, read_i64, write_i64, 8);
int_codec!(F32Be, f32, BigEndian, read_f32, write_f32, 4);
int_codec!(F32Le, f32, LittleEndian, read_f32, write_f32, 4);
int_codec!(F64Be, f64, BigEndian, read_f64, write_f64, 8);
int_codec!(F64Le, f64, LittleEndian, read_f64, write_f64, 8);

/// Big-endian IPv4 address (network byte order, the common case).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv4Be;

impl Codec for Ipv4Be {
    type Value = Ipv4Addr;

    fn default_value() -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn pack(value: &Ipv4Addr, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        buf.write_all(&value.octets())?;
        Ok(())
    }

    fn unpack(data: &[u8]) -> Result<(Ipv4Addr, usize), DeserializeError> {
        need(data, 4)?;
        Ok((Ipv4Addr::new(data[0], data[1], data[2], data[3]), 4))
    }
}

/// Little-endian IPv4 address, matching a handful of legacy PPL fields that
/// store addresses byte-swapped relative to network order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv4Le;

impl Codec for Ipv4Le {
    type Value = Ipv4Addr;

    fn default_value() -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn pack(value: &Ipv4Addr, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        let o = value.octets();
        buf.extend_from_slice(&[o[3], o[2], o[1], o[0]]);
        Ok(())
    }

    fn unpack(data: &[u8]) -> Result<(Ipv4Addr, usize), DeserializeError> {
        need(data, 4)?;
        Ok((Ipv4Addr::new(data[3], data[2], data[1], data[0]), 4))
    }
}

/// 6-byte MAC address, big-endian (network order).
#[derive(Debug, Clone, Copy, Default)]
pub struct MacCodec;

impl Codec for MacCodec {
    type Value = crate::mac::MacAddress;

    fn default_value() -> crate::mac::MacAddress {
        crate::mac::MacAddress::ZERO
    }

    fn pack(value: &crate::mac::MacAddress, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        buf.extend_from_slice(&value.octets());
        Ok(())
    }

    fn unpack(data: &[u8]) -> Result<(crate::mac::MacAddress, usize), DeserializeError> {
        need(data, 6)?;
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&data[..6]);
        Ok((crate::mac::MacAddress::from_octets(octets), 6))
    }
}

/// A `u16`-length-prefixed string. Packed as Latin-1 (each `char` truncated
/// to its low byte); unpacked as UTF-8. This asymmetry is inherited directly
/// from the system this runtime replaces and is deliberate, not a bug — see
/// DESIGN.md.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizedString;

impl Codec for SizedString {
    type Value = String;

    fn default_value() -> String {
        String::new()
    }

    fn pack(value: &String, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        if value.chars().count() > u16::MAX as usize {
            return Err(SerializeError::StringTooLong {
                value: value.clone(),
                max: u16::MAX as usize,
            });
        }
        let latin1: Vec<u8> = value.chars().map(|c| c as u32 as u8).collect();
        buf.write_u16::<BigEndian>(latin1.len() as u16)?;
        buf.extend_from_slice(&latin1);
        Ok(())
    }

    fn unpack(data: &[u8]) -> Result<(String, usize), DeserializeError> {
        need(data, 2)?;
        let len = BigEndian::read_u16(&data[..2]) as usize;
        need(&data[2..], len)?;
        let bytes = &data[2..2 + len];
        let s = String::from_utf8_lossy(bytes).into_owned();
        Ok((s, 2 + len))
    }
}

/// A `u16`-element-count-prefixed array of homogeneous elements.
pub struct VariableArray<T>(std::marker::PhantomData<T>);

impl<T: Codec> VariableArray<T> {
    /// Pack `values` with a `u16` big-endian element count prefix.
    pub fn pack(values: &[T::Value], buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        if values.len() > u16::MAX as usize {
            return Err(SerializeError::CollectionTooLong {
                len: values.len(),
                max: u16::MAX as usize,
            });
        }
        buf.write_u16::<BigEndian>(values.len() as u16)?;
        for v in values {
            T::pack(v, buf)?;
        }
        Ok(())
    }

    /// Unpack a `u16`-count-prefixed array, returning the elements and total
    /// bytes consumed (including the count prefix).
    pub fn unpack(data: &[u8]) -> Result<(Vec<T::Value>, usize), DeserializeError> {
        need(data, 2)?;
        let count = BigEndian::read_u16(&data[..2]) as usize;
        let mut offset = 2;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let (v, n) = T::unpack(&data[offset..])?;
            out.push(v);
            offset += n;
        }
        Ok((out, offset))
    }
}

/// A fixed-length array of exactly `N` elements, with no length prefix.
pub struct FixedArray<T, const N: usize>(std::marker::PhantomData<T>);

impl<T: Codec, const N: usize> FixedArray<T, N>
where
    T::Value: Copy + Default,
{
    /// Pack exactly `N` elements, with no length prefix.
    pub fn pack(values: &[T::Value; N], buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        for v in values {
            T::pack(v, buf)?;
        }
        Ok(())
    }

    /// Unpack exactly `N` elements.
    pub fn unpack(data: &[u8]) -> Result<([T::Value; N], usize), DeserializeError> {
        let mut out = [T::Value::default(); N];
        let mut offset = 0;
        for slot in out.iter_mut() {
            let (v, n) = T::unpack(&data[offset..])?;
            *slot = v;
            offset += n;
        }
        Ok((out, offset))
    }
}

/// TLV quad-length framing used by `DeviceDiagnostics`: a one-byte length
/// field counts 4-byte quads covering the tag byte plus payload,
/// `ceil((1 + payload.len()) / 4)`, with zero padding to the quad boundary.
/// A quad count of 0 or 1 can't hold a tag byte plus any real payload, so
/// it's never produced by `pack` and is rejected by `unpack`.
pub struct Tlv;

impl Tlv {
    /// Number of quads needed to hold a 1-byte tag plus `payload_len` bytes,
    /// clamped to the minimum of 2 quads a valid TLV entry requires.
    pub fn quad_count(payload_len: usize) -> usize {
        (1 + payload_len).div_ceil(4).max(2)
    }

    /// Pack `tag` and `payload` into a quad-aligned, zero-padded TLV entry.
    pub fn pack(tag: u8, payload: &[u8], buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        let quads = Self::quad_count(payload.len());
        if quads > u8::MAX as usize {
            return Err(SerializeError::CollectionTooLong {
                len: payload.len(),
                max: (u8::MAX as usize) * 4 - 1,
            });
        }
        buf.write_u8(quads as u8)?;
        buf.write_u8(tag)?;
        buf.extend_from_slice(payload);
        let total = quads * 4;
        let written = 2 + payload.len();
        buf.resize(buf.len() + total.saturating_sub(written), 0);
        Ok(())
    }

    /// Unpack a TLV entry, returning `(tag, padded_payload, bytes_consumed)`.
    /// The payload includes any zero padding; callers that embed a further
    /// length or terminator inside it are responsible for trimming it.
    pub fn unpack(data: &[u8]) -> Result<(u8, Vec<u8>, usize), DeserializeError> {
        need(data, 1)?;
        let quads = data[0] as usize;
        if quads < 2 {
            return Err(DeserializeError::TlvTooShort(quads));
        }
        let total = quads * 4;
        need(data, total)?;
        let tag = data[1];
        let payload = data[2..total].to_vec();
        Ok((tag, payload, total))
    }
}

/// An enum codec over an underlying `u8` discriminant, requiring the enum to
/// define a zero member (enforced once at registry build time via
/// [`EnumSpec::validate_has_zero`], not on every decode). Discriminant
/// conversion is provided by a `#[derive(Primitive)]` (`enum_primitive_derive`)
/// on the implementing enum, not by a hand-written lookup table.
pub trait EnumSpec: FromPrimitive + ToPrimitive + Copy + 'static {
    /// Human-readable name used in error messages.
    const NAME: &'static str;

    /// Converts to the wire discriminant.
    fn to_u8(self) -> u8 {
        ToPrimitive::to_u8(&self).expect("Primitive-derived enum always fits in a u8")
    }

    /// Panics if this enum has no zero-valued member, per the codec
    /// invariant that every wire enum must decode byte `0` to something.
    fn validate_has_zero() {
        assert!(
            Self::from_u8(0).is_some(),
            "enum {} has no zero member, violating the codec's zero-member invariant",
            Self::NAME
        );
    }
}

/// Codec for any [`EnumSpec`], backed by a single wire byte.
pub struct Enum<E>(std::marker::PhantomData<E>);

impl<E: EnumSpec> Codec for Enum<E> {
    type Value = E;

    fn default_value() -> E {
        E::from_u8(0).expect("enum codec requires a zero member")
    }

    /// Pack the enum's discriminant byte.
    fn pack(value: &E, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        buf.write_u8(value.to_u8())?;
        Ok(())
    }

    /// Unpack a discriminant byte, failing if it names no variant.
    fn unpack(data: &[u8]) -> Result<(E, usize), DeserializeError> {
        need(data, 1)?;
        let raw = data[0];
        E::from_u8(raw)
            .map(|e| (e, 1))
            .ok_or(DeserializeError::InvalidEnumValue(raw as i64, E::NAME))
    }
}
