use std::str;

use crate::error::WireError;

/// Longest legal varint: ten groups of seven bits cover a full `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// A protobuf byte buffer meant for reading.
///
/// Every read is bounds-checked against the wrapped slice, so a truncated or
/// malformed buffer produces an error instead of an out-of-bounds access.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_pb_schema::ByteBuffer::new(&[0x96, 0x01, 0x02, 0x68, 0x69]);
/// assert_eq!(bb.read_var_uint64(), Ok(150));
/// assert_eq!(bb.read_length_delimited(), Ok(&b"hi"[..]));
/// assert!(bb.is_empty());
/// ```
///
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left between the current index and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.index >= self.data.len()
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        if self.index >= self.data.len() {
            Err(WireError::TruncatedBuffer { offset: self.index })
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            Err(WireError::OutOfBounds {
                offset:    self.index,
                len,
                remaining: self.remaining(),
            })
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    /// Try to read a base-128 varint of up to 64 bits starting at the current
    /// index.
    pub fn read_var_uint64(&mut self) -> Result<u64, WireError> {
        let start = self.index;
        let mut result: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_byte()?;
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if (byte & 0x80) == 0 {
                return Ok(result);
            }
        }

        Err(WireError::MalformedVarint { offset: start })
    }

    /// Try to read a varint and truncate it to 32 bits, as protobuf does for
    /// `uint32` and `enum` values.
    pub fn read_var_uint32(&mut self) -> Result<u32, WireError> {
        Ok(self.read_var_uint64()? as u32)
    }

    /// Try to read an `int32`. Negative values arrive sign-extended to ten
    /// bytes.
    pub fn read_var_int32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_var_uint64()? as i32)
    }

    /// Try to read an `int64`.
    pub fn read_var_int64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_var_uint64()? as i64)
    }

    /// Try to read a zigzag encoded `sint32`.
    pub fn read_zigzag32(&mut self) -> Result<i32, WireError> {
        let value = self.read_var_uint64()? as u32;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    /// Try to read a zigzag encoded `sint64`.
    pub fn read_zigzag64(&mut self) -> Result<i64, WireError> {
        let value = self.read_var_uint64()?;
        Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
    }

    /// Try to read a boolean. Any non-zero varint is `true`.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_var_uint64()? != 0)
    }

    /// Try to read a little-endian `fixed32`.
    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Try to read a little-endian `fixed64`.
    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_sfixed32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_fixed32()? as i32)
    }

    pub fn read_sfixed64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_fixed64()? as i64)
    }

    pub fn read_float(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    pub fn read_double(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Try to read a varint length prefix followed by that many bytes. The
    /// returned slice aliases the underlying memory.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_var_uint64()?;
        if len > self.remaining() as u64 {
            return Err(WireError::OutOfBounds {
                offset:    self.index,
                len:       usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        self.read_bytes(len as usize)
    }

    /// Try to read everything left in the buffer as a UTF-8 string. Strings
    /// are always read from a region whose bounds were set by a length prefix.
    pub fn read_rest_as_string(&mut self) -> Result<String, WireError> {
        let bytes = self.read_bytes(self.remaining())?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }
}

#[test]
fn read_byte() {
    let read = |bytes| ByteBuffer::new(bytes).read_byte();
    assert_eq!(read(&[]), Err(WireError::TruncatedBuffer { offset: 0 }));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[255]), Ok(255));
}

#[test]
fn read_bytes() {
    let read = |bytes, len| ByteBuffer::new(bytes).read_bytes(len);
    assert_eq!(read(&[], 0), Ok(vec![].as_slice()));
    assert!(read(&[], 1).is_err());
    assert_eq!(read(&[0], 1), Ok(vec![0].as_slice()));
    assert_eq!(
        read(&[0], 2),
        Err(WireError::OutOfBounds { offset: 0, len: 2, remaining: 1 })
    );

    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.remaining(), 2);
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert!(bb.read_bytes(1).is_err());
    assert!(bb.is_empty());
}

#[test]
fn read_var_uint64() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_uint64();
    assert_eq!(read(&[]), Err(WireError::TruncatedBuffer { offset: 0 }));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(1));
    assert_eq!(read(&[127]), Ok(127));
    assert_eq!(read(&[128]), Err(WireError::TruncatedBuffer { offset: 1 }));
    assert_eq!(read(&[128, 1]), Ok(128));
    assert_eq!(read(&[0x96, 0x01]), Ok(150));
    assert_eq!(read(&[255, 255, 3]), Ok(65535));
    assert_eq!(read(&[255, 255, 255, 255, 15]), Ok(4294967295));
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(u64::MAX)
    );
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Err(WireError::MalformedVarint { offset: 0 })
    );
}

#[test]
fn read_var_int32() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_int32();
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[5]), Ok(5));
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(-1)
    );
    assert_eq!(
        read(&[0x80, 0x80, 0x80, 0x80, 0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i32::MIN)
    );
}

#[test]
fn read_zigzag() {
    let read32 = |bytes| ByteBuffer::new(bytes).read_zigzag32();
    assert_eq!(read32(&[0]), Ok(0));
    assert_eq!(read32(&[1]), Ok(-1));
    assert_eq!(read32(&[2]), Ok(1));
    assert_eq!(read32(&[3]), Ok(-2));
    assert_eq!(read32(&[0xFE, 0xFF, 0xFF, 0xFF, 0x0F]), Ok(i32::MAX));
    assert_eq!(read32(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]), Ok(i32::MIN));

    let read64 = |bytes| ByteBuffer::new(bytes).read_zigzag64();
    assert_eq!(read64(&[1]), Ok(-1));
    assert_eq!(read64(&[4]), Ok(2));
    assert_eq!(
        read64(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i64::MIN)
    );
}

#[test]
fn read_fixed() {
    let mut bb = ByteBuffer::new(&[
        0x01, 0x00, 0x00, 0x00, // fixed32 1
        0xFF, 0xFF, 0xFF, 0xFF, // sfixed32 -1
        0x00, 0x00, 0x80, 0x3F, // float 1.0
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F, // double 1.0
    ]);
    assert_eq!(bb.read_fixed32(), Ok(1));
    assert_eq!(bb.read_sfixed32(), Ok(-1));
    assert_eq!(bb.read_float(), Ok(1.0));
    assert_eq!(bb.read_double(), Ok(1.0));
    assert!(bb.read_fixed64().is_err());
}

#[test]
fn read_length_delimited() {
    let read = |bytes| ByteBuffer::new(bytes).read_length_delimited();
    assert_eq!(read(&[0]), Ok(vec![].as_slice()));
    assert_eq!(read(&[2, 104, 105]), Ok(&b"hi"[..]));
    assert_eq!(
        read(&[5, 104, 105]),
        Err(WireError::OutOfBounds { offset: 1, len: 5, remaining: 2 })
    );
    assert_eq!(read(&[0x80]), Err(WireError::TruncatedBuffer { offset: 1 }));
}

#[test]
fn read_rest_as_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_rest_as_string();
    assert_eq!(read(&[]), Ok(String::new()));
    assert_eq!(read(&[240, 159, 141, 149]), Ok("🍕".to_owned()));
    assert_eq!(read(&[97, 237, 160, 188, 99]), Err(WireError::InvalidUtf8));
}

/// A protobuf byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_pb_schema::ByteBufferMut::new();
/// bb.write_var_uint64(150);
/// bb.write_length_delimited(b"hi");
/// assert_eq!(bb.data(), [0x96, 0x01, 0x02, 0x68, 0x69]);
/// ```
///
#[derive(Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Creates an empty buffer that will not reallocate before `capacity`
    /// bytes have been written.
    pub fn with_capacity(capacity: usize) -> ByteBufferMut {
        ByteBufferMut {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a base-128 varint to the end of the buffer.
    pub fn write_var_uint64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.write_byte((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.write_byte(value as u8);
    }

    pub fn write_var_uint32(&mut self, value: u32) {
        self.write_var_uint64(value as u64);
    }

    /// Write an `int32`. Negative values are sign-extended to 64 bits and so
    /// always take ten bytes.
    pub fn write_var_int32(&mut self, value: i32) {
        self.write_var_uint64(value as i64 as u64);
    }

    pub fn write_var_int64(&mut self, value: i64) {
        self.write_var_uint64(value as u64);
    }

    /// Write a zigzag encoded `sint32`.
    pub fn write_zigzag32(&mut self, value: i32) {
        self.write_var_uint32(((value << 1) ^ (value >> 31)) as u32);
    }

    /// Write a zigzag encoded `sint64`.
    pub fn write_zigzag64(&mut self, value: i64) {
        self.write_var_uint64(((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(if value { 1 } else { 0 });
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_sfixed32(&mut self, value: i32) {
        self.write_fixed32(value as u32);
    }

    pub fn write_sfixed64(&mut self, value: i64) {
        self.write_fixed64(value as u64);
    }

    pub fn write_float(&mut self, value: f32) {
        self.write_fixed32(value.to_bits());
    }

    pub fn write_double(&mut self, value: f64) {
        self.write_fixed64(value.to_bits());
    }

    /// Write a varint length prefix followed by the bytes themselves.
    pub fn write_length_delimited(&mut self, value: &[u8]) {
        self.write_var_uint64(value.len() as u64);
        self.write_bytes(value);
    }
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_size(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_var_uint64() {
    assert_eq!(write_once(|bb| bb.write_var_uint64(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(1)), [1]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(127)), [127]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(128)), [128, 1]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(150)), [0x96, 0x01]);
    assert_eq!(
        write_once(|bb| bb.write_var_uint64(4294967295)),
        [255, 255, 255, 255, 15]
    );
    assert_eq!(
        write_once(|bb| bb.write_var_uint64(u64::MAX)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn write_var_int32() {
    assert_eq!(write_once(|bb| bb.write_var_int32(5)), [5]);
    assert_eq!(
        write_once(|bb| bb.write_var_int32(-1)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn write_zigzag() {
    assert_eq!(write_once(|bb| bb.write_zigzag32(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_zigzag32(-1)), [1]);
    assert_eq!(write_once(|bb| bb.write_zigzag32(1)), [2]);
    assert_eq!(write_once(|bb| bb.write_zigzag32(-2)), [3]);
    assert_eq!(write_once(|bb| bb.write_zigzag32(-64)), [127]);
    assert_eq!(write_once(|bb| bb.write_zigzag32(64)), [128, 1]);
    assert_eq!(
        write_once(|bb| bb.write_zigzag32(i32::MIN)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]
    );
    assert_eq!(
        write_once(|bb| bb.write_zigzag64(i64::MIN)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn write_fixed() {
    assert_eq!(write_once(|bb| bb.write_fixed32(1)), [1, 0, 0, 0]);
    assert_eq!(write_once(|bb| bb.write_sfixed32(-1)), [255, 255, 255, 255]);
    assert_eq!(write_once(|bb| bb.write_float(1.0)), [0x00, 0x00, 0x80, 0x3F]);
    assert_eq!(
        write_once(|bb| bb.write_double(1.0)),
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]
    );
    assert_eq!(write_once(|bb| bb.write_fixed64(2)), [2, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn varint_size_matches_writer() {
    for value in [0, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX] {
        let mut bb = ByteBufferMut::new();
        bb.write_var_uint64(value);
        assert_eq!(varint_size(value), bb.len(), "value {}", value);
    }
}

#[test]
fn write_then_read_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_var_uint64(123456789);
    bb.write_zigzag64(-42);
    bb.write_length_delimited("🍕".as_bytes());
    bb.write_double(-0.5);
    let data = bb.data();

    let mut rb = ByteBuffer::new(&data);
    assert_eq!(rb.read_var_uint64(), Ok(123456789));
    assert_eq!(rb.read_zigzag64(), Ok(-42));
    assert_eq!(rb.read_length_delimited(), Ok("🍕".as_bytes()));
    assert_eq!(rb.read_double(), Ok(-0.5));
    assert!(rb.is_empty());
}
