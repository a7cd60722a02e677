use super::{FRAME_CRC, SYNC_H, SYNC_L};

/// Unwrap a result whose error cannot exist.
pub(crate) fn infallible<T>(r: Result<T, core::convert::Infallible>) -> T {
    match r {
        Ok(v) => v,
        Err(e) => match e {},
    }
}

/// A trait for serializing wire data.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else has a default in terms of write_u8; buffer-backed
    // impls specialize the bulk writes

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_le_bytes())
    }

    fn write_le_i16(&mut self, val: i16) -> Result<(), Self::Error> {
        self.write_le_u16(val as u16)
    }

    fn write_le_u32(&mut self, val: u32) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_le_bytes())
    }

    fn write_le_i32(&mut self, val: i32) -> Result<(), Self::Error> {
        self.write_le_u32(val as u32)
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_le_u16(val)
    }

    fn write_le_i16(&mut self, val: i16) -> Result<(), Self::Error> {
        (*self).write_le_i16(val)
    }

    fn write_le_u32(&mut self, val: u32) -> Result<(), Self::Error> {
        (*self).write_le_u32(val)
    }

    fn write_le_i32(&mut self, val: i32) -> Result<(), Self::Error> {
        (*self).write_le_i32(val)
    }
}

/// A serializer that only counts bytes written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerLength {
    len: usize,
}

impl SerializerLength {
    pub fn new() -> Self {
        SerializerLength { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Serializer for SerializerLength {
    type Error = core::convert::Infallible;

    fn write_u8(&mut self, _val: u8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.len += val.len();
        Ok(())
    }

    fn write_le_u16(&mut self, _val: u16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }

    fn write_le_i16(&mut self, _val: i16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }

    fn write_le_u32(&mut self, _val: u32) -> Result<(), Self::Error> {
        self.len += 4;
        Ok(())
    }

    fn write_le_i32(&mut self, _val: i32) -> Result<(), Self::Error> {
        self.len += 4;
        Ok(())
    }
}

/// A serializer writing into a fixed byte slice.
#[derive(Debug, PartialEq, Eq)]
pub struct SerializerSlice<'a> {
    buf: &'a mut [u8],
    len: usize,
}

/// The slice serializer ran out of room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferFull;

impl<'a> SerializerSlice<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn done(self) -> &'a [u8] {
        &self.buf[..self.len]
    }
}

impl<'a> Serializer for SerializerSlice<'a> {
    type Error = BufferFull;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        if self.len >= self.buf.len() {
            return Err(BufferFull);
        }
        self.buf[self.len] = val;
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        if self.len + val.len() > self.buf.len() {
            return Err(BufferFull);
        }
        self.buf[self.len..self.len + val.len()].copy_from_slice(val);
        self.len += val.len();
        Ok(())
    }
}

/// A serializer collecting into a Vec.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerVec {
    data: alloc::vec::Vec<u8>,
}

#[cfg(feature = "alloc")]
impl SerializerVec {
    pub fn new() -> Self {
        Self {
            data: alloc::vec::Vec::new(),
        }
    }

    pub fn done(self) -> alloc::vec::Vec<u8> {
        self.data
    }
}

#[cfg(feature = "alloc")]
impl Serializer for SerializerVec {
    type Error = core::convert::Infallible;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.data.push(val);
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.data.extend_from_slice(val);
        Ok(())
    }
}

/// Wrap a std::io::Write to become a Serializer.
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerWrap<T> {
    inner: T,
}

#[cfg(feature = "std")]
impl<T> SerializerWrap<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn done(self) -> T {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<T> Serializer for SerializerWrap<T>
where
    T: std::io::Write,
{
    type Error = std::io::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[val])
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(val)
    }
}

/// A serializer that also computes the frame CRC on the side.
pub struct SerializerCrc<T> {
    digest: crc::Digest<'static, u16, crc::Table<1>>,
    inner: T,
}

impl<T> SerializerCrc<T> {
    pub fn new(inner: T) -> Self {
        Self {
            digest: FRAME_CRC.digest(),
            inner,
        }
    }

    pub fn finalize(self) -> (u16, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<T> Serializer for SerializerCrc<T>
where
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update(&[val]);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// A trait for serializing messages.
pub trait MessageSerialize {
    /// The command byte for this message.
    fn command(&self) -> u8;

    /// Serialize just the message payload.
    ///
    /// Must be repeatable: the framing layer runs it twice, once to
    /// measure and once to write.
    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer;

    /// Serialize the message into a full frame, with sync bytes,
    /// length, and CRC.
    fn frame<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        // run it once to get a length
        let mut len_ser = SerializerLength::new();
        infallible(self.message_body(&mut len_ser));
        let len = len_ser.len() as u16;

        ser.write_u8(SYNC_H)?;
        ser.write_u8(SYNC_L)?;

        // the CRC covers command, length, and payload
        let mut crc_ser = SerializerCrc::new(ser);
        crc_ser.write_u8(self.command())?;
        crc_ser.write_le_u16(len)?;
        self.message_body(&mut crc_ser)?;
        let (crc, ser) = crc_ser.finalize();

        ser.write_le_u16(crc)
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::*;

    struct Empty(u8);

    impl MessageSerialize for Empty {
        fn command(&self) -> u8 {
            self.0
        }

        fn message_body<S>(&self, _ser: &mut S) -> Result<(), S::Error>
        where
            S: Serializer,
        {
            Ok(())
        }
    }

    #[test]
    fn empty_frame_layout() {
        // cmd 0x22, empty payload, 7 bytes total
        let mut ser = SerializerVec::new();
        infallible(Empty(0x22).frame(&mut ser));
        let bytes = ser.done();

        let crc = FRAME_CRC.checksum(&[0x22, 0x00, 0x00]);
        assert_eq!(
            bytes,
            alloc::vec![0xaa, 0x55, 0x22, 0x00, 0x00, (crc & 0xff) as u8, (crc >> 8) as u8]
        );
    }

    #[test]
    fn slice_serializer_overflow() {
        let mut buf = [0u8; 3];
        let mut ser = SerializerSlice::new(&mut buf);
        assert!(ser.write_le_u16(0x1234).is_ok());
        assert!(ser.write_u8(0x56).is_ok());
        assert_eq!(ser.write_u8(0x78), Err(BufferFull));
    }
}
