/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A big endian, bounds checked reader over an in-memory buffer
//!
//! This wraps zune-core's `ZByteReader`, adding window checks to skips
//! and seeks and typed errors in place of its string messages.
//!
//! Every read either returns the requested bytes or fails, there is no
//! zero filling on short reads, a short read is the first sign of a misparsed
//! length field and we want to stop there rather than decode garbage.
use std::fmt::{Debug, Formatter};

use zune_core::bytestream::ZByteReader;

/// Low level errors from the byte cursor
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum ByteIoError {
    /// Requested, remaining
    NotEnoughBytes(usize, usize),
    /// Target, buffer length
    SeekOutOfRange(usize, usize)
}

impl Debug for ByteIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteIoError::NotEnoughBytes(requested, remaining) => {
                writeln!(f, "Not enough bytes, requested {requested} but {remaining} remain")
            }
            ByteIoError::SeekOutOfRange(target, len) => {
                writeln!(f, "Cannot seek to {target}, buffer length is {len}")
            }
        }
    }
}

/// Map the reader's untyped error after a successful `has` check.
///
/// Only reachable if the window shrinks under us, which a borrowed slice cannot.
fn reader_err(_: &'static str) -> ByteIoError {
    ByteIoError::NotEnoughBytes(0, 0)
}

macro_rules! get_reader_type {
    ($name:tt, $reader_fn:tt, $int_type:tt) => {
        #[doc = concat!("Read a big endian `", stringify!($int_type), "` advancing the position")]
        #[inline]
        pub fn $name(&mut self) -> Result<$int_type, ByteIoError> {
            self.ensure(core::mem::size_of::<$int_type>())?;
            self.reader.$reader_fn().map_err(reader_err)
        }
    };
}

macro_rules! get_cast_type {
    ($name:tt, $unsigned_fn:tt, $int_type:tt) => {
        #[doc = concat!("Read a big endian `", stringify!($int_type), "` advancing the position")]
        #[inline]
        pub fn $name(&mut self) -> Result<$int_type, ByteIoError> {
            Ok(self.$unsigned_fn()? as $int_type)
        }
    };
}

/// A cursor over a borrowed byte slice.
///
/// Reads go through zune's [`ZByteReader`], every movement is checked
/// against the window first so a short read fails without moving.
///
/// Sub cursors created by [`take`](ByteCursor::take) see only their own
/// window and report positions relative to it.
pub struct ByteCursor<'a> {
    data:   &'a [u8],
    reader: ZByteReader<&'a [u8]>
}

impl<'a> Clone for ByteCursor<'a> {
    fn clone(&self) -> Self {
        let mut reader = ZByteReader::new(self.data);
        reader.set_position(self.reader.get_position());
        ByteCursor { data: self.data, reader }
    }
}

impl<'a> ByteCursor<'a> {
    pub const fn new(data: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor {
            data,
            reader: ZByteReader::new(data)
        }
    }

    /// Current position from the start of this cursor's window
    #[inline]
    pub const fn position(&self) -> usize {
        self.reader.get_position()
    }

    /// Total window length
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the position and the end of the window
    #[inline]
    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.reader.eof()
    }

    /// Whether at least `num` bytes can be read
    #[inline]
    pub fn has(&self, num: usize) -> bool {
        self.reader.has(num)
    }

    #[inline]
    fn ensure(&self, num: usize) -> Result<(), ByteIoError> {
        if self.has(num) {
            Ok(())
        } else {
            Err(ByteIoError::NotEnoughBytes(num, self.remaining()))
        }
    }

    /// Move to an absolute offset in this window.
    ///
    /// Seeking exactly to the end is allowed, anything past it is not.
    pub fn seek(&mut self, offset: usize) -> Result<(), ByteIoError> {
        if offset > self.data.len() {
            return Err(ByteIoError::SeekOutOfRange(offset, self.data.len()));
        }
        self.reader.set_position(offset);
        Ok(())
    }

    /// Advance by `num` bytes
    pub fn skip(&mut self, num: usize) -> Result<(), ByteIoError> {
        self.ensure(num)?;
        self.reader.skip(num);
        Ok(())
    }

    /// Borrow the next `num` bytes and advance past them
    pub fn read_bytes(&mut self, num: usize) -> Result<&'a [u8], ByteIoError> {
        self.ensure(num)?;
        let start = self.reader.get_position();
        self.reader.skip(num);
        Ok(&self.data[start..start + num])
    }

    /// Borrow everything that is left, leaving the cursor at the end
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let start = self.reader.get_position().min(self.data.len());
        self.reader.set_position(self.data.len());
        &self.data[start..]
    }

    pub fn read_fixed_bytes<const N: usize>(&mut self) -> Result<[u8; N], ByteIoError> {
        self.ensure(N)?;
        self.reader.get_fixed_bytes_or_err::<N>().map_err(reader_err)
    }

    /// Look at the next `N` bytes without moving
    pub fn peek_fixed_bytes<const N: usize>(&self) -> Result<[u8; N], ByteIoError> {
        self.ensure(N)?;
        let mut out = [0; N];
        out.copy_from_slice(self.reader.peek_at(0, N).map_err(reader_err)?);
        Ok(out)
    }

    /// Split off a cursor over the next `num` bytes and advance this one
    /// past them.
    ///
    /// The parent moves by `num` no matter how much of the child is
    /// later consumed.
    pub fn take(&mut self, num: usize) -> Result<ByteCursor<'a>, ByteIoError> {
        Ok(ByteCursor::new(self.read_bytes(num)?))
    }

    get_reader_type!(read_u8, get_u8_err, u8);
    get_reader_type!(read_u16, get_u16_be_err, u16);
    get_reader_type!(read_u32, get_u32_be_err, u32);
    get_reader_type!(read_u64, get_u64_be_err, u64);

    get_cast_type!(read_i8, read_u8, i8);
    get_cast_type!(read_i16, read_u16, i16);
    get_cast_type!(read_i32, read_u32, i32);
    get_cast_type!(read_i64, read_u64, i64);

    /// Read a big endian IEEE single advancing the position
    pub fn read_f32(&mut self) -> Result<f32, ByteIoError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a big endian IEEE double advancing the position
    pub fn read_f64(&mut self) -> Result<f64, ByteIoError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}
