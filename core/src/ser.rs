// Copyright 2021 The Martlet Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Consensus serialization.
//!
//! Only the encoding direction is implemented: the client hashes headers
//! and transactions it already holds in decoded form, it never parses raw
//! network bytes itself (message framing and decoding belong to the peer
//! manager).

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::hash::Hash;

/// Types that know their Bitcoin consensus encoding.
pub trait Writeable {
	/// Write the consensus encoding of self.
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()>;

	/// Consensus encoding of self as a fresh byte vector.
	fn ser_vec(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		// writing into a Vec cannot fail
		let _ = self.write(&mut buf);
		buf
	}
}

/// Writes a Bitcoin variable-length integer (the "CompactSize" encoding).
pub fn write_varint<W: Write>(writer: &mut W, n: u64) -> io::Result<()> {
	match n {
		0..=0xfc => writer.write_u8(n as u8),
		0xfd..=0xffff => {
			writer.write_u8(0xfd)?;
			writer.write_u16::<LittleEndian>(n as u16)
		}
		0x10000..=0xffff_ffff => {
			writer.write_u8(0xfe)?;
			writer.write_u32::<LittleEndian>(n as u32)
		}
		_ => {
			writer.write_u8(0xff)?;
			writer.write_u64::<LittleEndian>(n)
		}
	}
}

/// Writes a length-prefixed byte string (scripts, filter data).
pub fn write_bytes<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
	write_varint(writer, data.len() as u64)?;
	writer.write_all(data)
}

impl Writeable for Hash {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_all(&self.0)
	}
}

impl Writeable for u32 {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u32::<LittleEndian>(*self)
	}
}

impl Writeable for u64 {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u64::<LittleEndian>(*self)
	}
}
