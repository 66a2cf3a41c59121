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

//! Block headers. The client never holds full blocks; the 80-byte header
//! is the unit the chain is built from.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::prelude::{DateTime, TimeZone, Utc};

use crate::hash::{Hash, Hashed};
use crate::ser::Writeable;
use crate::work::CompactDifficulty;

/// Size of a serialized block header in bytes.
pub const HEADER_SIZE: usize = 80;

/// A Bitcoin block header, chained to its parent through the previous-block
/// hash and committing to the block's transactions through the merkle root.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
	/// Block version, as signalled by the miner.
	pub version: u32,
	/// Hash of the previous block header.
	pub previous: Hash,
	/// Root of the transaction merkle tree.
	pub merkle_root: Hash,
	/// Miner-reported block time.
	pub time: DateTime<Utc>,
	/// Compact encoding of the proof-of-work target.
	pub bits: CompactDifficulty,
	/// Proof-of-work nonce.
	pub nonce: u32,
}

impl Writeable for BlockHeader {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u32::<LittleEndian>(self.version)?;
		self.previous.write(writer)?;
		self.merkle_root.write(writer)?;
		writer.write_u32::<LittleEndian>(self.time.timestamp() as u32)?;
		writer.write_u32::<LittleEndian>(self.bits.0)?;
		writer.write_u32::<LittleEndian>(self.nonce)
	}
}

impl Hashed for BlockHeader {
	fn bytes(&self) -> Vec<u8> {
		self.ser_vec()
	}
}

impl BlockHeader {
	/// Hash identifying this block.
	pub fn hash(&self) -> Hash {
		Hashed::hash(self)
	}

	/// Whether the header's own hash satisfies its declared target.
	pub fn pow_is_valid(&self) -> bool {
		self.bits.is_met_by(&self.hash())
	}

	/// Builds a header from its raw consensus fields, with the time given
	/// as a unix timestamp.
	pub fn from_raw(
		version: u32,
		previous: Hash,
		merkle_root: Hash,
		time: u32,
		bits: u32,
		nonce: u32,
	) -> BlockHeader {
		BlockHeader {
			version,
			previous,
			merkle_root,
			time: Utc.timestamp(time as i64, 0),
			bits: CompactDifficulty(bits),
			nonce,
		}
	}
}
