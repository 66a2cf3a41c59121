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

//! Hash Function
//!
//! Double SHA256, the hash function used pervasively in the Bitcoin
//! protocol for blocks and transactions.

use std::fmt;

use sha2::{Digest, Sha256};

/// A hash to uniquely (or close enough) identify one of the main blockchain
/// constructs. Bytes are kept in wire order (little endian); `Display`
/// prints the conventional reversed hex form.
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for b in self.0.iter().rev() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Hash({})", self)
	}
}

impl Hash {
	/// Creates a new hash from a byte vector in wire order.
	pub fn from_vec(v: Vec<u8>) -> Hash {
		let mut a = [0; 32];
		a.copy_from_slice(&v[..32]);
		Hash(a)
	}

	/// Parses a hash from its reversed-hex display form.
	pub fn from_hex(s: &str) -> Result<Hash, hex::FromHexError> {
		let mut v = hex::decode(s)?;
		if v.len() != 32 {
			return Err(hex::FromHexError::InvalidStringLength);
		}
		v.reverse();
		Ok(Hash::from_vec(v))
	}

	/// Converts the hash to a byte vector in wire order.
	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}

	/// Converts the hash to a byte slice in wire order.
	pub fn to_slice(&self) -> &[u8] {
		&self.0
	}
}

/// The "zero" hash, used as the previous-block reference of the genesis
/// header and as the open-ended stop hash of locator queries.
pub const ZERO_HASH: Hash = Hash([0; 32]);

/// A trait for types that get their hash (double SHA256) from their byte
/// serialization.
pub trait Hashed {
	/// Byte serialization the hash is computed over.
	fn bytes(&self) -> Vec<u8>;

	/// Double SHA256 of the serialized bytes.
	fn hash(&self) -> Hash {
		Hash(sha256d(&self.bytes()))
	}
}

/// Double SHA256 of arbitrary data.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
	let first = Sha256::digest(data);
	let second = Sha256::digest(&first);
	let mut buf = [0; 32];
	buf.copy_from_slice(&second);
	buf
}

impl Hashed for [u8] {
	fn bytes(&self) -> Vec<u8> {
		self.to_owned()
	}
}
