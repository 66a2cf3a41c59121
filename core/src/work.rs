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

//! Proof-of-work arithmetic: the compact "nBits" difficulty encoding
//! carried in block headers and the 256-bit cumulative work derived from
//! it, which drives best-chain selection.

use std::fmt;
use std::ops::{Add, AddAssign};

use primitive_types::U256;

use crate::hash::Hash;

/// The compact difficulty encoding from a block header: one exponent byte
/// followed by a three-byte mantissa.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompactDifficulty(pub u32);

impl CompactDifficulty {
	const MANTISSA_MASK: u32 = 0x007f_ffff;
	const SIGN_BIT: u32 = 0x0080_0000;

	/// Expands the compact encoding into the full 256-bit target, or `None`
	/// if the encoding is negative, zero or overflows 256 bits.
	pub fn to_target(&self) -> Option<U256> {
		let exponent = (self.0 >> 24) as usize;
		let mantissa = self.0 & Self::MANTISSA_MASK;
		if mantissa == 0 || self.0 & Self::SIGN_BIT != 0 {
			return None;
		}
		let result = if exponent <= 3 {
			U256::from(mantissa >> (8 * (3 - exponent)))
		} else {
			let shift = 8 * (exponent - 3);
			if shift > 255 {
				return None;
			}
			let target = U256::from(mantissa) << shift;
			// shifting back recovers the mantissa iff nothing overflowed
			if target >> shift != U256::from(mantissa) {
				return None;
			}
			target
		};
		if result.is_zero() {
			None
		} else {
			Some(result)
		}
	}

	/// The expected work of a single block at this difficulty,
	/// `floor(2^256 / (target + 1))`.
	pub fn to_work(&self) -> Option<Work> {
		let target = self.to_target()?;
		// 2^256 / (t + 1) == ((2^256 - 1 - t) / (t + 1)) + 1 == !t / (t + 1) + 1
		let divisor = target + U256::one();
		Some(Work((!target / divisor) + U256::one()))
	}

	/// Whether the given header hash, interpreted as a little-endian
	/// 256-bit integer, meets this difficulty target.
	pub fn is_met_by(&self, hash: &Hash) -> bool {
		match self.to_target() {
			Some(target) => U256::from_little_endian(&hash.0) <= target,
			None => false,
		}
	}
}

/// Cumulative proof of work on a chain of headers.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Work(pub U256);

impl Work {
	/// The zero work of an empty chain.
	pub fn zero() -> Work {
		Work(U256::zero())
	}
}

impl fmt::Debug for Work {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Work({:x})", self.0)
	}
}

impl fmt::Display for Work {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:x}", self.0)
	}
}

impl Add for Work {
	type Output = Work;
	fn add(self, other: Work) -> Work {
		Work(self.0 + other.0)
	}
}

impl AddAssign for Work {
	fn add_assign(&mut self, other: Work) {
		self.0 = self.0 + other.0;
	}
}
