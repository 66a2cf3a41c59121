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

//! The subset of the Bitcoin wire vocabulary the sync core speaks. These
//! are decoded in-memory forms; framing and byte codecs belong to the
//! peer manager.

use martlet_core::block::BlockHeader;
use martlet_core::hash::{Hash, ZERO_HASH};
use martlet_core::transaction::Transaction;

/// Protocol version the client speaks.
pub const PROTOCOL_VERSION: u32 = 70015;

/// Maximum number of block headers a peer should ever send in one message.
pub const MAX_BLOCK_HEADERS: u32 = 2000;

/// An inventory item, a typed hash advertising or requesting data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Inventory {
	/// A transaction.
	Tx(Hash),
	/// A full block. The client never requests these but peers announce
	/// them.
	Block(Hash),
	/// A block to be delivered as a merkle block filtered through the
	/// peer's loaded bloom filter.
	FilteredBlock(Hash),
}

/// A bloom filter as loaded onto a remote peer: opaque filter bytes plus
/// the parameters the peer needs to probe it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BloomFilter {
	/// The filter bit field.
	pub data: Vec<u8>,
	/// Number of hash functions the filter was built with.
	pub hash_funcs: u32,
	/// Random tweak added to the hash seed.
	pub tweak: u32,
	/// Matched-element update behaviour flags.
	pub flags: u8,
}

impl BloomFilter {
	/// A filter that matches nothing; loading it would stop all
	/// transaction delivery.
	pub fn is_empty(&self) -> bool {
		self.data.iter().all(|b| *b == 0)
	}
}

/// Payload of a `getheaders` request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GetHeaders {
	/// Protocol version of the requester.
	pub version: u32,
	/// Known block hashes, densest near the tip, ending at genesis.
	pub locator: Vec<Hash>,
	/// Hash to stop at, or zero for as-many-as-possible.
	pub hash_stop: Hash,
}

impl GetHeaders {
	/// A request for as many headers after `locator` as the peer will give.
	pub fn after(locator: Vec<Hash>) -> GetHeaders {
		GetHeaders {
			version: PROTOCOL_VERSION,
			locator,
			hash_stop: ZERO_HASH,
		}
	}

	/// A request for the headers between `locator` and `hash_stop`.
	pub fn between(locator: Vec<Hash>, hash_stop: Hash) -> GetHeaders {
		GetHeaders {
			version: PROTOCOL_VERSION,
			locator,
			hash_stop,
		}
	}
}

/// A message exchanged with a peer, in decoded form.
#[derive(Clone, Debug)]
pub enum Message {
	/// Load a bloom filter onto the peer.
	FilterLoad(BloomFilter),
	/// A transaction, ours or theirs.
	Tx(Transaction),
	/// Request headers following a locator.
	GetHeaders(GetHeaders),
	/// Request inventory data.
	GetData(Vec<Inventory>),
	/// Keepalive probe, also used as an end-of-batch sentinel after a
	/// merkle block request.
	Ping(u64),
	/// Keepalive answer.
	Pong(u64),
	/// Headers answering a `GetHeaders`.
	Headers(Vec<BlockHeader>),
	/// Inventory announcement.
	Inv(Vec<Inventory>),
}
