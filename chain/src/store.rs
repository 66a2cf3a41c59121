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

//! The `HeaderChain` interface the sync core drives, and `HeaderIndex`,
//! an in-memory implementation of it.

use std::collections::HashMap;

use chrono::prelude::{DateTime, Utc};
use chrono::Duration;

use martlet_core::block::BlockHeader;
use martlet_core::genesis::Network;
use martlet_core::hash::Hash;

use crate::error::{Error, ErrorKind};
use crate::types::{ChainAction, HeaderAdded, HeaderEntry};

/// Leeway accepted on header timestamps relative to adjusted network time.
const MAX_FUTURE_DRIFT_SECS: i64 = 2 * 60 * 60;

/// Proof-of-work check applied to candidate headers. Kept injectable so
/// tests can build chains without mining.
pub type PowVerifier = fn(&BlockHeader) -> bool;

/// The header-chain operations the sync core depends on. Implementations
/// must keep header insertion and best-chain selection atomic with respect
/// to each other.
pub trait HeaderChain: Send {
	/// Validates a header and connects it to the chain. `adjusted_time`
	/// bounds how far in the future the header timestamp may lie.
	fn connect_block_header(
		&mut self,
		header: &BlockHeader,
		adjusted_time: DateTime<Utc>,
	) -> Result<HeaderAdded, Error>;

	/// Relates the newly imported block `bid` to the previous best block
	/// `prev`, deciding between extension, reorg and side chain.
	fn connect_block(&mut self, prev: &Hash, bid: &Hash) -> Result<ChainAction, Error>;

	/// Entry of the header with the most cumulative work.
	fn best_header(&self) -> HeaderEntry;

	/// Height of the best header.
	fn best_header_height(&self) -> u64 {
		self.best_header().height
	}

	/// Entry for the given header hash, if the chain knows it.
	fn header_entry(&self, hash: &Hash) -> Option<HeaderEntry>;

	/// Whether the chain knows the given header hash.
	fn contains_header(&self, hash: &Hash) -> bool {
		self.header_entry(hash).is_some()
	}

	/// Height of the given header, if known.
	fn header_height(&self, hash: &Hash) -> Option<u64> {
		self.header_entry(hash).map(|e| e.height)
	}

	/// The latest best-chain entry whose timestamp is strictly before
	/// `ts`. Falls back to genesis when every entry is newer.
	fn block_before_timestamp(&self, ts: DateTime<Utc>) -> HeaderEntry;

	/// Best-chain blocks strictly after `from` up to the tip, ascending
	/// by height. `from` must be on the best chain.
	fn blocks_to_download(&self, from: &Hash) -> Result<Vec<(u64, Hash)>, Error>;

	/// Block locator for `GetHeaders`: best-chain hashes from the tip
	/// backwards with exponentially growing gaps, ending at genesis.
	fn block_locator(&self) -> Vec<Hash>;

	/// Entry of the genesis header.
	fn genesis(&self) -> HeaderEntry;
}

/// An in-memory header chain with cumulative-work best-chain selection.
/// Backs ephemeral nodes and every test in the workspace; a persistent
/// implementation can be swapped in behind the same trait.
pub struct HeaderIndex {
	entries: HashMap<Hash, HeaderEntry>,
	best: Hash,
	genesis: Hash,
	pow_verifier: PowVerifier,
}

impl HeaderIndex {
	/// Creates an index holding only the genesis header of `network`,
	/// verifying proof of work with `pow_verifier`.
	pub fn init(network: Network, pow_verifier: PowVerifier) -> Result<HeaderIndex, Error> {
		let header = network.genesis_header();
		let hash = header.hash();
		let work = header
			.bits
			.to_work()
			.ok_or(ErrorKind::InvalidDifficulty)?;
		let entry = HeaderEntry {
			hash,
			height: 0,
			chain_work: work,
			header,
		};
		let mut entries = HashMap::new();
		entries.insert(hash, entry);
		Ok(HeaderIndex {
			entries,
			best: hash,
			genesis: hash,
			pow_verifier,
		})
	}

	/// Creates an index with the full proof-of-work check enabled.
	pub fn new(network: Network) -> Result<HeaderIndex, Error> {
		HeaderIndex::init(network, |h| h.pow_is_valid())
	}

	fn entry(&self, hash: &Hash) -> Result<HeaderEntry, Error> {
		self.entries
			.get(hash)
			.cloned()
			.ok_or_else(|| ErrorKind::UnknownHeader(*hash).into())
	}

	fn parent(&self, entry: &HeaderEntry) -> Result<HeaderEntry, Error> {
		self.entry(&entry.previous())
	}
}

impl HeaderChain for HeaderIndex {
	fn connect_block_header(
		&mut self,
		header: &BlockHeader,
		adjusted_time: DateTime<Utc>,
	) -> Result<HeaderAdded, Error> {
		let hash = header.hash();
		if let Some(existing) = self.entries.get(&hash) {
			return Ok(HeaderAdded::Duplicate(existing.clone()));
		}
		let parent = self
			.entries
			.get(&header.previous)
			.ok_or(ErrorKind::Orphan)?;
		if header.time > adjusted_time + Duration::seconds(MAX_FUTURE_DRIFT_SECS) {
			return Err(ErrorKind::InvalidHeaderTime.into());
		}
		if !(self.pow_verifier)(header) {
			return Err(ErrorKind::InvalidPow.into());
		}
		let work = header
			.bits
			.to_work()
			.ok_or(ErrorKind::InvalidDifficulty)?;
		let entry = HeaderEntry {
			hash,
			height: parent.height + 1,
			chain_work: parent.chain_work + work,
			header: *header,
		};
		// strictly-greater work moves the tip; on ties the incumbent wins
		let best_work = self.best_header().chain_work;
		self.entries.insert(hash, entry.clone());
		if entry.chain_work > best_work {
			self.best = hash;
		}
		Ok(HeaderAdded::Accepted(entry))
	}

	fn connect_block(&mut self, prev: &Hash, bid: &Hash) -> Result<ChainAction, Error> {
		let new = self.entry(bid)?;
		let old = self.entry(prev)?;
		if new.previous() == *prev {
			return Ok(ChainAction::BestBlock(new));
		}
		if new.chain_work <= old.chain_work {
			return Ok(ChainAction::SideBlock(new));
		}
		// heavier sibling branch: walk both sides down to the fork point
		let mut orphaned = vec![];
		let mut adopted = vec![];
		let mut o = old;
		let mut n = new;
		while o.height > n.height {
			orphaned.push(o.clone());
			o = self.parent(&o)?;
		}
		while n.height > o.height {
			adopted.push(n.clone());
			n = self.parent(&n)?;
		}
		while o.hash != n.hash {
			orphaned.push(o.clone());
			adopted.push(n.clone());
			o = self.parent(&o)?;
			n = self.parent(&n)?;
		}
		orphaned.reverse();
		adopted.reverse();
		debug!(
			"reorg at {} ({}): {} orphaned, {} adopted",
			o.hash,
			o.height,
			orphaned.len(),
			adopted.len(),
		);
		Ok(ChainAction::Reorg {
			fork: o,
			orphaned,
			adopted,
		})
	}

	fn best_header(&self) -> HeaderEntry {
		self.entries
			.get(&self.best)
			.cloned()
			.expect("best header present in index")
	}

	fn header_entry(&self, hash: &Hash) -> Option<HeaderEntry> {
		self.entries.get(hash).cloned()
	}

	fn block_before_timestamp(&self, ts: DateTime<Utc>) -> HeaderEntry {
		let mut cur = self.best_header();
		while cur.header.time >= ts && cur.hash != self.genesis {
			match self.parent(&cur) {
				Ok(parent) => cur = parent,
				Err(_) => break,
			}
		}
		cur
	}

	fn blocks_to_download(&self, from: &Hash) -> Result<Vec<(u64, Hash)>, Error> {
		self.entry(from)?;
		let mut blocks = vec![];
		let mut cur = self.best_header();
		while cur.hash != *from {
			if cur.hash == self.genesis {
				return Err(ErrorKind::NotOnCurrentChain(*from).into());
			}
			blocks.push((cur.height, cur.hash));
			cur = self.parent(&cur)?;
		}
		blocks.reverse();
		Ok(blocks)
	}

	fn block_locator(&self) -> Vec<Hash> {
		let best = self.best_header();
		let mut locator = vec![];
		let mut cur = best.clone();
		for height in locator_heights(best.height) {
			while cur.height > height {
				match self.parent(&cur) {
					Ok(parent) => cur = parent,
					Err(_) => return locator,
				}
			}
			locator.push(cur.hash);
		}
		locator
	}

	fn genesis(&self) -> HeaderEntry {
		self.entries
			.get(&self.genesis)
			.cloned()
			.expect("genesis header present in index")
	}
}

// current height back to 0, decreasing in powers of 2
fn locator_heights(height: u64) -> Vec<u64> {
	let mut current = height;
	let mut heights = vec![];
	while current > 0 {
		heights.push(current);
		let next = 2u64.pow(heights.len() as u32);
		current = if current > next { current - next } else { 0 };
	}
	heights.push(0);
	heights
}
