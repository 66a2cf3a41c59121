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

//! Base types the header chain hands out to the rest of the client.

use martlet_core::block::BlockHeader;
use martlet_core::hash::Hash;
use martlet_core::work::Work;

/// A header annotated with its position in the chain: height and the
/// cumulative work of the path from genesis up to and including it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderEntry {
	/// Hash of the header.
	pub hash: Hash,
	/// Distance from genesis.
	pub height: u64,
	/// Total work of the chain ending in this header.
	pub chain_work: Work,
	/// The header itself.
	pub header: BlockHeader,
}

impl HeaderEntry {
	/// Hash of the parent header.
	pub fn previous(&self) -> Hash {
		self.header.previous
	}
}

/// Outcome of inserting a header into the chain. Rejections are reported
/// through the error channel instead.
#[derive(Clone, Debug)]
pub enum HeaderAdded {
	/// The header was new and extends some branch of the chain.
	Accepted(HeaderEntry),
	/// The header was already present; nothing changed.
	Duplicate(HeaderEntry),
}

/// How a newly imported block relates to the previous best block, from the
/// wallet's point of view.
#[derive(Clone, Debug)]
pub enum ChainAction {
	/// The block extends the best chain.
	BestBlock(HeaderEntry),
	/// The block belongs to a heavier branch; the chain tail is replaced.
	Reorg {
		/// Last entry common to both branches.
		fork: HeaderEntry,
		/// Entries leaving the best chain, ascending by height.
		orphaned: Vec<HeaderEntry>,
		/// Entries joining the best chain, ascending by height; the last
		/// one is the newly imported block.
		adopted: Vec<HeaderEntry>,
	},
	/// The block belongs to a branch with no more work than the current
	/// one; recorded but the best block does not move.
	SideBlock(HeaderEntry),
}

impl ChainAction {
	/// The entry of the block the action is about.
	pub fn entry(&self) -> &HeaderEntry {
		match self {
			ChainAction::BestBlock(e) => e,
			ChainAction::SideBlock(e) => e,
			ChainAction::Reorg { adopted, fork, .. } => adopted.last().unwrap_or(fork),
		}
	}

	/// Whether the imported block becomes the new best block.
	pub fn advances_best(&self) -> bool {
		match self {
			ChainAction::BestBlock(_) | ChainAction::Reorg { .. } => true,
			ChainAction::SideBlock(_) => false,
		}
	}
}
