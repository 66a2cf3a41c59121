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

//! Decoded merkle blocks: a block header plus the transactions a remote
//! peer's bloom filter matched, proven included by a partial merkle tree.
//! The partial-tree reconstruction itself happens in the wire decoder;
//! what circulates in the client is the already-extracted result.

use crate::block::BlockHeader;
use crate::hash::Hash;
use crate::transaction::Transaction;

/// A merkle block as delivered by the wire decoder.
#[derive(Clone, Debug)]
pub struct MerkleBlock {
	/// Header of the filtered block.
	pub header: BlockHeader,
	/// Number of transactions in the full block.
	pub total_transactions: u32,
	/// Merkle root recomputed from the partial merkle tree.
	pub merkle_root: Hash,
	/// Txids the partial tree proves included, in block order.
	pub matched: Vec<Hash>,
	/// Matched transactions that have already arrived alongside the block.
	pub transactions: Vec<Transaction>,
}

impl MerkleBlock {
	/// Whether the recomputed root agrees with the header commitment.
	pub fn root_matches(&self) -> bool {
		self.merkle_root == self.header.merkle_root
	}

	/// Hash of the filtered block.
	pub fn block_hash(&self) -> Hash {
		self.header.hash()
	}
}
