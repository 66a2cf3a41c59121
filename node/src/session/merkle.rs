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

//! Merkle block and transaction ingestion, and the reassembler that turns
//! the unordered arrival stream back into parent-before-child wallet
//! deliveries.
//!
//! The reassembler only runs while no transaction request is inflight
//! anywhere. Without that interlock this sequence loses a confirmation:
//! a peer announces tx T, we request it, the merkle block confirming T
//! arrives and is imported without T, then T itself arrives as an
//! unconfirmed loose transaction.

use martlet_chain::HeaderChain;
use martlet_core::hash::Hash;
use martlet_core::merkle::MerkleBlock;
use martlet_core::transaction::Transaction;
use martlet_p2p::{PeerId, PeerManager};

use crate::error::Error;
use crate::session::Session;
use crate::wallet::WalletSink;

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// A merkle block arrived: release the peer's inflight slot, buffer
	/// the block if it checks out and try to move the wallet forward.
	/// While a rescan is pending every arrival is discarded; the rescan
	/// re-downloads the whole range anyway.
	pub(crate) fn merkle_block_received(&mut self, peer: PeerId, mb: MerkleBlock) {
		let hash = mb.block_hash();
		let entry = match self.chain.header_entry(&hash) {
			Some(entry) => entry,
			None => {
				debug!("unsolicited merkle block {} from {}", hash, peer);
				return;
			}
		};
		if let Some(state) = self.peer_state.get_mut(&peer) {
			if let Some(pos) = state
				.inflight_merkles
				.iter()
				.position(|(block, _)| block.hash == hash)
			{
				state.inflight_merkles.remove(pos);
			}
		}

		if !mb.root_matches() {
			warn!(
				"merkle root mismatch in {} from {}: {} != {}",
				hash, peer, mb.merkle_root, mb.header.merkle_root
			);
		} else if self.pending_rescan.is_none() {
			self.received_merkle.entry(entry.height).or_insert_with(Vec::new).push(mb);
			self.import_merkle_blocks();
			self.download_blocks(peer);
		}

		if self.pending_rescan.is_some() && self.peer_inflight_empty(&peer) {
			self.try_complete_rescan();
		}
	}

	/// A transaction arrived, either requested or pushed by the filter.
	/// Before the chain is caught up it is parked as a solo transaction;
	/// a merkle block may claim it later.
	pub(crate) fn transaction_received(&mut self, _peer: PeerId, tx: Transaction) {
		let txid = tx.txid();
		if self.merkle_synced() {
			self.wallet.import_txs(vec![tx]);
		} else {
			trace!("parking solo tx {}", txid);
			self.solo_txs.entry(txid).or_insert(tx);
		}
		for state in self.peer_state.values_mut() {
			state.inflight_txs.retain(|(hash, _)| *hash != txid);
		}
		// this may have been the last inflight tx holding imports back
		self.import_merkle_blocks();
	}

	pub(crate) fn peer_inflight_empty(&self, peer: &PeerId) -> bool {
		self.peer_state
			.get(peer)
			.map(|state| state.inflight_merkles.is_empty())
			.unwrap_or(true)
	}

	fn any_inflight_txs(&self) -> bool {
		self.peer_state
			.values()
			.any(|state| !state.inflight_txs.is_empty())
	}

	/// Imports every buffered merkle block whose parent the wallet
	/// already has, repeating until a pass makes no progress. Imports in
	/// ascending height order, so delivery is parent before child no
	/// matter how blocks arrived.
	pub(crate) fn import_merkle_blocks(&mut self) {
		if self.pending_rescan.is_some() || self.any_inflight_txs() {
			return;
		}
		loop {
			let mut imported = false;
			let candidates: Vec<Hash> = self
				.received_merkle
				.values()
				.flatten()
				.map(|mb| mb.block_hash())
				.collect();
			for hash in candidates {
				if !self.importable(&hash) {
					continue;
				}
				if let Some(mb) = self.remove_received(&hash) {
					if let Err(e) = self.import_merkle_block(mb) {
						debug!("import of merkle block {} failed: {}", hash, e);
					}
					imported = true;
				}
			}
			if !imported {
				return;
			}
			if self.merkle_synced() && !self.solo_txs.is_empty() {
				let txs: Vec<Transaction> =
					self.solo_txs.drain().map(|(_, tx)| tx).collect();
				debug!("chain caught up, importing {} solo txs", txs.len());
				self.wallet.import_txs(txs);
			}
		}
	}

	/// A block can go to the wallet when its parent can no longer arrive:
	/// the parent is genesis, the wallet already imported it, or it
	/// belongs to the pre-catchup era the wallet never sees.
	fn importable(&self, hash: &Hash) -> bool {
		let mb = match self.find_received(hash) {
			Some(mb) => mb,
			None => return false,
		};
		let prev = mb.header.previous;
		if prev == self.chain.genesis().hash || self.wallet.have_merkle_hash(&prev) {
			return true;
		}
		match self.chain.header_entry(&prev) {
			Some(entry) => entry.header.time < self.fast_catchup,
			None => false,
		}
	}

	fn find_received(&self, hash: &Hash) -> Option<&MerkleBlock> {
		self.received_merkle
			.values()
			.flatten()
			.find(|mb| mb.block_hash() == *hash)
	}

	fn remove_received(&mut self, hash: &Hash) -> Option<MerkleBlock> {
		let mut found: Option<(u64, usize)> = None;
		for (height, blocks) in self.received_merkle.iter() {
			if let Some(pos) = blocks.iter().position(|mb| mb.block_hash() == *hash) {
				found = Some((*height, pos));
				break;
			}
		}
		let (height, pos) = found?;
		let (mb, emptied) = {
			let blocks = self.received_merkle.get_mut(&height)?;
			let mb = blocks.remove(pos);
			(mb, blocks.is_empty())
		};
		if emptied {
			self.received_merkle.remove(&height);
		}
		Some(mb)
	}

	/// One block to the wallet: relate it to the previous best block,
	/// fold in any parked solo transactions it confirms, transactions
	/// first, then the block action itself.
	fn import_merkle_block(&mut self, mb: MerkleBlock) -> Result<(), Error> {
		let bid = mb.block_hash();
		let action = self.chain.connect_block(&self.best_block, &bid)?;
		let advances = action.advances_best();

		let mut txs: Vec<Transaction> = Vec::new();
		for tx in &mb.transactions {
			if !txs.iter().any(|t| t.txid() == tx.txid()) {
				txs.push(tx.clone());
			}
		}
		for txid in &mb.matched {
			if let Some(tx) = self.solo_txs.remove(txid) {
				if !txs.iter().any(|t| t.txid() == *txid) {
					txs.push(tx);
				}
			}
		}

		if advances {
			self.best_block = bid;
		}
		debug!(
			"importing merkle block {} ({} txs, advances {})",
			bid,
			txs.len(),
			advances
		);
		if !txs.is_empty() {
			self.wallet.import_txs(txs);
		}
		self.wallet.import_merkle_block(action, mb.matched);
		Ok(())
	}
}
