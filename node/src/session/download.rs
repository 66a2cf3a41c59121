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

//! The download scheduler: hands slices of the block queue to idle peers,
//! fetches announced transactions the wallet wants, and keeps the
//! per-peer inflight bookkeeping.

use chrono::prelude::Utc;
use rand::{thread_rng, Rng};

use martlet_chain::HeaderChain;
use martlet_core::hash::Hash;
use martlet_p2p::{GetHeaders, Inventory, Message, PeerId, PeerManager};

use crate::session::{BlockRef, Session};
use crate::types::MAX_MERKLE_BATCH;
use crate::wallet::WalletSink;

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// Whether a peer may be handed download work right now. The sync
	/// peer is spared (it is busy serving headers), a peer with inflight
	/// merkle blocks still owes us answers, and nothing moves without a
	/// bloom filter or during a pending rescan.
	pub(crate) fn can_download(&self, peer: &PeerId) -> bool {
		if self.sync_peer == Some(*peer) || self.bloom.is_none() || self.pending_rescan.is_some() {
			return false;
		}
		let handshaken = self
			.peers
			.peer_data(peer)
			.map(|data| data.handshaken)
			.unwrap_or(false);
		if !handshaken {
			return false;
		}
		self.peer_state
			.get(peer)
			.map(|state| state.inflight_merkles.is_empty())
			.unwrap_or(true)
	}

	/// The sole assigner of merkle-block work: moves up to
	/// `MAX_MERKLE_BATCH` of the lowest queued blocks the peer can serve
	/// (its advertised height caps the batch) into its inflight list and
	/// requests them, with a ping as end-of-batch sentinel.
	pub(crate) fn download_blocks(&mut self, peer: PeerId) {
		if !self.can_download(&peer) {
			return;
		}
		let peer_height = match self.peers.peer_data(&peer) {
			Some(data) => data.height,
			None => return,
		};

		let mut batch: Vec<BlockRef> = Vec::new();
		'queue: for (&height, hashes) in self.blocks_to_download.iter() {
			for &hash in hashes {
				if batch.len() == MAX_MERKLE_BATCH {
					break 'queue;
				}
				batch.push(BlockRef { height, hash });
			}
		}
		// blocks above the peer's advertised height stay queued for a
		// better-informed peer
		let cut = batch
			.iter()
			.position(|block| block.height > peer_height)
			.unwrap_or_else(|| batch.len());
		batch.truncate(cut);
		if batch.is_empty() {
			return;
		}

		for block in &batch {
			self.unqueue_block(block);
		}
		let now = Utc::now();
		let state = self.peer_state.entry(peer).or_insert_with(Default::default);
		state
			.inflight_merkles
			.extend(batch.iter().map(|block| (*block, now)));

		debug!(
			"requesting {} merkle blocks {}..{} from {}",
			batch.len(),
			batch[0].height,
			batch[batch.len() - 1].height,
			peer
		);
		let inventory = batch
			.iter()
			.map(|block| Inventory::FilteredBlock(block.hash))
			.collect();
		self.send(&peer, Message::GetData(inventory));
		self.send(&peer, Message::Ping(thread_rng().gen()));
	}

	fn unqueue_block(&mut self, block: &BlockRef) {
		let emptied = match self.blocks_to_download.get_mut(&block.height) {
			Some(hashes) => {
				if let Some(pos) = hashes.iter().position(|h| *h == block.hash) {
					hashes.remove(pos);
				}
				hashes.is_empty()
			}
			None => false,
		};
		if emptied {
			self.blocks_to_download.remove(&block.height);
		}
	}

	/// Requests transactions from a peer and tracks them inflight. Hashes
	/// already inflight to this peer are skipped.
	pub(crate) fn download_txs(&mut self, peer: PeerId, hashes: Vec<Hash>) {
		let now = Utc::now();
		let state = self.peer_state.entry(peer).or_insert_with(Default::default);
		let fresh: Vec<Hash> = hashes
			.into_iter()
			.filter(|hash| !state.inflight_txs.iter().any(|(h, _)| h == hash))
			.collect();
		if fresh.is_empty() {
			return;
		}
		state
			.inflight_txs
			.extend(fresh.iter().map(|hash| (*hash, now)));
		let inventory = fresh.into_iter().map(Inventory::Tx).collect();
		self.send(&peer, Message::GetData(inventory));
	}

	/// An inventory announcement: fetch wanted transactions, raise the
	/// peer's height for blocks we can place, and chase headers for
	/// blocks we cannot.
	pub(crate) fn inv_received(&mut self, peer: PeerId, invs: Vec<Inventory>) {
		let mut tx_hashes: Vec<Hash> = Vec::new();
		let mut block_hashes: Vec<Hash> = Vec::new();
		for inv in invs {
			match inv {
				Inventory::Tx(hash) => tx_hashes.push(hash),
				Inventory::Block(hash) | Inventory::FilteredBlock(hash) => {
					block_hashes.push(hash)
				}
			}
		}

		let wanted: Vec<Hash> = tx_hashes
			.into_iter()
			.filter(|hash| self.wallet.want_tx_hash(hash))
			.collect();
		if !wanted.is_empty() {
			self.download_txs(peer, wanted);
		}

		let mut known_height: Option<u64> = None;
		let mut unknown: Vec<Hash> = Vec::new();
		for hash in block_hashes {
			match self.chain.header_height(&hash) {
				Some(height) => {
					known_height = Some(known_height.map_or(height, |h| h.max(height)))
				}
				None => unknown.push(hash),
			}
		}
		if let Some(height) = known_height {
			self.peers.increase_peer_height(&peer, height);
		}
		if !unknown.is_empty() {
			let locator = self.chain.block_locator();
			self.peer_state
				.entry(peer)
				.or_insert_with(Default::default)
				.broadcast_blocks
				.extend(unknown.iter().cloned());
			for hash in unknown {
				debug!("peer {} announced unknown block {}", peer, hash);
				self.send(
					&peer,
					Message::GetHeaders(GetHeaders::between(locator.clone(), hash)),
				);
			}
		}
	}
}
