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

//! The session: the single-owner record of all sync coordination state and
//! the handlers that mutate it. Everything runs on the dispatcher thread;
//! the only calls out are peer-manager sends, header-chain operations and
//! wallet imports.

mod download;
mod headers;
mod heartbeat;
mod merkle;
mod rescan;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::prelude::{DateTime, Utc};

use martlet_chain::HeaderChain;
use martlet_core::hash::Hash;
use martlet_core::merkle::MerkleBlock;
use martlet_core::transaction::Transaction;
use martlet_p2p::{BloomFilter, GetHeaders, Message, PeerId, PeerManager};

use crate::error::Error;
use crate::types::{NodeConfig, NodeRequest, SessionStats};
use crate::wallet::WalletSink;

/// A block identified by its position in the chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BlockRef {
	pub height: u64,
	pub hash: Hash,
}

/// Everything the session tracks about one connected peer. Dropping the
/// record is the whole disconnect cleanup.
#[derive(Default)]
pub(crate) struct PeerSyncState {
	/// Merkle blocks requested from the peer, with request times.
	pub inflight_merkles: Vec<(BlockRef, DateTime<Utc>)>,
	/// Transactions requested from the peer, with request times.
	pub inflight_txs: Vec<(Hash, DateTime<Utc>)>,
	/// Blocks the peer announced whose headers we have not linked yet.
	/// Once the header lands the peer's height is raised retroactively.
	pub broadcast_blocks: Vec<Hash>,
}

/// The SPV session state machine.
pub struct Session<C, W, P> {
	pub(crate) chain: C,
	pub(crate) wallet: W,
	pub(crate) peers: Arc<P>,

	pub(crate) sync_peer: Option<PeerId>,
	pub(crate) bloom: Option<BloomFilter>,
	pub(crate) blocks_to_download: BTreeMap<u64, Vec<Hash>>,
	pub(crate) received_merkle: BTreeMap<u64, Vec<MerkleBlock>>,
	pub(crate) best_block: Hash,
	pub(crate) solo_txs: HashMap<Hash, Transaction>,
	pub(crate) pending_tx_broadcast: Vec<Transaction>,
	pub(crate) pending_rescan: Option<DateTime<Utc>>,
	pub(crate) fast_catchup: DateTime<Utc>,
	pub(crate) stall_timeout_secs: i64,
	pub(crate) peer_state: HashMap<PeerId, PeerSyncState>,
}

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// Builds the session and prepares the download queue. If the
	/// configured best block predates the fast-catchup time it is replaced
	/// with the catchup anchor, the latest header older than the catchup
	/// time.
	pub fn new(chain: C, wallet: W, peers: Arc<P>, config: NodeConfig) -> Result<Self, Error> {
		let best_block = match config.best_block {
			Some(hash) => hash,
			None => chain.genesis().hash,
		};
		let mut session = Session {
			chain,
			wallet,
			peers,
			sync_peer: None,
			bloom: None,
			blocks_to_download: BTreeMap::new(),
			received_merkle: BTreeMap::new(),
			best_block,
			solo_txs: HashMap::new(),
			pending_tx_broadcast: Vec::new(),
			pending_rescan: None,
			fast_catchup: config.fast_catchup,
			stall_timeout_secs: config.stall_timeout_secs,
			peer_state: HashMap::new(),
		};
		session.init()?;
		Ok(session)
	}

	fn init(&mut self) -> Result<(), Error> {
		let best = self
			.chain
			.header_entry(&self.best_block)
			.ok_or(Error::UnknownBestBlock(self.best_block))?;
		if best.header.time < self.fast_catchup {
			let anchor = self.chain.block_before_timestamp(self.fast_catchup);
			debug!(
				"catchup anchor {} at {} replaces best block {}",
				anchor.hash, anchor.height, self.best_block
			);
			self.best_block = anchor.hash;
		}
		self.rebuild_download_queue()?;
		info!(
			"session starting from {} with {} blocks to download",
			self.best_block,
			self.stats().queued_blocks
		);
		Ok(())
	}

	/// Recomputes the download queue as everything on the best chain past
	/// the current best block, skipping headers from before the catchup
	/// time (those stay header-only).
	pub(crate) fn rebuild_download_queue(&mut self) -> Result<(), Error> {
		self.blocks_to_download.clear();
		for (height, hash) in self.chain.blocks_to_download(&self.best_block)? {
			let downloadable = match self.chain.header_entry(&hash) {
				Some(entry) => entry.header.time >= self.fast_catchup,
				None => false,
			};
			if downloadable {
				self.enqueue_block(height, hash);
			}
		}
		Ok(())
	}

	/// Runs one request to completion. Never fails: every error is
	/// absorbed and logged here or below.
	pub fn dispatch(&mut self, req: NodeRequest) {
		match req {
			NodeRequest::FilterUpdate(filter) => self.filter_update(filter),
			NodeRequest::PublishTransaction(tx) => self.publish_transaction(tx),
			NodeRequest::Rescan(ts) => self.process_rescan(ts),
			NodeRequest::Heartbeat => self.heartbeat(),
			NodeRequest::PeerHandshake(peer, info) => self.peer_handshake(peer, info),
			NodeRequest::PeerDisconnect(peer) => self.peer_disconnect(peer),
			NodeRequest::PeerMessage(peer, msg) => self.peer_message(peer, msg),
			NodeRequest::PeerMerkleBlock(peer, mb) => self.merkle_block_received(peer, mb),
		}
	}

	fn peer_message(&mut self, peer: PeerId, msg: Message) {
		match msg {
			Message::Headers(headers) => self.headers_received(peer, headers),
			Message::Inv(invs) => self.inv_received(peer, invs),
			Message::Tx(tx) => self.transaction_received(peer, tx),
			other => trace!("ignoring {:?} from {}", other, peer),
		}
	}

	/// Installs a new bloom filter, pushes it to every handshaken peer and
	/// kicks the download scheduler, since peers without a filter are not
	/// eligible for merkle block requests.
	fn filter_update(&mut self, filter: BloomFilter) {
		if filter.is_empty() {
			debug!("ignoring empty bloom filter update");
			return;
		}
		if self.bloom.as_ref() == Some(&filter) {
			return;
		}
		self.bloom = Some(filter.clone());
		let handshaken = self.handshaken_peers();
		for peer in &handshaken {
			self.send(peer, Message::FilterLoad(filter.clone()));
		}
		for peer in handshaken {
			self.download_blocks(peer);
		}
	}

	/// Sends a wallet transaction to every handshaken peer, or holds it
	/// until the first one connects.
	fn publish_transaction(&mut self, tx: Transaction) {
		let handshaken = self.handshaken_peers();
		if handshaken.is_empty() {
			debug!("no peers for tx {}, holding for broadcast", tx.txid());
			self.pending_tx_broadcast.insert(0, tx);
			return;
		}
		for peer in &handshaken {
			self.send(peer, Message::Tx(tx.clone()));
		}
	}

	/// Cleans up after a lost peer: its unanswered merkle requests go back
	/// to the download queue, its record is dropped, and if it was driving
	/// header sync the remaining peers are asked for headers.
	fn peer_disconnect(&mut self, peer: PeerId) {
		debug!("peer {} disconnected", peer);
		if let Some(state) = self.peer_state.remove(&peer) {
			for (block, _) in state.inflight_merkles {
				self.enqueue_block(block.height, block.hash);
			}
		}
		if self.sync_peer == Some(peer) {
			self.sync_peer = None;
			let locator = self.chain.block_locator();
			for other in self.peers.peer_keys() {
				self.send(&other, Message::GetHeaders(GetHeaders::after(locator.clone())));
			}
		}
		for other in self.peers.peer_keys() {
			self.download_blocks(other);
		}
	}

	/// Queue a block for download, keeping per-height insertion order.
	pub(crate) fn enqueue_block(&mut self, height: u64, hash: Hash) {
		self.blocks_to_download
			.entry(height)
			.or_insert_with(Vec::new)
			.push(hash);
	}

	pub(crate) fn send(&self, peer: &PeerId, msg: Message) {
		if let Err(e) = self.peers.send_message(peer, msg) {
			debug!("send to {} failed: {:?}", peer, e);
		}
	}

	pub(crate) fn handshaken_peers(&self) -> Vec<PeerId> {
		self.peers
			.peers()
			.into_iter()
			.filter(|(_, data)| data.handshaken)
			.map(|(peer, _)| peer)
			.collect()
	}

	/// Headers are synced once our best header is at least as high as the
	/// best height any handshaken peer advertises.
	pub(crate) fn headers_synced(&self) -> bool {
		self.chain.best_header_height() >= self.peers.best_peer_height()
	}

	/// Merkle blocks are synced once the wallet's best block is at least
	/// as high as the best height any handshaken peer advertises.
	pub(crate) fn merkle_synced(&self) -> bool {
		let best_height = self.chain.header_height(&self.best_block).unwrap_or(0);
		best_height >= self.peers.best_peer_height()
	}

	/// Point-in-time counters of the coordination state.
	pub fn stats(&self) -> SessionStats {
		SessionStats {
			best_block: self.best_block,
			sync_peer: self.sync_peer,
			queued_blocks: self.blocks_to_download.values().map(Vec::len).sum(),
			inflight_merkles: self
				.peer_state
				.values()
				.map(|s| s.inflight_merkles.len())
				.sum(),
			inflight_txs: self.peer_state.values().map(|s| s.inflight_txs.len()).sum(),
			buffered_merkles: self.received_merkle.values().map(Vec::len).sum(),
			solo_txs: self.solo_txs.len(),
			pending_rescan: self.pending_rescan.is_some(),
		}
	}

	/// Structural self-check: a block hash may live in at most one of the
	/// download queue, any peer's inflight list and the received buffer;
	/// buffered blocks sit at their chain height; queued heights never
	/// fall below the wallet's best block. Cheap enough to run after every
	/// event in tests.
	pub fn check_consistency(&self) -> Result<(), String> {
		let mut seen: HashMap<Hash, &'static str> = HashMap::new();
		let mut track = |hash: Hash, place: &'static str| match seen.insert(hash, place) {
			Some(previous) => Err(format!(
				"block {} in both {} and {}",
				hash, previous, place
			)),
			None => Ok(()),
		};
		for (height, hashes) in &self.blocks_to_download {
			for hash in hashes {
				track(*hash, "download queue")?;
				if self.chain.header_height(hash) != Some(*height) {
					return Err(format!("queued block {} at wrong height {}", hash, height));
				}
			}
		}
		for state in self.peer_state.values() {
			for (block, _) in &state.inflight_merkles {
				track(block.hash, "inflight")?;
			}
		}
		for (height, blocks) in &self.received_merkle {
			for mb in blocks {
				let hash = mb.block_hash();
				track(hash, "received buffer")?;
				if self.chain.header_height(&hash) != Some(*height) {
					return Err(format!(
						"received block {} at wrong height {}",
						hash, height
					));
				}
			}
		}
		if let Some(best_height) = self.chain.header_height(&self.best_block) {
			if let Some(lowest) = self.blocks_to_download.keys().next() {
				if *lowest < best_height {
					return Err(format!(
						"queued height {} below best block height {}",
						lowest, best_height
					));
				}
			}
		}
		Ok(())
	}
}
