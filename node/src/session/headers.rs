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

//! Header synchronization: electing a sync peer, absorbing `headers`
//! messages into the chain and turning newly linked headers into download
//! work.

use chrono::prelude::Utc;

use martlet_chain::{HeaderAdded, HeaderChain, HeaderEntry};
use martlet_core::block::BlockHeader;
use martlet_p2p::{GetHeaders, Message, PeerId, PeerInfo, PeerManager};

use crate::session::Session;
use crate::wallet::WalletSink;

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// A peer finished its handshake: arm it with our bloom filter, flush
	/// transactions waiting for a first peer, ask it for headers (it may
	/// turn out faster than the current sync peer) and offer it download
	/// work.
	pub(crate) fn peer_handshake(&mut self, peer: PeerId, info: PeerInfo) {
		debug!(
			"peer {} handshaken, height {}, agent {}",
			peer, info.height, info.user_agent
		);
		self.peer_state.entry(peer).or_insert_with(Default::default);
		if let Some(filter) = self.bloom.clone() {
			self.send(&peer, Message::FilterLoad(filter));
		}
		let pending: Vec<_> = self.pending_tx_broadcast.drain(..).collect();
		for tx in pending {
			self.send(&peer, Message::Tx(tx));
		}
		let locator = self.chain.block_locator();
		self.send(&peer, Message::GetHeaders(GetHeaders::after(locator)));
		self.download_blocks(peer);
	}

	/// Absorbs a `headers` message: connect each header, split the newly
	/// accepted ones at the fast-catchup time into header-only and
	/// downloadable, and follow up with the peer if the chain grew.
	pub(crate) fn headers_received(&mut self, peer: PeerId, headers: Vec<BlockHeader>) {
		if headers.is_empty() {
			return;
		}
		let work_before = self.chain.best_header().chain_work;
		let now = Utc::now();

		let mut accepted: Vec<HeaderEntry> = Vec::with_capacity(headers.len());
		for header in &headers {
			match self.chain.connect_block_header(header, now) {
				Ok(HeaderAdded::Accepted(entry)) => accepted.push(entry),
				Ok(HeaderAdded::Duplicate(entry)) => {
					trace!("duplicate header {} from {}", entry.hash, peer);
				}
				Err(e) => {
					debug!("rejected header {} from {}: {}", header.hash(), peer, e);
				}
			}
		}

		// headers from before the catchup time are never downloaded; the
		// wallet's best block just moves past them when they out-work it
		let (header_only, downloadable): (Vec<_>, Vec<_>) = accepted
			.iter()
			.partition(|entry| entry.header.time < self.fast_catchup);
		if let Some(last) = header_only.last() {
			let best_work = self
				.chain
				.header_entry(&self.best_block)
				.map(|e| e.chain_work);
			if Some(last.chain_work) > best_work {
				debug!("advancing best block through header-only era to {}", last.hash);
				self.best_block = last.hash;
			}
		}
		let best_height = self.chain.header_height(&self.best_block).unwrap_or(0);
		for entry in downloadable {
			if entry.height >= best_height {
				self.enqueue_block(entry.height, entry.hash);
			}
		}

		// a header may resolve an earlier inv announcement; credit every
		// peer that announced it with the now-known height
		for entry in &accepted {
			self.resolve_broadcast_block(entry);
		}

		if self.chain.best_header().chain_work > work_before {
			let best = self.chain.best_header();
			self.peers.increase_peer_height(&peer, best.height);
			if self.headers_synced() {
				self.sync_peer = None;
			} else {
				self.sync_peer = Some(peer);
			}
			self.send(
				&peer,
				Message::GetHeaders(GetHeaders::after(vec![best.hash])),
			);
		}

		for other in self.peers.peer_keys() {
			self.download_blocks(other);
		}
	}

	/// Removes the entry's hash from every peer's announced-blocks list
	/// and raises those peers' heights to the entry's height.
	fn resolve_broadcast_block(&mut self, entry: &HeaderEntry) {
		let mut announcers: Vec<PeerId> = Vec::new();
		for (peer, state) in self.peer_state.iter_mut() {
			if let Some(pos) = state.broadcast_blocks.iter().position(|h| *h == entry.hash) {
				state.broadcast_blocks.remove(pos);
				announcers.push(*peer);
			}
		}
		for peer in announcers {
			self.peers.increase_peer_height(&peer, entry.height);
		}
	}
}
