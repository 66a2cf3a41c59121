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

//! Rescans: rewinding the wallet's view to an earlier point in time and
//! re-downloading every merkle block since. A rescan must not interleave
//! with answers to earlier merkle requests, so it waits for all inflight
//! merkle blocks to drain before touching anything.

use chrono::prelude::{DateTime, Utc};

use martlet_chain::HeaderChain;
use martlet_p2p::PeerManager;

use crate::session::Session;
use crate::wallet::WalletSink;

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// Wallet asked for a rescan from `ts`. Runs immediately when no
	/// merkle block is inflight, otherwise parks the request; arrivals
	/// are discarded until the last inflight drains, then the rescan
	/// completes.
	pub(crate) fn process_rescan(&mut self, ts: DateTime<Utc>) {
		let inflight = self
			.peer_state
			.values()
			.any(|state| !state.inflight_merkles.is_empty());
		if inflight {
			debug!("rescan to {} deferred until inflight merkle blocks drain", ts);
			self.pending_rescan = Some(ts);
			return;
		}
		self.perform_rescan(ts);
	}

	/// Runs a parked rescan once every peer's inflight list is empty.
	pub(crate) fn try_complete_rescan(&mut self) {
		let ts = match self.pending_rescan {
			Some(ts) => ts,
			None => return,
		};
		let inflight = self
			.peer_state
			.values()
			.any(|state| !state.inflight_merkles.is_empty());
		if !inflight {
			self.perform_rescan(ts);
		}
	}

	fn perform_rescan(&mut self, ts: DateTime<Utc>) {
		self.wallet.rescan_cleanup();
		let anchor = self.chain.block_before_timestamp(ts);
		info!("rescanning from {} at {} ({})", anchor.hash, anchor.height, ts);
		self.pending_rescan = None;
		self.fast_catchup = ts;
		self.best_block = anchor.hash;
		self.received_merkle.clear();
		if let Err(e) = self.rebuild_download_queue() {
			warn!("rescan could not rebuild download queue: {}", e);
		}
		for peer in self.peers.peer_keys() {
			self.download_blocks(peer);
		}
	}
}
