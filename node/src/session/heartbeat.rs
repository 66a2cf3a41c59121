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

//! The heartbeat: the only timeout mechanism in the core. Every interval
//! it claws back merkle requests that peers sat on, re-requests stalled
//! transactions and reschedules downloads, serving well-behaved peers
//! first.

use chrono::prelude::Utc;
use chrono::Duration;

use martlet_chain::HeaderChain;
use martlet_core::hash::Hash;
use martlet_p2p::{PeerId, PeerManager};

use crate::session::{BlockRef, Session};
use crate::wallet::WalletSink;

impl<C, W, P> Session<C, W, P>
where
	C: HeaderChain,
	W: WalletSink,
	P: PeerManager,
{
	/// One stall sweep. A request is stalled once it has been unanswered
	/// for the full timeout.
	pub(crate) fn heartbeat(&mut self) {
		let now = Utc::now();
		let timeout = Duration::seconds(self.stall_timeout_secs);

		// stalled merkle requests go back to the queue; the peers that
		// sat on them go to the back of this round's scheduling order
		let mut demoted: Vec<PeerId> = Vec::new();
		let mut requeue: Vec<BlockRef> = Vec::new();
		for (peer, state) in self.peer_state.iter_mut() {
			let inflight = std::mem::replace(&mut state.inflight_merkles, Vec::new());
			let (stalled, live): (Vec<_>, Vec<_>) = inflight
				.into_iter()
				.partition(|(_, issued)| now.signed_duration_since(*issued) >= timeout);
			state.inflight_merkles = live;
			if !stalled.is_empty() {
				debug!(
					"peer {} stalled on {} merkle blocks, requeueing",
					peer,
					stalled.len()
				);
				demoted.push(*peer);
				requeue.extend(stalled.into_iter().map(|(block, _)| block));
			}
		}
		for block in requeue {
			self.enqueue_block(block.height, block.hash);
		}

		// stalled transactions are asked from the same peer again
		let peers_with_txs: Vec<PeerId> = self.peer_state.keys().cloned().collect();
		for peer in peers_with_txs {
			let stalled: Vec<Hash> = match self.peer_state.get_mut(&peer) {
				Some(state) => {
					let inflight = std::mem::replace(&mut state.inflight_txs, Vec::new());
					let (stalled, live): (Vec<_>, Vec<_>) = inflight
						.into_iter()
						.partition(|(_, issued)| now.signed_duration_since(*issued) >= timeout);
					state.inflight_txs = live;
					stalled.into_iter().map(|(hash, _)| hash).collect()
				}
				None => continue,
			};
			if !stalled.is_empty() {
				debug!("re-requesting {} stalled txs from {}", stalled.len(), peer);
				self.download_txs(peer, stalled);
			}
		}

		let mut order: Vec<PeerId> = self
			.peers
			.peer_keys()
			.into_iter()
			.filter(|peer| !demoted.contains(peer))
			.collect();
		order.extend(demoted);
		for peer in order {
			self.download_blocks(peer);
		}
	}
}
