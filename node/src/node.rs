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

//! The running node: owns the dispatcher thread that serializes all
//! session mutation and the heartbeat thread that feeds it stall checks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time;

use chrono::prelude::{DateTime, Utc};

use martlet_chain::HeaderChain;
use martlet_core::transaction::Transaction;
use martlet_p2p::{BloomFilter, PeerManager};

use crate::adapters::NetToNodeAdapter;
use crate::error::Error;
use crate::session::Session;
use crate::types::{NodeConfig, NodeRequest, HEARTBEAT_INTERVAL_SECS};
use crate::wallet::WalletSink;

/// Handle to a running SPV node. Wallet-facing requests go through here;
/// network events go through the adapter handed to the peer manager. All
/// requests are fire and forget.
pub struct Node {
	requests: SyncSender<NodeRequest>,
	stop: Arc<AtomicBool>,
}

impl Node {
	/// Builds the session and spawns the dispatcher and heartbeat
	/// threads.
	pub fn start<C, W, P>(
		chain: C,
		wallet: W,
		peers: Arc<P>,
		config: NodeConfig,
	) -> Result<Node, Error>
	where
		C: HeaderChain + 'static,
		W: WalletSink + 'static,
		P: PeerManager + 'static,
	{
		let mut session = Session::new(chain, wallet, peers, config.clone())?;
		let (requests, incoming) = mpsc::sync_channel(config.channel_capacity);
		let stop = Arc::new(AtomicBool::new(false));

		let dispatch_stop = stop.clone();
		thread::Builder::new()
			.name("spv-dispatch".to_string())
			.spawn(move || {
				while let Ok(req) = incoming.recv() {
					if dispatch_stop.load(Ordering::Relaxed) {
						break;
					}
					session.dispatch(req);
				}
			})?;

		let heartbeat_requests = requests.clone();
		let heartbeat_stop = stop.clone();
		thread::Builder::new()
			.name("spv-heartbeat".to_string())
			.spawn(move || {
				let mut elapsed = 0;
				while !heartbeat_stop.load(Ordering::Relaxed) {
					thread::sleep(time::Duration::from_secs(1));
					elapsed += 1;
					if elapsed >= HEARTBEAT_INTERVAL_SECS {
						elapsed = 0;
						if heartbeat_requests.send(NodeRequest::Heartbeat).is_err() {
							break;
						}
					}
				}
			})?;

		Ok(Node { requests, stop })
	}

	/// The adapter the peer manager should deliver its callbacks to.
	pub fn adapter(&self) -> NetToNodeAdapter {
		NetToNodeAdapter::new(self.requests.clone())
	}

	/// Install a new bloom filter and push it to every peer.
	pub fn filter_update(&self, filter: BloomFilter) {
		self.post(NodeRequest::FilterUpdate(filter));
	}

	/// Broadcast a wallet transaction.
	pub fn publish_transaction(&self, tx: Transaction) {
		self.post(NodeRequest::PublishTransaction(tx));
	}

	/// Rewind and re-download merkle blocks from `ts` onwards.
	pub fn rescan(&self, ts: DateTime<Utc>) {
		self.post(NodeRequest::Rescan(ts));
	}

	/// Stops the node threads. Events still queued are dropped.
	pub fn stop(&self) {
		self.stop.store(true, Ordering::Relaxed);
		// wake the dispatcher if it is parked on an empty channel
		let _ = self.requests.try_send(NodeRequest::Heartbeat);
	}

	fn post(&self, req: NodeRequest) {
		if self.requests.send(req).is_err() {
			debug!("node stopped, dropping request");
		}
	}
}
