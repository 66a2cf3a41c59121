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

//! Node configuration, the request variants the dispatcher consumes and
//! the statistics snapshot it exposes.

use chrono::prelude::{DateTime, TimeZone, Utc};

use martlet_core::genesis::Network;
use martlet_core::hash::Hash;
use martlet_core::merkle::MerkleBlock;
use martlet_core::transaction::Transaction;
use martlet_p2p::{BloomFilter, Message, PeerId, PeerInfo};

/// Maximum number of merkle blocks requested from one peer in one batch.
pub const MAX_MERKLE_BATCH: usize = 500;

/// Seconds after which an unanswered request counts as stalled.
pub const STALL_TIMEOUT_SECS: i64 = 120;

/// Seconds between heartbeats.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 120;

/// Node configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
	/// Which network to sync against.
	pub network: Network,
	/// Merkle blocks older than this are never downloaded; only their
	/// headers are fetched. Set to the wallet's birth time.
	pub fast_catchup: DateTime<Utc>,
	/// Best block already delivered to the wallet, or `None` to start
	/// from genesis.
	pub best_block: Option<Hash>,
	/// Capacity of the bounded request channel feeding the dispatcher.
	pub channel_capacity: usize,
	/// Seconds an unanswered request may age before the heartbeat
	/// reclaims it.
	pub stall_timeout_secs: i64,
}

impl Default for NodeConfig {
	fn default() -> NodeConfig {
		NodeConfig {
			network: Network::Mainnet,
			fast_catchup: Utc.timestamp(0, 0),
			best_block: None,
			channel_capacity: 128,
			stall_timeout_secs: STALL_TIMEOUT_SECS,
		}
	}
}

/// A request posted to the session dispatcher. Wallet requests, peer
/// lifecycle events, inbound peer messages and heartbeats all travel in
/// this one variant family so the dispatcher is the single point of state
/// mutation.
#[derive(Clone, Debug)]
pub enum NodeRequest {
	/// Install a new bloom filter and broadcast it to all peers.
	FilterUpdate(BloomFilter),
	/// Broadcast a wallet transaction to the network.
	PublishTransaction(Transaction),
	/// Rewind and redownload merkle blocks from the given time onwards.
	Rescan(DateTime<Utc>),
	/// Periodic stall check, posted by the heartbeat timer.
	Heartbeat,
	/// A peer completed the version handshake.
	PeerHandshake(PeerId, PeerInfo),
	/// A peer went away.
	PeerDisconnect(PeerId),
	/// A decoded message arrived from a peer.
	PeerMessage(PeerId, Message),
	/// A decoded merkle block arrived from a peer.
	PeerMerkleBlock(PeerId, MerkleBlock),
}

/// A point-in-time snapshot of the session's coordination state.
#[derive(Clone, Debug)]
pub struct SessionStats {
	/// Best merkle block delivered to the wallet.
	pub best_block: Hash,
	/// Peer currently driving header sync, if any.
	pub sync_peer: Option<PeerId>,
	/// Block hashes queued for download.
	pub queued_blocks: usize,
	/// Merkle block requests awaiting an answer, across all peers.
	pub inflight_merkles: usize,
	/// Transaction requests awaiting an answer, across all peers.
	pub inflight_txs: usize,
	/// Merkle blocks received but not yet imported.
	pub buffered_merkles: usize,
	/// Transactions buffered until the chain catches up.
	pub solo_txs: usize,
	/// Whether a rescan is waiting for inflight merkle blocks to drain.
	pub pending_rescan: bool,
}
