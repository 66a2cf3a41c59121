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

//! Peer identity, peer metadata and the two traits that tie the sync core
//! to a peer manager implementation.

use std::io;
use std::net::SocketAddr;

use martlet_core::merkle::MerkleBlock;

use crate::msg::Message;

/// Identity of a connected peer. The socket address doubles as the key of
/// every per-peer structure in the client.
pub type PeerId = SocketAddr;

bitflags! {
	/// Services a peer advertised in its version message.
	#[derive(Serialize, Deserialize)]
	pub struct Services: u64 {
		/// Full chain history.
		const NETWORK = 1;
		/// Serves bloom-filtered connections (BIP 111).
		const BLOOM = 1 << 2;
	}
}

/// What a peer told us about itself during the version handshake.
#[derive(Clone, Debug, Serialize)]
pub struct PeerInfo {
	/// Address the peer is reachable at.
	pub addr: PeerId,
	/// Self-reported user agent.
	pub user_agent: String,
	/// Protocol version the peer speaks.
	pub version: u32,
	/// Advertised services.
	pub services: Services,
	/// Best block height the peer claimed at handshake.
	pub height: u64,
}

/// Live view of a peer as maintained by the peer manager. The height may
/// be raised past the handshake value as the peer announces new blocks.
#[derive(Clone, Debug, Serialize)]
pub struct PeerData {
	/// Protocol version the peer speaks.
	pub version: u32,
	/// Advertised services.
	pub services: Services,
	/// Self-reported user agent.
	pub user_agent: String,
	/// Best block height currently attributed to the peer.
	pub height: u64,
	/// Whether the version handshake completed.
	pub handshaken: bool,
}

/// Errors surfaced by the peer manager. Sends are best effort from the
/// core's point of view; a failure here only ever gets logged.
#[derive(Debug)]
pub enum Error {
	/// Underlying connection failure.
	Connection(io::Error),
	/// The peer's outbound queue is full.
	ChannelFull,
	/// No connection to the given peer.
	PeerNotFound(PeerId),
	/// The peer timed out.
	Timeout,
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::Connection(e)
	}
}

/// Callbacks the peer manager invokes on the node. Implementations must
/// not block: they forward into the node's request channel.
pub trait NetAdapter: Send + Sync {
	/// A peer completed the version handshake.
	fn peer_handshake(&self, peer: PeerId, info: PeerInfo);

	/// A peer connection went away, cleanly or not.
	fn peer_disconnect(&self, peer: PeerId);

	/// A decoded message arrived from a peer.
	fn message_received(&self, peer: PeerId, msg: Message);

	/// A decoded merkle block arrived from a peer. Separate from
	/// `message_received` because the decoder extracts the partial merkle
	/// tree before the core sees it.
	fn merkle_block_received(&self, peer: PeerId, mb: MerkleBlock);
}

/// The peer manager operations the sync core drives.
pub trait PeerManager: Send + Sync {
	/// Queue a message to a peer. Best effort.
	fn send_message(&self, peer: &PeerId, msg: Message) -> Result<(), Error>;

	/// Identities of all currently connected peers.
	fn peer_keys(&self) -> Vec<PeerId>;

	/// All currently connected peers with their live metadata.
	fn peers(&self) -> Vec<(PeerId, PeerData)>;

	/// Live metadata of one peer.
	fn peer_data(&self, peer: &PeerId) -> Option<PeerData>;

	/// Raise the height attributed to a peer. Ignored if the peer already
	/// advertises a higher one.
	fn increase_peer_height(&self, peer: &PeerId, height: u64);

	/// The highest height advertised by any handshaken peer, or zero when
	/// none is connected.
	fn best_peer_height(&self) -> u64;
}
