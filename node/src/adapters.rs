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

//! Adapter connecting peer-manager callbacks to the session dispatcher.
//! Each callback becomes a request on the bounded channel; the send
//! blocks when the dispatcher is saturated, which is the only
//! backpressure the core exerts on the network layer.

use std::sync::mpsc::SyncSender;

use martlet_core::merkle::MerkleBlock;
use martlet_p2p::{Message, NetAdapter, PeerId, PeerInfo};

use crate::types::NodeRequest;

/// Forwards network events into the node's request channel.
#[derive(Clone)]
pub struct NetToNodeAdapter {
	requests: SyncSender<NodeRequest>,
}

impl NetToNodeAdapter {
	pub(crate) fn new(requests: SyncSender<NodeRequest>) -> NetToNodeAdapter {
		NetToNodeAdapter { requests }
	}

	fn post(&self, req: NodeRequest) {
		if self.requests.send(req).is_err() {
			debug!("node stopped, dropping network event");
		}
	}
}

impl NetAdapter for NetToNodeAdapter {
	fn peer_handshake(&self, peer: PeerId, info: PeerInfo) {
		self.post(NodeRequest::PeerHandshake(peer, info));
	}

	fn peer_disconnect(&self, peer: PeerId) {
		self.post(NodeRequest::PeerDisconnect(peer));
	}

	fn message_received(&self, peer: PeerId, msg: Message) {
		self.post(NodeRequest::PeerMessage(peer, msg));
	}

	fn merkle_block_received(&self, peer: PeerId, mb: MerkleBlock) {
		self.post(NodeRequest::PeerMerkleBlock(peer, mb));
	}
}
