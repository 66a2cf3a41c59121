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

//! Test doubles for the session's collaborators: an in-memory peer set
//! that records every message, a wallet that journals everything imported
//! into it, and builders for linked header chains and merkle blocks.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::prelude::{TimeZone, Utc};

use martlet_chain::{ChainAction, HeaderChain, HeaderIndex};
use martlet_core::block::BlockHeader;
use martlet_core::genesis::Network;
use martlet_core::hash::{Hash, ZERO_HASH};
use martlet_core::merkle::MerkleBlock;
use martlet_core::transaction::{OutPoint, Transaction, TxIn, TxOut};
use martlet_node::WalletSink;
use martlet_p2p::{Error, Inventory, Message, PeerData, PeerId, PeerInfo, PeerManager, Services};

/// Interval between fixture block timestamps.
pub const BLOCK_SPACING_SECS: i64 = 600;

pub fn peer(n: u8) -> PeerId {
	SocketAddr::from(([127, 0, 0, n], 8333))
}

pub fn peer_info(addr: PeerId, height: u64) -> PeerInfo {
	PeerInfo {
		addr,
		user_agent: "/test:0.1/".to_string(),
		version: martlet_p2p::PROTOCOL_VERSION,
		services: Services::NETWORK | Services::BLOOM,
		height,
	}
}

struct PeerRecord {
	data: PeerData,
	sent: Vec<Message>,
}

/// A recording stand-in for the peer manager.
pub struct FakePeers {
	inner: Mutex<HashMap<PeerId, PeerRecord>>,
}

impl FakePeers {
	pub fn new() -> Arc<FakePeers> {
		Arc::new(FakePeers {
			inner: Mutex::new(HashMap::new()),
		})
	}

	/// Registers a handshaken peer advertising `height`.
	pub fn connect(&self, peer: PeerId, height: u64) {
		self.inner.lock().unwrap().insert(
			peer,
			PeerRecord {
				data: PeerData {
					version: martlet_p2p::PROTOCOL_VERSION,
					services: Services::NETWORK | Services::BLOOM,
					user_agent: "/test:0.1/".to_string(),
					height,
					handshaken: true,
				},
				sent: Vec::new(),
			},
		);
	}

	pub fn disconnect(&self, peer: &PeerId) {
		self.inner.lock().unwrap().remove(peer);
	}

	/// Everything sent to `peer` so far, oldest first.
	pub fn sent(&self, peer: &PeerId) -> Vec<Message> {
		self.inner
			.lock()
			.unwrap()
			.get(peer)
			.map(|record| record.sent.clone())
			.unwrap_or_default()
	}

	pub fn clear_sent(&self) {
		for record in self.inner.lock().unwrap().values_mut() {
			record.sent.clear();
		}
	}

	/// Block hashes of every `FilteredBlock` inventory requested from
	/// `peer`, in request order.
	pub fn requested_merkle_blocks(&self, peer: &PeerId) -> Vec<Hash> {
		self.sent(peer)
			.iter()
			.flat_map(|msg| match msg {
				Message::GetData(invs) => invs.clone(),
				_ => Vec::new(),
			})
			.filter_map(|inv| match inv {
				Inventory::FilteredBlock(hash) => Some(hash),
				_ => None,
			})
			.collect()
	}

	/// Txids of every `Tx` inventory requested from `peer`.
	pub fn requested_txs(&self, peer: &PeerId) -> Vec<Hash> {
		self.sent(peer)
			.iter()
			.flat_map(|msg| match msg {
				Message::GetData(invs) => invs.clone(),
				_ => Vec::new(),
			})
			.filter_map(|inv| match inv {
				Inventory::Tx(hash) => Some(hash),
				_ => None,
			})
			.collect()
	}

	pub fn count_filter_loads(&self, peer: &PeerId) -> usize {
		self.sent(peer)
			.iter()
			.filter(|msg| matches!(msg, Message::FilterLoad(_)))
			.count()
	}

	pub fn count_get_headers(&self, peer: &PeerId) -> usize {
		self.sent(peer)
			.iter()
			.filter(|msg| matches!(msg, Message::GetHeaders(_)))
			.count()
	}
}

impl PeerManager for FakePeers {
	fn send_message(&self, peer: &PeerId, msg: Message) -> Result<(), Error> {
		let mut inner = self.inner.lock().unwrap();
		match inner.get_mut(peer) {
			Some(record) => {
				record.sent.push(msg);
				Ok(())
			}
			None => Err(Error::PeerNotFound(*peer)),
		}
	}

	fn peer_keys(&self) -> Vec<PeerId> {
		let mut keys: Vec<PeerId> = self.inner.lock().unwrap().keys().cloned().collect();
		keys.sort();
		keys
	}

	fn peers(&self) -> Vec<(PeerId, PeerData)> {
		let mut peers: Vec<(PeerId, PeerData)> = self
			.inner
			.lock()
			.unwrap()
			.iter()
			.map(|(peer, record)| (*peer, record.data.clone()))
			.collect();
		peers.sort_by_key(|(peer, _)| *peer);
		peers
	}

	fn peer_data(&self, peer: &PeerId) -> Option<PeerData> {
		self.inner
			.lock()
			.unwrap()
			.get(peer)
			.map(|record| record.data.clone())
	}

	fn increase_peer_height(&self, peer: &PeerId, height: u64) {
		if let Some(record) = self.inner.lock().unwrap().get_mut(peer) {
			if height > record.data.height {
				record.data.height = height;
			}
		}
	}

	fn best_peer_height(&self) -> u64 {
		self.inner
			.lock()
			.unwrap()
			.values()
			.filter(|record| record.data.handshaken)
			.map(|record| record.data.height)
			.max()
			.unwrap_or(0)
	}
}

/// One thing the wallet was asked to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum WalletEvent {
	/// A batch of imported transactions, as txids.
	Txs(Vec<Hash>),
	/// An imported merkle block: its hash and the matched txids.
	Block(Hash, Vec<Hash>),
	/// A rescan cleanup.
	Cleanup,
}

#[derive(Default)]
pub struct WalletLog {
	pub events: Vec<WalletEvent>,
	pub have: HashSet<Hash>,
	pub want: HashSet<Hash>,
}

impl WalletLog {
	pub fn imported_blocks(&self) -> Vec<Hash> {
		self.events
			.iter()
			.filter_map(|event| match event {
				WalletEvent::Block(hash, _) => Some(*hash),
				_ => None,
			})
			.collect()
	}

	pub fn imported_txids(&self) -> Vec<Hash> {
		self.events
			.iter()
			.filter_map(|event| match event {
				WalletEvent::Txs(txids) => Some(txids.clone()),
				_ => None,
			})
			.flatten()
			.collect()
	}

	pub fn cleanups(&self) -> usize {
		self.events
			.iter()
			.filter(|event| matches!(event, WalletEvent::Cleanup))
			.count()
	}
}

/// A wallet that journals everything; the test keeps the shared handle.
pub struct RecordingWallet(pub Arc<Mutex<WalletLog>>);

impl RecordingWallet {
	pub fn new() -> (RecordingWallet, Arc<Mutex<WalletLog>>) {
		let log = Arc::new(Mutex::new(WalletLog::default()));
		(RecordingWallet(log.clone()), log)
	}
}

impl WalletSink for RecordingWallet {
	fn want_tx_hash(&self, hash: &Hash) -> bool {
		self.0.lock().unwrap().want.contains(hash)
	}

	fn have_merkle_hash(&self, hash: &Hash) -> bool {
		self.0.lock().unwrap().have.contains(hash)
	}

	fn import_txs(&mut self, txs: Vec<Transaction>) {
		let txids = txs.iter().map(|tx| tx.txid()).collect();
		self.0.lock().unwrap().events.push(WalletEvent::Txs(txids));
	}

	fn import_merkle_block(&mut self, action: ChainAction, matched: Vec<Hash>) {
		let hash = action.entry().hash;
		let mut log = self.0.lock().unwrap();
		log.have.insert(hash);
		log.events.push(WalletEvent::Block(hash, matched));
	}

	fn rescan_cleanup(&mut self) {
		let mut log = self.0.lock().unwrap();
		log.have.clear();
		log.events.push(WalletEvent::Cleanup);
	}
}

/// Builds linked chains of fixture headers on top of mainnet genesis.
pub struct ChainBuilder {
	prev: Hash,
	time: i64,
	nonce: u32,
	headers: Vec<BlockHeader>,
}

impl ChainBuilder {
	pub fn new() -> ChainBuilder {
		let genesis = Network::Mainnet.genesis_header();
		ChainBuilder {
			prev: genesis.hash(),
			time: genesis.time.timestamp(),
			nonce: 0,
			headers: Vec::new(),
		}
	}

	/// Appends a header committing to `merkle_root`.
	pub fn add_with_root(&mut self, merkle_root: Hash) -> BlockHeader {
		self.time += BLOCK_SPACING_SECS;
		self.nonce += 1;
		let header = BlockHeader::from_raw(
			1,
			self.prev,
			merkle_root,
			self.time as u32,
			0x1d00_ffff,
			self.nonce,
		);
		self.prev = header.hash();
		self.headers.push(header);
		header
	}

	/// Appends a header with no interesting transactions.
	pub fn add(&mut self) -> BlockHeader {
		self.add_with_root(ZERO_HASH)
	}

	/// Appends `n` headers.
	pub fn extend(&mut self, n: usize) -> &mut Self {
		for _ in 0..n {
			self.add();
		}
		self
	}

	pub fn headers(&self) -> Vec<BlockHeader> {
		self.headers.clone()
	}

	pub fn header(&self, index: usize) -> BlockHeader {
		self.headers[index]
	}

	pub fn hash(&self, index: usize) -> Hash {
		self.headers[index].hash()
	}

	pub fn tip_hash(&self) -> Hash {
		self.prev
	}
}

/// An empty header index that skips proof-of-work checks, as fixture
/// headers are not mined.
pub fn test_index() -> HeaderIndex {
	HeaderIndex::init(Network::Mainnet, |_| true).unwrap()
}

/// An index pre-loaded with the given headers.
pub fn index_with(headers: &[BlockHeader]) -> HeaderIndex {
	let mut index = test_index();
	let far_future = Utc.timestamp(4_000_000_000, 0);
	for header in headers {
		index
			.connect_block_header(header, far_future)
			.expect("fixture header connects");
	}
	index
}

/// A minimal distinct transaction.
pub fn test_tx(n: u32) -> Transaction {
	Transaction {
		version: 1,
		inputs: vec![TxIn {
			prev_output: OutPoint {
				txid: ZERO_HASH,
				vout: n,
			},
			script_sig: Vec::new(),
			sequence: u32::max_value(),
		}],
		outputs: vec![TxOut {
			value: u64::from(n) + 1,
			script_pubkey: Vec::new(),
		}],
		lock_time: 0,
	}
}

/// A well-formed merkle block for `header`.
pub fn merkle_block(
	header: &BlockHeader,
	matched: Vec<Hash>,
	transactions: Vec<Transaction>,
) -> MerkleBlock {
	MerkleBlock {
		header: *header,
		total_transactions: matched.len().max(1) as u32,
		merkle_root: header.merkle_root,
		matched,
		transactions,
	}
}
