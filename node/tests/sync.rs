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

//! End-to-end scenarios driving the session through its dispatcher with
//! recorded collaborators: header sync, multi-peer download scheduling,
//! stall recovery, the tx/merkle interlock, disconnects and rescans.

mod common;

use std::sync::{Arc, Mutex};

use chrono::prelude::{TimeZone, Utc};

use martlet_chain::HeaderIndex;
use martlet_core::hash::{Hash, ZERO_HASH};
use martlet_node::{NodeConfig, NodeRequest, Session};
use martlet_p2p::{BloomFilter, GetHeaders, Inventory, Message, PeerId, PeerManager};

use common::{
	index_with, merkle_block, peer, peer_info, test_index, test_tx, ChainBuilder, FakePeers,
	RecordingWallet, WalletEvent, WalletLog,
};

type TestSession = Session<HeaderIndex, RecordingWallet, FakePeers>;

struct Harness {
	session: TestSession,
	peers: Arc<FakePeers>,
	wallet: Arc<Mutex<WalletLog>>,
}

impl Harness {
	fn new(config: NodeConfig) -> Harness {
		Harness::with_index(test_index(), config)
	}

	fn with_index(index: HeaderIndex, config: NodeConfig) -> Harness {
		let peers = FakePeers::new();
		let (wallet, log) = RecordingWallet::new();
		let session = Session::new(index, wallet, peers.clone(), config).unwrap();
		Harness {
			session,
			peers,
			wallet: log,
		}
	}

	/// Dispatches one request and checks structural invariants after it.
	fn drive(&mut self, req: NodeRequest) {
		self.session.dispatch(req);
		self.session.check_consistency().unwrap();
	}

	fn handshake(&mut self, peer: PeerId, height: u64) {
		self.peers.connect(peer, height);
		self.drive(NodeRequest::PeerHandshake(peer, peer_info(peer, height)));
	}

	fn set_filter(&mut self) {
		self.drive(NodeRequest::FilterUpdate(test_filter()));
	}
}

fn test_filter() -> BloomFilter {
	BloomFilter {
		data: vec![0xff, 0x01, 0x40],
		hash_funcs: 5,
		tweak: 42,
		flags: 1,
	}
}

fn config() -> NodeConfig {
	NodeConfig::default()
}

fn config_short_stall() -> NodeConfig {
	NodeConfig {
		stall_timeout_secs: 0,
		..NodeConfig::default()
	}
}

// S1: two peers, a hundred headers from one of them, merkle blocks
// arriving in shuffled order; the wallet must see imports in strictly
// ascending height order.
#[test]
fn linear_sync_delivers_in_order() {
	let p1 = peer(1);
	let p2 = peer(2);
	let mut chain = ChainBuilder::new();
	chain.extend(100);

	let mut h = Harness::new(config());
	h.handshake(p1, 100);
	h.handshake(p2, 100);
	h.set_filter();

	assert_eq!(h.peers.count_filter_loads(&p1), 1);
	assert_eq!(h.peers.count_filter_loads(&p2), 1);

	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));

	// the first eligible peer received the whole batch, in ascending order
	let requested = h.peers.requested_merkle_blocks(&p1);
	let expected: Vec<Hash> = (0..100).map(|i| chain.hash(i)).collect();
	assert_eq!(requested, expected);
	assert_eq!(h.session.stats().inflight_merkles, 100);
	assert_eq!(h.session.stats().queued_blocks, 0);

	// GetData is followed by the end-of-batch ping sentinel
	let sent = h.peers.sent(&p1);
	let getdata_at = sent
		.iter()
		.position(|msg| matches!(msg, Message::GetData(_)))
		.unwrap();
	assert!(matches!(sent[getdata_at + 1], Message::Ping(_)));

	// deliver every merkle block in a fixed pseudo-random permutation
	for i in 0..100usize {
		let idx = (i * 37) % 100;
		let mb = merkle_block(&chain.header(idx), vec![], vec![]);
		h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	}

	let imported = h.wallet.lock().unwrap().imported_blocks();
	assert_eq!(imported, expected);
	let stats = h.session.stats();
	assert_eq!(stats.inflight_merkles, 0);
	assert_eq!(stats.buffered_merkles, 0);
	assert_eq!(stats.best_block, chain.hash(99));
}

// S2: a peer sits on its merkle requests; the heartbeat must take the
// work away and hand it to the other peer.
#[test]
fn heartbeat_reassigns_stalled_downloads() {
	let p1 = peer(1);
	let p2 = peer(2);
	let mut chain = ChainBuilder::new();
	chain.extend(3);

	let mut h = Harness::new(config_short_stall());
	h.handshake(p1, 3);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));
	assert_eq!(h.peers.requested_merkle_blocks(&p1).len(), 3);

	h.handshake(p2, 3);
	assert_eq!(h.peers.requested_merkle_blocks(&p2).len(), 0);

	// with a zero stall timeout everything inflight is overdue
	h.drive(NodeRequest::Heartbeat);

	assert_eq!(
		h.peers.requested_merkle_blocks(&p2),
		(0..3).map(|i| chain.hash(i)).collect::<Vec<_>>()
	);
	// nothing was re-requested from the stalling peer
	assert_eq!(h.peers.requested_merkle_blocks(&p1).len(), 3);
	assert_eq!(h.session.stats().inflight_merkles, 3);
	assert_eq!(h.session.stats().queued_blocks, 0);

	// the slow peer's late answer is no longer inflight but still imports
	let mb = merkle_block(&chain.header(0), vec![], vec![]);
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	assert_eq!(
		h.wallet.lock().unwrap().imported_blocks(),
		vec![chain.hash(0)]
	);
}

// S3: a merkle block confirming a transaction we are still fetching must
// wait for the transaction; the wallet then sees the transaction first.
#[test]
fn inflight_tx_blocks_merkle_import() {
	let p1 = peer(1);
	let tx = test_tx(7);
	let txid = tx.txid();
	let mut chain = ChainBuilder::new();
	let header = chain.add_with_root(txid);

	let mut h = Harness::new(config());
	h.wallet.lock().unwrap().want.insert(txid);
	h.handshake(p1, 1);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(vec![header])));
	assert_eq!(h.session.stats().inflight_merkles, 1);

	h.drive(NodeRequest::PeerMessage(
		p1,
		Message::Inv(vec![Inventory::Tx(txid)]),
	));
	assert_eq!(h.peers.requested_txs(&p1), vec![txid]);
	assert_eq!(h.session.stats().inflight_txs, 1);

	// the merkle block arrives while the tx is inflight: no import yet
	let mb = merkle_block(&header, vec![txid], vec![]);
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	assert!(h.wallet.lock().unwrap().events.is_empty());
	assert_eq!(h.session.stats().buffered_merkles, 1);

	// the tx lands: import unblocks, tx batch first, then the block
	h.drive(NodeRequest::PeerMessage(p1, Message::Tx(tx)));
	let events = h.wallet.lock().unwrap().events.clone();
	assert_eq!(
		events,
		vec![
			WalletEvent::Txs(vec![txid]),
			WalletEvent::Block(header.hash(), vec![txid]),
		]
	);
	assert_eq!(h.session.stats().solo_txs, 0);
	assert_eq!(h.session.stats().inflight_txs, 0);
}

// S4: all of a dead peer's inflight work must return to the queue and
// flow to the surviving peer.
#[test]
fn disconnect_reassigns_inflight() {
	let p1 = peer(1);
	let p2 = peer(2);
	let mut chain = ChainBuilder::new();
	chain.extend(5);

	let mut h = Harness::new(config());
	h.handshake(p1, 5);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));
	assert_eq!(h.peers.requested_merkle_blocks(&p1).len(), 5);

	h.handshake(p2, 5);
	h.peers.disconnect(&p1);
	h.drive(NodeRequest::PeerDisconnect(p1));

	assert_eq!(
		h.peers.requested_merkle_blocks(&p2),
		(0..5).map(|i| chain.hash(i)).collect::<Vec<_>>()
	);
	assert_eq!(h.session.stats().inflight_merkles, 5);
}

// S4, sync-peer side: losing the header-sync peer clears the slot and
// asks everyone else for headers.
#[test]
fn disconnect_of_sync_peer_restarts_header_sync() {
	let p1 = peer(1);
	let p2 = peer(2);
	let mut chain = ChainBuilder::new();
	chain.extend(5);

	let mut h = Harness::new(config());
	h.handshake(p1, 10);
	h.handshake(p2, 10);

	// five headers against an advertised height of ten: sync continues
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));
	assert_eq!(h.session.stats().sync_peer, Some(p1));

	let headers_to_p2_before = h.peers.count_get_headers(&p2);
	h.peers.disconnect(&p1);
	h.drive(NodeRequest::PeerDisconnect(p1));

	assert_eq!(h.session.stats().sync_peer, None);
	assert_eq!(h.peers.count_get_headers(&p2), headers_to_p2_before + 1);
}

// S5: a rescan requested while merkle blocks are inflight waits for them,
// discards what still arrives, and then rewinds and redownloads.
#[test]
fn rescan_waits_for_inflight_merkles() {
	let p1 = peer(1);
	let mut chain = ChainBuilder::new();
	chain.extend(4);

	let mut h = Harness::new(config());
	h.handshake(p1, 4);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));
	assert_eq!(h.session.stats().inflight_merkles, 4);

	// two blocks make it home before the wallet asks for a rescan
	for i in 0..2 {
		let mb = merkle_block(&chain.header(i), vec![], vec![]);
		h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	}
	assert_eq!(h.session.stats().best_block, chain.hash(1));
	assert_eq!(h.session.stats().inflight_merkles, 2);

	let rescan_time = chain.header(1).time;
	h.drive(NodeRequest::Rescan(rescan_time));
	let stats = h.session.stats();
	assert!(stats.pending_rescan);
	assert_eq!(stats.best_block, chain.hash(1));
	assert_eq!(h.wallet.lock().unwrap().cleanups(), 0);

	// the third block arrives while the rescan waits: discarded
	let mb = merkle_block(&chain.header(2), vec![], vec![]);
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	let stats = h.session.stats();
	assert!(stats.pending_rescan);
	assert_eq!(stats.buffered_merkles, 0);
	assert_eq!(h.wallet.lock().unwrap().imported_blocks().len(), 2);

	// the last inflight block drains: the rescan executes
	let mb = merkle_block(&chain.header(3), vec![], vec![]);
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	let stats = h.session.stats();
	assert!(!stats.pending_rescan);
	assert_eq!(h.wallet.lock().unwrap().cleanups(), 1);
	// rewound to the last block before the rescan time
	assert_eq!(stats.best_block, chain.hash(0));
	// blocks 1..3 requested again
	assert_eq!(stats.inflight_merkles, 3);
	let requested = h.peers.requested_merkle_blocks(&p1);
	assert_eq!(requested.len(), 7);
	assert_eq!(requested[4..], [chain.hash(1), chain.hash(2), chain.hash(3)]);

	// redelivery imports the rescanned range in order
	for i in 1..4 {
		let mb = merkle_block(&chain.header(i), vec![], vec![]);
		h.drive(NodeRequest::PeerMerkleBlock(p1, mb));
	}
	let imported = h.wallet.lock().unwrap().imported_blocks();
	assert_eq!(
		imported,
		vec![
			chain.hash(0),
			chain.hash(1),
			chain.hash(1),
			chain.hash(2),
			chain.hash(3),
		]
	);
}

// S6: headers older than the fast-catchup time move the best block
// without any download or wallet traffic.
#[test]
fn fast_catchup_skips_old_blocks() {
	let p1 = peer(1);
	let mut chain = ChainBuilder::new();
	chain.extend(100);

	// catchup time far past every fixture header
	let catchup = Utc.timestamp(2_000_000_000, 0);
	let cfg = NodeConfig {
		fast_catchup: catchup,
		..NodeConfig::default()
	};
	let mut h = Harness::new(cfg);
	h.handshake(p1, 100);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));

	let stats = h.session.stats();
	assert_eq!(stats.best_block, chain.hash(99));
	assert_eq!(stats.queued_blocks, 0);
	assert_eq!(stats.inflight_merkles, 0);
	assert!(h.wallet.lock().unwrap().events.is_empty());
	assert!(h.peers.requested_merkle_blocks(&p1).is_empty());
}

// A catchup anchor in the middle of a known chain: only the tail after
// the anchor is queued on startup.
#[test]
fn startup_anchors_at_fast_catchup() {
	let mut chain = ChainBuilder::new();
	chain.extend(10);

	let catchup = chain.header(5).time;
	let cfg = NodeConfig {
		fast_catchup: catchup,
		..NodeConfig::default()
	};
	let h = Harness::with_index(index_with(&chain.headers()), cfg);

	let stats = h.session.stats();
	// anchor is the last header strictly before the catchup time
	assert_eq!(stats.best_block, chain.hash(4));
	// blocks 5..9 remain to download
	assert_eq!(stats.queued_blocks, 5);
}

#[test]
fn solo_txs_are_deduplicated() {
	let p1 = peer(1);
	let p2 = peer(2);
	let tx = test_tx(3);

	let mut h = Harness::new(config());
	h.handshake(p1, 5);
	h.handshake(p2, 5);

	// not merkle-synced yet, so both copies are parked
	h.drive(NodeRequest::PeerMessage(p1, Message::Tx(tx.clone())));
	h.drive(NodeRequest::PeerMessage(p2, Message::Tx(tx.clone())));
	assert_eq!(h.session.stats().solo_txs, 1);
	assert!(h.wallet.lock().unwrap().events.is_empty());
}

#[test]
fn synced_txs_import_directly() {
	let p1 = peer(1);
	let tx = test_tx(4);

	let mut h = Harness::new(config());
	// peer advertises no blocks beyond ours: already merkle-synced
	h.handshake(p1, 0);
	h.drive(NodeRequest::PeerMessage(p1, Message::Tx(tx.clone())));
	assert_eq!(
		h.wallet.lock().unwrap().events,
		vec![WalletEvent::Txs(vec![tx.txid()])]
	);
	assert_eq!(h.session.stats().solo_txs, 0);
}

#[test]
fn publish_waits_for_first_peer() {
	let p1 = peer(1);
	let tx = test_tx(9);

	let mut h = Harness::new(config());
	h.drive(NodeRequest::PublishTransaction(tx.clone()));

	h.handshake(p1, 0);
	let sent_txids: Vec<Hash> = h
		.peers
		.sent(&p1)
		.iter()
		.filter_map(|msg| match msg {
			Message::Tx(tx) => Some(tx.txid()),
			_ => None,
		})
		.collect();
	assert_eq!(sent_txids, vec![tx.txid()]);
}

#[test]
fn publish_broadcasts_to_all_handshaken_peers() {
	let p1 = peer(1);
	let p2 = peer(2);
	let tx = test_tx(9);

	let mut h = Harness::new(config());
	h.handshake(p1, 0);
	h.handshake(p2, 0);
	h.drive(NodeRequest::PublishTransaction(tx.clone()));

	for p in [p1, p2].iter() {
		assert!(h
			.peers
			.sent(p)
			.iter()
			.any(|msg| matches!(msg, Message::Tx(t) if t.txid() == tx.txid())));
	}
}

#[test]
fn repeated_and_empty_filters_are_ignored() {
	let p1 = peer(1);
	let mut h = Harness::new(config());
	h.handshake(p1, 0);

	h.drive(NodeRequest::FilterUpdate(BloomFilter {
		data: vec![0, 0],
		hash_funcs: 1,
		tweak: 0,
		flags: 0,
	}));
	assert_eq!(h.peers.count_filter_loads(&p1), 0);

	h.set_filter();
	h.set_filter();
	assert_eq!(h.peers.count_filter_loads(&p1), 1);
}

#[test]
fn inv_of_unknown_block_chases_headers() {
	let p1 = peer(1);
	let mut chain = ChainBuilder::new();
	chain.extend(5);

	let mut h = Harness::new(config());
	h.handshake(p1, 0);
	let announced = chain.hash(4);
	h.drive(NodeRequest::PeerMessage(
		p1,
		Message::Inv(vec![Inventory::Block(announced)]),
	));

	// a getheaders stopping at the announced hash went out
	let chased = h.peers.sent(&p1).iter().any(|msg| match msg {
		Message::GetHeaders(GetHeaders { hash_stop, .. }) => *hash_stop == announced,
		_ => false,
	});
	assert!(chased);

	// once the headers link the hash, the announcer's height catches up
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));
	assert_eq!(h.peers.peer_data(&p1).unwrap().height, 5);
}

#[test]
fn inv_of_known_block_raises_peer_height() {
	let p1 = peer(1);
	let p2 = peer(2);
	let mut chain = ChainBuilder::new();
	chain.extend(3);

	let mut h = Harness::new(config());
	h.handshake(p1, 3);
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(chain.headers())));

	h.handshake(p2, 0);
	h.drive(NodeRequest::PeerMessage(
		p2,
		Message::Inv(vec![Inventory::Block(chain.hash(2))]),
	));
	assert_eq!(h.peers.peer_data(&p2).unwrap().height, 3);
}

#[test]
fn unsolicited_merkle_blocks_are_ignored() {
	let p1 = peer(1);
	let mut chain = ChainBuilder::new();
	let header = chain.add();

	let mut h = Harness::new(config());
	h.handshake(p1, 1);
	// header never delivered, so the merkle block is unknown
	let mb = merkle_block(&header, vec![], vec![]);
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));

	assert_eq!(h.session.stats().buffered_merkles, 0);
	assert!(h.wallet.lock().unwrap().events.is_empty());
}

#[test]
fn merkle_root_mismatch_is_dropped() {
	let p1 = peer(1);
	let mut chain = ChainBuilder::new();
	let header = chain.add_with_root(test_tx(1).txid());

	let mut h = Harness::new(config());
	h.handshake(p1, 1);
	h.set_filter();
	h.drive(NodeRequest::PeerMessage(p1, Message::Headers(vec![header])));
	assert_eq!(h.session.stats().inflight_merkles, 1);

	let mut mb = merkle_block(&header, vec![], vec![]);
	mb.merkle_root = ZERO_HASH;
	h.drive(NodeRequest::PeerMerkleBlock(p1, mb));

	// removed from inflight but never buffered or imported
	let stats = h.session.stats();
	assert_eq!(stats.inflight_merkles, 0);
	assert_eq!(stats.buffered_merkles, 0);
	assert!(h.wallet.lock().unwrap().events.is_empty());
}

// Stalled transaction requests are re-issued to the same peer.
#[test]
fn heartbeat_rerequests_stalled_txs() {
	let p1 = peer(1);
	let tx = test_tx(2);
	let txid = tx.txid();

	let mut h = Harness::new(config_short_stall());
	h.wallet.lock().unwrap().want.insert(txid);
	h.handshake(p1, 5);
	h.drive(NodeRequest::PeerMessage(
		p1,
		Message::Inv(vec![Inventory::Tx(txid)]),
	));
	assert_eq!(h.peers.requested_txs(&p1), vec![txid]);

	h.drive(NodeRequest::Heartbeat);
	assert_eq!(h.peers.requested_txs(&p1), vec![txid, txid]);
	assert_eq!(h.session.stats().inflight_txs, 1);
}
