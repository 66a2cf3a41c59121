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

//! Network parameters: the genesis block headers every header chain is
//! anchored to. All values are embedded consensus constants.

use crate::block::BlockHeader;
use crate::hash::{Hash, ZERO_HASH};
use crate::transaction::{OutPoint, Transaction, TxIn, TxOut};

/// The merkle root shared by the mainnet and testnet genesis blocks (both
/// contain the same single coinbase transaction).
const GENESIS_MERKLE_ROOT: &str =
	"4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// The Bitcoin network a node is part of.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Network {
	/// The production network.
	Mainnet,
	/// The public test network.
	Testnet,
}

impl Network {
	/// The genesis block header of this network.
	pub fn genesis_header(&self) -> BlockHeader {
		let merkle_root = Hash::from_hex(GENESIS_MERKLE_ROOT).unwrap();
		match self {
			Network::Mainnet => BlockHeader::from_raw(
				1,
				ZERO_HASH,
				merkle_root,
				1231006505,
				0x1d00_ffff,
				2083236893,
			),
			Network::Testnet => BlockHeader::from_raw(
				1,
				ZERO_HASH,
				merkle_root,
				1296688602,
				0x1d00_ffff,
				414098458,
			),
		}
	}

	/// The hash of this network's genesis header.
	pub fn genesis_hash(&self) -> Hash {
		let hex = match self {
			Network::Mainnet => {
				"000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
			}
			Network::Testnet => {
				"000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
			}
		};
		Hash::from_hex(hex).unwrap()
	}
}

/// The coinbase transaction of the genesis block, shared by both networks.
/// Mostly useful to tests as a well-known transaction with a well-known
/// txid (the genesis merkle root).
pub fn genesis_coinbase() -> Transaction {
	let script_sig = hex::decode(
		"04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63\
		 656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f\
		 722062616e6b73",
	)
	.unwrap();
	let script_pubkey = hex::decode(
		"4104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649\
		 f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac",
	)
	.unwrap();
	Transaction {
		version: 1,
		inputs: vec![TxIn {
			prev_output: OutPoint {
				txid: ZERO_HASH,
				vout: u32::max_value(),
			},
			script_sig,
			sequence: u32::max_value(),
		}],
		outputs: vec![TxOut {
			value: 50 * 100_000_000,
			script_pubkey,
		}],
		lock_time: 0,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn testnet_genesis_hash() {
		let header = Network::Testnet.genesis_header();
		assert_eq!(header.hash(), Network::Testnet.genesis_hash());
	}

	#[test]
	fn networks_share_merkle_root() {
		assert_eq!(
			Network::Mainnet.genesis_header().merkle_root,
			Network::Testnet.genesis_header().merkle_root,
		);
	}
}
