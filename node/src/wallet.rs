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

//! The wallet seen from the session: a sink for imported transactions and
//! merkle blocks plus the two membership queries scheduling depends on.

use martlet_chain::ChainAction;
use martlet_core::hash::Hash;
use martlet_core::transaction::Transaction;

/// Wallet operations the session invokes. Delivery guarantees: merkle
/// blocks arrive strictly parent before child, and a transaction confirmed
/// by a merkle block is imported before that merkle block.
pub trait WalletSink: Send {
	/// Whether the wallet wants the given announced transaction fetched.
	fn want_tx_hash(&self, hash: &Hash) -> bool;

	/// Whether the wallet has already seen the given merkle block.
	fn have_merkle_hash(&self, hash: &Hash) -> bool;

	/// Import a batch of transactions.
	fn import_txs(&mut self, txs: Vec<Transaction>);

	/// Import a merkle block: how the chain moved plus the txids the block
	/// proves included.
	fn import_merkle_block(&mut self, action: ChainAction, matched: Vec<Hash>);

	/// Drop all imported state past the rescan point before a rescan
	/// starts re-delivering it.
	fn rescan_cleanup(&mut self);
}
