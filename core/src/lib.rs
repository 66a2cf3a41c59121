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

//! Primitive types shared across the martlet client: double-SHA256 hashes,
//! consensus serialization, proof-of-work arithmetic, block headers,
//! transactions and decoded merkle blocks.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate serde_derive;

pub mod block;
pub mod genesis;
pub mod hash;
pub mod merkle;
pub mod ser;
pub mod transaction;
pub mod work;

pub use crate::block::BlockHeader;
pub use crate::genesis::Network;
pub use crate::hash::{Hash, Hashed, ZERO_HASH};
pub use crate::merkle::MerkleBlock;
pub use crate::transaction::Transaction;
pub use crate::work::{CompactDifficulty, Work};
