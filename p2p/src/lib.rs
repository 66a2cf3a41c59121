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

//! Interface between the sync core and the networking layer: peer identity
//! and metadata, the wire message vocabulary, the `PeerManager` operations
//! the core invokes and the `NetAdapter` callbacks it receives. Sockets,
//! handshakes and message framing live on the other side of these traits.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate serde_derive;

mod msg;
mod types;

pub use crate::msg::{
	BloomFilter, GetHeaders, Inventory, Message, MAX_BLOCK_HEADERS, PROTOCOL_VERSION,
};
pub use crate::types::{Error, NetAdapter, PeerData, PeerId, PeerInfo, PeerManager, Services};
