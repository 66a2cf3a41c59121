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

//! The SPV session core: drives block-header synchronization against
//! connected peers, schedules bloom-filtered merkle-block downloads across
//! them, and delivers transactions and merkle blocks to the attached
//! wallet in chain order regardless of network arrival order.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod adapters;
mod error;
mod node;
mod session;
mod types;
mod wallet;

pub use crate::adapters::NetToNodeAdapter;
pub use crate::error::Error;
pub use crate::node::Node;
pub use crate::session::Session;
pub use crate::types::{
	NodeConfig, NodeRequest, SessionStats, HEARTBEAT_INTERVAL_SECS, MAX_MERKLE_BATCH,
	STALL_TIMEOUT_SECS,
};
pub use crate::wallet::WalletSink;
