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

//! Error types for the node.

use std::io;

use failure::Fail;

use martlet_core::hash::Hash;

/// Things that can go wrong starting or driving the session. Once the
/// dispatcher runs, errors are absorbed and logged rather than surfaced.
#[derive(Debug, Fail)]
pub enum Error {
	/// Error from the header chain.
	#[fail(display = "Chain error: {}", _0)]
	Chain(martlet_chain::Error),
	/// The configured best block is not part of the header chain.
	#[fail(display = "Unknown best block: {}", _0)]
	UnknownBestBlock(Hash),
	/// Failure spawning one of the node threads.
	#[fail(display = "I/O error: {}", _0)]
	Io(io::Error),
}

impl From<martlet_chain::Error> for Error {
	fn from(e: martlet_chain::Error) -> Error {
		Error::Chain(e)
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::Io(e)
	}
}
