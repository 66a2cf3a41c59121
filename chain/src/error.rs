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

//! Error types for the header chain.

use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

use martlet_core::hash::Hash;

/// Error definition
#[derive(Debug)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Header chain error definitions
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// The header's parent is not part of the chain
	#[fail(display = "Orphan header")]
	Orphan,
	/// The header hash does not meet its own declared target
	#[fail(display = "Invalid PoW")]
	InvalidPow,
	/// The compact difficulty encoding is negative, zero or overflows
	#[fail(display = "Invalid difficulty encoding")]
	InvalidDifficulty,
	/// Header timestamp is too far in the future
	#[fail(display = "Invalid header time")]
	InvalidHeaderTime,
	/// A referenced header is not part of the chain
	#[fail(display = "Unknown header: {}", _0)]
	UnknownHeader(Hash),
	/// A referenced header is not on the current best chain
	#[fail(display = "Header not on current chain: {}", _0)]
	NotOnCurrentChain(Hash),
	/// Anything else
	#[fail(display = "Other error: {}", _0)]
	Other(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		Display::fmt(&self.inner, f)
	}
}

impl Error {
	/// get kind
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
	/// get cause
	pub fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}
	/// get backtrace
	pub fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}
}

impl Fail for Error {
	fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}

	fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}
