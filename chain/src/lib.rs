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

//! The block header chain: accepts new headers, tracks cumulative work,
//! computes reorgs and answers the queries the sync core needs. No full
//! blocks are ever stored.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod error;
mod store;
mod types;

pub use crate::error::{Error, ErrorKind};
pub use crate::store::{HeaderChain, HeaderIndex, PowVerifier};
pub use crate::types::{ChainAction, HeaderAdded, HeaderEntry};
