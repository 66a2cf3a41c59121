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

//! Transactions. The client neither constructs nor validates transactions;
//! it ferries them between peers and the wallet, so only structure and
//! identity (txid) are implemented here. Scripts stay opaque byte strings.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::hash::{Hash, Hashed};
use crate::ser::{write_bytes, write_varint, Writeable};

/// A reference to an output of an earlier transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutPoint {
	/// Transaction the output belongs to.
	pub txid: Hash,
	/// Index of the output within that transaction.
	pub vout: u32,
}

/// A transaction input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxIn {
	/// The output being spent.
	pub prev_output: OutPoint,
	/// Spending script, opaque to the client.
	pub script_sig: Vec<u8>,
	/// Sequence number.
	pub sequence: u32,
}

/// A transaction output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
	/// Value in satoshis.
	pub value: u64,
	/// Locking script, opaque to the client.
	pub script_pubkey: Vec<u8>,
}

/// A Bitcoin transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
	/// Transaction format version.
	pub version: u32,
	/// Inputs spending earlier outputs.
	pub inputs: Vec<TxIn>,
	/// Newly created outputs.
	pub outputs: Vec<TxOut>,
	/// Earliest block height or time the transaction may be mined at.
	pub lock_time: u32,
}

impl Writeable for OutPoint {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		self.txid.write(writer)?;
		writer.write_u32::<LittleEndian>(self.vout)
	}
}

impl Writeable for TxIn {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		self.prev_output.write(writer)?;
		write_bytes(writer, &self.script_sig)?;
		writer.write_u32::<LittleEndian>(self.sequence)
	}
}

impl Writeable for TxOut {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u64::<LittleEndian>(self.value)?;
		write_bytes(writer, &self.script_pubkey)
	}
}

impl Writeable for Transaction {
	fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u32::<LittleEndian>(self.version)?;
		write_varint(writer, self.inputs.len() as u64)?;
		for input in &self.inputs {
			input.write(writer)?;
		}
		write_varint(writer, self.outputs.len() as u64)?;
		for output in &self.outputs {
			output.write(writer)?;
		}
		writer.write_u32::<LittleEndian>(self.lock_time)
	}
}

impl Hashed for Transaction {
	fn bytes(&self) -> Vec<u8> {
		self.ser_vec()
	}
}

impl Transaction {
	/// Hash identifying this transaction.
	pub fn txid(&self) -> Hash {
		Hashed::hash(self)
	}
}
