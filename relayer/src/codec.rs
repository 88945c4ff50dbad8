//! Byte-packed swap payload carried after the token-transfer fields of a
//! transfer-with-payload message.
//!
//! Layout (every field prefixed by a single length byte unless noted):
//!
//! ```text
//! dst_max_gas_price | dst_max_gas | transaction_id | receiver | receiving_asset_id
//! [ reserved (swap count) | { call_target | sending_asset | receiving_asset | call_data }+ ]
//! ```
//!
//! `call_data` uses a 1-byte length in [`PayloadVersion::V1`] and a 2-byte
//! big-endian length in [`PayloadVersion::V2`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the integer read by [`IntegerMode::Compat5`] when the declared
/// width is outside the native range.
const COMPAT_INTEGER_WIDTH: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unsupported integer width {width} for {field}")]
    UnsupportedIntegerWidth { field: &'static str, width: usize },

    #[error("unexpected token bridge payload type {0}")]
    UnexpectedPayloadType(u8),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid receiver address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadVersion {
    /// Call data length is one byte.
    V1,
    /// Call data length is a big-endian u16.
    #[default]
    V2,
}

impl PayloadVersion {
    fn call_data_len_width(self) -> usize {
        match self {
            PayloadVersion::V1 => 1,
            PayloadVersion::V2 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegerMode {
    /// Integer widths outside 1..=8 are rejected.
    #[default]
    Strict,
    /// Integer widths outside 1..=8 are read as their first five bytes.
    Compat5,
}

/// Text form the receiver address is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    #[default]
    Base58,
    Hex,
}

impl AddressFormat {
    pub fn render(self, bytes: &[u8]) -> String {
        match self {
            AddressFormat::Base58 => bs58::encode(bytes).into_string(),
            AddressFormat::Hex => format!("0x{}", hex::encode(bytes)),
        }
    }

    pub fn parse(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            AddressFormat::Base58 => bs58::decode(text).into_vec().map_err(|e| e.to_string()),
            AddressFormat::Hex => {
                hex::decode(text.trim_start_matches("0x")).map_err(|e| e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodecConfig {
    #[serde(default)]
    pub version: PayloadVersion,
    #[serde(default)]
    pub integer_mode: IntegerMode,
    #[serde(default)]
    pub receiver_format: AddressFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapStep {
    pub call_target: Vec<u8>,
    pub sending_asset_id: Vec<u8>,
    pub receiving_asset_id: Vec<u8>,
    pub call_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainPayload {
    pub dst_max_gas_price: u64,
    pub dst_max_gas: u64,
    pub source_transaction_id: Vec<u8>,
    /// Receiver rendered in the destination chain's address format.
    pub receiver: String,
    pub receiving_asset_id: Vec<u8>,
    pub swap_steps: Vec<SwapStep>,
}

impl CrossChainPayload {
    pub fn without_swap(&self) -> bool {
        self.swap_steps.is_empty()
    }

    /// Asset released by the bridge before any swap runs.
    pub fn bridged_asset(&self) -> &[u8] {
        match self.swap_steps.first() {
            Some(step) => &step.sending_asset_id,
            None => &self.receiving_asset_id,
        }
    }

    /// Asset the receiver ends up holding.
    pub fn delivered_asset(&self) -> &[u8] {
        match self.swap_steps.last() {
            Some(step) => &step.receiving_asset_id,
            None => &self.receiving_asset_id,
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(field, 1)?[0])
    }

    fn length(&mut self, field: &'static str, width: usize) -> Result<usize, DecodeError> {
        let raw = self.take(field, width)?;
        Ok(raw.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }

    fn bytes(&mut self, field: &'static str, width: usize) -> Result<&'a [u8], DecodeError> {
        let len = self.length(field, width)?;
        self.take(field, len)
    }
}

fn be_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

fn minimal_be(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec {
    config: CodecConfig,
}

impl PayloadCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decode a payload, requiring the cursor to land exactly on the end of
    /// `buf`.
    pub fn decode(&self, buf: &[u8]) -> Result<CrossChainPayload, DecodeError> {
        let mut reader = Reader::new(buf);

        let dst_max_gas_price = self.read_integer(&mut reader, "dst_max_gas_price")?;
        let dst_max_gas = self.read_integer(&mut reader, "dst_max_gas")?;
        let source_transaction_id = reader.bytes("transaction_id", 1)?.to_vec();
        let receiver = self
            .config
            .receiver_format
            .render(reader.bytes("receiver", 1)?);
        let receiving_asset_id = reader.bytes("receiving_asset_id", 1)?.to_vec();

        let mut swap_steps = Vec::new();
        if !reader.is_empty() {
            let min_tail = 1 + self.min_step_len();
            if reader.remaining() < min_tail {
                return Err(DecodeError::Malformed(format!(
                    "{} trailing bytes cannot hold a swap section",
                    reader.remaining()
                )));
            }

            reader.bytes("reserved", 1)?;
            if reader.is_empty() {
                return Err(DecodeError::Malformed(
                    "swap section has no swap steps".to_string(),
                ));
            }

            while !reader.is_empty() {
                swap_steps.push(self.read_step(&mut reader)?);
            }
        }

        if !reader.is_empty() {
            return Err(DecodeError::Malformed(format!(
                "{} bytes left after last field",
                reader.remaining()
            )));
        }

        Ok(CrossChainPayload {
            dst_max_gas_price,
            dst_max_gas,
            source_transaction_id,
            receiver,
            receiving_asset_id,
            swap_steps,
        })
    }

    pub fn encode(&self, payload: &CrossChainPayload) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();

        put_field(&mut out, "dst_max_gas_price", &minimal_be(payload.dst_max_gas_price), 1)?;
        put_field(&mut out, "dst_max_gas", &minimal_be(payload.dst_max_gas), 1)?;
        put_field(&mut out, "transaction_id", &payload.source_transaction_id, 1)?;
        let receiver = self
            .config
            .receiver_format
            .parse(&payload.receiver)
            .map_err(EncodeError::InvalidAddress)?;
        put_field(&mut out, "receiver", &receiver, 1)?;
        put_field(&mut out, "receiving_asset_id", &payload.receiving_asset_id, 1)?;

        if !payload.swap_steps.is_empty() {
            put_field(
                &mut out,
                "reserved",
                &minimal_be(payload.swap_steps.len() as u64),
                1,
            )?;
        }

        let width = self.config.version.call_data_len_width();
        for step in &payload.swap_steps {
            put_field(&mut out, "call_target", &step.call_target, 1)?;
            put_field(&mut out, "sending_asset_id", &step.sending_asset_id, 1)?;
            put_field(&mut out, "receiving_asset_id", &step.receiving_asset_id, 1)?;
            put_field(&mut out, "call_data", &step.call_data, width)?;
        }

        Ok(out)
    }

    fn min_step_len(&self) -> usize {
        3 + self.config.version.call_data_len_width()
    }

    fn read_integer(
        &self,
        reader: &mut Reader<'_>,
        field: &'static str,
    ) -> Result<u64, DecodeError> {
        let width = reader.u8(field)? as usize;
        if (1..=8).contains(&width) {
            return Ok(be_to_u64(reader.take(field, width)?));
        }

        match self.config.integer_mode {
            IntegerMode::Strict => Err(DecodeError::UnsupportedIntegerWidth { field, width }),
            IntegerMode::Compat5 => {
                let raw = reader.take(field, width)?;
                if raw.len() < COMPAT_INTEGER_WIDTH {
                    return Err(DecodeError::UnsupportedIntegerWidth { field, width });
                }
                Ok(be_to_u64(&raw[..COMPAT_INTEGER_WIDTH]))
            }
        }
    }

    fn read_step(&self, reader: &mut Reader<'_>) -> Result<SwapStep, DecodeError> {
        let call_target = reader.bytes("call_target", 1)?.to_vec();
        let sending_asset_id = reader.bytes("sending_asset_id", 1)?.to_vec();
        let receiving_asset_id = reader.bytes("swap_receiving_asset_id", 1)?.to_vec();
        let call_data = reader
            .bytes("call_data", self.config.version.call_data_len_width())?
            .to_vec();

        Ok(SwapStep {
            call_target,
            sending_asset_id,
            receiving_asset_id,
            call_data,
        })
    }
}

fn put_field(
    out: &mut Vec<u8>,
    field: &'static str,
    value: &[u8],
    width: usize,
) -> Result<(), EncodeError> {
    let max = (1usize << (8 * width)) - 1;
    if value.len() > max {
        return Err(EncodeError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    let len = value.len().to_be_bytes();
    out.extend_from_slice(&len[len.len() - width..]);
    out.extend_from_slice(value);
    Ok(())
}
