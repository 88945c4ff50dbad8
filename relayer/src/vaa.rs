//! Guardian-signed message envelope and the token bridge transfer framing
//! carried inside it.

use crate::codec::{CrossChainPayload, DecodeError, PayloadCodec};
use serde::Serialize;
use sha3::{Digest, Keccak256};

const SIGNATURE_LEN: usize = 66;
const HEADER_LEN: usize = 6;
const BODY_FIXED_LEN: usize = 51;
const TRANSFER_FIXED_LEN: usize = 133;

pub const PAYLOAD_ID_TRANSFER: u8 = 1;
pub const PAYLOAD_ID_TRANSFER_WITH_PAYLOAD: u8 = 3;

fn need(buf: &[u8], len: usize, field: &'static str) -> Result<(), DecodeError> {
    if buf.len() < len {
        return Err(DecodeError::Truncated {
            field,
            needed: len,
            remaining: buf.len(),
        });
    }
    Ok(())
}

fn array32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    out
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardianSignature {
    pub index: u8,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedVaa {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<GuardianSignature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: u16,
    #[serde(with = "hex_bytes")]
    pub emitter_address: [u8; 32],
    pub sequence: u64,
    pub consistency_level: u8,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// keccak256 of the body, the key the core bridge stores posted messages under.
    #[serde(with = "hex_bytes")]
    pub hash: [u8; 32],
}

impl SignedVaa {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        need(bytes, HEADER_LEN, "vaa_header")?;

        let num_signers = bytes[5] as usize;
        let body_start = HEADER_LEN + num_signers * SIGNATURE_LEN;
        need(bytes, body_start, "guardian_signatures")?;

        let signatures = bytes[HEADER_LEN..body_start]
            .chunks_exact(SIGNATURE_LEN)
            .map(|chunk| GuardianSignature {
                index: chunk[0],
                signature: chunk[1..].to_vec(),
            })
            .collect();

        let body = &bytes[body_start..];
        need(body, BODY_FIXED_LEN, "vaa_body")?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Keccak256::digest(body));

        Ok(Self {
            version: bytes[0],
            guardian_set_index: be_u32(&bytes[1..5]),
            signatures,
            timestamp: be_u32(&body[0..4]),
            nonce: be_u32(&body[4..8]),
            emitter_chain: be_u16(&body[8..10]),
            emitter_address: array32(&body[10..42]),
            sequence: be_u64(&body[42..50]),
            consistency_level: body[50],
            payload: body[BODY_FIXED_LEN..].to_vec(),
            hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub payload_id: u8,
    /// Normalised to at most 8 decimals by the token bridge.
    #[serde(with = "hex_bytes")]
    pub amount: [u8; 32],
    #[serde(with = "hex_bytes")]
    pub token_address: [u8; 32],
    pub token_chain: u16,
    #[serde(with = "hex_bytes")]
    pub to: [u8; 32],
    pub to_chain: u16,
    /// Relayer fee for plain transfers, sender for transfers with payload.
    #[serde(with = "hex_bytes")]
    pub fee_or_from: [u8; 32],
    #[serde(with = "hex_bytes")]
    pub custom_payload: Vec<u8>,
}

impl TokenTransfer {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        need(payload, 1, "payload_id")?;
        let payload_id = payload[0];
        if payload_id != PAYLOAD_ID_TRANSFER && payload_id != PAYLOAD_ID_TRANSFER_WITH_PAYLOAD {
            return Err(DecodeError::UnexpectedPayloadType(payload_id));
        }
        need(payload, TRANSFER_FIXED_LEN, "token_transfer")?;

        Ok(Self {
            payload_id,
            amount: array32(&payload[1..33]),
            token_address: array32(&payload[33..65]),
            token_chain: be_u16(&payload[65..67]),
            to: array32(&payload[67..99]),
            to_chain: be_u16(&payload[99..101]),
            fee_or_from: array32(&payload[101..133]),
            custom_payload: payload[TRANSFER_FIXED_LEN..].to_vec(),
        })
    }

    /// Amount as u64. Normalised bridge amounts always fit.
    pub fn amount_u64(&self) -> Option<u64> {
        if self.amount[..24].iter().any(|b| *b != 0) {
            return None;
        }
        Some(be_u64(&self.amount[24..]))
    }

    pub fn decode_payload(&self, codec: &PayloadCodec) -> Result<CrossChainPayload, DecodeError> {
        if self.payload_id != PAYLOAD_ID_TRANSFER_WITH_PAYLOAD {
            return Err(DecodeError::UnexpectedPayloadType(self.payload_id));
        }
        codec.decode(&self.custom_payload)
    }
}

/// A signed message fully parsed down to its swap payload.
#[derive(Debug, Clone)]
pub struct ParsedTransfer {
    pub vaa: SignedVaa,
    pub transfer: TokenTransfer,
    pub payload: CrossChainPayload,
}

impl ParsedTransfer {
    pub fn parse(bytes: &[u8], codec: &PayloadCodec) -> Result<Self, DecodeError> {
        let vaa = SignedVaa::parse(bytes)?;
        let transfer = TokenTransfer::parse(&vaa.payload)?;
        let payload = transfer.decode_payload(codec)?;
        Ok(Self {
            vaa,
            transfer,
            payload,
        })
    }
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S, T>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes.as_ref())))
    }
}
