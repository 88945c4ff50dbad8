#![allow(dead_code)]

use omniswap_relayer::codec::{PayloadCodec, SwapStep};
use omniswap_relayer::types::PendingTransfer;
use omniswap_relayer::vaa::ParsedTransfer;

/// Signed transfer from BSC (chain 4) to Solana, sequence 4971, no swap steps.
pub const SAMPLE_VAA: &str = "01000000000100a27a9ee47f5cc670f2f959e3a993fe393940dcfc55d7ecf36f75734e27f31d6c6045d835cf9d81b418383bc2a61ce3e1d8aa2ae0b9fccabe88917fa2b66d621901652212a80000000000040000000000000000000000009dcf9d205c9de35334d646bee44b2d2859712a09000000000000136b0f0300000000000000000000000000000000000000000000000000000000000f42403b442cb3912157f13a933d0134282d032b5ffecd01a2dbf1b7790608df002ea700017ef1dcda48c0b739dfd4da982c187838573cc044d8ded9fe382b84ceb6fa6b53000100000000000000000000000084b7ca95ac91f8903acb08b27f5b41a4de2dc0fc010102deac20d5006ba1ae36806c379a926d648b5e0783e966eddde87b8920717a7e819436982038e121709ad96bd37a2f87022932336e9a290f62aef3d41dae00b1547c6f1938203b442cb3912157f13a933d0134282d032b5ffecd01a2dbf1b7790608df002ea7";

pub const SAMPLE_CONTRACT: &str = "7ef1dcda48c0b739dfd4da982c187838573cc044d8ded9fe382b84ceb6fa6b53";

pub const SAMPLE_QUOTE: &str = r#"{
  "whirlpool_program": "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",
  "whirlpool": "b3D36rfrihrvLmwfvAzbnX9qF1aJ4hVguZFmjqsxVbV",
  "token_mint_a": "281LhxeKQ2jaFDx9HAHcdrU9CpedSH7hx5PuRrM7e1FS",
  "token_mint_b": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
  "token_owner_account_a": "7CxzRURXNEYJU5D2oqFdtg25RcVLkwCbaNJnC8RXZwEP",
  "token_owner_account_b": "68DjnBuZ6UtM6dGoTGhu2rqV5ZSowsPGgv2AWD1xuGB4",
  "token_vault_a": "3dycP3pym3q6DgUpZRviaavaScwrrCuC6QyLhiLfSXge",
  "token_vault_b": "969UqMJSqvgxmNuAWZx91PAnLJU825qJRAAcEVQMWASg",
  "tick_array_0": "CXmxVvENVutfAmmHUSVNatgcidiu26uSXuCK8ufvqfxp",
  "tick_array_1": "CXmxVvENVutfAmmHUSVNatgcidiu26uSXuCK8ufvqfxp",
  "tick_array_2": "CXmxVvENVutfAmmHUSVNatgcidiu26uSXuCK8ufvqfxp",
  "oracle": "44xQG1Fgv5k3Us1s5Mcg6MQiQV2oSeocBRwo7hZvKdRo",
  "is_a_to_b": true,
  "amount_in": "100000000000",
  "estimated_amount_out": "210498",
  "min_amount_out": "208413"
}"#;

pub fn sample_bytes() -> Vec<u8> {
    hex::decode(SAMPLE_VAA).unwrap()
}

/// The sample message with `steps` whirlpool swap steps appended to its payload.
pub fn sample_with_steps(steps: usize) -> Vec<u8> {
    let codec = PayloadCodec::default();
    let bytes = sample_bytes();
    let mut parsed = ParsedTransfer::parse(&bytes, &codec).unwrap();
    for _ in 0..steps {
        parsed.payload.swap_steps.push(SwapStep {
            call_target: b"b3D36rfrihrvLmwfvAzbnX9qF1aJ4hVguZFmjqsxVbV".to_vec(),
            sending_asset_id: parsed.transfer.token_address.to_vec(),
            receiving_asset_id: vec![0u8; 32],
            call_data: vec![0x01],
        });
    }
    let custom = codec.encode(&parsed.payload).unwrap();

    // header(6) + one signature(66) + body fixed part(51) + transfer(133)
    let mut out = bytes[..6 + 66 + 51 + 133].to_vec();
    out.extend_from_slice(&custom);
    out
}

pub fn pending(sequence: u64) -> PendingTransfer {
    PendingTransfer {
        chain_name: "bsc-test".to_string(),
        source_transaction_hash: format!("0x{:04x}", sequence),
        source_chain_id: 4,
        destination_chain_id: 1,
        sequence,
        block_timestamp: 0,
        origin_block: None,
    }
}

pub fn temp_path(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("omniswap-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}
