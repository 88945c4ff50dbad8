//! Program-derived addresses used when completing a transfer.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_program,
};

pub const WSOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

const CREATE_IDEMPOTENT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub omniswap: Pubkey,
    pub token_bridge: Pubkey,
    pub core_bridge: Pubkey,
}

impl ProgramIds {
    fn omniswap_pda(&self, seeds: &[&[u8]]) -> Pubkey {
        Pubkey::find_program_address(seeds, &self.omniswap).0
    }

    fn token_bridge_pda(&self, seeds: &[&[u8]]) -> Pubkey {
        Pubkey::find_program_address(seeds, &self.token_bridge).0
    }

    pub fn redeemer_config(&self) -> Pubkey {
        self.omniswap_pda(&[b"redeemer"])
    }

    pub fn fee_config(&self) -> Pubkey {
        self.omniswap_pda(&[b"so_fee"])
    }

    /// Registered source contract; the chain id is little-endian here.
    pub fn foreign_contract(&self, chain: u16) -> Pubkey {
        self.omniswap_pda(&[b"foreign_contract", &chain.to_le_bytes()])
    }

    pub fn tmp_token_account(&self, mint: &Pubkey) -> Pubkey {
        self.omniswap_pda(&[b"tmp", mint.as_ref()])
    }

    pub fn unwrap_sol_account(&self) -> Pubkey {
        self.omniswap_pda(&[b"unwrap"])
    }

    pub fn token_bridge_config(&self) -> Pubkey {
        self.token_bridge_pda(&[b"config"])
    }

    pub fn custody(&self, mint: &Pubkey) -> Pubkey {
        self.token_bridge_pda(&[mint.as_ref()])
    }

    pub fn custody_signer(&self) -> Pubkey {
        self.token_bridge_pda(&[b"custody_signer"])
    }

    pub fn mint_authority(&self) -> Pubkey {
        self.token_bridge_pda(&[b"mint_signer"])
    }

    pub fn wrapped_mint(&self, token_chain: u16, token_address: &[u8; 32]) -> Pubkey {
        self.token_bridge_pda(&[b"wrapped", &token_chain.to_be_bytes(), token_address])
    }

    pub fn wrapped_meta(&self, mint: &Pubkey) -> Pubkey {
        self.token_bridge_pda(&[b"meta", mint.as_ref()])
    }

    pub fn foreign_endpoint(&self, emitter_chain: u16, emitter_address: &[u8; 32]) -> Pubkey {
        self.token_bridge_pda(&[&emitter_chain.to_be_bytes(), emitter_address])
    }

    pub fn claim(&self, emitter_address: &[u8; 32], emitter_chain: u16, sequence: u64) -> Pubkey {
        self.token_bridge_pda(&[
            emitter_address,
            &emitter_chain.to_be_bytes(),
            &sequence.to_be_bytes(),
        ])
    }

    /// Core bridge account holding a verified message, keyed by body hash.
    pub fn posted_vaa(&self, hash: &[u8; 32]) -> Pubkey {
        Pubkey::find_program_address(&[b"PostedVAA", hash], &self.core_bridge).0
    }
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Create `owner`'s token account for `mint` unless it already exists.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(associated_token_address(owner, mint), false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![CREATE_IDEMPOTENT],
    }
}

/// The all-zero address a payload uses to ask for native SOL.
pub fn is_native_sol(asset: &[u8]) -> bool {
    asset.len() == 32 && asset.iter().all(|b| *b == 0)
}
