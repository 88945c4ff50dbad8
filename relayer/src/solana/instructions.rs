//! Completion instructions for the omniswap program.

use super::accounts::{
    associated_token_address, is_native_sol, ProgramIds, ASSOCIATED_TOKEN_PROGRAM_ID,
    TOKEN_PROGRAM_ID, WSOL_MINT,
};
use crate::quote::WhirlpoolRoute;
use crate::types::AssetRepresentation;
use crate::vaa::ParsedTransfer;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::{ParsePubkeyError, Pubkey},
    system_program, sysvar,
};
use std::str::FromStr;

/// First 8 bytes of `sha256("global:<method>")`.
pub fn discriminator(method: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{}", method).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[derive(BorshSerialize)]
struct WithoutSwapArgs {
    vaa_hash: [u8; 32],
    skip_verify_soswap_message: bool,
}

#[derive(BorshSerialize)]
struct WithSwapArgs {
    vaa_hash: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemInstruction {
    NativeWithoutSwap { vaa_hash: [u8; 32], skip_verify: bool },
    WrappedWithoutSwap { vaa_hash: [u8; 32], skip_verify: bool },
    NativeWithWhirlpool { vaa_hash: [u8; 32] },
    WrappedWithWhirlpool { vaa_hash: [u8; 32] },
}

impl RedeemInstruction {
    pub fn method(&self) -> &'static str {
        match self {
            Self::NativeWithoutSwap { .. } => "complete_so_swap_native_without_swap",
            Self::WrappedWithoutSwap { .. } => "complete_so_swap_wrapped_without_swap",
            Self::NativeWithWhirlpool { .. } => "complete_so_swap_native_with_whirlpool",
            Self::WrappedWithWhirlpool { .. } => "complete_so_swap_wrapped_with_whirlpool",
        }
    }

    pub fn pack(&self) -> std::io::Result<Vec<u8>> {
        let mut data = discriminator(self.method()).to_vec();
        match *self {
            Self::NativeWithoutSwap { vaa_hash, skip_verify }
            | Self::WrappedWithoutSwap { vaa_hash, skip_verify } => WithoutSwapArgs {
                vaa_hash,
                skip_verify_soswap_message: skip_verify,
            }
            .serialize(&mut data)?,
            Self::NativeWithWhirlpool { vaa_hash } | Self::WrappedWithWhirlpool { vaa_hash } => {
                WithSwapArgs { vaa_hash }.serialize(&mut data)?
            }
        }
        Ok(data)
    }
}

/// Accounts the program needs to unwrap SOL for the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwrapSolAccounts {
    pub unwrap_sol_account: Pubkey,
    pub wsol_mint: Pubkey,
    pub recipient: Pubkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCustody {
    Native {
        custody: Pubkey,
        custody_signer: Pubkey,
    },
    Wrapped {
        wrapped_meta: Pubkey,
        mint_authority: Pubkey,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemAccounts {
    pub payer: Pubkey,
    pub config: Pubkey,
    pub fee_config: Pubkey,
    pub beneficiary_token_account: Pubkey,
    pub foreign_contract: Pubkey,
    pub unwrap: Option<UnwrapSolAccounts>,
    /// Bridged mint: the native mint or the token bridge's wrapped mint.
    pub mint: Pubkey,
    pub recipient: Pubkey,
    /// Mint the receiver ends up holding.
    pub delivered_mint: Pubkey,
    pub recipient_token_account: Pubkey,
    pub recipient_bridge_token_account: Pubkey,
    pub tmp_token_account: Pubkey,
    pub token_bridge_config: Pubkey,
    pub vaa: Pubkey,
    pub token_bridge_claim: Pubkey,
    pub token_bridge_foreign_endpoint: Pubkey,
    pub custody: BridgeCustody,
}

impl RedeemAccounts {
    pub fn derive(
        ids: &ProgramIds,
        payer: Pubkey,
        beneficiary: Pubkey,
        recipient: Pubkey,
        parsed: &ParsedTransfer,
        asset: AssetRepresentation,
    ) -> Self {
        let vaa = &parsed.vaa;
        let transfer = &parsed.transfer;

        let (mint, custody) = match asset {
            AssetRepresentation::Native => {
                let mint = Pubkey::new_from_array(transfer.token_address);
                (
                    mint,
                    BridgeCustody::Native {
                        custody: ids.custody(&mint),
                        custody_signer: ids.custody_signer(),
                    },
                )
            }
            AssetRepresentation::Wrapped => {
                let mint = ids.wrapped_mint(transfer.token_chain, &transfer.token_address);
                (
                    mint,
                    BridgeCustody::Wrapped {
                        wrapped_meta: ids.wrapped_meta(&mint),
                        mint_authority: ids.mint_authority(),
                    },
                )
            }
        };

        let receiving_asset = &parsed.payload.receiving_asset_id;
        let unwrap = is_native_sol(receiving_asset).then(|| UnwrapSolAccounts {
            unwrap_sol_account: ids.unwrap_sol_account(),
            wsol_mint: WSOL_MINT,
            recipient,
        });

        // Without a swap the receiver gets the bridged mint itself.
        let delivered_mint = if parsed.payload.without_swap() {
            mint
        } else if unwrap.is_some() {
            WSOL_MINT
        } else {
            Pubkey::try_from(receiving_asset.as_slice()).unwrap_or(mint)
        };

        Self {
            payer,
            config: ids.redeemer_config(),
            fee_config: ids.fee_config(),
            beneficiary_token_account: associated_token_address(&beneficiary, &mint),
            foreign_contract: ids.foreign_contract(vaa.emitter_chain),
            unwrap,
            mint,
            recipient,
            delivered_mint,
            recipient_token_account: associated_token_address(&recipient, &delivered_mint),
            recipient_bridge_token_account: associated_token_address(&recipient, &mint),
            tmp_token_account: ids.tmp_token_account(&mint),
            token_bridge_config: ids.token_bridge_config(),
            vaa: ids.posted_vaa(&vaa.hash),
            token_bridge_claim: ids.claim(&vaa.emitter_address, vaa.emitter_chain, vaa.sequence),
            token_bridge_foreign_endpoint: ids
                .foreign_endpoint(vaa.emitter_chain, &vaa.emitter_address),
            custody,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhirlpoolAccounts {
    pub program: Pubkey,
    pub whirlpool: Pubkey,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub token_owner_account_a: Pubkey,
    pub token_vault_a: Pubkey,
    pub token_owner_account_b: Pubkey,
    pub token_vault_b: Pubkey,
    pub tick_arrays: [Pubkey; 3],
    pub oracle: Pubkey,
}

impl TryFrom<&WhirlpoolRoute> for WhirlpoolAccounts {
    type Error = ParsePubkeyError;

    fn try_from(route: &WhirlpoolRoute) -> Result<Self, Self::Error> {
        Ok(Self {
            program: Pubkey::from_str(&route.whirlpool_program)?,
            whirlpool: Pubkey::from_str(&route.whirlpool)?,
            token_mint_a: Pubkey::from_str(&route.token_mint_a)?,
            token_mint_b: Pubkey::from_str(&route.token_mint_b)?,
            token_owner_account_a: Pubkey::from_str(&route.token_owner_account_a)?,
            token_vault_a: Pubkey::from_str(&route.token_vault_a)?,
            token_owner_account_b: Pubkey::from_str(&route.token_owner_account_b)?,
            token_vault_b: Pubkey::from_str(&route.token_vault_b)?,
            tick_arrays: [
                Pubkey::from_str(&route.tick_array_0)?,
                Pubkey::from_str(&route.tick_array_1)?,
                Pubkey::from_str(&route.tick_array_2)?,
            ],
            oracle: Pubkey::from_str(&route.oracle)?,
        })
    }
}

fn optional(key: Option<Pubkey>, writable: bool, program_id: &Pubkey) -> AccountMeta {
    match key {
        Some(key) if writable => AccountMeta::new(key, false),
        Some(key) => AccountMeta::new_readonly(key, false),
        None => AccountMeta::new_readonly(*program_id, false),
    }
}

fn head(accounts: &RedeemAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(accounts.payer, true),
        AccountMeta::new_readonly(accounts.config, false),
        AccountMeta::new_readonly(accounts.fee_config, false),
        AccountMeta::new(accounts.beneficiary_token_account, false),
        AccountMeta::new_readonly(accounts.foreign_contract, false),
    ]
}

fn unwrap_metas(accounts: &RedeemAccounts, program_id: &Pubkey) -> Vec<AccountMeta> {
    let unwrap = accounts.unwrap;
    vec![
        optional(unwrap.map(|u| u.unwrap_sol_account), true, program_id),
        optional(unwrap.map(|u| u.wsol_mint), false, program_id),
        optional(unwrap.map(|u| u.recipient), true, program_id),
    ]
}

fn whirlpool_metas(whirlpool: &WhirlpoolAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(whirlpool.program, false),
        AccountMeta::new(whirlpool.whirlpool, false),
        AccountMeta::new(whirlpool.token_owner_account_a, false),
        AccountMeta::new(whirlpool.token_vault_a, false),
        AccountMeta::new(whirlpool.token_owner_account_b, false),
        AccountMeta::new(whirlpool.token_vault_b, false),
        AccountMeta::new(whirlpool.tick_arrays[0], false),
        AccountMeta::new(whirlpool.tick_arrays[1], false),
        AccountMeta::new(whirlpool.tick_arrays[2], false),
        AccountMeta::new_readonly(whirlpool.oracle, false),
    ]
}

/// Token bridge accounts from the program ids through the custody pair.
fn bridge_metas(ids: &ProgramIds, accounts: &RedeemAccounts) -> Vec<AccountMeta> {
    let mut metas = vec![
        AccountMeta::new_readonly(ids.core_bridge, false),
        AccountMeta::new_readonly(ids.token_bridge, false),
    ];
    if let BridgeCustody::Wrapped { wrapped_meta, .. } = accounts.custody {
        metas.push(AccountMeta::new_readonly(wrapped_meta, false));
    }
    metas.extend([
        AccountMeta::new_readonly(accounts.token_bridge_config, false),
        AccountMeta::new_readonly(accounts.vaa, false),
        AccountMeta::new(accounts.token_bridge_claim, false),
        AccountMeta::new_readonly(accounts.token_bridge_foreign_endpoint, false),
    ]);
    match accounts.custody {
        BridgeCustody::Native {
            custody,
            custody_signer,
        } => {
            metas.push(AccountMeta::new(custody, false));
            metas.push(AccountMeta::new_readonly(custody_signer, false));
        }
        BridgeCustody::Wrapped { mint_authority, .. } => {
            metas.push(AccountMeta::new_readonly(mint_authority, false));
        }
    }
    metas
}

fn tail() -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ]
}

fn mint_meta(accounts: &RedeemAccounts) -> AccountMeta {
    match accounts.custody {
        BridgeCustody::Native { .. } => AccountMeta::new_readonly(accounts.mint, false),
        BridgeCustody::Wrapped { .. } => AccountMeta::new(accounts.mint, false),
    }
}

pub fn create_complete_without_swap_instruction(
    ids: &ProgramIds,
    accounts: &RedeemAccounts,
    vaa_hash: [u8; 32],
    skip_verify: bool,
) -> std::io::Result<Instruction> {
    let mut metas = head(accounts);
    let data = match accounts.custody {
        BridgeCustody::Native { .. } => {
            metas.extend(unwrap_metas(accounts, &ids.omniswap));
            RedeemInstruction::NativeWithoutSwap { vaa_hash, skip_verify }
        }
        BridgeCustody::Wrapped { .. } => {
            RedeemInstruction::WrappedWithoutSwap { vaa_hash, skip_verify }
        }
    }
    .pack()?;

    metas.push(mint_meta(accounts));
    metas.push(AccountMeta::new(accounts.recipient_token_account, false));
    metas.push(AccountMeta::new(accounts.tmp_token_account, false));
    metas.extend(bridge_metas(ids, accounts));
    metas.extend(tail());

    Ok(Instruction {
        program_id: ids.omniswap,
        accounts: metas,
        data,
    })
}

pub fn create_complete_with_whirlpool_instruction(
    ids: &ProgramIds,
    accounts: &RedeemAccounts,
    whirlpool: &WhirlpoolAccounts,
    vaa_hash: [u8; 32],
) -> std::io::Result<Instruction> {
    let data = match accounts.custody {
        BridgeCustody::Native { .. } => RedeemInstruction::NativeWithWhirlpool { vaa_hash },
        BridgeCustody::Wrapped { .. } => RedeemInstruction::WrappedWithWhirlpool { vaa_hash },
    }
    .pack()?;

    let mut metas = head(accounts);
    metas.extend(whirlpool_metas(whirlpool));
    metas.extend(unwrap_metas(accounts, &ids.omniswap));
    metas.push(mint_meta(accounts));
    metas.push(AccountMeta::new(accounts.recipient_token_account, false));
    metas.push(AccountMeta::new(accounts.recipient_bridge_token_account, false));
    metas.push(AccountMeta::new(accounts.tmp_token_account, false));
    metas.extend(bridge_metas(ids, accounts));
    metas.extend(tail());

    Ok(Instruction {
        program_id: ids.omniswap,
        accounts: metas,
        data,
    })
}
