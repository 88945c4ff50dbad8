use super::accounts::{
    associated_token_address, create_associated_token_account_idempotent, ProgramIds,
};
use super::instructions::{
    create_complete_with_whirlpool_instruction, create_complete_without_swap_instruction,
    RedeemAccounts, WhirlpoolAccounts,
};
use crate::codec::AddressFormat;
use crate::config::SolanaConfig;
use crate::destination::{Completion, Destination, SubmitError};
use crate::error::{RelayerError, Result};
use crate::types::AssetRepresentation;
use crate::vaa::ParsedTransfer;
use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Completes transfers on Solana as the configured relayer key.
pub struct SolanaDestination {
    client: Arc<RpcClient>,
    payer: Keypair,
    ids: ProgramIds,
    beneficiary: Pubkey,
    lookup_table: Option<Pubkey>,
    compute_unit_limit: u32,
    chain_id: u16,
    receiver_format: AddressFormat,
}

fn parse_key(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| RelayerError::ConfigError(format!("Invalid {} {}: {}", label, value, e)))
}

impl SolanaDestination {
    pub fn new(
        client: Arc<RpcClient>,
        config: &SolanaConfig,
        chain_id: u16,
        receiver_format: AddressFormat,
    ) -> Result<Self> {
        let payer = Keypair::from_bytes(&config.relayer_key)
            .map_err(|e| RelayerError::ConfigError(format!("Invalid keypair: {}", e)))?;

        let ids = ProgramIds {
            omniswap: parse_key("omniswap program", &config.omniswap_program_id)?,
            token_bridge: parse_key("token bridge program", &config.token_bridge_program_id)?,
            core_bridge: parse_key("core bridge program", &config.core_bridge_program_id)?,
        };

        let lookup_table = if config.lookup_table.is_empty() {
            None
        } else {
            Some(parse_key("lookup table", &config.lookup_table)?)
        };

        info!("Solana relayer account: {}", payer.pubkey());

        Ok(Self {
            client,
            payer,
            ids,
            beneficiary: parse_key("beneficiary", &config.beneficiary)?,
            lookup_table,
            compute_unit_limit: config.compute_unit_limit,
            chain_id,
            receiver_format,
        })
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    fn recipient(&self, parsed: &ParsedTransfer) -> std::result::Result<Pubkey, SubmitError> {
        let bytes = self
            .receiver_format
            .parse(&parsed.payload.receiver)
            .map_err(|e| {
                SubmitError::Other(format!("receiver {}: {}", parsed.payload.receiver, e))
            })?;
        Pubkey::try_from(bytes.as_slice()).map_err(|_| {
            SubmitError::Other(format!("receiver {} is not 32 bytes", parsed.payload.receiver))
        })
    }

    async fn account_exists(&self, key: &Pubkey) -> std::result::Result<bool, SubmitError> {
        self.client
            .get_account_with_commitment(key, self.client.commitment())
            .await
            .map(|response| response.value.is_some())
            .map_err(|e| SubmitError::Other(format!("get account {}: {}", key, e)))
    }

    async fn lookup_tables(
        &self,
    ) -> std::result::Result<Vec<AddressLookupTableAccount>, SubmitError> {
        let Some(key) = self.lookup_table else {
            return Ok(Vec::new());
        };
        let account = self
            .client
            .get_account(&key)
            .await
            .map_err(|e| SubmitError::Other(format!("lookup table {}: {}", key, e)))?;
        let table = AddressLookupTable::deserialize(&account.data)
            .map_err(|e| SubmitError::Other(format!("lookup table {}: {}", key, e)))?;
        Ok(vec![AddressLookupTableAccount {
            key,
            addresses: table.addresses.to_vec(),
        }])
    }

    /// Token accounts the program expects to exist before it runs.
    fn token_account_setup(
        &self,
        accounts: &RedeemAccounts,
        whirlpool: Option<&WhirlpoolAccounts>,
    ) -> Vec<Instruction> {
        let payer = self.payer.pubkey();
        let mut owners = vec![
            (self.beneficiary, accounts.mint),
            (accounts.recipient, accounts.delivered_mint),
        ];
        if let Some(whirlpool) = whirlpool {
            owners.push((accounts.recipient, accounts.mint));
            for (owner_account, mint) in [
                (whirlpool.token_owner_account_a, whirlpool.token_mint_a),
                (whirlpool.token_owner_account_b, whirlpool.token_mint_b),
            ] {
                if owner_account == associated_token_address(&payer, &mint) {
                    owners.push((payer, mint));
                }
            }
        }
        let mut unique: Vec<(Pubkey, Pubkey)> = Vec::with_capacity(owners.len());
        for pair in owners {
            if !unique.contains(&pair) {
                unique.push(pair);
            }
        }
        unique
            .iter()
            .map(|(owner, mint)| create_associated_token_account_idempotent(&payer, owner, mint))
            .collect()
    }

    async fn send(
        &self,
        instructions: Vec<Instruction>,
    ) -> std::result::Result<String, SubmitError> {
        let mut all = vec![ComputeBudgetInstruction::set_compute_unit_limit(
            self.compute_unit_limit,
        )];
        all.extend(instructions);

        let tables = self.lookup_tables().await?;
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|e| SubmitError::Other(format!("blockhash: {}", e)))?;

        let message = v0::Message::try_compile(&self.payer.pubkey(), &all, &tables, blockhash)
            .map_err(|e| SubmitError::Other(format!("compile message: {}", e)))?;
        let transaction =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[&self.payer])
                .map_err(|e| SubmitError::Other(format!("sign transaction: {}", e)))?;

        let signature = self
            .client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| classify_client_error(&e))?;
        Ok(signature.to_string())
    }
}

/// Classify an RPC failure, including preflight program logs when present.
pub fn classify_client_error(err: &ClientError) -> SubmitError {
    let mut text = err.to_string();
    if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
        data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
        ..
    }) = err.kind()
    {
        if let Some(logs) = &simulation.logs {
            text.push('\n');
            text.push_str(&logs.join("\n"));
        }
    }
    SubmitError::classify(text)
}

#[async_trait]
impl Destination for SolanaDestination {
    async fn asset_representation(
        &self,
        parsed: &ParsedTransfer,
    ) -> std::result::Result<AssetRepresentation, SubmitError> {
        let transfer = &parsed.transfer;
        if transfer.token_chain == self.chain_id {
            return Ok(AssetRepresentation::Native);
        }
        let wrapped = self
            .ids
            .wrapped_mint(transfer.token_chain, &transfer.token_address);
        if self.account_exists(&wrapped).await? {
            Ok(AssetRepresentation::Wrapped)
        } else {
            Err(SubmitError::Other(format!(
                "no wrapped mint {} for token {} on chain {}",
                wrapped,
                hex::encode(transfer.token_address),
                transfer.token_chain
            )))
        }
    }

    async fn complete(
        &self,
        parsed: &ParsedTransfer,
        asset: AssetRepresentation,
        completion: &Completion,
    ) -> std::result::Result<String, SubmitError> {
        let recipient = self.recipient(parsed)?;
        let accounts = RedeemAccounts::derive(
            &self.ids,
            self.payer.pubkey(),
            self.beneficiary,
            recipient,
            parsed,
            asset,
        );
        let hash = parsed.vaa.hash;

        let (mut instructions, redeem) = match completion {
            Completion::WithoutSwap { skip_verify } => (
                self.token_account_setup(&accounts, None),
                create_complete_without_swap_instruction(&self.ids, &accounts, hash, *skip_verify),
            ),
            Completion::WithSwap { route } => {
                let whirlpool = WhirlpoolAccounts::try_from(route)
                    .map_err(|e| SubmitError::Other(format!("quote account: {}", e)))?;
                (
                    self.token_account_setup(&accounts, Some(&whirlpool)),
                    create_complete_with_whirlpool_instruction(
                        &self.ids, &accounts, &whirlpool, hash,
                    ),
                )
            }
        };
        instructions
            .push(redeem.map_err(|e| SubmitError::Other(format!("encode instruction: {}", e)))?);

        debug!(
            "{} for {}: mint {} recipient {}",
            completion.name(asset),
            parsed.vaa.sequence,
            accounts.mint,
            recipient
        );

        match self.send(instructions).await {
            Ok(signature) => {
                info!("{} confirmed: {}", completion.name(asset), signature);
                Ok(signature)
            }
            Err(e) => {
                warn!("{} failed: {}", completion.name(asset), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadCodec;
    use crate::config::{Config, Network};
    use crate::vaa::tests::sample_bytes;

    fn destination() -> SolanaDestination {
        let mut config = Config::preset(Network::Mainnet).solana;
        config.relayer_key = Keypair::new().to_bytes().to_vec();
        config.lookup_table = String::new();
        let client = Arc::new(RpcClient::new("http://127.0.0.1:8899".to_string()));
        SolanaDestination::new(client, &config, 1, AddressFormat::Base58).unwrap()
    }

    #[test]
    fn test_rejects_bad_keypair() {
        let mut config = Config::preset(Network::Mainnet).solana;
        config.relayer_key = vec![1, 2, 3];
        let client = Arc::new(RpcClient::new("http://127.0.0.1:8899".to_string()));
        assert!(matches!(
            SolanaDestination::new(client, &config, 1, AddressFormat::Base58),
            Err(RelayerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_recipient_from_payload() {
        let destination = destination();
        let parsed = ParsedTransfer::parse(&sample_bytes(), &PayloadCodec::default()).unwrap();
        let recipient = destination.recipient(&parsed).unwrap();
        assert_eq!(
            hex::encode(recipient.to_bytes()),
            "d5006ba1ae36806c379a926d648b5e0783e966eddde87b8920717a7e81943698"
        );
    }

    #[tokio::test]
    async fn test_native_token_needs_no_lookup() {
        let destination = destination();
        let parsed = ParsedTransfer::parse(&sample_bytes(), &PayloadCodec::default()).unwrap();
        assert_eq!(
            destination.asset_representation(&parsed).await.unwrap(),
            AssetRepresentation::Native
        );
    }

    #[test]
    fn test_setup_creates_receiver_and_fee_accounts() {
        let destination = destination();
        let parsed = ParsedTransfer::parse(&sample_bytes(), &PayloadCodec::default()).unwrap();
        let recipient = destination.recipient(&parsed).unwrap();
        let accounts = RedeemAccounts::derive(
            &destination.ids,
            destination.payer(),
            destination.beneficiary,
            recipient,
            &parsed,
            AssetRepresentation::Native,
        );
        let setup = destination.token_account_setup(&accounts, None);
        assert_eq!(setup.len(), 2);
        assert_eq!(setup[0].accounts[1].pubkey, accounts.beneficiary_token_account);
        assert_eq!(setup[1].accounts[1].pubkey, accounts.recipient_token_account);
    }

    #[test]
    fn test_classify_custom_client_error() {
        let err = ClientError::from(ClientErrorKind::Custom(
            "Program log: Error Code: AmountOutBelowMinimum".to_string(),
        ));
        assert!(matches!(classify_client_error(&err), SubmitError::SlippageExceeded(_)));
    }
}
