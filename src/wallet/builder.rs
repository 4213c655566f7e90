use async_trait::async_trait;
use log::debug;

use crate::codec::{CodecError, TxCodec};
use crate::discovery::KeyAgent;
use crate::models::{
    Address, AddressType, Certificate, DataSignature, GroupedAddress, KeyPath, KeyRole,
    ProtocolParameters, SignedTx, Tip, TransactionId, Tx, TxBody, TxOut, Utxo, ValidityInterval,
    Withdrawal,
};
use crate::wallet::WalletError;

/// Validity window given to transactions that do not set one
pub const DEFAULT_TTL_SLOTS: u64 = 7200;

pub struct SelectionParams {
    pub available: Vec<Utxo>,
    pub outputs: Vec<TxOut>,
    pub change_address: Address,
    pub protocol_parameters: ProtocolParameters,
    /// Coins the body needs on top of `outputs` and the fee, e.g. deposits
    pub implicit_coin: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub change: Vec<TxOut>,
    pub fee: u64,
}

/// Coin selection strategy
#[async_trait]
pub trait InputSelector: Send + Sync {
    async fn select(&self, params: SelectionParams) -> Result<Selection, String>;
}

#[derive(Debug, Clone, Default)]
pub struct InitializeTxProps {
    pub outputs: Vec<TxOut>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
    pub validity_interval: Option<ValidityInterval>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitializeTxResult {
    pub id: TransactionId,
    pub body: TxBody,
    pub inputs: Vec<Utxo>,
}

#[derive(Debug, Clone)]
pub struct FinalizeTxProps {
    pub id: TransactionId,
    pub body: TxBody,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SignDataProps {
    /// Payment or reward address whose key signs
    pub sign_with: String,
    pub payload: Vec<u8>,
}

pub(crate) struct BuildContext<'a> {
    pub selector: Option<&'a dyn InputSelector>,
    pub codec: Option<&'a dyn TxCodec>,
    pub addresses: &'a [GroupedAddress],
    pub available: Vec<Utxo>,
    pub protocol_parameters: Option<ProtocolParameters>,
    pub tip: Option<Tip>,
}

fn deposit_delta(certificates: &[Certificate], parameters: &ProtocolParameters) -> u64 {
    certificates
        .iter()
        .map(|certificate| match certificate {
            Certificate::StakeRegistration { .. } => parameters.key_deposit,
            Certificate::PoolRegistration { .. } => parameters.pool_deposit,
            _ => 0,
        })
        .sum()
}

/// Selects inputs for `props` and assembles an unsigned body
pub(crate) async fn initialize_tx(
    props: InitializeTxProps,
    context: BuildContext<'_>,
) -> Result<InitializeTxResult, WalletError> {
    let selector = context.selector.ok_or_else(|| {
        WalletError::InvalidConfiguration("no input selector configured".to_string())
    })?;
    let codec = context.codec.ok_or(CodecError::Missing)?;
    let protocol_parameters = context.protocol_parameters.ok_or_else(|| {
        WalletError::InvalidConfiguration("protocol parameters are not known yet".to_string())
    })?;
    let change_address = context
        .addresses
        .iter()
        .find(|a| a.kind == AddressType::Internal)
        .or_else(|| context.addresses.first())
        .map(|a| a.address.clone())
        .ok_or_else(|| WalletError::InvalidConfiguration("wallet has no addresses".to_string()))?;

    let validity_interval = props.validity_interval.unwrap_or_else(|| ValidityInterval {
        invalid_before: None,
        invalid_hereafter: context.tip.map(|tip| tip.slot + DEFAULT_TTL_SLOTS),
    });

    let selection = selector
        .select(SelectionParams {
            available: context.available,
            outputs: props.outputs.clone(),
            change_address,
            implicit_coin: deposit_delta(&props.certificates, &protocol_parameters),
            protocol_parameters,
        })
        .await
        .map_err(WalletError::InputSelection)?;

    let mut outputs = props.outputs;
    outputs.extend(selection.change);
    let body = TxBody {
        inputs: selection.inputs.iter().map(|u| u.input.clone()).collect(),
        outputs,
        fee: selection.fee,
        validity_interval,
        certificates: props.certificates,
        withdrawals: props.withdrawals,
    };
    let id = codec.id(&body);
    debug!("Initialized transaction {} with {} inputs", id, body.inputs.len());
    Ok(InitializeTxResult {
        id,
        body,
        inputs: selection.inputs,
    })
}

/// Signs `props.body` through the key agent and encodes the result
pub(crate) async fn finalize_tx(
    props: FinalizeTxProps,
    key_agent: &dyn KeyAgent,
    codec: Option<&dyn TxCodec>,
) -> Result<SignedTx, WalletError> {
    let codec = codec.ok_or(CodecError::Missing)?;
    let witness = key_agent.sign_transaction(&props.id, &props.body).await?;
    let tx = Tx {
        id: props.id,
        body: props.body,
        witness,
    };
    let wire_bytes = codec.serialize(&tx);
    Ok(SignedTx {
        tx,
        wire_bytes,
        context: props.context,
    })
}

/// Key path signing for `sign_with`, which is a wallet payment address or
/// one of its reward accounts
pub(crate) fn signing_path(addresses: &[GroupedAddress], sign_with: &str) -> Option<KeyPath> {
    if let Some(address) = addresses.iter().find(|a| a.address.0 == sign_with) {
        let role = match address.kind {
            AddressType::External => KeyRole::External,
            AddressType::Internal => KeyRole::Internal,
        };
        return Some(KeyPath {
            role,
            index: address.index,
        });
    }
    addresses
        .iter()
        .find(|a| a.reward_account.0 == sign_with)
        .map(|a| {
            a.stake_key_derivation_path.unwrap_or(KeyPath {
                role: KeyRole::Stake,
                index: 0,
            })
        })
}

pub(crate) async fn sign_data(
    props: SignDataProps,
    addresses: &[GroupedAddress],
    key_agent: &dyn KeyAgent,
) -> Result<DataSignature, WalletError> {
    let path = signing_path(addresses, &props.sign_with)
        .ok_or_else(|| WalletError::UnknownAddress(props.sign_with.clone()))?;
    Ok(key_agent.sign_blob(path, &props.payload).await?)
}
