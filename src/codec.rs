use thiserror::Error;

use crate::models::{OutgoingTx, TransactionId, Tx, TxBody, TxInput};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("no transaction codec configured")]
    Missing,
}

/// Ledger wire format. Implementations must be deterministic: the same
/// logical transaction always yields the same bytes and the same id.
pub trait TxCodec: Send + Sync {
    fn serialize(&self, tx: &Tx) -> Vec<u8>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Tx, CodecError>;

    fn id(&self, body: &TxBody) -> TransactionId;
}

/// Normalizes anything `submit_tx` accepts into an [`OutgoingTx`]. Records
/// that already carry an id keep it; only raw bytes are decoded.
pub fn to_outgoing(input: TxInput, codec: Option<&dyn TxCodec>) -> Result<OutgoingTx, CodecError> {
    match input {
        TxInput::Outgoing(tx) => Ok(tx),
        TxInput::Signed(signed) => Ok(OutgoingTx {
            id: signed.tx.id,
            body: signed.tx.body,
            wire_bytes: signed.wire_bytes,
            context: signed.context,
        }),
        TxInput::Tx(tx) => {
            let codec = codec.ok_or(CodecError::Missing)?;
            let wire_bytes = codec.serialize(&tx);
            Ok(OutgoingTx {
                id: tx.id,
                body: tx.body,
                wire_bytes,
                context: None,
            })
        }
        TxInput::WireBytes(bytes) => {
            let codec = codec.ok_or(CodecError::Missing)?;
            let tx = codec.deserialize(&bytes)?;
            Ok(OutgoingTx {
                id: tx.id,
                body: tx.body,
                wire_bytes: bytes,
                context: None,
            })
        }
    }
}
