//! Signing of aggregator-built transactions

use base64::Engine as _;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{Error, Result};

use super::provider::UnsignedTransaction;

/// Decode an unsigned transaction and sign it with `keypair`
///
/// The fee payer must be the signing wallet; a transaction built for another
/// wallet is rejected rather than partially signed.
pub fn sign_transaction(
    unsigned: &UnsignedTransaction,
    keypair: &Keypair,
) -> Result<VersionedTransaction> {
    let transaction = unsigned.decode()?;

    let payer = transaction
        .message
        .static_account_keys()
        .first()
        .copied()
        .ok_or_else(|| Error::Signing("transaction has no account keys".to_string()))?;
    if payer != keypair.pubkey() {
        return Err(Error::Signing(format!(
            "fee payer {} is not the signing wallet {}",
            payer,
            keypair.pubkey()
        )));
    }

    VersionedTransaction::try_new(transaction.message, &[keypair])
        .map_err(|e| Error::Signing(e.to_string()))
}

/// Serialize a signed transaction for the RPC `sendTransaction` call
pub fn encode_base64(transaction: &VersionedTransaction) -> Result<String> {
    let bytes = bincode::serialize(transaction)
        .map_err(|e| Error::Serialization(format!("Failed to serialize transaction: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::testing::unsigned_for;

    #[test]
    fn test_sign_own_transaction() {
        let keypair = Keypair::new();
        let unsigned = unsigned_for(&keypair.pubkey());

        let signed = sign_transaction(&unsigned, &keypair).unwrap();
        assert_eq!(signed.signatures.len(), 1);
        assert!(signed.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn test_reject_foreign_payer() {
        let keypair = Keypair::new();
        let other = Keypair::new();
        let unsigned = unsigned_for(&other.pubkey());

        assert!(matches!(
            sign_transaction(&unsigned, &keypair),
            Err(Error::Signing(_))
        ));
    }

    #[test]
    fn test_reject_garbage() {
        let keypair = Keypair::new();
        let unsigned = UnsignedTransaction::from_bytes(vec![0xff; 8]);
        assert!(sign_transaction(&unsigned, &keypair).is_err());
    }

    #[test]
    fn test_encode_roundtrip_signature() {
        let keypair = Keypair::new();
        let signed = sign_transaction(&unsigned_for(&keypair.pubkey()), &keypair).unwrap();
        let encoded = encode_base64(&signed).unwrap();
        let decoded = UnsignedTransaction::from_base64("rpc", &encoded)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(decoded.signatures, signed.signatures);
    }
}
