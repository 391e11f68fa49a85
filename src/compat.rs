//! Uniform access to `VersionedMessage` fields
//!
//! Legacy and V0 messages expose the same header, keys and blockhash through
//! different structs. Bundle assembly and signer checks go through these
//! helpers so they never match on the message version themselves.

use solana_sdk::{
    hash::Hash,
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    transaction::VersionedTransaction,
};

#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Account keys embedded directly in the message (no lookup-table addresses).
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// The first `num_required_signatures` static keys, fee payer first.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

#[inline]
#[must_use]
pub fn get_fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_required_signers(message).first()
}

#[inline]
#[must_use]
pub fn get_recent_blockhash(message: &VersionedMessage) -> &Hash {
    message.recent_blockhash()
}

/// Required signers whose signature slot is missing or does not verify.
///
/// An empty result means the transaction is fully signed.
pub fn missing_signers(tx: &VersionedTransaction) -> Vec<Pubkey> {
    let signers = get_required_signers(&tx.message);
    if tx.signatures.len() != signers.len() {
        return signers.to_vec();
    }

    signers
        .iter()
        .zip(tx.verify_with_results())
        .filter_map(|(signer, ok)| (!ok).then_some(*signer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        message::{v0::Message as MessageV0, Message},
        signature::{Keypair, Signature},
        signer::Signer,
    };
    #[allow(deprecated)]
    use solana_sdk::system_instruction;

    fn transfer_v0(payer: &Keypair) -> VersionedMessage {
        let instruction =
            system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1000);
        let message_v0 =
            MessageV0::try_compile(&payer.pubkey(), &[instruction], &[], Hash::new_unique())
                .unwrap();
        VersionedMessage::V0(message_v0)
    }

    #[test]
    fn test_v0_required_signers() {
        let payer = Keypair::new();
        let message = transfer_v0(&payer);

        let signers = get_required_signers(&message);
        assert_eq!(signers, &[payer.pubkey()]);
        assert_eq!(get_fee_payer(&message), Some(&payer.pubkey()));
        assert_eq!(get_message_header(&message).num_required_signatures, 1);
    }

    #[test]
    fn test_legacy_static_account_keys() {
        let payer = Keypair::new();
        let recipient = Pubkey::new_unique();

        let instruction = system_instruction::transfer(&payer.pubkey(), &recipient, 1000);
        let message = Message::new(&[instruction], Some(&payer.pubkey()));
        let versioned_message = VersionedMessage::Legacy(message);

        let keys = get_static_account_keys(&versioned_message);
        assert!(keys.len() >= 2);
        assert_eq!(keys[0], payer.pubkey());
    }

    #[test]
    fn test_missing_signers_detects_unsigned_slot() {
        let payer = Keypair::new();
        let message = transfer_v0(&payer);

        let unsigned = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: message.clone(),
        };
        assert_eq!(missing_signers(&unsigned), vec![payer.pubkey()]);

        let signed = VersionedTransaction::try_new(message, &[&payer]).unwrap();
        assert!(missing_signers(&signed).is_empty());
    }

    #[test]
    fn test_recent_blockhash() {
        let payer = Keypair::new();
        let message = transfer_v0(&payer);
        assert_eq!(get_recent_blockhash(&message), message.recent_blockhash());
    }
}
