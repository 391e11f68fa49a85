//! Transaction steps and signed build output
//!
//! A [`TransactionStep`] is an ordered instruction plan plus its fee payer.
//! Signing compiles it against a blockhash and checks that every account the
//! message marks as a signer has a matching keypair, so a partially signed
//! transaction never leaves this module.

use solana_sdk::{
    hash::Hash,
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use tracing::debug;

use crate::metrics::metrics;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{sanity_check_ix_order, InstructionPlan};

/// An unsigned, ordered transaction awaiting a blockhash and its signers
#[derive(Debug, Clone)]
pub struct TransactionStep {
    pub label: String,
    pub payer: Pubkey,
    pub plan: InstructionPlan,
}

impl TransactionStep {
    pub fn new(label: impl Into<String>, payer: Pubkey, plan: InstructionPlan) -> Self {
        Self {
            label: label.into(),
            payer,
            plan,
        }
    }

    /// Every account that must sign, fee payer first, each exactly once.
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let mut signers = vec![self.payer];
        for meta in self.plan.instructions.iter().flat_map(|ix| &ix.accounts) {
            if meta.is_signer && !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    pub fn compile(&self, blockhash: Hash) -> Result<VersionedMessage, TransactionBuilderError> {
        sanity_check_ix_order(&self.plan.instructions)?;

        let message = MessageV0::try_compile(&self.payer, &self.plan.instructions, &[], blockhash)
            .map_err(|e| TransactionBuilderError::InstructionBuild {
                program: self.label.clone(),
                reason: format!("Failed to compile message: {}", e),
            })?;
        Ok(VersionedMessage::V0(message))
    }

    /// Compiles and signs with the matching subset of `keypairs`.
    ///
    /// Extra keypairs are ignored. A required signer without a keypair fails
    /// with [`TransactionBuilderError::MissingSigner`].
    pub fn sign(
        self,
        blockhash: Hash,
        keypairs: &[&Keypair],
    ) -> Result<TxBuildOutput, TransactionBuilderError> {
        let message = self.compile(blockhash)?;

        let mut ordered: Vec<&Keypair> = Vec::new();
        for signer in crate::compat::get_required_signers(&message) {
            let keypair = keypairs
                .iter()
                .find(|kp| kp.pubkey() == *signer)
                .copied()
                .ok_or_else(|| TransactionBuilderError::MissingSigner(signer.to_string()))?;
            ordered.push(keypair);
        }

        let tx = VersionedTransaction::try_new(message, ordered.as_slice())
            .map_err(|e| TransactionBuilderError::Signing(e.to_string()))?;

        let output = TxBuildOutput::new(tx, self.label, blockhash);
        output.verify_complete()?;

        metrics().transactions_built.inc();
        debug!(
            label = %output.label,
            signers = output.required_signers.len(),
            instructions = self.plan.instructions.len(),
            "Transaction signed"
        );
        Ok(output)
    }
}

/// A fully signed transaction and the blockhash it was built against
#[derive(Debug, Clone)]
pub struct TxBuildOutput {
    pub tx: VersionedTransaction,
    pub label: String,
    pub blockhash: Hash,
    /// Extracted from message.header.num_required_signatures
    pub required_signers: Vec<Pubkey>,
}

impl TxBuildOutput {
    pub fn new(tx: VersionedTransaction, label: impl Into<String>, blockhash: Hash) -> Self {
        let required_signers = crate::compat::get_required_signers(&tx.message).to_vec();
        Self {
            tx,
            label: label.into(),
            blockhash,
            required_signers,
        }
    }

    pub fn tx_ref(&self) -> &VersionedTransaction {
        &self.tx
    }

    pub fn into_tx(self) -> VersionedTransaction {
        self.tx
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.required_signers.first()
    }

    /// Fails if any required signature is absent or invalid.
    pub fn verify_complete(&self) -> Result<(), TransactionBuilderError> {
        match crate::compat::missing_signers(&self.tx).first() {
            Some(missing) => Err(TransactionBuilderError::MissingSigner(missing.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::instructions::{buy_ix, plan_instructions, BuyRequest};
    use solana_sdk::signature::Signature;

    fn buy_step(user: &Keypair, payer: &Keypair) -> TransactionStep {
        let ix = buy_ix(&BuyRequest {
            mint: Pubkey::new_unique(),
            user: user.pubkey(),
            creator: Pubkey::new_unique(),
            token_amount: 10,
            max_sol_cost: 10,
        })
        .unwrap();
        let plan = plan_instructions(200_000, 1, vec![ix]).unwrap();
        TransactionStep::new("buy", payer.pubkey(), plan)
    }

    #[test]
    fn test_required_signers_payer_first_no_duplicates() {
        let user = Keypair::new();
        let payer = Keypair::new();
        let step = buy_step(&user, &payer);
        assert_eq!(step.required_signers(), vec![payer.pubkey(), user.pubkey()]);

        let self_paid = buy_step(&user, &user);
        assert_eq!(self_paid.required_signers(), vec![user.pubkey()]);
    }

    #[test]
    fn test_sign_with_all_signers() {
        let user = Keypair::new();
        let payer = Keypair::new();
        let extra = Keypair::new();
        let blockhash = Hash::new_unique();

        let output = buy_step(&user, &payer)
            .sign(blockhash, &[&user, &extra, &payer])
            .unwrap();

        assert_eq!(output.blockhash, blockhash);
        assert_eq!(output.tx.message.recent_blockhash(), &blockhash);
        assert_eq!(output.fee_payer(), Some(&payer.pubkey()));
        assert_eq!(output.required_signers.len(), 2);
        assert!(output.verify_complete().is_ok());
    }

    #[test]
    fn test_sign_missing_signer_fails() {
        let user = Keypair::new();
        let payer = Keypair::new();

        let result = buy_step(&user, &payer).sign(Hash::new_unique(), &[&payer]);
        match result {
            Err(TransactionBuilderError::MissingSigner(key)) => {
                assert_eq!(key, user.pubkey().to_string())
            }
            other => panic!("expected MissingSigner, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_complete_detects_blank_signature() {
        let user = Keypair::new();
        let mut output = buy_step(&user, &user)
            .sign(Hash::new_unique(), &[&user])
            .unwrap();
        output.tx.signatures[0] = Signature::default();
        assert!(matches!(
            output.verify_complete(),
            Err(TransactionBuilderError::MissingSigner(_))
        ));
    }
}
