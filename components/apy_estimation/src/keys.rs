//! Period state fields and transaction types of the application.
use abci_engine::{CollectionKey, ScalarKey};
use abci_roles::TransactionType;

/// Randomness collected by the randomness rounds.
pub const PARTICIPANT_TO_RANDOMNESS: CollectionKey = CollectionKey("participant_to_randomness");
/// Randomness agreed on.
pub const MOST_VOTED_RANDOMNESS: ScalarKey = ScalarKey("most_voted_randomness");
/// Keeper selections.
pub const PARTICIPANT_TO_SELECTION: CollectionKey = CollectionKey("participant_to_selection");
/// Address of the elected keeper.
pub const MOST_VOTED_KEEPER_ADDRESS: ScalarKey = ScalarKey("most_voted_keeper_address");
/// Address of the safe deployed by the keeper.
pub const SAFE_CONTRACT_ADDRESS: ScalarKey = ScalarKey("safe_contract_address");
/// Address of the oracle deployed by the keeper.
pub const ORACLE_CONTRACT_ADDRESS: ScalarKey = ScalarKey("oracle_contract_address");
/// Votes of the last validation round.
pub const PARTICIPANT_TO_VOTES: CollectionKey = CollectionKey("participant_to_votes");
/// Raw observations.
pub const PARTICIPANT_TO_OBSERVATIONS: CollectionKey =
    CollectionKey("participant_to_observations");
/// Transformed observations submitted by each participant.
pub const PARTICIPANT_TO_TRANSFORMATION: CollectionKey =
    CollectionKey("participant_to_transformation");
/// Observations in canonical form, see [`crate::transform::transform`].
pub const TRANSFORMATION: ScalarKey = ScalarKey("transformation");
/// Estimates.
pub const PARTICIPANT_TO_ESTIMATE: CollectionKey = CollectionKey("participant_to_estimate");
/// Estimate agreed on.
pub const MOST_VOTED_ESTIMATE: ScalarKey = ScalarKey("most_voted_estimate");
/// Hashes of the settlement transaction.
pub const PARTICIPANT_TO_TX_HASH: CollectionKey = CollectionKey("participant_to_tx_hash");
/// Hash of the settlement transaction agreed on.
pub const MOST_VOTED_TX_HASH: ScalarKey = ScalarKey("most_voted_tx_hash");
/// Signatures of the settlement transaction.
pub const PARTICIPANT_TO_SIGNATURE: CollectionKey = CollectionKey("participant_to_signature");
/// Hash of the transaction sent by the keeper.
pub const FINAL_TX_HASH: ScalarKey = ScalarKey("final_tx_hash");

#[allow(missing_docs)]
pub mod tx_type {
    use super::TransactionType;

    pub const REGISTRATION: TransactionType = TransactionType::new("registration");
    pub const RANDOMNESS: TransactionType = TransactionType::new("randomness");
    pub const SELECT_KEEPER: TransactionType = TransactionType::new("select_keeper");
    pub const DEPLOY_SAFE: TransactionType = TransactionType::new("deploy_safe");
    pub const DEPLOY_ORACLE: TransactionType = TransactionType::new("deploy_oracle");
    pub const VALIDATE: TransactionType = TransactionType::new("validate");
    pub const OBSERVATION: TransactionType = TransactionType::new("observation");
    pub const TRANSFORMATION: TransactionType = TransactionType::new("transformation");
    pub const ESTIMATE: TransactionType = TransactionType::new("estimate");
    pub const TX_HASH: TransactionType = TransactionType::new("tx_hash");
    pub const SIGNATURE: TransactionType = TransactionType::new("signature");
    pub const FINALIZATION: TransactionType = TransactionType::new("finalization");
    pub const RESET: TransactionType = TransactionType::new("reset");
    pub const RESET_AND_PAUSE: TransactionType = TransactionType::new("reset_and_pause");
}
