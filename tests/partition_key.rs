#[path = "common/mod.rs"]
mod common;

use common::{ENVELOPE_ID, RECIPIENT, SENDER};
use num_bigint::BigInt;
use orchestrate::types::tx::JobType;
use orchestrate::types::Envelope;
use proptest::prelude::*;

const GROUP: &str = "kAbelwaVW7okoEn1+okO+AbA4Hhz/7DaCOWVQz9nx5M=";

fn envelope_on(chain_id: u64) -> Envelope {
    let mut envelope = Envelope::new();
    envelope
        .set_id(ENVELOPE_ID)
        .set_chain_id(BigInt::from(chain_id))
        .set_chain_name("testChain");
    envelope.set_from_string(SENDER).expect("sender address");
    envelope
}

#[test]
fn public_transactions_key_on_sender_and_chain() {
    let mut envelope = envelope_on(10);
    // a privacy group alone does not make the transaction private
    envelope.set_privacy_group_id(GROUP);

    assert_eq!(
        envelope.partition_key(),
        "0x0000000000000000000000000000000000000001@10"
    );
}

#[test]
fn eea_transactions_key_on_privacy_group() {
    let mut envelope = envelope_on(11);
    envelope
        .set_job_type(JobType::EthOrionEeaTx)
        .set_privacy_group_id(GROUP);

    assert_eq!(
        envelope.partition_key(),
        format!("0x0000000000000000000000000000000000000001@orion-{GROUP}@11")
    );
}

#[test]
fn eea_transactions_key_on_participant_digest() {
    let mut envelope = envelope_on(12);
    envelope
        .set_job_type(JobType::EthOrionEeaTx)
        .set_private_for(vec![GROUP.to_string()]);

    assert_eq!(
        envelope.partition_key(),
        "0x0000000000000000000000000000000000000001@orion-a3ce4ff3ac5af3264fd8ae06af53ed9e@12"
    );
}

#[test]
fn eea_without_privacy_data_falls_back_to_public_key() {
    let mut envelope = envelope_on(7);
    envelope.set_job_type(JobType::EthOrionEeaTx);

    assert_eq!(
        envelope.partition_key(),
        "0x0000000000000000000000000000000000000001@7"
    );
}

#[test]
fn unknown_sender_or_chain_yields_no_key() {
    let mut no_chain = Envelope::new();
    no_chain.set_from_string(SENDER).expect("sender address");
    assert_eq!(no_chain.partition_key(), "");

    let mut no_sender = Envelope::new();
    no_sender.set_chain_id(BigInt::from(1));
    assert_eq!(no_sender.partition_key(), "");
}

proptest! {
    #[test]
    fn participant_order_does_not_change_the_key(
        participants in proptest::collection::vec("[A-Za-z0-9+/]{43}=", 1..5),
        private_from in "[A-Za-z0-9+/]{43}=",
    ) {
        let mut forward = envelope_on(5);
        forward
            .set_job_type(JobType::EthOrionEeaTx)
            .set_private_from(private_from.clone())
            .set_private_for(participants.clone());

        let mut reversed_participants = participants;
        reversed_participants.reverse();
        let mut reversed = forward.clone();
        reversed.set_private_for(reversed_participants);

        let key = forward.partition_key();
        prop_assert_eq!(&key, &reversed.partition_key());
        prop_assert!(key.starts_with("0x0000000000000000000000000000000000000001@orion-"));
        prop_assert!(key.ends_with("@5"));
    }

    #[test]
    fn public_key_ignores_every_other_field(
        gas in any::<u64>(),
        nonce in any::<u64>(),
        value in any::<u64>(),
        data in proptest::collection::vec(any::<u8>(), 0..64),
        id in "[a-z0-9-]{0,36}",
        privacy_group in "[A-Za-z0-9+/]{0,44}",
        contract in "[A-Za-z]{0,12}",
    ) {
        let baseline = envelope_on(10).partition_key();

        let mut varied = envelope_on(10);
        varied
            .set_id(id)
            .set_gas(gas)
            .set_nonce(nonce)
            .set_value(BigInt::from(value))
            .set_gas_price(BigInt::from(value / 2))
            .set_data(&data)
            .set_privacy_group_id(privacy_group)
            .set_contract_name(contract)
            .set_chain_name("otherChain");
        varied.set_to_string(RECIPIENT).expect("recipient address");

        prop_assert_eq!(varied.partition_key(), baseline);
    }
}
