//! Registration -> nullifier -> submission, end to end through the public API.

use std::time::Duration;

use civic_identity_core::{
    action_domain::{build_action_domain, ActionDomainParams, JurisdictionType},
    cell_id::CellId,
    error::{Error, ErrorCategory},
    field::FieldElement,
    identity::{derive_user_secret, generate_user_entropy},
    merkle::MerkleTree,
    nullifier::compute_nullifier,
    pseudonym::PseudonymSalt,
    submission::{
        public_inputs::{
            ACTION_DOMAIN_INDEX, AUTHORITY_LEVEL_INDEX, CELL_MAP_ROOT_INDEX, NULLIFIER_INDEX,
            USER_ROOT_INDEX,
        },
        ChannelVerificationQueue, InMemorySubmissionStore, RetryPolicy, SubmissionHandler,
        SubmissionRequest, SubmissionStatus, SubmissionStore, PUBLIC_INPUT_COUNT,
    },
};

const SALT: &str = "integration-salt-0123456789abcdefghijkl";

fn action() -> ActionDomainParams {
    ActionDomainParams {
        country: "US".to_string(),
        jurisdiction_type: JurisdictionType::Federal,
        recipient_subdivision: "CA-12".to_string(),
        template_id: "tmpl_housing".to_string(),
        session_id: "119th-congress".to_string(),
    }
}

fn public_inputs(
    user_root: FieldElement,
    cell_root: FieldElement,
    nullifier: FieldElement,
    action_domain: FieldElement,
) -> Vec<String> {
    let mut inputs = vec![FieldElement::zero(); PUBLIC_INPUT_COUNT];
    inputs[USER_ROOT_INDEX] = user_root;
    inputs[CELL_MAP_ROOT_INDEX] = cell_root;
    inputs[NULLIFIER_INDEX] = nullifier;
    inputs[ACTION_DOMAIN_INDEX] = action_domain;
    inputs[AUTHORITY_LEVEL_INDEX] = FieldElement::from_u64(3);
    inputs.iter().map(FieldElement::to_hex).collect()
}

#[tokio::test]
async fn test_register_derive_submit_and_replay() {
    // registration: commitment joins the user tree, entropy stays on device
    let commitment = FieldElement::from_u64(0xC0FFEE);
    let user_tree = MerkleTree::new(vec![
        FieldElement::from_u64(1),
        commitment,
        FieldElement::from_u64(3),
    ]);
    let path = user_tree.get_path_for_leaf(&commitment).unwrap();
    assert!(path.verify(&user_tree.root()));

    let cell = CellId::create("060750201001000").unwrap();
    let cell_tree = MerkleTree::new(vec![cell.to_field()]);

    let entropy = generate_user_entropy();
    let secret = derive_user_secret(&commitment.to_hex(), &entropy.to_hex()).unwrap();
    let domain = build_action_domain(&action()).unwrap();
    let nullifier = compute_nullifier(&secret, &domain);

    let (queue, mut verifier_rx) = ChannelVerificationQueue::new(16);
    let handler = SubmissionHandler::new(
        InMemorySubmissionStore::new(),
        queue,
        PseudonymSalt::new(SALT).unwrap(),
        RetryPolicy::default(),
    );
    let request = SubmissionRequest {
        proof: hex_proof(),
        public_inputs: public_inputs(user_tree.root(), cell_tree.root(), nullifier, domain),
        encrypted_message: "base64-ciphertext".to_string(),
        template_id: "tmpl_housing".to_string(),
        district_id: "CA-12".to_string(),
    };

    let receipt = handler
        .handle_submission("internal-user-81", request.clone())
        .await
        .unwrap();
    assert_eq!(receipt.status, SubmissionStatus::Pending);
    assert_eq!(receipt.nullifier, nullifier);

    let job = tokio::time::timeout(Duration::from_secs(5), verifier_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.nullifier, nullifier);

    let stored = handler.store().find_by_nullifier(nullifier).await.unwrap().unwrap();
    assert_eq!(stored.action_domain, domain);
    assert!(!serde_json::to_string(&stored).unwrap().contains("internal-user-81"));

    // same action again, from the same or a different account
    for user in ["internal-user-81", "internal-user-82"] {
        let err: Error = handler
            .handle_submission(user, request.clone())
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::DuplicateNullifier);
    }
    assert_eq!(handler.store().len().await, 1);

    // a different action yields a fresh nullifier
    let mut other = action();
    other.template_id = "tmpl_transit".to_string();
    let other_domain = build_action_domain(&other).unwrap();
    let other_nullifier = compute_nullifier(&secret, &other_domain);
    assert_ne!(other_nullifier, nullifier);

    let mut second = request;
    second.public_inputs =
        public_inputs(user_tree.root(), cell_tree.root(), other_nullifier, other_domain);
    second.template_id = "tmpl_transit".to_string();
    handler.handle_submission("internal-user-81", second).await.unwrap();
    assert_eq!(handler.store().len().await, 2);
}

fn hex_proof() -> String {
    format!("0x{}", "ab".repeat(256))
}
