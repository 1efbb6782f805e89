//! Concurrency tests for claims
//!
//! These tests race many claims for the same item and check that exactly one
//! of them releases it.

use futures::future::join_all;

use resource_holder::crypto::ClaimSigner;
use resource_holder::error::ClaimError;
use resource_holder::registry::AssetRegistry;
use resource_holder::types::AccountId;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    claimant, depositor, mint_and_deposit, setup, signed_claim, FAR_FUTURE_DEADLINE,
    HARDHAT_KEY_0,
};

/// Test that concurrent identical claims release the item exactly once
/// What is tested: 16 tasks submit the same valid claim at once
/// Why: Only one claim may win; the rest must see NoSuchEscrowedItem
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_release_once() {
    let env = setup();
    let signer = ClaimSigner::from_hex(HARDHAT_KEY_0).unwrap();
    let item_id = mint_and_deposit(&env, &signer.address().to_string()).await;
    let request = signed_claim(&signer, &item_id, FAR_FUTURE_DEADLINE, &claimant());

    let tasks = (0..16).map(|_| {
        let holder = env.holder.clone();
        let request = request.clone();
        tokio::spawn(async move { holder.claim(&request, &claimant()).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_taken = results
        .iter()
        .filter(|r| matches!(r, Err(ClaimError::NoSuchEscrowedItem)))
        .count();

    assert_eq!(successes, 1, "Exactly one claim must succeed");
    assert_eq!(already_taken, 15);
    assert_eq!(env.registry.owner_of(&item_id).await, Some(claimant()));
    assert!(env.holder.list_items(&signer.address()).await.is_empty());
}

/// Test that claim and reclaim racing for one item never both succeed
/// What is tested: a claim and an administrative reclaim spawned together
/// Why: An item leaves escrow exactly once, to exactly one account
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_and_reclaim_race() {
    let env = setup();
    let signer = ClaimSigner::from_hex(HARDHAT_KEY_0).unwrap();
    let item_id = mint_and_deposit(&env, &signer.address().to_string()).await;
    let request = signed_claim(&signer, &item_id, FAR_FUTURE_DEADLINE, &claimant());

    let claim = {
        let holder = env.holder.clone();
        tokio::spawn(async move { holder.claim(&request, &claimant()).await })
    };
    let reclaim = {
        let holder = env.holder.clone();
        let item_id = item_id.clone();
        tokio::spawn(async move { holder.reclaim(&item_id).await })
    };

    let claim_result = claim.await.unwrap();
    let reclaim_result = reclaim.await.unwrap();
    assert!(
        claim_result.is_ok() ^ reclaim_result.is_ok(),
        "Exactly one of claim and reclaim must succeed"
    );

    let expected_owner: AccountId = if claim_result.is_ok() {
        claimant()
    } else {
        depositor()
    };
    assert_eq!(env.registry.owner_of(&item_id).await, Some(expected_owner));
}

/// Test that claims for different items proceed independently
/// What is tested: 8 items escrowed for one address, all claimed concurrently
/// Why: Exclusivity is per item; unrelated claims must not block each other out
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_for_distinct_items() {
    let env = setup();
    let signer = ClaimSigner::from_hex(HARDHAT_KEY_0).unwrap();
    let mut items = Vec::new();
    for _ in 0..8 {
        items.push(mint_and_deposit(&env, &signer.address().to_string()).await);
    }

    let tasks = items.iter().map(|item_id| {
        let holder = env.holder.clone();
        let request = signed_claim(&signer, item_id, FAR_FUTURE_DEADLINE, &claimant());
        tokio::spawn(async move { holder.claim(&request, &claimant()).await })
    });
    for joined in join_all(tasks).await {
        assert!(joined.unwrap().is_ok());
    }

    for item_id in &items {
        assert_eq!(env.registry.owner_of(item_id).await, Some(claimant()));
    }
    assert!(env.holder.list_items(&signer.address()).await.is_empty());
}
