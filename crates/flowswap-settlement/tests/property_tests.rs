//! Property tests for position settlement against a live ledger.
//!
//! Two counterparties stream against each other with arbitrary amounts and
//! end ticks. Whatever the parameters, nothing is created or destroyed and
//! splitting a withdrawal never pays more than settling once.

use flowswap_custody::VaultLedger;
use flowswap_settlement::StreamingMarket;
use flowswap_types::*;
use proptest::prelude::*;

const WIDTH: u64 = 10;
const FUNDING: u64 = 2_000_000_000;

fn market() -> (StreamingMarket, VaultLedger, DepositorId, DepositorId) {
    let engine = StreamingMarket::create(
        EngineConfig {
            schedule_capacity: 256,
            history_capacity: 4_096,
            max_buckets_per_call: 10_000,
            min_deposit: 1_000,
        },
        MarketId::from_bytes([9; 16]),
        DepositorId::numbered(0),
        &MarketParams::new(0, WIDTH),
        0,
    )
    .unwrap();
    let mut ledger = VaultLedger::new();
    ledger.open_vault(engine.market().vault(Side::A), "AAA");
    ledger.open_vault(engine.market().vault(Side::B), "BBB");
    let alice = DepositorId::numbered(1);
    let bob = DepositorId::numbered(2);
    ledger.fund(alice, "AAA", FUNDING).unwrap();
    ledger.fund(bob, "BBB", FUNDING).unwrap();
    (engine, ledger, alice, bob)
}

fn arb_stream() -> impl Strategy<Value = (u64, u64)> {
    (1_000u64..1_000_000_000, 2u64..200)
}

proptest! {
    // =========================================================================
    // Property: closing both sides conserves each asset
    // =========================================================================
    #[test]
    fn lifecycle_conserves_assets(
        (a_amount, a_bucket) in arb_stream(),
        (b_amount, b_bucket) in arb_stream(),
        mid in 1u64..2_000,
    ) {
        let (mut engine, mut ledger, alice, bob) = market();
        engine.deposit_a(alice, a_amount, a_bucket * WIDTH, 0, &mut ledger).unwrap();
        engine.deposit_b(bob, b_amount, b_bucket * WIDTH, 0, &mut ledger).unwrap();

        match engine.withdraw_accrued_b(alice, mid, &mut ledger) {
            Ok(_) | Err(FlowswapError::NoTokensSwapped) => {}
            Err(err) => prop_assert!(false, "withdraw failed: {}", err),
        }
        prop_assert!(engine.verify_flow_conservation().is_ok());

        engine.close_position_a(alice, 2_500, &mut ledger).unwrap();
        engine.close_position_b(bob, 2_500, &mut ledger).unwrap();

        prop_assert!(engine.verify_vaults(&ledger).is_ok());
        prop_assert_eq!(engine.market().flow_rate_a, 0);
        prop_assert_eq!(engine.market().flow_rate_b, 0);
        prop_assert_eq!(ledger.total_supply("AAA"), u128::from(FUNDING));
        prop_assert_eq!(ledger.total_supply("BBB"), u128::from(FUNDING));

        // each side received at most what the other put in
        let alice_b = ledger.wallet_balance(alice, "BBB");
        let bob_a = ledger.wallet_balance(bob, "AAA");
        prop_assert!(alice_b <= b_amount);
        prop_assert!(bob_a <= a_amount);
    }

    // =========================================================================
    // Property: a split withdrawal never beats settling once
    // =========================================================================
    #[test]
    fn split_withdrawal_floors_at_most_once_more(
        (a_amount, a_bucket) in arb_stream(),
        (b_amount, b_bucket) in arb_stream(),
        mid in 1u64..2_000,
    ) {
        let (mut split, mut split_ledger, alice, bob) = market();
        let (mut once, mut once_ledger, _, _) = market();
        for (engine, ledger) in [(&mut split, &mut split_ledger), (&mut once, &mut once_ledger)] {
            engine.deposit_a(alice, a_amount, a_bucket * WIDTH, 0, ledger).unwrap();
            engine.deposit_b(bob, b_amount, b_bucket * WIDTH, 0, ledger).unwrap();
        }

        let first = match split.withdraw_accrued_b(alice, mid, &mut split_ledger) {
            Ok(receipt) => receipt.amount,
            Err(FlowswapError::NoTokensSwapped) => 0,
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };
        let rest = split.close_position_a(alice, 2_500, &mut split_ledger).unwrap().proceeds;
        let whole = once.close_position_a(alice, 2_500, &mut once_ledger).unwrap().proceeds;

        prop_assert!(first + rest <= whole);
        prop_assert!(whole - (first + rest) <= 1);
    }
}
