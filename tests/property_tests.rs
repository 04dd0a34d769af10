//! Property-based tests for credit arithmetic and the approval state machine.
//!
//! These use proptest to check the invariants across a wide range of
//! prices, quantities and action sequences.

use proptest::prelude::*;
use return_desk::documents::{format_currency, truncate};
use return_desk::models::returns::{credit_amount, total_credit};
use return_desk::models::{ReturnItem, ReturnStatus, WorkflowAction};
use return_desk::notifications::is_deliverable_address;
use rust_decimal::Decimal;

// Prices with up to four decimals, quantities with up to three.
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|units| Decimal::new(units, 4))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|units| Decimal::new(units, 3))
}

fn action_strategy() -> impl Strategy<Value = WorkflowAction> {
    prop_oneof![
        Just(WorkflowAction::ApproveWarehouse),
        Just(WorkflowAction::ApproveManager),
        Just(WorkflowAction::Reject),
    ]
}

fn item(credit: Decimal) -> ReturnItem {
    ReturnItem {
        id: 0,
        return_id: 1,
        product_code: "P-1".into(),
        product_desc: String::new(),
        price_per_unit: Decimal::ZERO,
        quantity: Decimal::ONE,
        credit_amount: credit,
        product_returning: "Yes".into(),
        reason_for_return: String::new(),
        follow_up_action: None,
        supplier_credit: false,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn credit_is_whole_cents_within_half_a_cent(price in price_strategy(), qty in quantity_strategy()) {
        let credit = credit_amount(price, qty).expect("in range");
        let exact = price * qty;
        prop_assert_eq!(credit.round_dp(2), credit);
        prop_assert!((credit - exact).abs() <= Decimal::new(5, 3));
        prop_assert!(credit >= Decimal::ZERO);
    }

    #[test]
    fn total_is_sum_of_stored_credits(
        lines in prop::collection::vec((price_strategy(), quantity_strategy()), 1..12)
    ) {
        let items: Vec<ReturnItem> = lines
            .iter()
            .map(|(price, qty)| item(credit_amount(*price, *qty).expect("in range")))
            .collect();
        let expected: Decimal = items.iter().map(|i| i.credit_amount).sum();
        prop_assert_eq!(total_credit(&items), expected);
    }

    #[test]
    fn statuses_only_move_forward(actions in prop::collection::vec(action_strategy(), 0..8)) {
        let mut status = ReturnStatus::Pending;
        let mut warehouse_signed = false;

        for action in actions {
            match status.after(action) {
                Some(next) => {
                    prop_assert!(!status.is_terminal());
                    if action == WorkflowAction::ApproveWarehouse {
                        warehouse_signed = true;
                    }
                    if next == ReturnStatus::Approved {
                        prop_assert!(warehouse_signed);
                    }
                    status = next;
                }
                None => {
                    // Illegal actions leave the status where it was.
                    prop_assert!(
                        status.is_terminal()
                            || (status == ReturnStatus::Pending && action == WorkflowAction::ApproveManager)
                            || (status == ReturnStatus::WhApproved && action == WorkflowAction::ApproveWarehouse)
                    );
                }
            }
        }
    }

    #[test]
    fn currency_always_has_dollar_sign_and_cents(units in -1_000_000_000i64..1_000_000_000) {
        let text = format_currency(Decimal::new(units, 2));
        let digits = text.trim_start_matches('-');
        prop_assert!(digits.starts_with('$'));
        let (_, cents) = digits.rsplit_once('.').expect("decimal point");
        prop_assert_eq!(cents.len(), 2);
    }

    #[test]
    fn truncation_never_exceeds_width(text in ".{0,120}") {
        prop_assert!(truncate(&text, 40).chars().count() <= 40);
    }

    #[test]
    fn addresses_with_two_ats_are_never_deliverable(local in "[a-z]{1,8}", domain in "[a-z]{1,8}") {
        let address = format!("{local}@{domain}@example.com");
        prop_assert!(!is_deliverable_address(&address));
        let good = format!("{local}@{domain}.com");
        prop_assert!(is_deliverable_address(&good));
    }
}

#[test]
fn credit_past_decimal_range_is_none() {
    assert_eq!(credit_amount(Decimal::MAX, Decimal::new(2, 0)), None);
}

#[test]
fn footer_total_for_the_sample_return() {
    let credit = credit_amount(Decimal::new(500, 2), Decimal::new(5, 0)).expect("in range");
    assert_eq!(format_currency(total_credit(&[item(credit)])), "$25.00");
}
