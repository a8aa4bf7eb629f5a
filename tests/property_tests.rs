use autoshop_api::services::invoices::{
    compute_totals, normalize_item, ItemType, NewInvoiceItem,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Money-scale decimals: up to 7 figures with two decimal places.
fn money() -> impl Strategy<Value = Decimal> {
    (0i64..=9_999_999).prop_map(|cents| Decimal::new(cents, 2))
}

/// Quantities: up to three decimal places, bounded.
fn quantity() -> impl Strategy<Value = Decimal> {
    (0i64..=99_999).prop_map(|milli| Decimal::new(milli, 3))
}

fn raw_item() -> impl Strategy<Value = NewInvoiceItem> {
    (
        proptest::option::of("[A-Za-z ]{0,24}"),
        quantity(),
        money(),
        prop_oneof![
            Just(None),
            Just(Some("part".to_string())),
            Just(Some("labor".to_string())),
        ],
    )
        .prop_map(|(description, quantity, rate, item_type)| NewInvoiceItem {
            description,
            category: None,
            quantity,
            unit: None,
            rate,
            item_type,
        })
}

proptest! {
    #[test]
    fn normalized_amount_is_quantity_times_rate(raw in raw_item()) {
        let item = normalize_item(&raw);
        prop_assert_eq!(item.amount, item.quantity * item.rate);
        prop_assert!(!item.description.is_empty());
        prop_assert!(!item.category.is_empty());
        prop_assert!(!item.unit.is_empty());
    }

    #[test]
    fn totals_invariants_hold_for_any_item_set(
        raws in proptest::collection::vec(raw_item(), 0..12),
        discount in money(),
        paid in money(),
    ) {
        let items: Vec<_> = raws.iter().map(normalize_item).collect();
        let totals = compute_totals(&items, discount, paid);

        // The partition sums agree with an independent fold
        let parts: Decimal = items
            .iter()
            .filter(|i| i.item_type == ItemType::Part)
            .map(|i| i.amount)
            .sum();
        let labor: Decimal = items
            .iter()
            .filter(|i| i.item_type == ItemType::Labor)
            .map(|i| i.amount)
            .sum();

        prop_assert_eq!(totals.parts_total, parts);
        prop_assert_eq!(totals.labor_total, labor);
        prop_assert_eq!(totals.grand_total, parts + labor - discount);
        prop_assert_eq!(totals.balance_amount, totals.grand_total - paid);
    }

    #[test]
    fn unspecified_item_type_defaults_to_part(
        quantity in quantity(),
        rate in money(),
    ) {
        let raw = NewInvoiceItem {
            description: Some("Spark plug".to_string()),
            category: None,
            quantity,
            unit: None,
            rate,
            item_type: None,
        };
        prop_assert_eq!(normalize_item(&raw).item_type, ItemType::Part);
    }
}
