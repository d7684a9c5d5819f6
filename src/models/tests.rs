#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;

// ── Price / Quantity ──────────────────────────────────────────

#[test]
fn test_price_parse_scales_to_cents() {
    assert_eq!(Price::parse("12.50").unwrap(), Price(1250));
    assert_eq!(Price::parse("0.01").unwrap(), Price(1));
    assert_eq!(Price::parse("7").unwrap(), Price(700));
}

#[test]
fn test_price_parse_accepts_comma_and_whitespace() {
    assert_eq!(Price::parse(" 3,99 ").unwrap(), Price(399));
}

#[test]
fn test_price_parse_rounds_extra_places() {
    assert_eq!(Price::parse("1.005").unwrap(), Price(101));
    assert_eq!(Price::parse("1.004").unwrap(), Price(100));
}

#[test]
fn test_price_parse_rejects_bad_input() {
    assert!(matches!(
        Price::parse("abc"),
        Err(AmountError::NotANumber(_))
    ));
    assert!(matches!(Price::parse("-1.00"), Err(AmountError::Negative(_))));
    assert!(matches!(Price::parse(""), Err(AmountError::NotANumber(_))));
}

#[test]
fn test_price_actual_roundtrip() {
    for s in ["0.00", "0.10", "12.34", "999999.99"] {
        let price = Price::parse(s).unwrap();
        assert_eq!(price.actual().to_string(), s, "roundtrip failed for {s}");
    }
}

#[test]
fn test_quantity_actual_roundtrip() {
    for s in ["0.001", "1.000", "2.500", "1234.567"] {
        let quantity = Quantity::parse(s).unwrap();
        assert_eq!(quantity.actual().to_string(), s, "roundtrip failed for {s}");
    }
}

#[test]
fn test_quantity_parse_scales_to_thousandths() {
    assert_eq!(Quantity::parse("1").unwrap(), Quantity(1000));
    assert_eq!(Quantity::parse("0.25").unwrap(), Quantity(250));
}

#[test]
fn test_display_uses_fixed_places() {
    assert_eq!(Price(500).to_string(), "5.00");
    assert_eq!(Quantity(1500).to_string(), "1.500");
}

#[test]
fn test_from_decimal_out_of_range() {
    let huge = Decimal::MAX;
    assert!(matches!(
        Price::from_decimal(huge),
        Err(AmountError::OutOfRange(_))
    ));
}

#[test]
fn test_line_value_rounds_half_up() {
    // 2.99 * 1.5 = 4.485 -> 4.49
    assert_eq!(line_value(Price(299), Quantity(1500)).unwrap(), Price(449));
    assert_eq!(line_value(Price(100), Quantity(1000)).unwrap(), Price(100));
    assert_eq!(line_value(Price(0), Quantity(3000)).unwrap(), Price(0));
}

#[test]
fn test_line_value_out_of_range() {
    let price = Price::parse("100000000").unwrap();
    let quantity = Quantity::parse("1000000000").unwrap();
    assert!(matches!(
        line_value(price, quantity),
        Err(AmountError::OutOfRange(_))
    ));
    assert!(matches!(
        Price(i64::MAX).checked_add(Price(1)),
        Err(AmountError::OutOfRange(_))
    ));
}

#[test]
fn test_price_actual_is_decimal_division() {
    assert_eq!(Price(1999).actual(), dec!(19.99));
    assert_eq!(Quantity(250).actual(), dec!(0.250));
}

// ── Names ─────────────────────────────────────────────────────

#[test]
fn test_normalize_name_trims() {
    assert_eq!(normalize_name("  Lidl \t").as_deref(), Some("Lidl"));
}

#[test]
fn test_normalize_name_blank_is_none() {
    assert_eq!(normalize_name(""), None);
    assert_eq!(normalize_name(" \n\t "), None);
}

#[test]
fn test_normalize_name_idempotent() {
    for raw in ["a", " a ", "a b", "\tx\n"] {
        let once = normalize_name(raw).unwrap();
        assert_eq!(normalize_name(&once).unwrap(), once);
    }
}

#[test]
fn test_normalize_note() {
    assert_eq!(normalize_note(None), None);
    assert_eq!(normalize_note(Some("  ")), None);
    assert_eq!(normalize_note(Some(" hi ")).as_deref(), Some("hi"));
}

// ── Entities ──────────────────────────────────────────────────

#[test]
fn test_variant_global() {
    let global = Variant::global("1L".into());
    assert!(global.is_global());
    assert!(global.applies_to(1));
    assert!(global.applies_to(42));

    let bound = Variant::new("500g".into(), Some(7));
    assert!(!bound.is_global());
    assert!(bound.applies_to(7));
    assert!(!bound.applies_to(8));
}

#[test]
fn test_item_value() {
    let item = Item::new(1, 1, Quantity(2000), Price(350));
    assert_eq!(item.value().unwrap(), Price(700));
}

#[test]
fn test_transaction_date_time() {
    let txn = Transaction::new(86_400_000, None, Price::ZERO);
    let dt = txn.date_time().unwrap();
    assert_eq!(dt.format("%Y-%m-%d").to_string(), "1970-01-02");
}

#[test]
fn test_category_display() {
    let cat = Category::new("Groceries".into());
    assert_eq!(format!("{cat}"), "Groceries");
}

// ── SystemTag ─────────────────────────────────────────────────

#[test]
fn test_system_tag_ids_are_distinct_and_descending() {
    let ids: Vec<i64> = SystemTag::all().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![9999, 9998, 9997, 9996, 9995]);
}

#[test]
fn test_system_tag_from_id_roundtrip() {
    for t in SystemTag::all() {
        assert_eq!(SystemTag::from_id(t.id()), Some(*t));
    }
    assert_eq!(SystemTag::from_id(1), None);
}
