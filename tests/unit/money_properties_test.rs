use careera_billing::core::{Currency, Money, MoneyError};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Property-based tests for Money
///
/// Validates:
/// - Amounts are rounded to 2 decimal places
/// - Addition is exact for same-currency values
/// - Cross-currency arithmetic and comparison are rejected
/// - Negative amounts are never constructed

fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop::sample::select(Currency::ALL.to_vec())
}

fn cents(value: u64) -> Decimal {
    Decimal::from(value) / Decimal::from(100)
}

proptest! {
    #[test]
    fn test_amounts_round_to_two_places(
        raw in 0u64..10_000_000_000u64,
        currency in currency_strategy()
    ) {
        // four decimal places in, two out
        let amount = Decimal::from(raw) / Decimal::from(10_000);
        let money = Money::new(amount, currency).unwrap();

        prop_assert_eq!(money.amount().scale(), 2);
        prop_assert!((money.amount() - amount).abs() <= Decimal::new(5, 3));
    }

    #[test]
    fn test_addition_sums_amounts(
        a in 0u64..100_000_000u64,
        b in 0u64..100_000_000u64,
        currency in currency_strategy()
    ) {
        let left = Money::new(cents(a), currency).unwrap();
        let right = Money::new(cents(b), currency).unwrap();

        let sum = left.try_add(&right).unwrap();
        prop_assert_eq!(sum.amount(), cents(a + b));
        prop_assert_eq!(sum, left + right);
        prop_assert_eq!(sum.currency(), currency);
    }

    #[test]
    fn test_subtraction_never_goes_negative(
        a in 0u64..100_000_000u64,
        b in 0u64..100_000_000u64
    ) {
        let left = Money::new(cents(a), Currency::USD).unwrap();
        let right = Money::new(cents(b), Currency::USD).unwrap();

        match left.try_sub(&right) {
            Ok(diff) => {
                prop_assert!(a >= b);
                prop_assert_eq!(diff.amount(), cents(a - b));
            }
            Err(e) => {
                prop_assert!(a < b);
                prop_assert_eq!(e, MoneyError::Negative);
            }
        }
    }

    #[test]
    fn test_cross_currency_rejected(
        a in 0u64..100_000_000u64,
        b in 0u64..100_000_000u64,
        left_currency in currency_strategy(),
        right_currency in currency_strategy()
    ) {
        prop_assume!(left_currency != right_currency);
        let left = Money::new(cents(a), left_currency).unwrap();
        let right = Money::new(cents(b), right_currency).unwrap();

        let mismatch = MoneyError::CurrencyMismatch { left: left_currency, right: right_currency };
        prop_assert_eq!(left.try_add(&right), Err(mismatch.clone()));
        prop_assert_eq!(left.try_sub(&right), Err(mismatch.clone()));
        prop_assert_eq!(left.try_cmp(&right), Err(mismatch));
        prop_assert_eq!(left.partial_cmp(&right), None);
    }

    #[test]
    fn test_percentage_never_exceeds_whole(
        a in 0u64..100_000_000u64,
        pct in 0u32..=100u32
    ) {
        let money = Money::new(cents(a), Currency::EGP).unwrap();
        let part = money.percentage(Decimal::from(pct)).unwrap();

        prop_assert!(part <= money);
        prop_assert_eq!(part.amount().scale(), 2);
    }
}

#[test]
fn test_negative_amount_rejected() {
    assert_eq!(
        Money::new(Decimal::new(-1, 2), Currency::USD),
        Err(MoneyError::Negative)
    );
}

#[test]
#[should_panic(expected = "invalid money addition")]
fn test_operator_addition_panics_across_currencies() {
    let usd = Money::new(Decimal::ONE, Currency::USD).unwrap();
    let eur = Money::new(Decimal::ONE, Currency::EUR).unwrap();
    let _ = usd + eur;
}

#[test]
fn test_display_amount_symbols() {
    let cases = [
        (Currency::USD, "$30.00"),
        (Currency::EUR, "€30.00"),
        (Currency::GBP, "£30.00"),
        (Currency::EGP, "30.00 EGP"),
        (Currency::SAR, "30.00 SAR"),
    ];

    for (currency, expected) in cases {
        let money = Money::new(Decimal::from(30), currency).unwrap();
        assert_eq!(money.display_amount(), expected);
        assert_eq!(money.to_string(), format!("30.00 {}", currency));
    }
}
