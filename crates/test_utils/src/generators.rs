//! Property-Based Test Generators
//!
//! Proptest strategies for billing inputs, and `fake` data for request
//! bodies that only need to look realistic.

use chrono::Duration;
use core_kernel::{Currency, Money};
use domain_billing::{BillingMode, RegisterCustomerRequest, TariffCategory};
use fake::faker::address::en::StreetName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::TemporalFixtures;

/// Strategy for supported currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::AOA), Just(Currency::USD), Just(Currency::EUR)]
}

/// Strategy for billing modes
pub fn billing_mode_strategy() -> impl Strategy<Value = BillingMode> {
    prop_oneof![Just(BillingMode::Postpaid), Just(BillingMode::Prepaid)]
}

/// Strategy for tariff categories
pub fn tariff_category_strategy() -> impl Strategy<Value = TariffCategory> {
    prop_oneof![
        Just(TariffCategory::Domestic),
        Just(TariffCategory::Commercial),
        Just(TariffCategory::Industrial),
    ]
}

/// Cumulative meter reading with one decimal place, 0 to 1,000,000 kWh
pub fn reading_value_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 1))
}

/// A (previous, current) reading pair with `current >= previous`
pub fn forward_reading_pair_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    (reading_value_strategy(), 0i64..100_000i64)
        .prop_map(|(previous, delta)| (previous, previous + Decimal::new(delta, 1)))
}

/// A (previous, current) reading pair with `current < previous`
pub fn backward_reading_pair_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    (1i64..10_000_000i64, 1i64..10_000_000i64).prop_map(|(a, b)| {
        let previous = Decimal::new(a.max(b) + 1, 1);
        let current = Decimal::new(a.min(b), 1);
        (previous, current)
    })
}

/// Unit price with two decimal places, 0.01 to 1,000.00
pub fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Money in the given currency with two decimal places
pub fn money_strategy(currency: Currency) -> impl Strategy<Value = Money> {
    (0i64..100_000_000i64).prop_map(move |n| Money::new(Decimal::new(n, 2), currency))
}

/// Days past the due date, up to a year
pub fn days_overdue_strategy() -> impl Strategy<Value = i64> {
    0i64..366i64
}

/// Due dates within the year before the fixture date
pub fn due_date_strategy() -> impl Strategy<Value = chrono::NaiveDate> {
    days_overdue_strategy().prop_map(|days| TemporalFixtures::today() - Duration::days(days))
}

/// A customer registration with fake name and contact details
pub fn fake_customer_request(billing_mode: BillingMode) -> RegisterCustomerRequest {
    let fiscal: u64 = (1_000_000_000u64..9_999_999_999u64).fake();
    RegisterCustomerRequest {
        name: Name().fake(),
        fiscal_id: fiscal.to_string(),
        national_id: None,
        address: Some(StreetName().fake()),
        phone: Some(PhoneNumber().fake()),
        email: Some(SafeEmail().fake()),
        billing_mode,
        tariff_id: None,
        notes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_forward_pairs_never_go_backwards(
            (previous, current) in forward_reading_pair_strategy()
        ) {
            prop_assert!(current >= previous);
        }

        #[test]
        fn test_backward_pairs_always_go_backwards(
            (previous, current) in backward_reading_pair_strategy()
        ) {
            prop_assert!(current < previous);
        }

        #[test]
        fn test_due_dates_not_in_future(due in due_date_strategy()) {
            prop_assert!(due <= TemporalFixtures::today());
        }
    }

    #[test]
    fn test_fake_customer_has_ten_digit_fiscal_id() {
        let request = fake_customer_request(BillingMode::Prepaid);
        assert_eq!(request.fiscal_id.len(), 10);
        assert!(!request.name.is_empty());
    }
}
