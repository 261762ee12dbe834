//! Custom Test Assertions
//!
//! Assertion helpers for billing types that give more meaningful failure
//! messages than bare `assert_eq!`.

use core_kernel::Money;
use domain_billing::{Invoice, Meter, MeterStatus};
use rust_decimal::Decimal;

/// Asserts a Money value has the expected amount (currency ignored)
pub fn assert_amount(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Amount mismatch: actual={}, expected={} {}",
        actual,
        actual.currency().symbol(),
        expected
    );
}

/// Asserts the invoice total equals the sum of its four components and
/// that every component shares the total's currency
pub fn assert_invoice_balanced(invoice: &Invoice) {
    let currency = invoice.total.currency();
    for (name, component) in [
        ("consumption_value", &invoice.consumption_value),
        ("other_fees", &invoice.other_fees),
        ("late_fee", &invoice.late_fee),
        ("interest", &invoice.interest),
    ] {
        assert_eq!(
            component.currency(),
            currency,
            "Invoice {} has {} in {} but total in {}",
            invoice.invoice_number,
            name,
            component.currency(),
            currency
        );
    }

    let sum = invoice.consumption_value.amount()
        + invoice.other_fees.amount()
        + invoice.late_fee.amount()
        + invoice.interest.amount();
    assert_eq!(
        invoice.total.amount(),
        sum,
        "Invoice {} total {} does not match component sum {}",
        invoice.invoice_number,
        invoice.total,
        sum
    );
}

/// Asserts the invoice consumption equals current minus previous reading
pub fn assert_invoice_consumption(invoice: &Invoice) {
    assert_eq!(
        invoice.consumption,
        invoice.current_reading - invoice.previous_reading,
        "Invoice {} consumption does not match its readings",
        invoice.invoice_number
    );
}

/// Asserts a meter is suspended with a suspension timestamp
pub fn assert_meter_suspended(meter: &Meter) {
    assert_eq!(
        meter.status,
        MeterStatus::Suspended,
        "Expected meter {} to be suspended",
        meter.serial_number
    );
    assert!(
        meter.suspended_at.is_some(),
        "Suspended meter {} has no suspended_at",
        meter.serial_number
    );
}

/// Asserts a meter is not suspended and carries no suspension timestamp
pub fn assert_meter_not_suspended(meter: &Meter) {
    assert_ne!(
        meter.status,
        MeterStatus::Suspended,
        "Expected meter {} not to be suspended",
        meter.serial_number
    );
    assert!(
        meter.suspended_at.is_none(),
        "Meter {} is {} but still has suspended_at",
        meter.serial_number,
        meter.status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::TestBilling;
    use crate::fixtures::MoneyFixtures;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_amount() {
        assert_amount(&MoneyFixtures::kz(dec!(12.50)), dec!(12.5));
    }

    #[test]
    #[should_panic(expected = "Amount mismatch")]
    fn test_assert_amount_fails() {
        assert_amount(&MoneyFixtures::kz(dec!(1)), dec!(2));
    }

    #[tokio::test]
    async fn test_issued_invoice_is_balanced() {
        let billing = TestBilling::new();
        let (_, meter, invoice) = billing.invoiced_scenario().await;
        assert_invoice_balanced(&invoice);
        assert_invoice_consumption(&invoice);
        assert_meter_not_suspended(&billing.service.get_meter(meter.id).await.unwrap());
    }
}
