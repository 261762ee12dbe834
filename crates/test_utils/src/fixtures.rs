//! Pre-built Test Fixtures
//!
//! Fixed dates and amounts so tests produce predictable invoices.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use core_kernel::{Currency, FixedClock, Money};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Business date every fixture clock starts on
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    /// Noon UTC of [`TemporalFixtures::today`]
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    /// A clock frozen at [`TemporalFixtures::now`]
    pub fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::at(Self::now()))
    }

    /// A date `days` before today
    pub fn days_ago(days: i64) -> NaiveDate {
        Self::today() - Duration::days(days)
    }

    /// Installation date used by meter fixtures
    pub fn installation_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }
}

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// An amount in kwanza
    pub fn kz(amount: Decimal) -> Money {
        Money::new(amount, Currency::AOA)
    }

    /// Total of the standard scenario: 50 kWh at 50 Kz plus a 10 Kz surcharge
    pub fn standard_invoice_total() -> Money {
        Self::kz(dec!(2510))
    }
}

/// Tariff values shared by the builders and the expected amounts above
pub struct TariffFixtures;

impl TariffFixtures {
    pub const UNIT_PRICE: Decimal = dec!(50);
    pub const FIXED_FEE: Decimal = dec!(200);
    pub const POSTPAID_SURCHARGE: Decimal = dec!(10);
    pub const PREPAID_SURCHARGE: Decimal = dec!(5);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Clock;

    #[test]
    fn test_clock_matches_today() {
        assert_eq!(TemporalFixtures::clock().today(), TemporalFixtures::today());
    }

    #[test]
    fn test_days_ago() {
        assert_eq!(
            TemporalFixtures::days_ago(18),
            NaiveDate::from_ymd_opt(2026, 9, 30).unwrap()
        );
    }
}
