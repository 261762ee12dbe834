//! Tariffs and the tariff catalog
//!
//! A tariff is a pricing plan: a price per kWh, a fixed monthly fee and a
//! surcharge per billing mode. The catalog turns a customer's (optional)
//! tariff into the two numbers an invoice needs: unit price and other fees.
//!
//! Which fee counts as "other fees" depends on the issuing path:
//!
//! | Path              | Tariff assigned        | No tariff             |
//! |-------------------|------------------------|-----------------------|
//! | reading / manual  | surcharge for the mode | `default_surcharge`   |
//! | bulk generation   | plan fixed fee         | `default_fixed_fee`   |
//!
//! See [`FeeBasis`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, TariffId};

use crate::config::BillingConfig;
use crate::customer::BillingMode;
use crate::error::BillingError;
use crate::requests::UpdateTariffRequest;

/// Tariff category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffCategory {
    Domestic,
    Commercial,
    Industrial,
}

impl_labels!(TariffCategory {
    Domestic => "DOMESTIC",
    Commercial => "COMMERCIAL",
    Industrial => "INDUSTRIAL",
});

/// A pricing plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    pub id: TariffId,
    pub name: String,
    pub category: TariffCategory,
    /// Price per kWh
    pub unit_price: Money,
    /// Fixed monthly fee
    pub fixed_fee: Money,
    /// Additional fee charged to postpaid customers
    pub postpaid_surcharge: Money,
    /// Additional fee charged to prepaid customers
    pub prepaid_surcharge: Money,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tariff {
    /// Creates an active tariff with no fees
    pub fn new(name: impl Into<String>, category: TariffCategory, unit_price: Money) -> Self {
        let currency = unit_price.currency();
        Self {
            id: TariffId::new_v7(),
            name: name.into(),
            category,
            unit_price,
            fixed_fee: Money::zero(currency),
            postpaid_surcharge: Money::zero(currency),
            prepaid_surcharge: Money::zero(currency),
            description: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_fixed_fee(mut self, fixed_fee: Money) -> Self {
        self.fixed_fee = fixed_fee;
        self
    }

    pub fn with_surcharges(mut self, postpaid: Money, prepaid: Money) -> Self {
        self.postpaid_surcharge = postpaid;
        self.prepaid_surcharge = prepaid;
        self
    }

    /// Applies edited plan data in the plan's own currency; call `validate` afterwards
    pub fn apply_update(&mut self, changes: UpdateTariffRequest) {
        let currency = self.unit_price.currency();
        let money = |amount| Money::new(amount, currency);

        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(unit_price) = changes.unit_price {
            self.unit_price = money(unit_price);
        }
        if let Some(fixed_fee) = changes.fixed_fee {
            self.fixed_fee = money(fixed_fee);
        }
        if let Some(postpaid) = changes.postpaid_surcharge {
            self.postpaid_surcharge = money(postpaid);
        }
        if let Some(prepaid) = changes.prepaid_surcharge {
            self.prepaid_surcharge = money(prepaid);
        }
        if changes.description.is_some() {
            self.description = changes.description;
        }
        if let Some(active) = changes.active {
            self.active = active;
        }
    }

    /// Returns the surcharge that applies to a billing mode
    pub fn surcharge_for(&self, mode: BillingMode) -> Money {
        match mode {
            BillingMode::Postpaid => self.postpaid_surcharge,
            BillingMode::Prepaid => self.prepaid_surcharge,
        }
    }

    /// Checks that the plan is usable for billing
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.name.trim().is_empty() {
            return Err(BillingError::validation("tariff name is required"));
        }
        let amounts = [
            ("unit_price", self.unit_price),
            ("fixed_fee", self.fixed_fee),
            ("postpaid_surcharge", self.postpaid_surcharge),
            ("prepaid_surcharge", self.prepaid_surcharge),
        ];
        for (field, amount) in amounts {
            if amount.is_negative() {
                return Err(BillingError::validation(format!("{field} must not be negative")));
            }
            if amount.currency() != self.unit_price.currency() {
                return Err(BillingError::validation(format!(
                    "{field} currency differs from unit price"
                )));
            }
        }
        Ok(())
    }
}

/// Which fee an issuing path adds on top of consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeBasis {
    /// Surcharge selected by billing mode (reading-triggered and manual invoices)
    ModeSurcharge,
    /// The plan's fixed monthly fee (bulk generation)
    FixedFee,
}

/// Resolved pricing for one invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub unit_price: Money,
    pub other_fees: Money,
}

/// Resolves pricing from an optional tariff and the configured defaults
#[derive(Debug, Clone)]
pub struct TariffCatalog {
    default_unit_price: Money,
    default_fixed_fee: Money,
    default_surcharge: Money,
}

impl TariffCatalog {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            default_unit_price: config.money(config.default_unit_price),
            default_fixed_fee: config.money(config.default_fixed_fee),
            default_surcharge: config.money(config.default_surcharge),
        }
    }

    /// Returns unit price and other fees for a customer
    pub fn resolve(&self, tariff: Option<&Tariff>, mode: BillingMode, basis: FeeBasis) -> Pricing {
        match tariff {
            Some(tariff) => Pricing {
                unit_price: tariff.unit_price,
                other_fees: match basis {
                    FeeBasis::ModeSurcharge => tariff.surcharge_for(mode),
                    FeeBasis::FixedFee => tariff.fixed_fee,
                },
            },
            None => Pricing {
                unit_price: self.default_unit_price,
                other_fees: match basis {
                    FeeBasis::ModeSurcharge => self.default_surcharge,
                    FeeBasis::FixedFee => self.default_fixed_fee,
                },
            },
        }
    }

    pub fn default_unit_price(&self) -> Decimal {
        self.default_unit_price.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn kz(amount: Decimal) -> Money {
        Money::new(amount, Currency::AOA)
    }

    fn residential() -> Tariff {
        Tariff::new("Residencial", TariffCategory::Domestic, kz(dec!(50)))
            .with_fixed_fee(kz(dec!(200)))
            .with_surcharges(kz(dec!(10)), kz(dec!(5)))
    }

    #[test]
    fn test_surcharge_follows_billing_mode() {
        let catalog = TariffCatalog::new(&BillingConfig::default());
        let tariff = residential();

        let post = catalog.resolve(Some(&tariff), BillingMode::Postpaid, FeeBasis::ModeSurcharge);
        let pre = catalog.resolve(Some(&tariff), BillingMode::Prepaid, FeeBasis::ModeSurcharge);
        assert_eq!(post.other_fees.amount(), dec!(10));
        assert_eq!(pre.other_fees.amount(), dec!(5));
    }

    #[test]
    fn test_fixed_fee_basis_ignores_surcharges() {
        let catalog = TariffCatalog::new(&BillingConfig::default());
        let pricing =
            catalog.resolve(Some(&residential()), BillingMode::Postpaid, FeeBasis::FixedFee);
        assert_eq!(pricing.other_fees.amount(), dec!(200));
        assert_eq!(pricing.unit_price.amount(), dec!(50));
    }

    #[test]
    fn test_defaults_without_tariff() {
        let config = BillingConfig {
            default_fixed_fee: dec!(150),
            default_surcharge: dec!(7),
            ..Default::default()
        };
        let catalog = TariffCatalog::new(&config);

        let reading_path = catalog.resolve(None, BillingMode::Postpaid, FeeBasis::ModeSurcharge);
        let bulk_path = catalog.resolve(None, BillingMode::Postpaid, FeeBasis::FixedFee);
        assert_eq!(reading_path.unit_price.amount(), dec!(50.00));
        assert_eq!(reading_path.other_fees.amount(), dec!(7));
        assert_eq!(bulk_path.other_fees.amount(), dec!(150));
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let mut tariff = residential();
        tariff.apply_update(UpdateTariffRequest {
            unit_price: Some(dec!(55)),
            active: Some(false),
            ..Default::default()
        });

        assert_eq!(tariff.unit_price, kz(dec!(55)));
        assert_eq!(tariff.fixed_fee, kz(dec!(200)));
        assert!(!tariff.active);
        assert!(tariff.validate().is_ok());
    }

    #[test]
    fn test_negative_price_is_invalid() {
        let tariff = Tariff::new("Broken", TariffCategory::Industrial, kz(dec!(-1)));
        assert!(tariff.validate().is_err());
    }
}
