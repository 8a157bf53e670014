use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::{AppError, Currency, Money, Result};
use crate::modules::pricing::models::{
    BillingCycle, PricedItem, PricingTier, ProductPricing, ProductType,
};

/// Price list for every product, cycle and currency the platform sells in.
///
/// Prices are kept in two tables: an international one (USD, also used for
/// EUR and GBP) and a regional one (EGP, also used for SAR).
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog;

impl PricingCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Price of `product` billed per `cycle` in `currency`
    pub fn price(
        &self,
        product: ProductType,
        currency: Currency,
        cycle: BillingCycle,
    ) -> Result<Money> {
        if !product.supports_cycle(cycle) {
            return Err(AppError::validation(format!(
                "{} cannot be purchased with a {} billing cycle",
                product.display_name(),
                cycle
            )));
        }

        let amount = match currency {
            Currency::USD | Currency::EUR | Currency::GBP => international_price(product, cycle),
            Currency::EGP | Currency::SAR => regional_price(product, cycle),
        };

        let amount = amount.ok_or_else(|| {
            AppError::validation(format!(
                "No price for {} ({}) in {}",
                product.display_name(),
                cycle,
                currency
            ))
        })?;

        Ok(Money::new(amount, currency)?)
    }

    /// Savings of the yearly tier against twelve monthly payments, in whole
    /// percent. `None` for products without both tiers.
    pub fn yearly_discount_percentage(
        &self,
        product: ProductType,
        currency: Currency,
    ) -> Option<Decimal> {
        let monthly = self.price(product, currency, BillingCycle::Monthly).ok()?;
        let yearly = self.price(product, currency, BillingCycle::Yearly).ok()?;

        let full_year = monthly.amount() * Decimal::from(12);
        if full_year.is_zero() {
            return None;
        }

        Some(((full_year - yearly.amount()) / full_year * Decimal::ONE_HUNDRED).round_dp(0))
    }

    /// All products with their tiers in `currency`
    pub fn list_products(&self, currency: Currency) -> Vec<ProductPricing> {
        ProductType::ALL
            .iter()
            .map(|&product| {
                let tiers = product
                    .billing_cycles()
                    .iter()
                    .filter_map(|&cycle| {
                        let price = self.price(product, currency, cycle).ok()?;
                        let discount_percentage = match cycle {
                            BillingCycle::Yearly => {
                                self.yearly_discount_percentage(product, currency)
                            }
                            _ => None,
                        };
                        Some(PricingTier {
                            billing_cycle: cycle,
                            price: price.amount(),
                            display_price: price.display_amount(),
                            discount_percentage,
                        })
                    })
                    .collect();

                ProductPricing {
                    product_type: product,
                    name: product.display_name().to_string(),
                    description: product.description().to_string(),
                    currency,
                    tiers,
                }
            })
            .collect()
    }
}

fn international_price(product: ProductType, cycle: BillingCycle) -> Option<Decimal> {
    use BillingCycle::*;
    use ProductType::*;

    let cents = match (product, cycle) {
        (InterviewerSubscription, Monthly) => 999,
        (InterviewerSubscription, Yearly) => 9999,
        (CvBuilderSubscription, Monthly) => 699,
        (CvBuilderSubscription, Yearly) => 6999,
        (BundleSubscription, Monthly) => 1399,
        (BundleSubscription, Yearly) => 13999,
        (InterviewerLifetime, Lifetime) => 19999,
        (CvBuilderLifetime, Lifetime) => 14999,
        (BundleLifetime, Lifetime) => 29999,
        (SingleInterview, PayPerUse) => 499,
        (SingleCv, PayPerUse) => 299,
        _ => return None,
    };
    Some(Decimal::new(cents, 2))
}

fn regional_price(product: ProductType, cycle: BillingCycle) -> Option<Decimal> {
    use BillingCycle::*;
    use ProductType::*;

    let piasters = match (product, cycle) {
        (InterviewerSubscription, Monthly) => 29999,
        (InterviewerSubscription, Yearly) => 299999,
        (CvBuilderSubscription, Monthly) => 19999,
        (CvBuilderSubscription, Yearly) => 199999,
        (BundleSubscription, Monthly) => 3000,
        (BundleSubscription, Yearly) => 30000,
        (InterviewerLifetime, Lifetime) => 599999,
        (CvBuilderLifetime, Lifetime) => 449999,
        (BundleLifetime, Lifetime) => 899999,
        (SingleInterview, PayPerUse) => 14999,
        (SingleCv, PayPerUse) => 8999,
        _ => return None,
    };
    Some(Decimal::new(piasters, 2))
}

/// Configured promotional codes, each worth a percentage off
#[derive(Debug, Clone, Default)]
pub struct DiscountPolicy {
    codes: HashMap<String, Decimal>,
}

impl DiscountPolicy {
    /// Codes are matched case-insensitively
    pub fn new(codes: HashMap<String, Decimal>) -> Self {
        let codes = codes
            .into_iter()
            .map(|(code, percent)| (code.trim().to_uppercase(), percent))
            .collect();
        Self { codes }
    }

    /// Parses `CODE:percent` pairs separated by commas, e.g. `LAUNCH20:20,VIP:35`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut codes = HashMap::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, percent) = entry.split_once(':').ok_or_else(|| {
                AppError::Configuration(format!("Invalid discount entry '{}'", entry))
            })?;

            let percent: Decimal = percent.trim().parse().map_err(|_| {
                AppError::Configuration(format!("Invalid discount percentage in '{}'", entry))
            })?;

            if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                return Err(AppError::Configuration(format!(
                    "Discount percentage must be within (0, 100] in '{}'",
                    entry
                )));
            }

            codes.insert(code.trim().to_uppercase(), percent);
        }

        Ok(Self { codes })
    }

    pub fn percentage(&self, code: &str) -> Option<Decimal> {
        self.codes.get(&code.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Applies `code` to `price`. Unknown codes leave the price unchanged.
    pub fn apply(&self, price: Money, code: Option<&str>) -> Result<PricedItem> {
        let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => {
                return Ok(PricedItem {
                    amount: price,
                    original_amount: None,
                    discount_code: None,
                })
            }
        };

        let percent = match self.percentage(code) {
            Some(percent) => percent,
            None => {
                warn!(discount_code = %code, "Ignoring unknown discount code");
                return Ok(PricedItem {
                    amount: price,
                    original_amount: None,
                    discount_code: None,
                });
            }
        };

        let discount = price.percentage(percent)?;
        let amount = price.try_sub(&discount)?;

        Ok(PricedItem {
            amount,
            original_amount: Some(price),
            discount_code: Some(code.to_uppercase()),
        })
    }
}
