pub mod product;

pub use product::{BillingCycle, ProductType};

use crate::core::Currency;
use rust_decimal::Decimal;
use serde::Serialize;

/// A single purchasable tier as shown on the pricing page
#[derive(Debug, Clone, Serialize)]
pub struct PricingTier {
    pub billing_cycle: BillingCycle,
    pub price: Decimal,
    pub display_price: String,
    /// Savings of the yearly tier against twelve monthly payments
    pub discount_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPricing {
    pub product_type: ProductType,
    pub name: String,
    pub description: String,
    pub currency: Currency,
    pub tiers: Vec<PricingTier>,
}

/// Final price of a checkout after discounts
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub amount: crate::core::Money,
    /// Set only when a discount changed the price
    pub original_amount: Option<crate::core::Money>,
    pub discount_code: Option<String>,
}
