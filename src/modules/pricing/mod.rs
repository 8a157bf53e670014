pub mod models;
pub mod services;

pub use models::{BillingCycle, PricedItem, PricingTier, ProductPricing, ProductType};
pub use services::{DiscountPolicy, PricingCatalog};
