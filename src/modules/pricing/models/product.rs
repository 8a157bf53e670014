use serde::{Deserialize, Serialize};
use std::fmt;

/// Purchasable products on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(40)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    InterviewerSubscription,
    CvBuilderSubscription,
    BundleSubscription,
    InterviewerLifetime,
    CvBuilderLifetime,
    BundleLifetime,
    SingleInterview,
    SingleCv,
}

impl ProductType {
    pub const ALL: [ProductType; 8] = [
        ProductType::InterviewerSubscription,
        ProductType::CvBuilderSubscription,
        ProductType::BundleSubscription,
        ProductType::InterviewerLifetime,
        ProductType::CvBuilderLifetime,
        ProductType::BundleLifetime,
        ProductType::SingleInterview,
        ProductType::SingleCv,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ProductType::InterviewerSubscription => "AI Interviewer",
            ProductType::CvBuilderSubscription => "CV Builder",
            ProductType::BundleSubscription => "Careera Bundle",
            ProductType::InterviewerLifetime => "AI Interviewer Lifetime",
            ProductType::CvBuilderLifetime => "CV Builder Lifetime",
            ProductType::BundleLifetime => "Careera Bundle Lifetime",
            ProductType::SingleInterview => "Single Interview Session",
            ProductType::SingleCv => "Single CV Review",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProductType::InterviewerSubscription => "Unlimited AI mock interviews",
            ProductType::CvBuilderSubscription => "Unlimited AI CV building and reviews",
            ProductType::BundleSubscription => "AI Interviewer and CV Builder together",
            ProductType::InterviewerLifetime => "One payment, AI mock interviews forever",
            ProductType::CvBuilderLifetime => "One payment, CV Builder forever",
            ProductType::BundleLifetime => "One payment, every feature forever",
            ProductType::SingleInterview => "One AI mock interview",
            ProductType::SingleCv => "One AI CV review",
        }
    }

    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            ProductType::InterviewerSubscription
                | ProductType::CvBuilderSubscription
                | ProductType::BundleSubscription
        )
    }

    pub fn is_lifetime(&self) -> bool {
        matches!(
            self,
            ProductType::InterviewerLifetime
                | ProductType::CvBuilderLifetime
                | ProductType::BundleLifetime
        )
    }

    /// Billing cycles a product can be bought with, default first
    pub fn billing_cycles(&self) -> &'static [BillingCycle] {
        if self.is_subscription() {
            &[BillingCycle::Monthly, BillingCycle::Yearly]
        } else if self.is_lifetime() {
            &[BillingCycle::Lifetime]
        } else {
            &[BillingCycle::PayPerUse]
        }
    }

    pub fn default_billing_cycle(&self) -> BillingCycle {
        self.billing_cycles()[0]
    }

    pub fn supports_cycle(&self, cycle: BillingCycle) -> bool {
        self.billing_cycles().contains(&cycle)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProductType::InterviewerSubscription => "interviewer_subscription",
            ProductType::CvBuilderSubscription => "cv_builder_subscription",
            ProductType::BundleSubscription => "bundle_subscription",
            ProductType::InterviewerLifetime => "interviewer_lifetime",
            ProductType::CvBuilderLifetime => "cv_builder_lifetime",
            ProductType::BundleLifetime => "bundle_lifetime",
            ProductType::SingleInterview => "single_interview",
            ProductType::SingleCv => "single_cv",
        };
        f.write_str(name)
    }
}

/// How often a purchase is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
    Lifetime,
    /// One-time purchase
    PayPerUse,
}

impl BillingCycle {
    /// Recurring interval understood by subscription checkouts
    pub fn recurring_interval(&self) -> Option<&'static str> {
        match self {
            BillingCycle::Monthly => Some("month"),
            BillingCycle::Yearly => Some("year"),
            BillingCycle::Lifetime | BillingCycle::PayPerUse => None,
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::Lifetime => "lifetime",
            BillingCycle::PayPerUse => "pay_per_use",
        };
        f.write_str(name)
    }
}
