use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment provider kinds the platform can route a checkout to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(32)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// International card checkout (Stripe Checkout)
    CardGateway,
    /// Wallet checkout (PayPal Orders)
    WalletProvider,
    /// Regional card and mobile wallet acceptance (Paymob)
    RegionalGateway,
}

impl PaymentProvider {
    pub const ALL: [PaymentProvider; 3] = [
        PaymentProvider::CardGateway,
        PaymentProvider::WalletProvider,
        PaymentProvider::RegionalGateway,
    ];

    /// Stable identifier used in URLs, logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::CardGateway => "card_gateway",
            PaymentProvider::WalletProvider => "wallet_provider",
            PaymentProvider::RegionalGateway => "regional_gateway",
        }
    }

    /// Vendor behind the provider kind
    pub fn vendor(&self) -> &'static str {
        match self {
            PaymentProvider::CardGateway => "Stripe",
            PaymentProvider::WalletProvider => "PayPal",
            PaymentProvider::RegionalGateway => "Paymob",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = String;

    /// Accepts the canonical identifier, a dashed variant, or the vendor name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "card_gateway" | "cardgateway" | "stripe" => Ok(PaymentProvider::CardGateway),
            "wallet_provider" | "walletprovider" | "wallet" | "paypal" => Ok(PaymentProvider::WalletProvider),
            "regional_gateway" | "regionalgateway" | "regional" | "paymob" => {
                Ok(PaymentProvider::RegionalGateway)
            }
            _ => Err(format!("Unknown payment provider: {}", s)),
        }
    }
}

/// How the customer paid, as far as the provider tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(32)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    PayPalWallet,
    MobileWallet,
    BankTransfer,
    ApplePay,
    GooglePay,
    Unknown,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Unknown
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::PayPalWallet => "pay_pal_wallet",
            PaymentMethod::MobileWallet => "mobile_wallet",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
            PaymentMethod::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
