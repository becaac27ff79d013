//! Checkout request types submitted by clients.
//!
//! These mirror the checkout flow's submission payload. The payment block
//! is decorative: it is validated for presence but never charged or
//! forwarded upstream.

use serde::{Deserialize, Serialize};

/// A product selected for gifting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
	/// Catalog identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Listed price in dollars.
	pub price: f64,
	/// Retailer this product is ordered from.
	pub retailer: String,
	/// Retailer-side product identifier used for order placement.
	pub product_id: String,
	/// Optional explicit max-price ceiling in dollars. When absent, a
	/// tiered buffer over the listed price is computed at placement time.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_price: Option<f64>,
}

/// Shipping destination for the gift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
	pub first_name: String,
	pub last_name: String,
	pub address_line1: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address_line2: Option<String>,
	pub zip_code: String,
	pub city: String,
	pub state: String,
	pub country: String,
	pub phone_number: String,
}

impl ShippingAddress {
	/// Recipient display name derived from the address.
	pub fn recipient_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

/// Payment details collected by the checkout form. Demo-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
	pub name: String,
	pub number: String,
	pub cvv: String,
	#[serde(rename = "expiryMonth")]
	pub expiry_month: String,
	#[serde(rename = "expiryYear")]
	pub expiry_year: String,
}

/// A complete checkout submission for an anonymous gift order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftOrderRequest {
	/// The product to order.
	pub product: Product,
	/// Optional gift message shown to the recipient.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Where to ship the gift.
	pub shipping_address: ShippingAddress,
	/// Decorative payment block.
	pub payment: PaymentInfo,
	/// Sender's email address.
	pub email: String,
	/// Optional email for identity disclosure to the recipient.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reveal_email: Option<String>,
}

impl GiftOrderRequest {
	/// Checks the fields that serde's structural validation cannot.
	pub fn validate(&self) -> Result<(), String> {
		if self.email.trim().is_empty() {
			return Err("sender email is required".into());
		}
		if self.product.product_id.trim().is_empty() {
			return Err("product id is required".into());
		}
		if self.product.price <= 0.0 {
			return Err("product price must be positive".into());
		}
		Ok(())
	}
}
