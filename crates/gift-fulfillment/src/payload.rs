//! Order placement payload construction.
//!
//! Builds the upstream order body from a checkout submission: a single
//! quantity-one line item, the shipping address as given, a price
//! ceiling, and webhook registrations for every status event class
//! pointing at one callback endpoint.

use crate::pricing;
use gift_types::{signal::webhook_event, GiftOrderRequest, ShippingAddress};
use serde::Serialize;

/// Gift message used when the sender left the message blank. The order is
/// still flagged as a gift so the retailer omits pricing from the package.
const DEFAULT_GIFT_MESSAGE: &str = "Someone sent you a gift!";

/// One line item in an upstream order.
#[derive(Debug, Serialize)]
pub struct OrderProduct {
	pub product_id: String,
	pub quantity: u32,
}

/// Webhook callback registrations, one per event class.
#[derive(Debug, Serialize)]
pub struct WebhookUrls {
	pub request_succeeded: String,
	pub request_failed: String,
	pub tracking_obtained: String,
	pub tracking_updated: String,
	pub status_updated: String,
}

impl WebhookUrls {
	fn new(callback_url: &str) -> Self {
		Self {
			request_succeeded: callback_url.to_string(),
			request_failed: callback_url.to_string(),
			tracking_obtained: callback_url.to_string(),
			tracking_updated: callback_url.to_string(),
			status_updated: callback_url.to_string(),
		}
	}

	/// All registered callback URLs keyed by event class.
	pub fn entries(&self) -> [(&'static str, &str); 5] {
		[
			(webhook_event::REQUEST_SUCCEEDED, &self.request_succeeded),
			(webhook_event::REQUEST_FAILED, &self.request_failed),
			(webhook_event::TRACKING_OBTAINED, &self.tracking_obtained),
			(webhook_event::TRACKING_UPDATED, &self.tracking_updated),
			(webhook_event::STATUS_UPDATED, &self.status_updated),
		]
	}
}

/// Metadata stored with the upstream order for later correlation.
#[derive(Debug, Serialize)]
pub struct ClientNotes {
	pub customer_email: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reveal_email: Option<String>,
	pub payment_collected: bool,
}

/// The complete upstream order placement body.
#[derive(Debug, Serialize)]
pub struct OrderPayload {
	pub retailer: String,
	pub products: Vec<OrderProduct>,
	pub shipping_address: ShippingAddress,
	pub shipping_method: String,
	/// Price ceiling in cents, as a decimal string.
	pub max_price: String,
	pub is_gift: bool,
	pub gift_message: String,
	pub client_notes: ClientNotes,
	pub webhooks: WebhookUrls,
}

/// Builds the upstream order payload for a checkout submission.
pub fn build_order_payload(request: &GiftOrderRequest, webhook_base_url: &str) -> OrderPayload {
	let callback_url = format!("{}/api/webhooks/order-status", webhook_base_url);
	let gift_message = request
		.message
		.clone()
		.filter(|m| !m.trim().is_empty())
		.unwrap_or_else(|| DEFAULT_GIFT_MESSAGE.to_string());

	OrderPayload {
		retailer: request.product.retailer.clone(),
		products: vec![OrderProduct {
			product_id: request.product.product_id.clone(),
			quantity: 1,
		}],
		shipping_address: request.shipping_address.clone(),
		shipping_method: "cheapest".to_string(),
		max_price: pricing::effective_max_price_cents(&request.product).to_string(),
		is_gift: true,
		gift_message,
		client_notes: ClientNotes {
			customer_email: request.email.clone(),
			reveal_email: request.reveal_email.clone(),
			payment_collected: true,
		},
		webhooks: WebhookUrls::new(&callback_url),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use gift_types::{PaymentInfo, Product};

	fn request() -> GiftOrderRequest {
		GiftOrderRequest {
			product: Product {
				id: "p1".into(),
				name: "Coffee Mug".into(),
				price: 12.0,
				retailer: "amazon".into(),
				product_id: "B000MUG".into(),
				max_price: None,
			},
			message: None,
			shipping_address: ShippingAddress {
				first_name: "Alex".into(),
				last_name: "Doe".into(),
				address_line1: "1 Main St".into(),
				address_line2: None,
				zip_code: "94110".into(),
				city: "San Francisco".into(),
				state: "CA".into(),
				country: "US".into(),
				phone_number: "5551234567".into(),
			},
			payment: PaymentInfo {
				name: "Alex Doe".into(),
				number: "4242424242424242".into(),
				cvv: "123".into(),
				expiry_month: "12".into(),
				expiry_year: "2030".into(),
			},
			email: "sender@example.com".into(),
			reveal_email: Some("sender@example.com".into()),
		}
	}

	#[test]
	fn registers_all_event_classes_at_one_endpoint() {
		let payload = build_order_payload(&request(), "https://gifts.example.com");
		let entries = payload.webhooks.entries();
		assert_eq!(entries.len(), 5);
		for (_, url) in entries {
			assert_eq!(url, "https://gifts.example.com/api/webhooks/order-status");
		}
	}

	#[test]
	fn price_ceiling_uses_tiered_buffer() {
		let payload = build_order_payload(&request(), "https://gifts.example.com");
		assert_eq!(payload.max_price, "2280");
	}

	#[test]
	fn blank_message_falls_back_to_default() {
		let mut req = request();
		req.message = Some("   ".into());
		let payload = build_order_payload(&req, "https://gifts.example.com");
		assert_eq!(payload.gift_message, DEFAULT_GIFT_MESSAGE);
		assert!(payload.is_gift);
	}

	#[test]
	fn single_quantity_one_line_item() {
		let payload = build_order_payload(&request(), "https://gifts.example.com");
		assert_eq!(payload.products.len(), 1);
		assert_eq!(payload.products[0].quantity, 1);
		assert_eq!(payload.products[0].product_id, "B000MUG");
	}

	#[test]
	fn payment_details_never_reach_the_payload() {
		let payload = build_order_payload(&request(), "https://gifts.example.com");
		let json = serde_json::to_value(&payload).unwrap();
		let text = json.to_string();
		assert!(!text.contains("4242424242424242"));
		assert!(!text.contains("cvv"));
	}
}
