//! Max-price ceiling computation.
//!
//! Retailer prices drift between catalog display and placement, so each
//! order carries a price ceiling with a tiered buffer over the listed
//! price. Cheaper items get proportionally more headroom because flat
//! shipping dominates their final cost.

use gift_types::Product;

/// Converts a dollar amount to whole cents, rounding up.
pub fn dollars_to_cents(dollars: f64) -> u64 {
	(dollars * 100.0).ceil() as u64
}

/// Computes the tiered max-price ceiling in cents for a listed price.
pub fn max_price_cents(list_price: f64) -> u64 {
	let ceiling = if list_price <= 10.0 {
		list_price * 2.0 + 7.0
	} else if list_price <= 15.0 {
		list_price * 1.9
	} else {
		list_price * 1.8
	};
	dollars_to_cents(ceiling)
}

/// The effective ceiling for a product: an explicit `max_price` override
/// wins, otherwise the tiered buffer over the listed price.
pub fn effective_max_price_cents(product: &Product) -> u64 {
	match product.max_price {
		Some(explicit) => dollars_to_cents(explicit),
		None => max_price_cents(product.price),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mid_tier_price_is_buffered() {
		// $12 falls in the 1.9x tier: 12 * 1.9 = $22.80.
		assert_eq!(max_price_cents(12.0), 2280);
	}

	#[test]
	fn cheap_tier_gets_flat_headroom() {
		// $8: 8 * 2.0 + 7 = $23.00.
		assert_eq!(max_price_cents(8.0), 2300);
	}

	#[test]
	fn expensive_tier_is_proportional() {
		// $18: 18 * 1.8 = $32.40.
		assert_eq!(max_price_cents(18.0), 3240);
	}

	#[test]
	fn fractional_cents_round_up() {
		// $10.33 * 1.9 = $19.627 -> 1963 cents.
		assert_eq!(max_price_cents(10.33), 1963);
	}

	#[test]
	fn explicit_override_wins() {
		let product = Product {
			id: "p1".into(),
			name: "Mug".into(),
			price: 12.0,
			retailer: "amazon".into(),
			product_id: "B000MUG".into(),
			max_price: Some(25.0),
		};
		assert_eq!(effective_max_price_cents(&product), 2500);
	}
}
