//! Channel pricing and order totals.
//!
//! A [`Channel`] picks the unit price and minimum quantity for a product;
//! [`PricingPolicy`] turns a subtotal into tax, shipping, discount and total.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ProductSnapshot;
use crate::order::Money;

/// Commercial context an order is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "B2B")]
    B2b,
    #[default]
    #[serde(rename = "B2C")]
    B2c,
}

impl Channel {
    /// Unit price this channel pays for the product.
    pub fn unit_price(&self, snapshot: &ProductSnapshot) -> Money {
        match self {
            Channel::B2b => snapshot.b2b_price,
            Channel::B2c => snapshot.base_price,
        }
    }

    /// Smallest quantity this channel may order in one line.
    pub fn minimum_quantity(&self, snapshot: &ProductSnapshot) -> u32 {
        match self {
            Channel::B2b => snapshot.b2b_minimum_order.max(1),
            Channel::B2c => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::B2b => "B2B",
            Channel::B2c => "B2C",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price of one line as resolved for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Minimum order not met for {sku}: required {required}, requested {requested}")]
    MinimumOrderNotMet {
        sku: String,
        required: u32,
        requested: u32,
    },

    #[error("Invalid quantity for {sku}: must be greater than 0")]
    InvalidQuantity { sku: String },

    #[error("Line total for {sku} is out of range")]
    LineTotalOutOfRange { sku: String },

    #[error("Order total is out of range")]
    TotalOutOfRange,
}

/// Resolves the unit price and line total for `quantity` units of a product.
pub fn resolve_price(
    channel: Channel,
    snapshot: &ProductSnapshot,
    quantity: u32,
) -> Result<PriceQuote, PricingError> {
    if quantity == 0 {
        return Err(PricingError::InvalidQuantity {
            sku: snapshot.sku.clone(),
        });
    }

    let required = channel.minimum_quantity(snapshot);
    if quantity < required {
        return Err(PricingError::MinimumOrderNotMet {
            sku: snapshot.sku.clone(),
            required,
            requested: quantity,
        });
    }

    let unit_price = channel.unit_price(snapshot);
    let line_total = unit_price.checked_multiply(quantity).ok_or_else(|| {
        PricingError::LineTotalOutOfRange {
            sku: snapshot.sku.clone(),
        }
    })?;
    Ok(PriceQuote {
        unit_price,
        line_total,
    })
}

pub trait TaxPolicy: Send + Sync {
    fn tax(&self, subtotal: Money) -> Money;
}

pub trait ShippingPolicy: Send + Sync {
    fn shipping(&self, subtotal: Money) -> Money;
}

/// Source of order-level discounts (promotions live outside this service).
pub trait DiscountPolicy: Send + Sync {
    fn discount(&self, channel: Channel, subtotal: Money) -> Money;
}

/// Single flat tax rate in basis points.
#[derive(Debug, Clone, Copy)]
pub struct FlatRateTax {
    pub rate_bps: u32,
}

impl FlatRateTax {
    pub const DEFAULT_RATE_BPS: u32 = 1_000;

    pub fn new(rate_bps: u32) -> Self {
        Self { rate_bps }
    }
}

impl Default for FlatRateTax {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATE_BPS)
    }
}

impl TaxPolicy for FlatRateTax {
    fn tax(&self, subtotal: Money) -> Money {
        subtotal.apply_rate_bps(self.rate_bps)
    }
}

/// Free shipping when the subtotal strictly exceeds `threshold`, otherwise `flat_fee`.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdShipping {
    pub threshold: Money,
    pub flat_fee: Money,
}

impl ThresholdShipping {
    pub fn new(threshold: Money, flat_fee: Money) -> Self {
        Self {
            threshold,
            flat_fee,
        }
    }
}

impl Default for ThresholdShipping {
    fn default() -> Self {
        Self::new(Money::from_dollars(100), Money::from_dollars(5))
    }
}

impl ShippingPolicy for ThresholdShipping {
    fn shipping(&self, subtotal: Money) -> Money {
        if subtotal > self.threshold {
            Money::zero()
        } else {
            self.flat_fee
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscount;

impl DiscountPolicy for NoDiscount {
    fn discount(&self, _channel: Channel, _subtotal: Money) -> Money {
        Money::zero()
    }
}

/// Monetary summary of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Builds totals, clamping the discount to `[0, subtotal + tax + shipping]`.
    pub fn compute(subtotal: Money, tax: Money, shipping: Money, discount: Money) -> Self {
        let gross = subtotal + tax + shipping;
        let discount = discount.clamp(Money::zero(), gross.max(Money::zero()));
        Self {
            subtotal,
            tax,
            shipping,
            discount,
            total: gross - discount,
        }
    }

    /// `total == subtotal + tax + shipping - discount` with every field non-negative.
    pub fn is_consistent(&self) -> bool {
        let fields = [
            self.subtotal,
            self.tax,
            self.shipping,
            self.discount,
            self.total,
        ];
        let expected = self
            .subtotal
            .checked_add(self.tax)
            .and_then(|m| m.checked_add(self.shipping))
            .map(|gross| gross - self.discount);
        fields.iter().all(|m| !m.is_negative()) && expected == Some(self.total)
    }
}

/// The tax, shipping and discount rules applied to every order.
#[derive(Clone)]
pub struct PricingPolicy {
    tax: Arc<dyn TaxPolicy>,
    shipping: Arc<dyn ShippingPolicy>,
    discount: Arc<dyn DiscountPolicy>,
}

impl PricingPolicy {
    pub fn new(
        tax: Arc<dyn TaxPolicy>,
        shipping: Arc<dyn ShippingPolicy>,
        discount: Arc<dyn DiscountPolicy>,
    ) -> Self {
        Self {
            tax,
            shipping,
            discount,
        }
    }

    pub fn with_discount(mut self, discount: Arc<dyn DiscountPolicy>) -> Self {
        self.discount = discount;
        self
    }

    pub fn totals(&self, channel: Channel, subtotal: Money) -> OrderTotals {
        OrderTotals::compute(
            subtotal,
            self.tax.tax(subtotal),
            self.shipping.shipping(subtotal),
            self.discount.discount(channel, subtotal),
        )
    }

    /// Like [`PricingPolicy::totals`], but fails instead of saturating when
    /// `subtotal + tax + shipping` does not fit.
    pub fn checked_totals(
        &self,
        channel: Channel,
        subtotal: Money,
    ) -> Result<OrderTotals, PricingError> {
        let tax = self.tax.tax(subtotal);
        let shipping = self.shipping.shipping(subtotal);
        subtotal
            .checked_add(tax)
            .and_then(|m| m.checked_add(shipping))
            .ok_or(PricingError::TotalOutOfRange)?;

        Ok(OrderTotals::compute(
            subtotal,
            tax,
            shipping,
            self.discount.discount(channel, subtotal),
        ))
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new(
            Arc::new(FlatRateTax::default()),
            Arc::new(ThresholdShipping::default()),
            Arc::new(NoDiscount),
        )
    }
}

impl std::fmt::Debug for PricingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingPolicy").finish_non_exhaustive()
    }
}
