//! Cart, cart line and summary types.
//!
//! # Line identity
//!
//! A cart line is one `(product, size, color)` selection, see [`LineKey`].
//! Adding the same key twice sums the quantities into a single line.
//!
//! Lines held in the device-local cart ([`LocalCart`]) get a sequence number
//! when they are created. The counter lives in the record and is never
//! reused, so a line keeps its `local_<n>` id when earlier lines are removed.
//!
//! # Totals
//!
//! [`Cart`] totals are derived from the product snapshot taken at read time.
//! [`CartSummary`] adds tax and shipping according to a [`PricingPolicy`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId, UserId};
use super::price::Money;
use super::product::Product;

/// Cart ID used for the anonymous, device-local cart.
pub const SESSION_CART_ID: &str = "session";

// =============================================================================
// Requests
// =============================================================================

/// Merge key of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
}

/// Request to add a product to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

impl AddToCartRequest {
    /// Create a request without a size or color selection.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            selected_size: None,
            selected_color: None,
        }
    }

    /// Set the selected size.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.selected_size = Some(size.into());
        self
    }

    /// Set the selected color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.selected_color = Some(color.into());
        self
    }

    /// The line this request merges into.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            selected_size: self.selected_size.clone(),
            selected_color: self.selected_color.clone(),
        }
    }
}

/// Request to change an existing cart line.
///
/// A quantity of zero removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub cart_item_id: CartItemId,
    pub quantity: u32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

// =============================================================================
// Local (session) cart record
// =============================================================================

/// One line of the device-local cart record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalCartItem {
    pub line_id: u64,
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl LocalCartItem {
    fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id
            && self.selected_size == key.selected_size
            && self.selected_color == key.selected_color
    }

    /// The request that recreates this line in another cart.
    #[must_use]
    pub fn to_add_request(&self) -> AddToCartRequest {
        AddToCartRequest {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            selected_size: self.selected_size.clone(),
            selected_color: self.selected_color.clone(),
        }
    }
}

/// The anonymous cart as persisted on the device.
///
/// Records written before line ids existed deserialize fine: missing ids are
/// assigned in list order on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLocalCart")]
pub struct LocalCart {
    pub items: Vec<LocalCartItem>,
    pub next_line_id: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawLocalCart {
    #[serde(default)]
    items: Vec<RawLocalCartItem>,
    #[serde(default)]
    next_line_id: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawLocalCartItem {
    #[serde(default)]
    line_id: Option<u64>,
    product_id: ProductId,
    quantity: u32,
    #[serde(default)]
    selected_size: Option<String>,
    #[serde(default)]
    selected_color: Option<String>,
    added_at: DateTime<Utc>,
}

impl From<RawLocalCart> for LocalCart {
    fn from(raw: RawLocalCart) -> Self {
        let mut next = raw
            .items
            .iter()
            .filter_map(|item| item.line_id)
            .map(|id| id + 1)
            .max()
            .unwrap_or(0)
            .max(raw.next_line_id);

        let items = raw
            .items
            .into_iter()
            .filter(|item| item.quantity > 0)
            .map(|item| {
                let line_id = item.line_id.unwrap_or_else(|| {
                    let id = next;
                    next += 1;
                    id
                });
                LocalCartItem {
                    line_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    selected_size: item.selected_size,
                    selected_color: item.selected_color,
                    added_at: item.added_at,
                }
            })
            .collect();

        Self {
            items,
            next_line_id: next,
            updated_at: raw.updated_at,
        }
    }
}

impl LocalCart {
    /// An empty record.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            next_line_id: 0,
            updated_at: now,
        }
    }

    /// Returns `true` if the record holds no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge a request into the record and return the affected line id.
    ///
    /// Quantities of an existing line with the same key are summed.
    pub fn add(&mut self, request: &AddToCartRequest, now: DateTime<Utc>) -> u64 {
        let key = request.key();
        let line_id = if let Some(item) = self.items.iter_mut().find(|item| item.matches(&key)) {
            item.quantity = item.quantity.saturating_add(request.quantity);
            item.line_id
        } else {
            let line_id = self.next_line_id;
            self.next_line_id += 1;
            self.items.push(LocalCartItem {
                line_id,
                product_id: request.product_id.clone(),
                quantity: request.quantity,
                selected_size: request.selected_size.clone(),
                selected_color: request.selected_color.clone(),
                added_at: now,
            });
            line_id
        };
        self.updated_at = now;
        line_id
    }

    /// Set the quantity (and optionally size/color) of a line.
    ///
    /// A quantity of zero removes the line. A `None` size or color keeps the
    /// stored value. If the new selection matches another line, that line
    /// absorbs the quantity and `line_id` is removed, so each key keeps a
    /// single line. Returns `false` if no line has `line_id`.
    pub fn update(
        &mut self,
        line_id: u64,
        quantity: u32,
        selected_size: Option<String>,
        selected_color: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if quantity == 0 {
            return self.remove(line_id, now);
        }

        let Some(pos) = self.items.iter().position(|item| item.line_id == line_id) else {
            return false;
        };
        let Some(item) = self.items.get(pos) else {
            return false;
        };
        let key = LineKey {
            product_id: item.product_id.clone(),
            selected_size: selected_size.or_else(|| item.selected_size.clone()),
            selected_color: selected_color.or_else(|| item.selected_color.clone()),
        };

        if let Some(other) = self
            .items
            .iter_mut()
            .find(|other| other.line_id != line_id && other.matches(&key))
        {
            other.quantity = other.quantity.saturating_add(quantity);
            self.items.remove(pos);
        } else if let Some(item) = self.items.get_mut(pos) {
            item.quantity = quantity;
            item.selected_size = key.selected_size;
            item.selected_color = key.selected_color;
        }
        self.updated_at = now;
        true
    }

    /// Remove a line. Returns `false` if no line has `line_id`.
    pub fn remove(&mut self, line_id: u64, now: DateTime<Utc>) -> bool {
        let Some(pos) = self.items.iter().position(|item| item.line_id == line_id) else {
            return false;
        };
        self.items.remove(pos);
        self.updated_at = now;
        true
    }
}

// =============================================================================
// Hydrated cart
// =============================================================================

/// Who owns a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    /// The anonymous device-local cart.
    Session,
    /// A signed-in user's server-side cart.
    User(UserId),
}

/// A cart line with its product snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    /// Product as read from the catalog when the cart was loaded.
    ///
    /// `None` if the catalog no longer has the product.
    pub product: Option<Product>,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Unit price from the snapshot; zero when the product is missing.
    #[must_use]
    pub fn unit_price(&self) -> Money {
        self.product.as_ref().map_or(Money::ZERO, |p| p.price)
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price() * self.quantity
    }
}

/// A hydrated cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// The user's id for server carts, [`SESSION_CART_ID`] otherwise.
    pub id: String,
    pub user_id: Option<UserId>,
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Build a cart and derive its totals from `items`.
    #[must_use]
    pub fn build(owner: CartOwner, items: Vec<CartItem>, now: DateTime<Utc>) -> Self {
        let (id, user_id) = match owner {
            CartOwner::Session => (SESSION_CART_ID.to_owned(), None),
            CartOwner::User(user_id) => (user_id.to_string(), Some(user_id)),
        };
        let total_items = items.iter().map(|item| u64::from(item.quantity)).sum();
        let total_amount = items.iter().map(CartItem::line_total).sum();

        Self {
            id,
            user_id,
            items,
            total_items,
            total_amount,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Display totals for a cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSummary {
    pub total_items: u64,
    /// Subtotal plus tax and shipping.
    pub total_amount: Money,
    pub subtotal: Money,
    pub tax: Option<Money>,
    pub shipping: Option<Money>,
}

/// Errors from building a [`PricingPolicy`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("tax rate must be between 0 and 1 (got {0})")]
    InvalidTaxRate(Decimal),
    #[error("{0} must not be negative")]
    Negative(&'static str),
}

/// Tax and shipping policy.
///
/// Defaults: 8% tax, $5.99 shipping, free shipping from $50.00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    tax_rate: Decimal,
    shipping_fee: Money,
    free_shipping_threshold: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            shipping_fee: Money::from_cents(599),
            free_shipping_threshold: Money::from_cents(5000),
        }
    }
}

impl PricingPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the tax rate is outside `0..=1` or if the fee or
    /// threshold is negative.
    pub fn new(
        tax_rate: Decimal,
        shipping_fee: Money,
        free_shipping_threshold: Money,
    ) -> Result<Self, PricingError> {
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(PricingError::InvalidTaxRate(tax_rate));
        }
        if shipping_fee < Money::ZERO {
            return Err(PricingError::Negative("shipping fee"));
        }
        if free_shipping_threshold < Money::ZERO {
            return Err(PricingError::Negative("free shipping threshold"));
        }
        Ok(Self {
            tax_rate,
            shipping_fee,
            free_shipping_threshold,
        })
    }

    #[must_use]
    pub const fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    #[must_use]
    pub const fn shipping_fee(&self) -> Money {
        self.shipping_fee
    }

    #[must_use]
    pub const fn free_shipping_threshold(&self) -> Money {
        self.free_shipping_threshold
    }

    /// Shipping charged for a given subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.shipping_fee
        }
    }

    /// How much more the customer must spend to get free shipping.
    ///
    /// `None` once the subtotal qualifies.
    #[must_use]
    pub fn free_shipping_remaining(&self, subtotal: Money) -> Option<Money> {
        (subtotal < self.free_shipping_threshold)
            .then(|| self.free_shipping_threshold - subtotal)
    }

    /// Customer-facing shipping hint.
    #[must_use]
    pub fn shipping_message(&self, subtotal: Money) -> String {
        match self.free_shipping_remaining(subtotal) {
            None => "You qualify for free shipping!".to_owned(),
            Some(remaining) => format!("Spend {remaining} more for free shipping"),
        }
    }

    /// Compute display totals.
    ///
    /// The shipping fee applies only to a cart with at least one line. An
    /// absent cart and an empty one (for example a signed-in cart right after
    /// `clear`) both summarize to all zeros with no tax or shipping line, so
    /// an empty cart never shows a $5.99 total.
    #[must_use]
    pub fn summarize(&self, cart: Option<&Cart>) -> CartSummary {
        let Some(cart) = cart.filter(|cart| !cart.is_empty()) else {
            return CartSummary::default();
        };

        let subtotal = cart.total_amount;
        let tax = subtotal * self.tax_rate;
        let shipping = self.shipping_for(subtotal);

        CartSummary {
            total_items: cart.total_items,
            total_amount: subtotal + tax + shipping,
            subtotal,
            tax: Some(tax),
            shipping: Some(shipping),
        }
    }
}

/// A cart and its summary, published together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart: Option<Cart>,
    pub summary: CartSummary,
}

impl CartSnapshot {
    /// Snapshot of an absent cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub const fn item_count(&self) -> u64 {
        self.summary.total_items
    }
}
