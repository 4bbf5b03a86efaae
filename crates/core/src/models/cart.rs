//! Cart line items and the pure cart operations.
//!
//! Nothing here touches storage: the storefront loads a [`Cart`] from the
//! visitor's session, applies one of these operations, and writes it back.

use serde::{Deserialize, Serialize};

use super::product::{Product, Variant};
use crate::types::{Price, ProductId, VariantId};

/// One line in a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Snapshot of the product at the time it was added.
    pub product: Product,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<Variant>,
}

/// Identity of a cart line for merge and increment purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartKey {
    pub product_id: ProductId,
    pub special_instructions: Option<String>,
    pub variant_id: Option<VariantId>,
}

impl CartItem {
    /// The `(product, instructions, variant)` key of this line.
    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey {
            product_id: self.product.id.clone(),
            special_instructions: self.special_instructions.clone(),
            variant_id: self.selected_variant.as_ref().map(|v| v.id.clone()),
        }
    }

    /// Variant price when a variant is selected, product price otherwise.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.selected_variant
            .as_ref()
            .map_or(self.product.price, |v| v.price)
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price().times(self.quantity)
    }
}

/// Normalize free-text instructions so that blank input and no input share a key.
#[must_use]
pub fn normalize_instructions(instructions: Option<&str>) -> Option<String> {
    instructions
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// An ordered list of cart lines.
///
/// Insertion order is preserved; lines sharing a [`CartKey`] are folded
/// together by [`Cart::add`] and [`Cart::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from already-keyed lines (e.g. a stored document).
    #[must_use]
    pub const fn from_items(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Add `quantity` of a product. Increments an existing line with the same
    /// key, otherwise appends a new one. A zero quantity is ignored.
    pub fn add(
        &mut self,
        product: Product,
        quantity: u32,
        special_instructions: Option<&str>,
        variant: Option<Variant>,
    ) {
        if quantity == 0 {
            return;
        }

        let item = CartItem {
            product,
            quantity,
            special_instructions: normalize_instructions(special_instructions),
            selected_variant: variant,
        };
        self.push_or_increment(item);
    }

    /// Remove the line at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<CartItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Replace the quantity of the line at `index`.
    ///
    /// Only positive quantities are applied; zero or negative values leave the
    /// cart untouched (use [`Cart::remove`] to drop a line). Returns whether the
    /// cart changed.
    pub fn set_quantity(&mut self, index: usize, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return false;
        };
        if quantity == 0 {
            return false;
        }
        match self.items.get_mut(index) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of effective unit price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Merge a pre-sign-in local cart into a previously stored remote cart.
    ///
    /// The result starts from `remote`; each local line either adds its
    /// quantity to the remote line with the same key or is appended.
    #[must_use]
    pub fn merge(remote: Self, local: Self) -> Self {
        let mut merged = remote;
        for item in local.items {
            merged.push_or_increment(item);
        }
        merged
    }

    fn push_or_increment(&mut self, item: CartItem) {
        let key = item.key();
        match self.items.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => self.items.push(item),
        }
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::{lasagna, muffins};

    fn small(product: &Product) -> Option<Variant> {
        product.variant(&VariantId::new("small")).cloned()
    }

    fn line(product: Product, quantity: u32) -> CartItem {
        CartItem {
            product,
            quantity,
            special_instructions: None,
            selected_variant: None,
        }
    }

    #[test]
    fn test_same_key_increments_single_line() {
        let mut cart = Cart::new();
        cart.add(muffins(), 2, None, None);
        cart.add(muffins(), 3, None, None);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_different_instructions_or_variant_make_new_lines() {
        let lasagna = lasagna();
        let mut cart = Cart::new();
        cart.add(lasagna.clone(), 1, None, small(&lasagna));
        cart.add(lasagna.clone(), 1, Some("no basil"), small(&lasagna));
        cart.add(
            lasagna.clone(),
            1,
            None,
            lasagna.variant(&VariantId::new("large")).cloned(),
        );
        // Blank instructions share the key of no instructions.
        cart.add(lasagna.clone(), 1, Some("   "), small(&lasagna));

        assert_eq!(cart.len(), 3);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_count_and_total_use_variant_price() {
        let lasagna = lasagna();
        let mut cart = Cart::new();
        cart.add(lasagna.clone(), 2, None, small(&lasagna));
        cart.add(muffins(), 3, None, None);

        assert_eq!(cart.count(), 5);
        assert_eq!(cart.total(), Price::from_pesos(2 * 180 + 3 * 130));
    }

    #[test]
    fn test_set_quantity_ignores_non_positive_and_bad_index() {
        let mut cart = Cart::new();
        cart.add(muffins(), 2, None, None);
        let before = cart.clone();

        assert!(!cart.set_quantity(0, 0));
        assert!(!cart.set_quantity(0, -1));
        assert!(!cart.set_quantity(7, 4));
        assert_eq!(cart, before);

        assert!(cart.set_quantity(0, 4));
        assert_eq!(cart.count(), 4);
    }

    #[test]
    fn test_remove_guards_bounds() {
        let mut cart = Cart::new();
        cart.add(muffins(), 1, None, None);
        assert!(cart.remove(3).is_none());
        assert_eq!(cart.len(), 1);
        assert!(cart.remove(0).is_some());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_zero_is_ignored() {
        let mut cart = Cart::new();
        cart.add(muffins(), 0, None, None);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_sums_matching_and_appends_rest() {
        let a = muffins();
        let mut b = muffins();
        b.id = ProductId::new("4");
        b.name = "Carrot Muffins".to_owned();

        let local = Cart::from_items(vec![line(a.clone(), 1)]);
        let remote = Cart::from_items(vec![line(a, 2), line(b, 1)]);

        let merged = Cart::merge(remote, local);
        let quantities: Vec<_> = merged
            .items()
            .iter()
            .map(|i| (i.product.id.as_str().to_owned(), i.quantity))
            .collect();
        assert_eq!(quantities, vec![("3".to_owned(), 3), ("4".to_owned(), 1)]);
    }

    #[test]
    fn test_merge_appends_local_only_lines_after_remote() {
        let mut other = muffins();
        other.id = ProductId::new("9");

        let local = Cart::from_items(vec![line(other, 2)]);
        let remote = Cart::from_items(vec![line(muffins(), 1)]);
        let merged = Cart::merge(remote, local);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.items()[1].product.id.as_str(), "9");
    }

    #[test]
    fn test_invariants_hold_over_operation_sequence() {
        let lasagna = lasagna();
        let mut cart = Cart::new();
        cart.add(muffins(), 2, None, None);
        cart.add(lasagna.clone(), 1, Some("extra cheese"), small(&lasagna));
        cart.set_quantity(1, 3);
        cart.add(muffins(), 1, None, None);
        cart.set_quantity(0, -2);
        cart.remove(5);

        let expected_count: u64 = cart.items().iter().map(|i| u64::from(i.quantity)).sum();
        let expected_total: Price = cart
            .items()
            .iter()
            .map(|i| i.unit_price().times(i.quantity))
            .sum();
        assert_eq!(cart.count(), expected_count);
        assert_eq!(cart.total(), expected_total);
        assert_eq!(cart.count(), 6);
    }

    #[test]
    fn test_cart_serializes_as_plain_list() {
        let mut cart = Cart::new();
        cart.add(muffins(), 1, Some("gift wrap"), None);
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["specialInstructions"], "gift wrap");

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
