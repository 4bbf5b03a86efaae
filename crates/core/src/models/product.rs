//! Menu products and their purchasable variants.

use serde::{Deserialize, Serialize};

use crate::types::{Category, Price, ProductId, ProductStatus, VariantId};

/// A menu item.
///
/// Products are written only by the admin surface; customer surfaces read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    pub description: String,
    /// Base price, used when no variant is selected.
    pub price: Price,
    /// Image path relative to the static asset root.
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub is_best_seller: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

/// A purchasable sub-option of a product, e.g. a tray size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub label: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl Product {
    /// Status with the "absent means available" default applied.
    #[must_use]
    pub fn effective_status(&self) -> ProductStatus {
        ProductStatus::effective(self.status)
    }

    /// Look up a variant by id.
    #[must_use]
    pub fn variant(&self, id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Mutable variant lookup, for admin status changes.
    pub fn variant_mut(&mut self, id: &VariantId) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| &v.id == id)
    }

    /// Whether the product offers size options.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Check that a line for this product (and optional variant) can be ordered.
    ///
    /// # Errors
    ///
    /// Returns [`Unorderable`] describing why the line cannot be ordered.
    pub fn check_orderable(&self, variant: Option<&VariantId>) -> Result<(), Unorderable> {
        if !self.effective_status().is_orderable() {
            return Err(Unorderable::Product(self.effective_status()));
        }

        match variant {
            Some(id) => {
                let variant = self
                    .variant(id)
                    .ok_or_else(|| Unorderable::UnknownVariant(id.clone()))?;
                let status = variant.effective_status();
                if status.is_orderable() {
                    Ok(())
                } else {
                    Err(Unorderable::Variant(status))
                }
            }
            None if self.has_variants() => Err(Unorderable::VariantRequired),
            None => Ok(()),
        }
    }
}

impl Variant {
    /// Status with the "absent means available" default applied.
    #[must_use]
    pub fn effective_status(&self) -> ProductStatus {
        ProductStatus::effective(self.status)
    }
}

/// Reasons a product line cannot be added to a cart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unorderable {
    #[error("product is {0}")]
    Product(ProductStatus),
    #[error("selected size is {0}")]
    Variant(ProductStatus),
    #[error("unknown size: {0}")]
    UnknownVariant(VariantId),
    #[error("a size must be selected for this product")]
    VariantRequired,
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::{lasagna, muffins};
    use super::*;

    #[test]
    fn test_orderable_checks() {
        let lasagna = lasagna();
        assert!(lasagna.check_orderable(Some(&VariantId::new("small"))).is_ok());
        assert_eq!(
            lasagna.check_orderable(Some(&VariantId::new("large"))),
            Err(Unorderable::Variant(ProductStatus::SoldOut))
        );
        assert_eq!(
            lasagna.check_orderable(None),
            Err(Unorderable::VariantRequired)
        );
        assert!(matches!(
            lasagna.check_orderable(Some(&VariantId::new("jumbo"))),
            Err(Unorderable::UnknownVariant(_))
        ));

        let mut muffins = muffins();
        assert!(muffins.check_orderable(None).is_ok());
        muffins.status = Some(ProductStatus::Unavailable);
        assert_eq!(
            muffins.check_orderable(None),
            Err(Unorderable::Product(ProductStatus::Unavailable))
        );
    }

    #[test]
    fn test_deserialize_document_without_optional_fields() {
        let json = r#"{
            "id": "2",
            "name": "Cheesy Baked Mac",
            "category": "pasta",
            "description": "Rich and creamy",
            "price": 140,
            "image": "images/cheesy-baked-mac.jpg"
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.effective_status(), ProductStatus::Available);
        assert!(!product.is_best_seller);
        assert!(product.variants.is_empty());
    }
}
