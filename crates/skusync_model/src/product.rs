//! Product, variant and image records.

use crate::error::{ModelError, ModelResult};
use crate::id::RemoteId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns the SKU as a matching key, or `None` when it is empty or blank.
///
/// Keys are compared exactly; surrounding whitespace is not trimmed away
/// because two stores disagreeing on it are not considered the same item.
pub fn sku_key(sku: &str) -> Option<&str> {
    if sku.trim().is_empty() {
        None
    } else {
        Some(sku)
    }
}

/// Publication status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Visible on the storefront.
    Active,
    /// Work in progress, not visible.
    Draft,
    /// Hidden from the storefront and admin lists.
    Archived,
}

impl ProductStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Draft => "draft",
            ProductStatus::Archived => "archived",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "draft" => Ok(ProductStatus::Draft),
            "archived" => Ok(ProductStatus::Archived),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-negative decimal price.
///
/// Stores render the same amount differently (`"10"`, `"10.0"`, `"10.00"`).
/// The amount is normalized on construction and shown with at least two
/// fractional digits, so equality is numeric equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Price(Decimal);

impl Price {
    /// Fractional digits always shown.
    const MIN_SCALE: u32 = 2;

    /// Parses a plain decimal price such as `"9.99"` or `".5"`.
    ///
    /// Signs, exponents and digit separators are rejected.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let trimmed = raw.trim();
        let plain = trimmed.bytes().any(|b| b.is_ascii_digit())
            && trimmed.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            && trimmed.bytes().filter(|b| *b == b'.').count() <= 1;
        if !plain {
            return Err(ModelError::InvalidPrice(raw.to_string()));
        }

        let text = match (trimmed.starts_with('.'), trimmed.ends_with('.')) {
            (true, _) => format!("0{trimmed}"),
            (_, true) => format!("{trimmed}0"),
            _ => trimmed.to_string(),
        };
        let amount =
            Decimal::from_str(&text).map_err(|_| ModelError::InvalidPrice(raw.to_string()))?;
        Ok(Self::from_decimal(amount))
    }

    fn from_decimal(amount: Decimal) -> Self {
        let mut amount = amount.normalize();
        if amount.scale() < Self::MIN_SCALE {
            amount.rescale(Self::MIN_SCALE);
        }
        Self(amount)
    }

    /// Returns the amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<String> for Price {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        Self::parse(&value)
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One option selection of a variant, e.g. `Size = Large`.
///
/// Stores hold option values in numbered slots; `slot` is that number
/// (1-based). Names are declared on the product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionValue {
    /// Option slot, starting at 1.
    pub slot: u8,
    /// Option name as declared on the product.
    pub name: String,
    /// Selected value.
    pub value: String,
}

impl OptionValue {
    /// Creates an option value in a slot.
    pub fn new(slot: u8, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            slot,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Store-assigned id, `None` until created.
    pub id: Option<RemoteId>,
    /// Variant SKU, unique within the parent product.
    pub sku: String,
    /// Unit price.
    pub price: Price,
    /// Available quantity.
    pub inventory_quantity: i64,
    /// Ordered option selections.
    pub options: Vec<OptionValue>,
}

impl VariantRecord {
    /// Creates a variant with no options and no store id.
    pub fn new(sku: impl Into<String>, price: Price, inventory_quantity: i64) -> Self {
        Self {
            id: None,
            sku: sku.into(),
            price,
            inventory_quantity,
            options: Vec::new(),
        }
    }

    /// Adds an option selection in the next free slot.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let slot = self.options.iter().map(|o| o.slot).max().unwrap_or(0) + 1;
        self.options.push(OptionValue::new(slot, name, value));
        self
    }

    /// Option values keyed by slot, ignoring names.
    ///
    /// Variant writes carry only slot values, so this is what two variants
    /// are compared on.
    pub fn option_values(&self) -> Vec<(u8, &str)> {
        let mut values: Vec<(u8, &str)> =
            self.options.iter().map(|o| (o.slot, o.value.as_str())).collect();
        values.sort_unstable();
        values
    }
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Store-assigned id, `None` until created.
    pub id: Option<RemoteId>,
    /// Source URL the destination store downloads the image from.
    pub src: String,
    /// Alt text.
    pub alt: String,
    /// Display position (1-based on the wire, only the order matters here).
    pub position: u32,
}

impl ImageRecord {
    /// Creates an image with no store id.
    pub fn new(src: impl Into<String>, alt: impl Into<String>, position: u32) -> Self {
        Self {
            id: None,
            src: src.into(),
            alt: alt.into(),
            position,
        }
    }
}

/// A product with its variants and images, as seen in one catalog snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Store-assigned id, `None` until created.
    pub id: Option<RemoteId>,
    /// Cross-store identity key.
    pub sku: String,
    /// Product title.
    pub title: String,
    /// HTML description.
    pub description: String,
    /// Publication status.
    pub status: ProductStatus,
    /// Vendor name, carried on create.
    pub vendor: String,
    /// Product type, carried on create.
    pub product_type: String,
    /// URL handle, carried on create.
    pub handle: String,
    /// Variants owned by this product.
    pub variants: Vec<VariantRecord>,
    /// Images ordered by position, one image per position.
    pub images: Vec<ImageRecord>,
    /// Names of the collections this product belongs to.
    pub collections: Vec<String>,
}

impl ProductRecord {
    /// Creates an active product with no variants or images.
    pub fn new(sku: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            sku: sku.into(),
            title: title.into(),
            description: String::new(),
            status: ProductStatus::Active,
            vendor: String::new(),
            product_type: String::new(),
            handle: String::new(),
            variants: Vec::new(),
            images: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Sets the store id.
    pub fn with_id(mut self, id: impl Into<RemoteId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ProductStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a variant.
    pub fn with_variant(mut self, variant: VariantRecord) -> Self {
        self.variants.push(variant);
        self
    }

    /// Replaces the image set, normalizing positions.
    pub fn with_images(mut self, images: Vec<ImageRecord>) -> Self {
        self.images = normalize_images(images);
        self
    }

    /// Returns the matching key for this product, if it has a usable SKU.
    pub fn sku_key(&self) -> Option<&str> {
        sku_key(&self.sku)
    }

    /// Option names by slot, taken from the first variant.
    ///
    /// A slot the first variant leaves empty gets a placeholder name, so the
    /// list position of every name matches its slot.
    pub fn option_names(&self) -> Vec<String> {
        let Some(first) = self.variants.first() else {
            return Vec::new();
        };
        let last = first.options.iter().map(|o| o.slot).max().unwrap_or(0);
        (1..=last)
            .map(|slot| {
                first
                    .options
                    .iter()
                    .find(|o| o.slot == slot)
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| format!("Option{slot}"))
            })
            .collect()
    }
}

/// Orders images by position and drops later images that reuse a position.
pub fn normalize_images(mut images: Vec<ImageRecord>) -> Vec<ImageRecord> {
    // Stable sort keeps first-seen order among equal positions.
    images.sort_by_key(|i| i.position);
    images.dedup_by_key(|i| i.position);
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_skus_have_no_key() {
        assert_eq!(sku_key(""), None);
        assert_eq!(sku_key("   \t"), None);
        assert_eq!(sku_key("A1"), Some("A1"));
    }

    #[test]
    fn price_canonical_form() {
        assert_eq!(Price::parse("10").unwrap().to_string(), "10.00");
        assert_eq!(Price::parse("10.5").unwrap().to_string(), "10.50");
        assert_eq!(Price::parse("010.000").unwrap().to_string(), "10.00");
        assert_eq!(Price::parse(".99").unwrap().to_string(), "0.99");
        assert_eq!(Price::parse("7.").unwrap().to_string(), "7.00");
        assert_eq!(Price::parse("3.125").unwrap().to_string(), "3.125");
        assert_eq!(Price::parse("10.0").unwrap(), Price::parse("10.00").unwrap());
        assert!(Price::parse("9.99").unwrap() < Price::parse("10").unwrap());
    }

    #[test]
    fn price_rejects_garbage() {
        assert!(Price::parse("").is_err());
        assert!(Price::parse(".").is_err());
        assert!(Price::parse("-1.00").is_err());
        assert!(Price::parse("1,00").is_err());
        assert!(Price::parse("abc").is_err());
        assert!(Price::parse("1e3").is_err());
        assert!(Price::parse("1.2.3").is_err());
    }

    #[test]
    fn price_deserializes_from_string() {
        let price: Price = serde_json::from_str("\"4.5\"").unwrap();
        assert_eq!(price.to_string(), "4.50");
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"4.50\"");
        assert!(serde_json::from_str::<Price>("\"four\"").is_err());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            ProductStatus::Active,
            ProductStatus::Draft,
            ProductStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ProductStatus>().unwrap(), status);
        }
        assert!("hidden".parse::<ProductStatus>().is_err());
    }

    #[test]
    fn duplicate_image_positions_keep_first_seen() {
        let product = ProductRecord::new("A1", "Widget").with_images(vec![
            ImageRecord::new("https://img/b.jpg", "second", 2),
            ImageRecord::new("https://img/a.jpg", "first", 1),
            ImageRecord::new("https://img/c.jpg", "dup", 2),
        ]);

        let alts: Vec<_> = product.images.iter().map(|i| i.alt.as_str()).collect();
        assert_eq!(alts, vec!["first", "second"]);
    }

    #[test]
    fn option_names_follow_first_variant() {
        let price = Price::parse("1").unwrap();
        let product = ProductRecord::new("A1", "Shirt").with_variant(
            VariantRecord::new("A1-S", price, 3)
                .with_option("Size", "S")
                .with_option("Color", "Red"),
        );
        assert_eq!(product.option_names(), vec!["Size", "Color"]);
        assert_eq!(product.variants[0].option_values(), vec![(1, "S"), (2, "Red")]);
        assert!(ProductRecord::new("B", "Empty").option_names().is_empty());
    }

    #[test]
    fn option_names_keep_slot_positions() {
        let mut variant = VariantRecord::new("A1", Price::parse("1").unwrap(), 1);
        variant.options.push(OptionValue::new(2, "Color", "Red"));
        let product = ProductRecord::new("A1", "Shirt").with_variant(variant);
        assert_eq!(product.option_names(), vec!["Option1", "Color"]);
    }
}
