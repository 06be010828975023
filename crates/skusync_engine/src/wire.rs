//! Conversion between store JSON payloads and catalog records.
//!
//! Store responses are parsed into fixed record shapes here and nowhere else.
//! Anything that does not match the expected shape is rejected with
//! [`ModelError::Parse`] instead of being passed on loosely typed.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use skusync_model::{
    normalize_images, CollectionRecord, ImageChange, ImageRecord, ModelError, ModelResult,
    OptionValue, Price, ProductChanges, ProductRecord, ProductStatus, RemoteId, VariantRecord,
    VariantUpdate,
};

/// Number of option slots a variant has on the wire.
const OPTION_SLOTS: usize = 3;

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: u64,
    title: String,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    product_type: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    variants: Vec<WireVariant>,
    #[serde(default)]
    images: Vec<WireImage>,
    #[serde(default)]
    options: Vec<WireOption>,
}

#[derive(Debug, Deserialize)]
struct WireVariant {
    id: u64,
    #[serde(default)]
    sku: Option<String>,
    price: String,
    #[serde(default)]
    inventory_quantity: Option<i64>,
    #[serde(default)]
    option1: Option<String>,
    #[serde(default)]
    option2: Option<String>,
    #[serde(default)]
    option3: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    id: u64,
    src: String,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireOption {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireCollection {
    id: u64,
    title: String,
    #[serde(default)]
    body_html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCollect {
    #[serde(default)]
    id: Option<u64>,
    product_id: u64,
    collection_id: u64,
}

/// A product-to-collection link as stored by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collect {
    /// Link id, if the store assigns one.
    pub id: Option<RemoteId>,
    /// Member product.
    pub product_id: RemoteId,
    /// Collection.
    pub collection_id: RemoteId,
}

fn field<'a>(body: &'a Value, key: &str, entity: &'static str) -> ModelResult<&'a Value> {
    body.get(key)
        .ok_or_else(|| ModelError::parse(entity, format!("response has no `{key}` field")))
}

fn decode<T: DeserializeOwned>(value: &Value, entity: &'static str) -> ModelResult<T> {
    T::deserialize(value).map_err(|e| ModelError::parse(entity, e.to_string()))
}

fn decode_list<T: DeserializeOwned>(
    body: &Value,
    key: &str,
    entity: &'static str,
) -> ModelResult<Vec<T>> {
    let items = field(body, key, entity)?
        .as_array()
        .ok_or_else(|| ModelError::parse(entity, format!("`{key}` is not an array")))?;
    items.iter().map(|item| decode(item, entity)).collect()
}

impl WireProduct {
    fn into_record(self) -> ModelResult<ProductRecord> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse::<ProductStatus>()?,
            None => ProductStatus::Active,
        };

        let option_names: Vec<String> = (0..OPTION_SLOTS)
            .map(|i| {
                self.options
                    .get(i)
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| format!("Option{}", i + 1))
            })
            .collect();

        let variants = self
            .variants
            .into_iter()
            .map(|v| v.into_record(&option_names))
            .collect::<ModelResult<Vec<_>>>()?;

        let images = self
            .images
            .into_iter()
            .enumerate()
            .map(|(i, img)| ImageRecord {
                id: Some(RemoteId::new(img.id)),
                src: img.src,
                alt: img.alt.unwrap_or_default(),
                position: img.position.unwrap_or(i as u32 + 1),
            })
            .collect();

        // Stores carry no product-level SKU; the first variant's stands in.
        let sku = variants.first().map(|v| v.sku.clone()).unwrap_or_default();

        Ok(ProductRecord {
            id: Some(RemoteId::new(self.id)),
            sku,
            title: self.title,
            description: self.body_html.unwrap_or_default(),
            status,
            vendor: self.vendor.unwrap_or_default(),
            product_type: self.product_type.unwrap_or_default(),
            handle: self.handle.unwrap_or_default(),
            variants,
            images: normalize_images(images),
            collections: Vec::new(),
        })
    }
}

impl WireVariant {
    fn into_record(self, option_names: &[String]) -> ModelResult<VariantRecord> {
        let options = [self.option1, self.option2, self.option3]
            .into_iter()
            .zip(option_names)
            .zip(1u8..)
            .filter_map(|((value, name), slot)| {
                value.map(|v| OptionValue::new(slot, name.clone(), v))
            })
            .collect();

        Ok(VariantRecord {
            id: Some(RemoteId::new(self.id)),
            sku: self.sku.unwrap_or_default(),
            price: Price::parse(&self.price)?,
            inventory_quantity: self.inventory_quantity.unwrap_or(0),
            options,
        })
    }
}

/// Parses a `{"products": [...]}` listing.
pub fn parse_products(body: &Value) -> ModelResult<Vec<ProductRecord>> {
    decode_list::<WireProduct>(body, "products", "product")?
        .into_iter()
        .map(WireProduct::into_record)
        .collect()
}

/// Parses a `{"product": {...}}` response.
pub fn parse_product(body: &Value) -> ModelResult<ProductRecord> {
    decode::<WireProduct>(field(body, "product", "product")?, "product")?.into_record()
}

/// Parses a `{"custom_collections": [...]}` listing. Members are left empty.
pub fn parse_collections(body: &Value) -> ModelResult<Vec<CollectionRecord>> {
    Ok(
        decode_list::<WireCollection>(body, "custom_collections", "collection")?
            .into_iter()
            .map(collection_record)
            .collect(),
    )
}

/// Parses a `{"custom_collection": {...}}` response.
pub fn parse_collection(body: &Value) -> ModelResult<CollectionRecord> {
    let wire = decode::<WireCollection>(
        field(body, "custom_collection", "collection")?,
        "collection",
    )?;
    Ok(collection_record(wire))
}

fn collection_record(wire: WireCollection) -> CollectionRecord {
    CollectionRecord {
        id: Some(RemoteId::new(wire.id)),
        title: wire.title,
        description: wire.body_html.unwrap_or_default(),
        members: Default::default(),
    }
}

/// Parses a `{"collects": [...]}` listing.
pub fn parse_collects(body: &Value) -> ModelResult<Vec<Collect>> {
    Ok(decode_list::<WireCollect>(body, "collects", "collect")?
        .into_iter()
        .map(collect_record)
        .collect())
}

/// Parses a `{"collect": {...}}` response.
pub fn parse_collect(body: &Value) -> ModelResult<Collect> {
    decode::<WireCollect>(field(body, "collect", "collect")?, "collect").map(collect_record)
}

fn collect_record(wire: WireCollect) -> Collect {
    Collect {
        id: wire.id.map(RemoteId::new),
        product_id: RemoteId::new(wire.product_id),
        collection_id: RemoteId::new(wire.collection_id),
    }
}

/// Writes option values into their `optionN` slots.
///
/// With `clear_empty`, slots the options leave empty are sent as `null` so an
/// update clears them.
fn option_slots(options: &[OptionValue], clear_empty: bool, into: &mut Map<String, Value>) {
    for slot in 1..=OPTION_SLOTS as u8 {
        let value = options.iter().find(|o| o.slot == slot).map(|o| json!(o.value));
        match value {
            Some(value) => {
                into.insert(format!("option{slot}"), value);
            }
            None if clear_empty => {
                into.insert(format!("option{slot}"), Value::Null);
            }
            None => {}
        }
    }
}

fn new_variant_body(variant: &VariantRecord) -> Value {
    let mut body = Map::new();
    body.insert("sku".into(), json!(variant.sku));
    body.insert("price".into(), json!(variant.price.to_string()));
    body.insert(
        "inventory_quantity".into(),
        json!(variant.inventory_quantity),
    );
    option_slots(&variant.options, false, &mut body);
    Value::Object(body)
}

fn variant_update_body(update: &VariantUpdate) -> Value {
    let mut body = Map::new();
    body.insert("id".into(), json!(update.variant_id.get()));
    if let Some(price) = &update.price {
        body.insert("price".into(), json!(price.to_string()));
    }
    if let Some(quantity) = update.inventory_quantity {
        body.insert("inventory_quantity".into(), json!(quantity));
    }
    if let Some(options) = &update.options {
        option_slots(options, true, &mut body);
    }
    Value::Object(body)
}

fn new_image_body(image: &ImageRecord) -> Value {
    json!({ "src": image.src, "alt": image.alt, "position": image.position })
}

/// Builds the body of a product create request.
///
/// Store-assigned ids of the source record are never sent.
pub fn product_create_body(product: &ProductRecord) -> Value {
    let options: Vec<Value> = product
        .option_names()
        .into_iter()
        .map(|name| json!({ "name": name }))
        .collect();

    let mut body = Map::new();
    body.insert("title".into(), json!(product.title));
    body.insert("body_html".into(), json!(product.description));
    body.insert("vendor".into(), json!(product.vendor));
    body.insert("product_type".into(), json!(product.product_type));
    if !product.handle.is_empty() {
        body.insert("handle".into(), json!(product.handle));
    }
    body.insert("status".into(), json!(product.status.as_str()));
    body.insert(
        "variants".into(),
        Value::Array(product.variants.iter().map(new_variant_body).collect()),
    );
    body.insert(
        "images".into(),
        Value::Array(product.images.iter().map(new_image_body).collect()),
    );
    if !options.is_empty() {
        body.insert("options".into(), Value::Array(options));
    }

    json!({ "product": body })
}

/// Builds the body of a product update request.
///
/// When variants change, every destination variant is listed in its existing
/// order (untouched ones by id only) so the store keeps the variants the
/// source does not know of. New variants go last.
pub fn product_update_body(product_id: RemoteId, changes: &ProductChanges) -> Value {
    let mut body = Map::new();
    body.insert("id".into(), json!(product_id.get()));
    if let Some(title) = &changes.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(description) = &changes.description {
        body.insert("body_html".into(), json!(description));
    }
    if let Some(status) = changes.status {
        body.insert("status".into(), json!(status.as_str()));
    }

    if changes.touches_variants() {
        let variants = changes
            .existing_variants
            .iter()
            .map(|id| {
                match changes.variant_updates.iter().find(|u| u.variant_id == *id) {
                    Some(update) => variant_update_body(update),
                    None => json!({ "id": id.get() }),
                }
            })
            .chain(changes.variant_creates.iter().map(new_variant_body))
            .collect();
        body.insert("variants".into(), Value::Array(variants));
    }

    match &changes.images {
        Some(ImageChange::Relabel(labels)) => {
            let images = labels
                .iter()
                .map(|l| json!({ "id": l.image_id.get(), "alt": l.alt }))
                .collect();
            body.insert("images".into(), Value::Array(images));
        }
        Some(ImageChange::Replace(images)) => {
            body.insert(
                "images".into(),
                Value::Array(images.iter().map(new_image_body).collect()),
            );
        }
        None => {}
    }

    json!({ "product": body })
}

/// Builds the body of a collection create request.
pub fn collection_create_body(title: &str, description: &str, published: bool) -> Value {
    json!({
        "custom_collection": {
            "title": title,
            "body_html": description,
            "published": published,
        }
    })
}

/// Builds the body of a collect create request.
pub fn collect_body(product_id: RemoteId, collection_id: RemoteId) -> Value {
    json!({
        "collect": {
            "product_id": product_id.get(),
            "collection_id": collection_id.get(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skusync_model::ImageLabel;

    fn sample_product() -> Value {
        json!({
            "id": 1,
            "title": "Test Product",
            "body_html": "<p>Test description</p>",
            "vendor": "Test Vendor",
            "product_type": "Test Type",
            "handle": "test-product",
            "status": "active",
            "variants": [
                { "id": 11, "product_id": 1, "sku": "TEST-SKU-1", "price": "10.00",
                  "inventory_quantity": 10, "option1": "Small" },
                { "id": 12, "product_id": 1, "sku": "TEST-SKU-2", "price": "15.00",
                  "inventory_quantity": 5, "option1": "Medium" }
            ],
            "images": [
                { "id": 22, "src": "https://test.com/image2.jpg", "alt": "Test Image 2", "position": 2 },
                { "id": 21, "src": "https://test.com/image1.jpg", "alt": "Test Image 1", "position": 1 }
            ],
            "options": [ { "name": "Size", "values": ["Small", "Medium", "Large"] } ]
        })
    }

    #[test]
    fn parses_product_listing() {
        let products = parse_products(&json!({ "products": [sample_product()] })).unwrap();
        assert_eq!(products.len(), 1);

        let product = &products[0];
        assert_eq!(product.id, Some(RemoteId::new(1)));
        assert_eq!(product.sku, "TEST-SKU-1");
        assert_eq!(product.title, "Test Product");
        assert_eq!(product.variants.len(), 2);
        assert_eq!(
            product.variants[0].options,
            vec![OptionValue::new(1, "Size", "Small")]
        );
        assert_eq!(product.images[0].alt, "Test Image 1");
        assert_eq!(product.images[1].position, 2);
    }

    #[test]
    fn product_without_variants_has_blank_sku() {
        let body = json!({ "product": { "id": 5, "title": "Bare" } });
        let product = parse_product(&body).unwrap();
        assert_eq!(product.sku_key(), None);
        assert_eq!(product.status, ProductStatus::Active);
    }

    #[test]
    fn malformed_payloads_fail_closed() {
        assert!(parse_products(&json!({ "items": [] })).is_err());
        assert!(parse_products(&json!({ "products": {} })).is_err());

        let mut bad_price = sample_product();
        bad_price["variants"][0]["price"] = json!("ten");
        assert!(matches!(
            parse_products(&json!({ "products": [bad_price] })),
            Err(ModelError::InvalidPrice(_))
        ));

        let mut bad_status = sample_product();
        bad_status["status"] = json!("hidden");
        assert!(parse_products(&json!({ "products": [bad_status] })).is_err());

        let mut bad_id = sample_product();
        bad_id["id"] = json!("one");
        assert!(matches!(
            parse_products(&json!({ "products": [bad_id] })),
            Err(ModelError::Parse { entity: "product", .. })
        ));
    }

    #[test]
    fn create_body_drops_store_ids() {
        let product = parse_product(&json!({ "product": sample_product() })).unwrap();
        let body = product_create_body(&product);
        let sent = &body["product"];

        assert!(sent.get("id").is_none());
        assert_eq!(sent["variants"][0]["sku"], "TEST-SKU-1");
        assert!(sent["variants"][0].get("id").is_none());
        assert_eq!(sent["variants"][1]["option1"], "Medium");
        assert!(sent["images"][0].get("id").is_none());
        assert_eq!(sent["images"][0]["src"], "https://test.com/image1.jpg");
        assert_eq!(sent["options"][0]["name"], "Size");
    }

    #[test]
    fn option_values_keep_their_slots() {
        let body = json!({ "product": {
            "id": 3,
            "title": "Cap",
            "variants": [
                { "id": 31, "sku": "CAP-R", "price": "5", "option1": null, "option2": "Red" }
            ],
            "options": [ { "name": "Size" }, { "name": "Color" } ]
        }});
        let product = parse_product(&body).unwrap();
        assert_eq!(
            product.variants[0].options,
            vec![OptionValue::new(2, "Color", "Red")]
        );

        let created = product_create_body(&product);
        let variant = &created["product"]["variants"][0];
        assert!(variant.get("option1").is_none());
        assert_eq!(variant["option2"], "Red");
        assert_eq!(created["product"]["options"][0]["name"], "Option1");
        assert_eq!(created["product"]["options"][1]["name"], "Color");

        let update = variant_update_body(&VariantUpdate {
            variant_id: RemoteId::new(31),
            sku: "CAP-R".into(),
            price: None,
            inventory_quantity: None,
            options: Some(product.variants[0].options.clone()),
        });
        assert_eq!(
            update,
            json!({ "id": 31, "option1": null, "option2": "Red", "option3": null })
        );
    }

    #[test]
    fn update_body_lists_existing_variants() {
        let changes = ProductChanges {
            variant_updates: vec![VariantUpdate {
                variant_id: RemoteId::new(12),
                sku: "TEST-SKU-2".into(),
                price: Some(Price::parse("16").unwrap()),
                inventory_quantity: None,
                options: None,
            }],
            existing_variants: vec![RemoteId::new(11), RemoteId::new(12)],
            images: Some(ImageChange::Relabel(vec![ImageLabel {
                image_id: RemoteId::new(21),
                alt: "Front".into(),
            }])),
            ..Default::default()
        };

        let body = product_update_body(RemoteId::new(1), &changes);
        let sent = &body["product"];
        assert_eq!(sent["id"], 1);
        assert!(sent.get("title").is_none());
        assert_eq!(sent["variants"][0], json!({ "id": 11 }));
        assert_eq!(sent["variants"][1], json!({ "id": 12, "price": "16.00" }));
        assert_eq!(sent["images"][0], json!({ "id": 21, "alt": "Front" }));
    }

    #[test]
    fn update_body_omits_variants_when_untouched() {
        let changes = ProductChanges {
            title: Some("Renamed".into()),
            existing_variants: vec![RemoteId::new(11)],
            ..Default::default()
        };
        let body = product_update_body(RemoteId::new(1), &changes);
        assert_eq!(body["product"]["title"], "Renamed");
        assert!(body["product"].get("variants").is_none());
    }

    #[test]
    fn parses_collects() {
        let body = json!({ "collects": [ { "id": 3, "product_id": 1, "collection_id": 9 } ] });
        let collects = parse_collects(&body).unwrap();
        assert_eq!(collects[0].product_id, RemoteId::new(1));
        assert_eq!(collects[0].collection_id, RemoteId::new(9));
    }
}
