//! Catalog records
//!
//! Field names follow the catalog wire format. Everything beyond the
//! identifying fields is defaulted so partially populated records still
//! decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub image_url: String,
    pub title: String,
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductColor {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOption {
    pub name: String,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    /// Either a name → value map or a list of values.
    #[serde(default)]
    pub values: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub layer_options: Vec<LayerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementOption {
    pub name: String,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub placement: String,
    pub technique: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub placement_options: Vec<PlacementOption>,
    #[serde(default)]
    pub conflicting_placements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    /// Mixed booleans and strings.
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub main_category_id: u64,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub variant_count: u64,
    #[serde(default)]
    pub is_discontinued: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ProductColor>,
    #[serde(default)]
    pub techniques: Vec<Technique>,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub product_options: Vec<ProductOption>,
}

/// Printable area of a placement, in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementDimension {
    pub placement: String,
    pub height: f64,
    pub width: f64,
    #[serde(default)]
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: u64,
    pub catalog_product_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub color_code: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub placement_dimensions: Vec<PlacementDimension>,
}

// Prices are decimal strings on the wire ("12.95").

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTechnique {
    pub technique_key: String,
    #[serde(default)]
    pub technique_display_name: String,
    pub price: String,
    #[serde(default)]
    pub discounted_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingVariant {
    pub id: u64,
    #[serde(default)]
    pub techniques: Vec<PricingTechnique>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingLayer {
    #[serde(rename = "type")]
    pub kind: String,
    pub additional_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlacement {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub technique_key: String,
    pub price: String,
    #[serde(default)]
    pub discounted_price: String,
    #[serde(default)]
    pub layers: Vec<PricingLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingProduct {
    pub id: u64,
    #[serde(default)]
    pub placements: Vec<PricingPlacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPricing {
    pub currency: String,
    pub product: PricingProduct,
    #[serde(default)]
    pub variants: Vec<PricingVariant>,
}

/// Price breakdown the user accepted, as computed by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub retail_price: f64,
    pub technique_price: f64,
    pub placement_price: f64,
}

/// The user's configured product, as submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSelection {
    pub color: String,
    pub size: String,
    pub placement: Placement,
    pub variant_id: u64,
    pub dimensions: PlacementDimension,
    pub pricing: PriceBreakdown,
}

/// Product fields the backend records with a selection.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SelectedProduct<'a> {
    pub id: u64,
    pub name: &'a str,
    pub brand: &'a str,
    pub description: &'a str,
    pub sizes: &'a [String],
    pub colors: &'a [ProductColor],
}

impl<'a> From<&'a Product> for SelectedProduct<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            id: product.id,
            name: &product.name,
            brand: &product.brand,
            description: &product.description,
            sizes: &product.sizes,
            colors: &product.colors,
        }
    }
}

/// Selection body as the backend expects it.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SelectionPayload<'a> {
    pub color: &'a str,
    pub size: &'a str,
    pub placement: &'a Placement,
    pub variant_id: u64,
    pub placement_dimensions: &'a PlacementDimension,
    pub pricing: &'a PriceBreakdown,
}

impl<'a> From<&'a UserSelection> for SelectionPayload<'a> {
    fn from(selection: &'a UserSelection) -> Self {
        Self {
            color: &selection.color,
            size: &selection.size,
            placement: &selection.placement,
            variant_id: selection.variant_id,
            placement_dimensions: &selection.dimensions,
            pricing: &selection.pricing,
        }
    }
}
