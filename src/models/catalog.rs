//! Catalog models
//!
//! Packages and campaigns are the two sellable item kinds. They share most
//! fields; campaigns additionally carry a pricing unit (e.g. "per day").
//! All prices are integers in paise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A one-time service package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Price in paise
    pub price: i64,
    /// Short description
    pub description: String,
    /// Feature bullet points
    pub features: Vec<String>,
    /// What the customer receives
    pub deliverables: Vec<String>,
    /// Whether the item is visible in the storefront
    pub is_active: bool,
    /// Highlighted in the "popular" section
    pub is_popular: bool,
    /// Sort position within the popular section
    pub popular_order: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A recurring campaign service. Same shape as [`Package`] plus a pricing
/// unit describing what one quantity buys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Price in paise, per `unit`
    pub price: i64,
    /// Pricing unit, e.g. "per day" or "per booth"
    pub unit: String,
    /// Short description
    pub description: String,
    /// Feature bullet points
    pub features: Vec<String>,
    /// What the customer receives
    pub deliverables: Vec<String>,
    /// Whether the item is visible in the storefront
    pub is_active: bool,
    /// Highlighted in the "popular" section
    pub is_popular: bool,
    /// Sort position within the popular section
    pub popular_order: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Discriminates which catalog table a cart or order line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// References a row in `packages`
    Package,
    /// References a row in `campaigns`
    Campaign,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Package => write!(f, "package"),
            ItemType::Campaign => write!(f, "campaign"),
        }
    }
}

impl FromStr for ItemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "package" => Ok(ItemType::Package),
            "campaign" => Ok(ItemType::Campaign),
            _ => Err(anyhow::anyhow!("Invalid item type: {}", s)),
        }
    }
}

/// Input for creating or replacing a package
#[derive(Debug, Clone, Deserialize)]
pub struct PackageInput {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub popular_order: i64,
}

/// Input for creating or replacing a campaign
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignInput {
    pub name: String,
    pub price: i64,
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub popular_order: i64,
}

fn default_true() -> bool {
    true
}

/// A catalog item resolved through an [`ItemType`] reference, used when
/// enriching cart lines and snapshotting order items.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub item_type: ItemType,
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub unit: Option<String>,
    pub is_active: bool,
}

impl From<&Package> for CatalogItem {
    fn from(p: &Package) -> Self {
        Self {
            item_type: ItemType::Package,
            id: p.id,
            name: p.name.clone(),
            price: p.price,
            unit: None,
            is_active: p.is_active,
        }
    }
}

impl From<&Campaign> for CatalogItem {
    fn from(c: &Campaign) -> Self {
        Self {
            item_type: ItemType::Campaign,
            id: c.id,
            name: c.name.clone(),
            price: c.price,
            unit: Some(c.unit.clone()),
            is_active: c.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_display() {
        assert_eq!(ItemType::Package.to_string(), "package");
        assert_eq!(ItemType::Campaign.to_string(), "campaign");
    }

    #[test]
    fn test_item_type_from_str() {
        assert_eq!(ItemType::from_str("package").unwrap(), ItemType::Package);
        assert_eq!(ItemType::from_str("CAMPAIGN").unwrap(), ItemType::Campaign);
        assert!(ItemType::from_str("bundle").is_err());
    }

    #[test]
    fn test_package_input_defaults() {
        let input: PackageInput =
            serde_json::from_str(r#"{"name": "Starter", "price": 499900}"#).unwrap();
        assert!(input.is_active);
        assert!(!input.is_popular);
        assert_eq!(input.popular_order, 0);
        assert!(input.features.is_empty());
    }

    #[test]
    fn test_catalog_item_from_campaign_has_unit() {
        let campaign = Campaign {
            id: 1,
            name: "Door to Door".to_string(),
            price: 150000,
            unit: "per day".to_string(),
            description: String::new(),
            features: vec![],
            deliverables: vec![],
            is_active: true,
            is_popular: false,
            popular_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let item = CatalogItem::from(&campaign);
        assert_eq!(item.item_type, ItemType::Campaign);
        assert_eq!(item.unit.as_deref(), Some("per day"));
    }
}
