//! Shared fixtures for repository tests.

use stockline_core::{Category, ItemKind, Product, SkuKind};

use crate::pool::{Database, DbConfig};
use crate::repository::category::NewCategory;
use crate::repository::product::NewProduct;

/// Fresh in-memory database with migrations applied.
pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Creates a category; single categories get IMEI SKUs, bulk get barcodes.
pub(crate) async fn test_category(db: &Database, name: &str, kind: ItemKind) -> Category {
    db.categories()
        .create(NewCategory {
            name: name.to_string(),
            item_kind: kind,
            sku_kind: match kind {
                ItemKind::Single => SkuKind::Imei,
                ItemKind::Bulk => SkuKind::Barcode,
            },
        })
        .await
        .unwrap()
}

/// Creates a single-SKU product holding its one unit.
pub(crate) async fn single_product(
    db: &Database,
    category_id: &str,
    name: &str,
    sku: &str,
    buying_price_cents: i64,
) -> Product {
    db.products()
        .create(NewProduct {
            category_id: category_id.to_string(),
            name: name.to_string(),
            sku_value: Some(sku.to_string()),
            quantity: 1,
            buying_price_cents,
            selling_price_cents: buying_price_cents * 13 / 10,
            owner_id: None,
            actor: Some("test".to_string()),
        })
        .await
        .unwrap()
}

/// Creates a bulk product with the given opening stock.
pub(crate) async fn bulk_product(
    db: &Database,
    category_id: &str,
    name: &str,
    quantity: i64,
    buying_price_cents: i64,
) -> Product {
    db.products()
        .create(NewProduct {
            category_id: category_id.to_string(),
            name: name.to_string(),
            sku_value: None,
            quantity,
            buying_price_cents,
            selling_price_cents: buying_price_cents * 13 / 10,
            owner_id: None,
            actor: Some("test".to_string()),
        })
        .await
        .unwrap()
}
