//! Models and fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use spannery::prelude::*;
use spannery_core::testing::MockDatabase;

#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    pub id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub active: bool,
}

impl Model for Supplier {
    const MODEL_NAME: &'static str = "Supplier";

    fn declare() -> SchemaDeclaration {
        TableSchema::declare(Self::MODEL_NAME, "Suppliers")
            .field(FieldInfo::string("SupplierID").primary_key().max_length(36).default_with(uuid4))
            .field(FieldInfo::string("Name").not_null().max_length(100))
            .field(FieldInfo::string("Category").max_length(50))
            .field(FieldInfo::bool("Active").default(true))
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("SupplierID", self.id.clone())
            .with("Name", &self.name)
            .with("Category", self.category.clone())
            .with("Active", self.active)
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("SupplierID")?,
            name: record.take("Name")?,
            category: record.take("Category")?,
            active: record.take::<Option<bool>>("Active")?.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Product {
    pub id: Option<String>,
    pub supplier_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub stock: i64,
    pub list_price: Option<Decimal>,
    pub tags: Vec<String>,
    pub attributes: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: &str, category: &str, stock: i64) -> Self {
        Self {
            name: name.to_string(),
            category: Some(category.to_string()),
            stock,
            ..Self::default()
        }
    }
}

impl Model for Product {
    const MODEL_NAME: &'static str = "Product";

    fn declare() -> SchemaDeclaration {
        TableSchema::declare(Self::MODEL_NAME, "Products")
            .field(FieldInfo::string("ProductID").primary_key().max_length(36).default_with(uuid4))
            .field(FieldInfo::foreign_key("SupplierID", "Supplier").related_name("products"))
            .field(FieldInfo::string("Name").not_null().max_length(100).index())
            .field(FieldInfo::string("Category").max_length(50))
            .field(FieldInfo::int64("Stock").default(0_i64))
            .field(FieldInfo::numeric("ListPrice").precision(10, 2))
            .field(FieldInfo::array("Tags", SpannerType::string()))
            .field(FieldInfo::json("Attributes"))
            .field(FieldInfo::timestamp("CreatedAt").auto_now_add())
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("ProductID", self.id.clone())
            .with("SupplierID", self.supplier_id.clone())
            .with("Name", &self.name)
            .with("Category", self.category.clone())
            .with("Stock", self.stock)
            .with("ListPrice", self.list_price)
            .with("Tags", self.tags.clone())
            .with("Attributes", self.attributes.clone())
            .with("CreatedAt", self.created_at)
    }

    fn from_record(mut record: Record) -> Result<Self> {
        Ok(Self {
            id: record.take("ProductID")?,
            supplier_id: record.take("SupplierID")?,
            name: record.take("Name")?,
            category: record.take("Category")?,
            stock: record.take::<Option<i64>>("Stock")?.unwrap_or_default(),
            list_price: record.take("ListPrice")?,
            tags: record.take::<Option<Vec<String>>>("Tags")?.unwrap_or_default(),
            attributes: record.take("Attributes")?,
            created_at: record.take("CreatedAt")?,
        })
    }
}

pub fn registry() -> ModelRegistry {
    ModelRegistry::builder()
        .register::<Supplier>()
        .unwrap()
        .register::<Product>()
        .unwrap()
        .build()
        .unwrap()
}

pub fn session() -> Session<MockDatabase> {
    Session::new(MockDatabase::new(), Arc::new(registry()))
}

/// Rows as a client returns them: named columns, one `Vec<Value>` per row.
pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> spannery::ResultSet {
    spannery::ResultSet::new(columns.iter().copied(), rows)
}

pub fn product_row(id: &str, name: &str, stock: i64) -> Vec<Value> {
    vec![Value::from(id), Value::from(name), Value::Int64(stock)]
}

pub const PRODUCT_COLUMNS: [&str; 3] = ["ProductID", "Name", "Stock"];
