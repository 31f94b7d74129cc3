use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unit a quantity is measured in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    #[sea_orm(string_value = "PIECES")]
    Pieces,
    #[sea_orm(string_value = "KG")]
    Kg,
    #[sea_orm(string_value = "LITERS")]
    Liters,
    #[sea_orm(string_value = "GRAMS")]
    Grams,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[sea_orm(string_value = "DAIRY")]
    Dairy,
    #[sea_orm(string_value = "VEGETABLES")]
    Vegetables,
    #[sea_orm(string_value = "FRUIT")]
    Fruit,
    #[sea_orm(string_value = "MEAT")]
    Meat,
    #[sea_orm(string_value = "FISH")]
    Fish,
    #[sea_orm(string_value = "PRESERVES")]
    Preserves,
    #[sea_orm(string_value = "BEVERAGES")]
    Beverages,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

/// Where an item is physically kept.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageLocation {
    #[sea_orm(string_value = "FRIDGE")]
    Fridge,
    #[sea_orm(string_value = "FREEZER")]
    Freezer,
    #[sea_orm(string_value = "PANTRY")]
    Pantry,
    #[sea_orm(string_value = "CELLAR")]
    Cellar,
}

/// Fractional digits stored for quantities, `decimal(12,3)`.
pub const QUANTITY_SCALE: u32 = 3;
/// Fractional digits stored for purchase prices, `decimal(10,2)`.
pub const PRICE_SCALE: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = InventoryItem)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub category: Category,
    pub location: StorageLocation,
    pub expiration_date: Option<NaiveDate>,
    pub opened_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub supplier: Option<String>,
    pub lot_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Model {
    /// Days until expiration relative to `today`; negative once expired.
    pub fn days_until_expiration(&self, today: NaiveDate) -> Option<i64> {
        self.expiration_date
            .map(|expires| (expires - today).num_days())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consumption_event::Entity")]
    ConsumptionEvents,
}

impl Related<super::consumption_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionEvents.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert && !matches!(active_model.created_at, Set(_)) {
            active_model.created_at = Set(now);
        }
        if !matches!(active_model.updated_at, Set(_)) {
            active_model.updated_at = Set(now);
        }

        Ok(active_model)
    }
}
