use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One product line on a return. `credit_amount` is fixed at submission.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "return_items")]
#[schema(as = ReturnItem)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub return_id: i64,
    pub product_code: String,
    pub product_desc: String,
    #[schema(value_type = String)]
    pub price_per_unit: Decimal,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub credit_amount: Decimal,
    pub product_returning: String,
    pub reason_for_return: String,
    pub follow_up_action: Option<String>,
    pub supplier_credit: bool,
}

impl Model {
    /// Restores the two-place scale of the money columns after a database read.
    pub fn with_money_scale(mut self) -> Self {
        self.price_per_unit = super::returns::with_cents(self.price_per_unit);
        self.credit_amount = super::returns::with_cents(self.credit_amount);
        self
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_entity::Entity",
        from = "Column::ReturnId",
        to = "super::return_entity::Column::Id",
        on_delete = "Cascade"
    )]
    Return,
}

impl Related<super::return_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Return.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
