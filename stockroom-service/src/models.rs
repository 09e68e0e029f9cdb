use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use std::str::FromStr;

use shared::{NewOrder, Order, OrderDraft, OrderStatus, Product, ProductInput};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductRow {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub supplier: String,
    pub image: Option<String>,
    pub stock: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            quantity: row.quantity,
            supplier: row.supplier,
            image: row.image,
            stock: row.stock,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProductRow {
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub supplier: String,
    pub image: Option<String>,
    pub stock: i32,
}

impl From<ProductInput> for NewProductRow {
    fn from(input: ProductInput) -> Self {
        Self {
            name: input.name,
            code: input.code,
            // stock starts out equal to the stocked quantity
            stock: input.quantity,
            quantity: input.quantity,
            supplier: input.supplier,
            image: input.image,
        }
    }
}

/// Product edit: plain field replacement, `stock` deliberately absent.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_null = true)]
pub struct ProductChangeset {
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub supplier: String,
    pub image: Option<String>,
}

impl From<ProductInput> for ProductChangeset {
    fn from(input: ProductInput) -> Self {
        Self {
            name: input.name,
            code: input.code,
            quantity: input.quantity,
            supplier: input.supplier,
            image: input.image,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: i32,
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: String,
    pub project_name: String,
    pub project_code: String,
    pub order_name: String,
    pub project_phase: String,
    pub project_consultant: String,
    pub project_location: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&row.status)?;
        Ok(Self {
            id: row.id,
            product_name: row.product_name,
            product_code: row.product_code,
            quantity: row.quantity,
            order_date: row.order_date,
            due_date: row.due_date,
            status,
            project_name: row.project_name,
            project_code: row.project_code,
            order_name: row.order_name,
            project_phase: row.project_phase,
            project_consultant: row.project_consultant,
            project_location: row.project_location,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrderRow {
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: String,
    pub project_name: String,
    pub project_code: String,
    pub order_name: String,
    pub project_phase: String,
    pub project_consultant: String,
    pub project_location: String,
}

impl From<NewOrder> for NewOrderRow {
    fn from(new: NewOrder) -> Self {
        Self {
            product_name: new.product_name,
            product_code: new.product_code,
            quantity: new.quantity,
            order_date: new.order_date,
            due_date: new.due_date,
            status: new.status.as_str().to_string(),
            project_name: new.project_name,
            project_code: new.project_code,
            order_name: new.order_name,
            project_phase: new.project_phase,
            project_consultant: new.project_consultant,
            project_location: new.project_location,
        }
    }
}

/// Order edit: `order_date` and `status` are not editable fields.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderChangeset {
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
    pub due_date: NaiveDate,
    pub project_name: String,
    pub project_code: String,
    pub order_name: String,
    pub project_phase: String,
    pub project_consultant: String,
    pub project_location: String,
}

impl From<OrderDraft> for OrderChangeset {
    fn from(draft: OrderDraft) -> Self {
        Self {
            product_name: draft.product_name,
            product_code: draft.product_code,
            quantity: draft.quantity,
            due_date: draft.due_date,
            project_name: draft.project_name,
            project_code: draft.project_code,
            order_name: draft.order_name,
            project_phase: draft.project_phase,
            project_consultant: draft.project_consultant,
            project_location: draft.project_location,
        }
    }
}
