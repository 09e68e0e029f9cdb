use anyhow::Context;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};

use shared::{
    CatalogError, NewOrder, Order, OrderDraft, OrderStatus, OrderStoreError, Product,
    ProductInput, SearchField,
};

use crate::models::{
    NewOrderRow, NewProductRow, OrderChangeset, OrderRow, ProductChangeset, ProductRow,
};
use crate::schema::{orders, products};
use crate::store::{CatalogStore, OrderStore, SEARCH_LIMIT};

type DbPool = Pool<AsyncPgConnection>;

pub struct PgCatalogStore {
    pool: DbPool,
}

impl PgCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create_product(&self, input: ProductInput) -> Result<Product, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = NewProductRow::from(input);
        let code = row.code.clone();
        match diesel::insert_into(products::table)
            .values(&row)
            .get_result::<ProductRow>(&mut conn)
            .await
        {
            Ok(created) => Ok(created.into()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(CatalogError::DuplicateCode(code))
            }
            Err(other) => Err(CatalogError::Backend(other.into())),
        }
    }

    async fn get_product(&self, code: &str) -> Result<Product, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = products::table
            .filter(products::code.eq(code))
            .first::<ProductRow>(&mut conn)
            .await
            .optional()
            .context("loading product")?
            .ok_or(CatalogError::NotFound)?;
        Ok(row.into())
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let rows = products::table
            .load::<ProductRow>(&mut conn)
            .await
            .context("listing products")?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_by_name_and_code(
        &self,
        name: &str,
        code: &str,
    ) -> Result<Option<Product>, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = products::table
            .filter(products::name.eq(name))
            .filter(products::code.eq(code))
            .first::<ProductRow>(&mut conn)
            .await
            .optional()
            .context("resolving product")?;
        Ok(row.map(Product::from))
    }

    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<Product>, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let pattern = format!("%{}%", term);
        let rows = match field {
            SearchField::Name => {
                products::table
                    .filter(products::name.ilike(&pattern))
                    .limit(SEARCH_LIMIT as i64)
                    .load::<ProductRow>(&mut conn)
                    .await
            }
            SearchField::Code => {
                products::table
                    .filter(products::code.ilike(&pattern))
                    .limit(SEARCH_LIMIT as i64)
                    .load::<ProductRow>(&mut conn)
                    .await
            }
        }
        .context("searching products")?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn reserve_stock(&self, code: &str, amount: i32) -> Result<Product, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        // The stock guard and the decrement are one conditional UPDATE, so
        // concurrent reservations serialize on the row and cannot oversell.
        let updated = diesel::update(
            products::table
                .filter(products::code.eq(code))
                .filter(products::stock.ge(amount)),
        )
        .set(products::stock.eq(products::stock - amount))
        .get_result::<ProductRow>(&mut conn)
        .await
        .optional()
        .context("reserving stock")?;

        match updated {
            Some(row) => Ok(row.into()),
            None => {
                let available = products::table
                    .filter(products::code.eq(code))
                    .select(products::stock)
                    .first::<i32>(&mut conn)
                    .await
                    .optional()
                    .context("re-reading stock")?
                    .ok_or(CatalogError::NotFound)?;
                Err(CatalogError::InsufficientStock { available })
            }
        }
    }

    async fn update_product(
        &self,
        code: &str,
        input: ProductInput,
    ) -> Result<Product, CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let changeset = ProductChangeset::from(input);
        let new_code = changeset.code.clone();
        match diesel::update(products::table.filter(products::code.eq(code)))
            .set(&changeset)
            .get_result::<ProductRow>(&mut conn)
            .await
        {
            Ok(row) => Ok(row.into()),
            Err(DieselError::NotFound) => Err(CatalogError::NotFound),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(CatalogError::DuplicateCode(new_code))
            }
            Err(other) => Err(CatalogError::Backend(other.into())),
        }
    }

    async fn delete_product(&self, code: &str) -> Result<(), CatalogError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let deleted = diesel::delete(products::table.filter(products::code.eq(code)))
            .execute(&mut conn)
            .await
            .context("deleting product")?;
        if deleted == 0 {
            return Err(CatalogError::NotFound);
        }
        Ok(())
    }
}

pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, new: NewOrder) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = diesel::insert_into(orders::table)
            .values(&NewOrderRow::from(new))
            .get_result::<OrderRow>(&mut conn)
            .await
            .context("creating order")?;
        Order::try_from(row).map_err(OrderStoreError::Backend)
    }

    async fn get_order(&self, id: i32) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = orders::table
            .filter(orders::id.eq(id))
            .first::<OrderRow>(&mut conn)
            .await
            .optional()
            .context("loading order")?
            .ok_or(OrderStoreError::NotFound)?;
        Order::try_from(row).map_err(OrderStoreError::Backend)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let rows = match status {
            Some(status) => {
                orders::table
                    .filter(orders::status.eq(status.as_str()))
                    .order(orders::order_date.desc())
                    .load::<OrderRow>(&mut conn)
                    .await
            }
            None => {
                orders::table
                    .order(orders::order_date.desc())
                    .load::<OrderRow>(&mut conn)
                    .await
            }
        }
        .context("listing orders")?;
        rows.into_iter()
            .map(|row| Order::try_from(row).map_err(OrderStoreError::Backend))
            .collect()
    }

    async fn update_order(&self, id: i32, draft: OrderDraft) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = diesel::update(orders::table.filter(orders::id.eq(id)))
            .set(&OrderChangeset::from(draft))
            .get_result::<OrderRow>(&mut conn)
            .await
            .optional()
            .context("updating order")?
            .ok_or(OrderStoreError::NotFound)?;
        Order::try_from(row).map_err(OrderStoreError::Backend)
    }

    async fn set_status(&self, id: i32, status: OrderStatus) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let row = diesel::update(orders::table.filter(orders::id.eq(id)))
            .set(orders::status.eq(status.as_str()))
            .get_result::<OrderRow>(&mut conn)
            .await
            .optional()
            .context("updating order status")?
            .ok_or(OrderStoreError::NotFound)?;
        Order::try_from(row).map_err(OrderStoreError::Backend)
    }

    async fn delete_order(&self, id: i32) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.get().await.context("acquiring connection")?;

        let deleted = diesel::delete(orders::table.filter(orders::id.eq(id)))
            .execute(&mut conn)
            .await
            .context("deleting order")?;
        if deleted == 0 {
            return Err(OrderStoreError::NotFound);
        }
        Ok(())
    }
}
