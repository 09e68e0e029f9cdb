use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use shared::{
    CatalogError, NewOrder, Order, OrderDraft, OrderStatus, OrderStoreError, Product,
    ProductInput, SearchField,
};

/// Search results are capped, matching the autocomplete the catalog feeds.
pub const SEARCH_LIMIT: usize = 10;

/// Durable storage of products. The sole owner of `stock` mutation:
/// `create_product` initializes it and `reserve_stock` decrements it, and
/// nothing else may write it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails with `DuplicateCode` if the code is already taken. Sets
    /// `stock = quantity`. No other validation.
    async fn create_product(&self, input: ProductInput) -> Result<Product, CatalogError>;

    async fn get_product(&self, code: &str) -> Result<Product, CatalogError>;

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    async fn find_by_name_and_code(
        &self,
        name: &str,
        code: &str,
    ) -> Result<Option<Product>, CatalogError>;

    /// Case-insensitive substring match on the chosen field, capped at
    /// [`SEARCH_LIMIT`] results, order unspecified.
    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<Product>, CatalogError>;

    /// Atomic check-and-decrement. Under concurrent callers the sum of
    /// successfully reserved amounts never exceeds the available stock.
    async fn reserve_stock(&self, code: &str, amount: i32) -> Result<Product, CatalogError>;

    /// Plain field update; never touches `stock`.
    async fn update_product(&self, code: &str, input: ProductInput)
        -> Result<Product, CatalogError>;

    async fn delete_product(&self, code: &str) -> Result<(), CatalogError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, new: NewOrder) -> Result<Order, OrderStoreError>;

    async fn get_order(&self, id: i32) -> Result<Order, OrderStoreError>;

    /// Newest `order_date` first, optionally filtered by status.
    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderStoreError>;

    async fn update_order(&self, id: i32, draft: OrderDraft) -> Result<Order, OrderStoreError>;

    async fn set_status(&self, id: i32, status: OrderStatus) -> Result<Order, OrderStoreError>;

    async fn delete_order(&self, id: i32) -> Result<(), OrderStoreError>;
}

/// Thread-safe in-memory catalog for tests and development.
#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    inner: Arc<RwLock<CatalogInner>>,
}

#[derive(Default)]
struct CatalogInner {
    next_id: i32,
    products: BTreeMap<i32, Product>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn create_product(&self, input: ProductInput) -> Result<Product, CatalogError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if inner.products.values().any(|p| p.code == input.code) {
            return Err(CatalogError::DuplicateCode(input.code));
        }
        inner.next_id += 1;
        let product = Product {
            id: inner.next_id,
            name: input.name,
            code: input.code,
            quantity: input.quantity,
            supplier: input.supplier,
            image: input.image,
            stock: input.quantity,
        };
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, code: &str) -> Result<Product, CatalogError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .products
            .values()
            .find(|p| p.code == code)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.products.values().cloned().collect())
    }

    async fn find_by_name_and_code(
        &self,
        name: &str,
        code: &str,
    ) -> Result<Option<Product>, CatalogError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .products
            .values()
            .find(|p| p.name == name && p.code == code)
            .cloned())
    }

    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<Product>, CatalogError> {
        let needle = term.to_lowercase();
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .products
            .values()
            .filter(|p| {
                let haystack = match field {
                    SearchField::Name => &p.name,
                    SearchField::Code => &p.code,
                };
                haystack.to_lowercase().contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    async fn reserve_stock(&self, code: &str, amount: i32) -> Result<Product, CatalogError> {
        // Check and decrement under one write lock; this is the whole
        // atomicity story of the in-memory backend.
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let product = inner
            .products
            .values_mut()
            .find(|p| p.code == code)
            .ok_or(CatalogError::NotFound)?;
        if amount > product.stock {
            return Err(CatalogError::InsufficientStock {
                available: product.stock,
            });
        }
        product.stock -= amount;
        Ok(product.clone())
    }

    async fn update_product(
        &self,
        code: &str,
        input: ProductInput,
    ) -> Result<Product, CatalogError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if inner
            .products
            .values()
            .any(|p| p.code == input.code && p.code != code)
        {
            return Err(CatalogError::DuplicateCode(input.code));
        }
        let product = inner
            .products
            .values_mut()
            .find(|p| p.code == code)
            .ok_or(CatalogError::NotFound)?;
        product.name = input.name;
        product.code = input.code;
        product.quantity = input.quantity;
        product.supplier = input.supplier;
        product.image = input.image;
        Ok(product.clone())
    }

    async fn delete_product(&self, code: &str) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let id = inner
            .products
            .values()
            .find(|p| p.code == code)
            .map(|p| p.id)
            .ok_or(CatalogError::NotFound)?;
        inner.products.remove(&id);
        Ok(())
    }
}

/// Thread-safe in-memory order store for tests and development.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    inner: Arc<RwLock<OrdersInner>>,
}

#[derive(Default)]
struct OrdersInner {
    next_id: i32,
    orders: BTreeMap<i32, Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(&self, new: NewOrder) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.next_id += 1;
        let order = Order {
            id: inner.next_id,
            product_name: new.product_name,
            product_code: new.product_code,
            quantity: new.quantity,
            order_date: new.order_date,
            due_date: new.due_date,
            status: new.status,
            project_name: new.project_name,
            project_code: new.project_code,
            order_name: new.order_name,
            project_phase: new.project_phase,
            project_consultant: new.project_consultant,
            project_location: new.project_location,
        };
        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: i32) -> Result<Order, OrderStoreError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.orders.get(&id).cloned().ok_or(OrderStoreError::NotFound)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn update_order(&self, id: i32, draft: OrderDraft) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let order = inner.orders.get_mut(&id).ok_or(OrderStoreError::NotFound)?;
        order.product_name = draft.product_name;
        order.product_code = draft.product_code;
        order.quantity = draft.quantity;
        order.due_date = draft.due_date;
        order.project_name = draft.project_name;
        order.project_code = draft.project_code;
        order.order_name = draft.order_name;
        order.project_phase = draft.project_phase;
        order.project_consultant = draft.project_consultant;
        order.project_location = draft.project_location;
        Ok(order.clone())
    }

    async fn set_status(&self, id: i32, status: OrderStatus) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let order = inner.orders.get_mut(&id).ok_or(OrderStoreError::NotFound)?;
        order.status = status;
        Ok(order.clone())
    }

    async fn delete_order(&self, id: i32) -> Result<(), OrderStoreError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or(OrderStoreError::NotFound)
    }
}
