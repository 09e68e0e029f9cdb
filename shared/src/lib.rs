use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub supplier: String,
    pub image: Option<String>,
    pub stock: i32,
}

/// Caller-supplied product fields, used for both create and edit.
/// `stock` is never accepted from callers: it is initialized to `quantity`
/// exactly once at creation and only mutated through stock reservation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub supplier: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Disapproved,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Disapproved => "disapproved",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown order status '{0}'")]
pub struct ParseStatusError(String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "disapproved" => Ok(OrderStatus::Disapproved),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i32,
    /// Copied from the product at order time. Soft reference: later edits
    /// to the product do not flow back into existing orders.
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: OrderStatus,
    pub project_name: String,
    pub project_code: String,
    pub order_name: String,
    pub project_phase: String,
    pub project_consultant: String,
    pub project_location: String,
}

impl Order {
    /// External order number, zero-padded to three digits ("M-007").
    /// Wider ids are rendered in full ("M-12345").
    pub fn display_code(&self) -> String {
        format!("M-{:03}", self.id)
    }
}

/// Order fields accepted from callers on submission and edit.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
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

/// A fully validated order record, ready to persist. Built by the workflow
/// engine after stock has been reserved; stores only assign the id.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: OrderStatus,
    pub project_name: String,
    pub project_code: String,
    pub order_name: String,
    pub project_phase: String,
    pub project_consultant: String,
    pub project_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    Name,
    Code,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("a product with code '{0}' already exists")]
    DuplicateCode(String),
    #[error("product not found")]
    NotFound,
    #[error("Only {available} available. Cannot order more than that.")]
    InsufficientStock { available: i32 },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("order not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("Both product name and code are required.")]
    MissingProductReference,
    #[error("Product not found. Please enter a valid product name and code.")]
    ProductNotFound,
    #[error("Due date cannot be in the past.")]
    PastDueDate,
    #[error("Quantity must be greater than zero.")]
    InvalidQuantity,
    #[error("Only {available} available. Cannot order more than that.")]
    InsufficientStock { available: i32 },
}

impl OrderValidationError {
    /// The input field the error attaches to; `None` for form-level errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            OrderValidationError::MissingProductReference => None,
            OrderValidationError::ProductNotFound => None,
            OrderValidationError::PastDueDate => Some("due_date"),
            OrderValidationError::InvalidQuantity => Some("quantity"),
            OrderValidationError::InsufficientStock { .. } => Some("quantity"),
        }
    }
}

/// Everything that failed in one validation pass, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<OrderValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: OrderValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, error: &OrderValidationError) -> bool {
        self.0.contains(error)
    }
}

impl From<OrderValidationError> for ValidationErrors {
    fn from(error: OrderValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}
