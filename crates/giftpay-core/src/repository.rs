//! # Order Repository
//!
//! Storage seam for orders. The in-memory implementation keeps orders for the
//! lifetime of the process only; swap in a persistent backend by implementing
//! `OrderRepository`.

use crate::error::{PaymentError, PaymentResult};
use crate::order::{Order, OrderStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or replace an order
    async fn save(&self, order: Order) -> PaymentResult<()>;

    async fn find(&self, order_id: &str) -> PaymentResult<Option<Order>>;

    /// Move an order to `status` and return the updated order.
    ///
    /// Fails with `OrderNotFound` for unknown ids.
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> PaymentResult<Order>;
}

/// Type alias for a shared repository
pub type BoxedOrderRepository = Arc<dyn OrderRepository>;

/// A thread-safe in-memory order store.
#[derive(Default, Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> PaymentResult<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn find(&self, order_id: &str) -> PaymentResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id).cloned())
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> PaymentResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.transition(status);
        Ok(order.clone())
    }
}
