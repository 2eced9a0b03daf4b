//! Last good dispatch order per execution pool.

use relay_core::dispatch::DispatchOrder;
use relay_core::ids::{DistroId, TaskId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Holds the most recent successful order of every distro. A failed pass
/// leaves the stored order untouched.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    orders: RwLock<HashMap<DistroId, DispatchOrder>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current order for a distro.
    pub async fn get(&self, distro: &DistroId) -> Option<DispatchOrder> {
        self.orders.read().await.get(distro).cloned()
    }

    /// Store a new order, returning the one it replaces.
    pub async fn replace(&self, order: DispatchOrder) -> Option<DispatchOrder> {
        self.orders.write().await.insert(order.distro.clone(), order)
    }

    /// Position of a task in its distro's order.
    pub async fn position(&self, distro: &DistroId, task: &TaskId) -> Option<usize> {
        self.orders
            .read()
            .await
            .get(distro)
            .and_then(|order| order.position(task))
    }

    /// Number of distros with a stored order.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}
