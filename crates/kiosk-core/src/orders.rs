use std::sync::Arc;

use anyhow::anyhow;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use kiosk_db::{Database, orders};
use kiosk_types::{Order, OrderStatus};

use crate::clock::Clock;
use crate::error::{Error, Result};

/// Append-only order storage. After creation only `status` moves.
pub struct OrderRepository {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl OrderRepository {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Persist a new order and its items on an open connection or transaction.
    ///
    /// Rejects orders whose total is not the sum of their item line totals, or
    /// that do not start out `placed`.
    pub fn create_in(&self, conn: &Connection, order: &Order) -> Result<()> {
        match order.items_total() {
            Some(sum) if sum == order.total => {}
            sum => {
                return Err(Error::Storage(anyhow!(
                    "order {} total {} does not match its items ({:?})",
                    order.id,
                    order.total,
                    sum
                )));
            }
        }
        if order.status != OrderStatus::Placed {
            return Err(Error::Storage(anyhow!(
                "new order {} must be placed, got {}",
                order.id,
                order.status
            )));
        }

        orders::insert(conn, order)?;
        Ok(())
    }

    /// Persist a new order in its own transaction: the order and its items
    /// land together or not at all.
    pub fn create(&self, order: Order) -> Result<Order> {
        self.db.with_transaction(|tx| self.create_in(tx, &order))?;
        Ok(order)
    }

    /// Fetch an order owned by `user_id`. Someone else's order reads as
    /// not found.
    pub fn get(&self, id: &Uuid, user_id: &Uuid) -> Result<Order> {
        match self.db.get_order(id)? {
            Some(order) if order.user_id == *user_id => Ok(order),
            _ => Err(Error::OrderNotFound(*id)),
        }
    }

    /// Newest first.
    pub fn list(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        Ok(self.db.list_orders(user_id)?)
    }

    /// Advance an order's status. The totals and items are never touched.
    pub fn update_status(&self, id: &Uuid, to: OrderStatus) -> Result<Order> {
        let now = self.clock.now();

        let order = self.db.with_transaction(|tx| -> Result<Order> {
            let current = orders::get(tx, id)?.ok_or(Error::OrderNotFound(*id))?;
            if !current.status.can_transition_to(to) {
                return Err(Error::InvalidStatusTransition { from: current.status, to });
            }
            if !orders::update_status(tx, id, current.status, to, now)? {
                return Err(Error::InvalidStatusTransition { from: current.status, to });
            }
            orders::get(tx, id)?.ok_or(Error::OrderNotFound(*id))
        })?;

        info!(order_id = %id, status = %order.status, "Order status updated");
        Ok(order)
    }
}
