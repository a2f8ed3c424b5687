//! Cart to order conversion.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kiosk_db::{Database, cart, users};
use kiosk_types::{Money, Order, OrderItem, OrderStatus, PaymentMethod, ShippingPartner, User};

use crate::catalog::ProductCatalog;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};
use crate::orders::OrderRepository;

pub struct CheckoutEngine {
    db: Arc<Database>,
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<OrderRepository>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
}

impl CheckoutEngine {
    pub fn new(
        db: Arc<Database>,
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<OrderRepository>,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
    ) -> Self {
        Self { db, catalog, orders, clock, notifier }
    }

    /// Turn the user's cart into a placed order.
    ///
    /// Runs as one immediate transaction: read the cart, price every line
    /// from the catalog (cart display prices are ignored), take the units out
    /// of stock, write the order and its items, clear the cart. Any failure
    /// rolls everything back and leaves the cart as it was. Of two concurrent
    /// checkouts for one user, the second sees an empty cart and gets
    /// `EmptyCart`.
    ///
    /// A confirmation is queued for the user once the order is committed.
    pub fn checkout(
        &self,
        user_id: &Uuid,
        shipping_partner: ShippingPartner,
        payment_method: PaymentMethod,
    ) -> Result<Order> {
        let now = self.clock.now();

        let result = self
            .db
            .with_transaction(|tx| -> Result<(Order, User)> {
                let user = users::get(tx, user_id)?.ok_or(Error::UserNotFound(*user_id))?;

                let lines = cart::list(tx, user_id)?;
                if lines.is_empty() {
                    return Err(Error::EmptyCart);
                }

                let order_id = Uuid::new_v4();
                let mut items = Vec::with_capacity(lines.len());
                let mut total = Money::ZERO;
                for line in &lines {
                    let unit_price = self.catalog.current_price(tx, &line.product_id)?;
                    total = unit_price
                        .checked_mul_qty(line.quantity)
                        .and_then(|line_total| total.checked_add(line_total))
                        .ok_or_else(|| {
                            Error::CheckoutTransactionFailed(anyhow!("order total overflows"))
                        })?;
                    self.catalog.reserve(tx, &line.product_id, line.quantity)?;

                    items.push(OrderItem {
                        id: Uuid::new_v4(),
                        order_id,
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price,
                    });
                }

                let order = Order {
                    id: order_id,
                    user_id: *user_id,
                    items,
                    total,
                    status: OrderStatus::Placed,
                    payment_method,
                    shipping_partner,
                    created_at: now,
                    updated_at: now,
                };
                self.orders.create_in(tx, &order)?;

                let cleared = cart::clear(tx, user_id)?;
                if cleared != lines.len() {
                    return Err(Error::CheckoutTransactionFailed(anyhow!(
                        "cart changed during checkout: read {} lines, cleared {}",
                        lines.len(),
                        cleared
                    )));
                }

                Ok((order, user))
            })
            .map_err(Error::into_checkout_failure);

        match &result {
            Ok((order, _)) => info!(
                user_id = %user_id,
                order_id = %order.id,
                items = order.items.len(),
                total = %order.total,
                "Order placed"
            ),
            Err(Error::EmptyCart) => debug!(user_id = %user_id, "Checkout on empty cart"),
            Err(e) => warn!(user_id = %user_id, "Checkout failed: {}", e),
        }

        let (order, user) = result?;
        self.notifier.notify(confirmation(&order, user.email));
        Ok(order)
    }
}

fn confirmation(order: &Order, recipient: String) -> Notification {
    let mut body = format!("Thank you for your order {}.\n\n", order.id);
    for item in &order.items {
        let line_total = item.line_total().unwrap_or(Money::ZERO);
        body.push_str(&format!(
            "{} x {} @ {} = {}\n",
            item.quantity, item.product_id, item.unit_price, line_total
        ));
    }
    body.push_str(&format!(
        "\nTotal: {}\nPayment: {}\nShipping: {}\n",
        order.total, order.payment_method, order.shipping_partner
    ));

    Notification {
        recipient,
        subject: format!("Order confirmation #{}", order.id),
        body,
    }
}
