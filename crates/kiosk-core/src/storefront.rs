use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use kiosk_db::{Database, products, users};
use kiosk_types::{
    CartItem, Order, OrderStatus, PaymentMethod, Product, Purpose, ShippingPartner, User,
    VerificationCode,
};

use crate::cart::CartStore;
use crate::catalog::ProductCatalog;
use crate::checkout::CheckoutEngine;
use crate::clock::{Clock, SystemClock};
use crate::codes::{CodeIssuer, CodeValidator, Outcome};
use crate::config::{CodeConfig, Config};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::orders::OrderRepository;

/// All services wired to one database, catalog, clock and notifier.
///
/// Cheap to share behind an `Arc`; every method is synchronous and blocks on
/// SQLite, so async callers should use `tokio::task::spawn_blocking`.
pub struct Storefront {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    pub issuer: CodeIssuer,
    pub validator: CodeValidator,
    pub cart: CartStore,
    pub checkout: CheckoutEngine,
    pub orders: Arc<OrderRepository>,
}

impl Storefront {
    /// Open the database from `config` and wire everything with the system clock.
    pub fn open(
        config: &Config,
        catalog: Arc<dyn ProductCatalog>,
        notifier: Notifier,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let db = Arc::new(Database::open(&config.db_path)?);
        Ok(Self::builder(db, catalog, notifier)
            .codes(config.codes.clone())
            .build())
    }

    pub fn builder(
        db: Arc<Database>,
        catalog: Arc<dyn ProductCatalog>,
        notifier: Notifier,
    ) -> StorefrontBuilder {
        StorefrontBuilder {
            db,
            catalog,
            notifier,
            clock: Arc::new(SystemClock),
            codes: CodeConfig::default(),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    // -- Users --

    pub fn register_user(&self, email: &str) -> Result<User> {
        let id = Uuid::new_v4();
        let now = self.clock.now();
        self.db.with_conn(|conn| users::insert(conn, &id, email, now))?;
        info!(user_id = %id, "User registered");
        self.get_user(&id)
    }

    pub fn get_user(&self, id: &Uuid) -> Result<User> {
        self.db.get_user_by_id(id)?.ok_or(Error::UserNotFound(*id))
    }

    // -- Catalog --

    /// Insert a product into the local `products` table (read by `SqlCatalog`).
    pub fn add_product(&self, product: &Product) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| products::insert(conn, product, now))?;
        Ok(())
    }

    // -- Codes --

    pub fn issue_code(&self, user_id: &Uuid, purpose: Purpose) -> Result<VerificationCode> {
        self.issuer.issue(user_id, purpose)
    }

    pub fn validate_code(&self, user_id: &Uuid, purpose: Purpose, submitted: &str) -> Result<Outcome> {
        self.validator.validate(user_id, purpose, submitted)
    }

    // -- Cart & checkout --

    pub fn get_cart(&self, user_id: &Uuid) -> Result<Vec<CartItem>> {
        self.cart.list(user_id)
    }

    pub fn place_order(
        &self,
        user_id: &Uuid,
        shipping_partner: ShippingPartner,
        payment_method: PaymentMethod,
    ) -> Result<Order> {
        self.checkout.checkout(user_id, shipping_partner, payment_method)
    }

    // -- Orders --

    pub fn get_order(&self, id: &Uuid, user_id: &Uuid) -> Result<Order> {
        self.orders.get(id, user_id)
    }

    pub fn list_orders(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        self.orders.list(user_id)
    }

    pub fn update_order_status(&self, id: &Uuid, status: OrderStatus) -> Result<Order> {
        self.orders.update_status(id, status)
    }
}

pub struct StorefrontBuilder {
    db: Arc<Database>,
    catalog: Arc<dyn ProductCatalog>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    codes: CodeConfig,
}

impl StorefrontBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn codes(mut self, codes: CodeConfig) -> Self {
        self.codes = codes;
        self
    }

    pub fn build(self) -> Storefront {
        let Self { db, catalog, notifier, clock, codes } = self;

        let orders = Arc::new(OrderRepository::new(db.clone(), clock.clone()));
        Storefront {
            issuer: CodeIssuer::new(db.clone(), clock.clone(), notifier.clone(), codes),
            validator: CodeValidator::new(db.clone(), clock.clone()),
            cart: CartStore::new(db.clone(), catalog.clone(), clock.clone()),
            checkout: CheckoutEngine::new(db.clone(), catalog, orders.clone(), clock.clone(), notifier),
            orders,
            db,
            clock,
        }
    }
}
