#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use kiosk_core::Storefront;
use kiosk_core::catalog::SqlCatalog;
use kiosk_core::clock::ManualClock;
use kiosk_core::config::CodeConfig;
use kiosk_core::notify::{Notification, Notifier};
use kiosk_db::{Database, products};
use kiosk_types::{Money, Product, User};

pub struct Fixture {
    pub shop: Storefront,
    pub clock: Arc<ManualClock>,
    pub outbox: mpsc::UnboundedReceiver<Notification>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

pub fn shop() -> Fixture {
    shop_with(CodeConfig::default())
}

pub fn shop_with(codes: CodeConfig) -> Fixture {
    let (notifier, outbox) = Notifier::channel();
    let clock = Arc::new(ManualClock::new(start_time()));
    let shop = build(codes, notifier, clock.clone());
    Fixture { shop, clock, outbox }
}

pub fn build(codes: CodeConfig, notifier: Notifier, clock: Arc<ManualClock>) -> Storefront {
    let db = Arc::new(Database::open_in_memory().unwrap());
    Storefront::builder(db, Arc::new(SqlCatalog), notifier)
        .clock(clock)
        .codes(codes)
        .build()
}

impl Fixture {
    pub fn user(&self, email: &str) -> User {
        self.shop.register_user(email).unwrap()
    }

    pub fn product(&self, name: &str, price: i64) -> Uuid {
        self.stocked(name, price, 100)
    }

    pub fn stocked(&self, name: &str, price: i64, stock: u32) -> Uuid {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: Money::from_minor(price),
            sale_price: None,
            active: true,
            stock,
        };
        self.shop.add_product(&product).unwrap();
        product.id
    }

    pub fn stock_of(&self, product_id: &Uuid) -> u32 {
        self.shop
            .database()
            .with_conn(|conn| products::get(conn, product_id))
            .unwrap()
            .unwrap()
            .stock
    }

    pub fn restock(&self, product_id: &Uuid, stock: u32) {
        self.shop
            .database()
            .with_conn(|conn| products::set_stock(conn, product_id, stock))
            .unwrap();
    }

    pub fn reprice(&self, product_id: &Uuid, price: i64) {
        self.shop
            .database()
            .with_conn(|conn| products::set_price(conn, product_id, Money::from_minor(price), None))
            .unwrap();
    }

    pub fn deactivate(&self, product_id: &Uuid) {
        self.shop
            .database()
            .with_conn(|conn| products::set_active(conn, product_id, false))
            .unwrap();
    }

    /// Notifications queued so far.
    pub fn sent(&mut self) -> Vec<Notification> {
        let mut sent = Vec::new();
        while let Ok(n) = self.outbox.try_recv() {
            sent.push(n);
        }
        sent
    }
}
