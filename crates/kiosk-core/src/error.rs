use kiosk_types::OrderStatus;
use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the verification and checkout services.
///
/// Every variant reaches the caller; the only failures swallowed inside the
/// core are notification deliveries, which are logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("verification code is invalid")]
    InvalidCode,

    #[error("verification code has expired")]
    ExpiredCode,

    #[error("verification code has already been used")]
    CodeAlreadyUsed,

    #[error("too many verification codes requested; try again later")]
    RateLimited,

    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} is not available")]
    ProductUnavailable(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, {available} available")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },

    #[error("product {0} is not in the cart")]
    CartItemNotFound(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("checkout failed: {0}")]
    CheckoutTransactionFailed(#[source] anyhow::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// Re-tag storage failures raised inside the checkout transaction.
    /// Domain errors pass through unchanged.
    pub(crate) fn into_checkout_failure(self) -> Self {
        match self {
            Error::Storage(e) => Error::CheckoutTransactionFailed(e),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.into())
    }
}
