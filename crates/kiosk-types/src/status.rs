use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Defines a fieldless enum together with its wire code: `as_str`, `Display`,
/// `FromStr` and serde all agree on the same strings.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $code, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $code => Ok($name::$variant), )+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

wire_enum! {
    /// The account action a verification code authorizes.
    Purpose, "purpose" {
        Signup => "signup",
        Login => "login",
        PasswordReset => "password_reset",
        Promotion => "promotion",
    }
}

impl Purpose {
    /// Whether consuming a code of this purpose marks the account verified.
    pub const fn verifies_account(self) -> bool {
        matches!(self, Purpose::Signup | Purpose::Login)
    }

    /// Human-readable label used in notification subjects.
    pub const fn label(self) -> &'static str {
        match self {
            Purpose::Signup => "signup",
            Purpose::Login => "login",
            Purpose::PasswordReset => "password reset",
            Purpose::Promotion => "promotion",
        }
    }
}

wire_enum! {
    /// Order lifecycle: placed -> paid -> shipped -> delivered, or cancelled.
    OrderStatus, "order status" {
        Placed => "placed",
        Paid => "paid",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Placed, OrderStatus::Paid)
                | (OrderStatus::Paid, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Placed, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

wire_enum! {
    PaymentMethod, "payment method" {
        /// Cash on delivery
        CashOnDelivery => "cod",
        JazzCash => "jazzcash",
        EasyPaisa => "easypaisa",
        BankTransfer => "bank",
    }
}

wire_enum! {
    /// Courier handling delivery.
    ShippingPartner, "shipping partner" {
        Leopard => "leopard",
        Tcs => "tcs",
        PkDex => "pkdex",
    }
}
