//! Unified error codes for the canteen service
//!
//! Error codes are organized by range:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Catalog errors (food items, forms)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as `u16` on the wire so clients can switch on the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Identity provider rejected the login or could not be reached
    AuthorizationFailed = 1010,
    /// Email domain is not the organization domain
    EmailDomainNotAllowed = 1011,
    /// Identity provider returned no email address
    EmailMissing = 1012,
    /// Too many attempts from the same client
    TooManyAttempts = 1013,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is empty
    OrderEmpty = 4007,
    /// Profile already submitted an order for this form
    OrderAlreadySubmitted = 4008,
    /// Reservation not found
    ReservationNotFound = 4009,
    /// Form is not accepting orders
    FormNotActive = 4010,
    /// Weekday has no menu option in this form
    WeekdayNotOffered = 4011,
    /// Food item is not on that weekday's menu
    ItemNotOffered = 4012,
    /// Quantity outside the accepted range
    QuantityOutOfRange = 4013,
    /// A checkout was started for the order; payment may still arrive
    OrderCheckoutPending = 4014,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Payment gateway request failed
    PaymentGatewayError = 5010,
    /// Webhook signature missing or invalid
    WebhookSignatureInvalid = 5011,
    /// Webhook refers to an unknown checkout session
    WebhookSessionUnknown = 5012,
    /// Webhook body could not be understood
    WebhookPayloadInvalid = 5013,

    // ==================== 6xxx: Catalog ====================
    /// Food item not found
    FoodItemNotFound = 6001,
    /// Food item has an invalid price
    FoodItemInvalidPrice = 6002,
    /// Food item is referenced by a menu or an order
    FoodItemInUse = 6003,
    /// Food item category does not match the form category
    FoodItemCategoryMismatch = 6004,
    /// Form not found
    FormNotFound = 6010,
    /// Form has persisted orders
    FormHasOrders = 6011,
    /// Week identifier is not a valid ISO week
    InvalidWeek = 6012,
    /// Weekday listed twice in a form
    DuplicateWeekday = 6013,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Network error
    NetworkError = 9101,
    /// Timeout error
    TimeoutError = 9102,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::AuthorizationFailed => "Authentication failed. Please try again.",
            ErrorCode::EmailDomainNotAllowed => "Access denied. Invalid email domain.",
            ErrorCode::EmailMissing => "Identity provider returned no email address",
            ErrorCode::TooManyAttempts => "Too many attempts",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::OrderAlreadySubmitted => "An order was already submitted for this form",
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::FormNotActive => "Form is not accepting orders",
            ErrorCode::WeekdayNotOffered => "No menu is offered on that weekday",
            ErrorCode::ItemNotOffered => "Food item is not on that weekday's menu",
            ErrorCode::QuantityOutOfRange => "Quantity is out of range",
            ErrorCode::OrderCheckoutPending => "A payment was started for this order",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentGatewayError => "Payment gateway request failed",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",
            ErrorCode::WebhookSessionUnknown => "Webhook refers to an unknown checkout session",
            ErrorCode::WebhookPayloadInvalid => "Webhook payload is invalid",

            // Catalog
            ErrorCode::FoodItemNotFound => "Food item not found",
            ErrorCode::FoodItemInvalidPrice => "Food item price must not be negative",
            ErrorCode::FoodItemInUse => "Food item is used by a menu or an order",
            ErrorCode::FoodItemCategoryMismatch => "Food item category does not match the form",
            ErrorCode::FormNotFound => "Form not found",
            ErrorCode::FormHasOrders => "Form has orders and cannot be changed or deleted",
            ErrorCode::InvalidWeek => "Week must look like 2024-W01",
            ErrorCode::DuplicateWeekday => "Weekday appears more than once",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1010 => Ok(ErrorCode::AuthorizationFailed),
            1011 => Ok(ErrorCode::EmailDomainNotAllowed),
            1012 => Ok(ErrorCode::EmailMissing),
            1013 => Ok(ErrorCode::TooManyAttempts),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2003 => Ok(ErrorCode::AdminRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::OrderAlreadySubmitted),
            4009 => Ok(ErrorCode::ReservationNotFound),
            4010 => Ok(ErrorCode::FormNotActive),
            4011 => Ok(ErrorCode::WeekdayNotOffered),
            4012 => Ok(ErrorCode::ItemNotOffered),
            4013 => Ok(ErrorCode::QuantityOutOfRange),
            4014 => Ok(ErrorCode::OrderCheckoutPending),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5010 => Ok(ErrorCode::PaymentGatewayError),
            5011 => Ok(ErrorCode::WebhookSignatureInvalid),
            5012 => Ok(ErrorCode::WebhookSessionUnknown),
            5013 => Ok(ErrorCode::WebhookPayloadInvalid),

            // Catalog
            6001 => Ok(ErrorCode::FoodItemNotFound),
            6002 => Ok(ErrorCode::FoodItemInvalidPrice),
            6003 => Ok(ErrorCode::FoodItemInUse),
            6004 => Ok(ErrorCode::FoodItemCategoryMismatch),
            6010 => Ok(ErrorCode::FormNotFound),
            6011 => Ok(ErrorCode::FormHasOrders),
            6012 => Ok(ErrorCode::InvalidWeek),
            6013 => Ok(ErrorCode::DuplicateWeekday),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9101 => Ok(ErrorCode::NetworkError),
            9102 => Ok(ErrorCode::TimeoutError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}
