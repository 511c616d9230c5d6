pub mod payment;
pub mod repository;
pub mod rules;
pub mod session;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tripnest_shared::ReservationStatus;

use crate::payment::GatewayError;
use crate::repository::StoreError;

/// Where an availability conflict was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictInfo {
    /// Client-side day scan hit an existing reservation.
    Detected {
        start: NaiveDate,
        end: NaiveDate,
        reservation_id: String,
    },
    /// The store refused the write (exclusion constraint).
    Rejected(String),
}

impl fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictInfo::Detected {
                start,
                end,
                reservation_id,
            } => write!(
                f,
                "{} to {} overlaps reservation {}",
                start, end, reservation_id
            ),
            ConflictInfo::Rejected(detail) => write!(f, "store rejected overlapping stay ({})", detail),
        }
    }
}

/// Failure categories surfaced to callers and, eventually, to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ConflictError,
    StoreUnavailable,
    GatewayError,
    PaymentDeclined,
    NotFound,
    InvalidTransition,
    Abandoned,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Requested dates are not available: {0}")]
    Conflict(ConflictInfo),

    #[error("Reservation store unavailable: {0}")]
    StoreUnavailable(StoreError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Reservation {reservation_id} exists but is unconfirmed: {source}")]
    Unconfirmed {
        reservation_id: String,
        #[source]
        source: Box<BookingError>,
    },

    #[error("Reservation not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("Operation abandoned before it completed")]
    Abandoned,
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::ValidationError,
            BookingError::Conflict(_) => ErrorKind::ConflictError,
            BookingError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            BookingError::Gateway(_) => ErrorKind::GatewayError,
            BookingError::PaymentDeclined(_) => ErrorKind::PaymentDeclined,
            BookingError::Unconfirmed { source, .. } => source.kind(),
            BookingError::NotFound(_) => ErrorKind::NotFound,
            BookingError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            BookingError::Abandoned => ErrorKind::Abandoned,
        }
    }

    /// Id of a reservation that was written before the failure, if any.
    pub fn orphaned_reservation(&self) -> Option<&str> {
        match self {
            BookingError::Unconfirmed { reservation_id, .. } => Some(reservation_id),
            _ => None,
        }
    }

    /// The row was written but the payment step did not settle.
    pub fn unconfirmed(reservation_id: impl Into<String>, source: BookingError) -> Self {
        BookingError::Unconfirmed {
            reservation_id: reservation_id.into(),
            source: Box::new(source),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Overlap(detail) => BookingError::Conflict(ConflictInfo::Rejected(detail)),
            other => {
                tracing::error!("Reservation store failure: {}", other);
                BookingError::StoreUnavailable(other)
            }
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
