use serde::{Deserialize, Serialize};

/// Why a reservation left the active states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserRequested,
    Expired,
}

/// Lifecycle notifications broadcast to whatever UI layer is listening.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationEvent {
    Created {
        reservation_id: String,
        user_id: String,
        destination_id: String,
        timestamp: i64,
    },
    PaymentAttached {
        reservation_id: String,
        payment_reference: String,
        timestamp: i64,
    },
    Confirmed {
        reservation_id: String,
        payment_reference: String,
        timestamp: i64,
    },
    Cancelled {
        reservation_id: String,
        reason: CancelReason,
        timestamp: i64,
    },
}

impl ReservationEvent {
    pub fn reservation_id(&self) -> &str {
        match self {
            ReservationEvent::Created { reservation_id, .. }
            | ReservationEvent::PaymentAttached { reservation_id, .. }
            | ReservationEvent::Confirmed { reservation_id, .. }
            | ReservationEvent::Cancelled { reservation_id, .. } => reservation_id,
        }
    }
}
