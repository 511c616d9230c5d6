pub mod models;
pub mod pii;

pub use models::events::{CancelReason, ReservationEvent};
pub use models::reservation::{NewReservation, Reservation, ReservationStatus};
