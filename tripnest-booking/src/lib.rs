pub mod availability;
pub mod expiry;
pub mod manager;
pub mod orchestrator;
pub mod pricing;
pub mod scope;
pub mod selector;

pub use availability::{AvailabilityChecker, BookedSpan};
pub use manager::{CreatedReservation, ReservationManager};
pub use orchestrator::{MockPaymentGateway, PaymentOrchestrator};
pub use scope::ViewScope;
pub use selector::{DateRangeSelector, Selection, TapOutcome};
