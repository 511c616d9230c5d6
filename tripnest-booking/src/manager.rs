use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tripnest_core::payment::{PaymentGateway, PaymentIntent};
use tripnest_core::repository::{Filter, Query, RecordStore, Row, StoreError, RESERVATIONS};
use tripnest_core::rules::BookingRules;
use tripnest_core::session::UserContext;
use tripnest_core::BookingError;
use tripnest_shared::{CancelReason, NewReservation, Reservation, ReservationEvent, ReservationStatus};

use crate::availability::AvailabilityChecker;
use crate::orchestrator::PaymentOrchestrator;
use crate::pricing::to_minor_units;

const EVENT_CAPACITY: usize = 64;

/// A freshly written reservation together with the intent the guest pays against.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub payment: PaymentIntent,
}

/// Manages reservation lifecycle and state transitions against the record store.
///
/// Transitions: `pending → confirmed`, `pending → cancelled`. `confirmed` and
/// `completed` reservations cannot be cancelled from here.
pub struct ReservationManager {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) orchestrator: PaymentOrchestrator,
    pub(crate) checker: AvailabilityChecker,
    pub(crate) rules: BookingRules,
    pub(crate) events: broadcast::Sender<ReservationEvent>,
}

impl ReservationManager {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn PaymentGateway>,
        rules: BookingRules,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            orchestrator: PaymentOrchestrator::new(gateway, rules.currency.clone()),
            checker: AvailabilityChecker::new(rules.cancelled_reservations),
            rules,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReservationEvent> {
        self.events.subscribe()
    }

    pub fn checker(&self) -> AvailabilityChecker {
        self.checker
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub(crate) fn emit(&self, event: ReservationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Write a `pending` reservation and open a payment intent for it.
    ///
    /// The availability read and the insert are not atomic. Concurrent
    /// overlapping bookings are only stopped by the store's exclusion
    /// constraint, which surfaces here as a conflict.
    pub async fn create(
        &self,
        ctx: &UserContext,
        request: NewReservation,
    ) -> Result<CreatedReservation, BookingError> {
        validate(ctx, &request)?;

        self.checker
            .check(
                self.store.as_ref(),
                &request.destination_id,
                request.start_date,
                request.end_date,
            )
            .await?;

        let row = self
            .store
            .insert(RESERVATIONS, request.to_row(&ctx.user_id))
            .await?;
        let reservation = decode(row)?;
        info!(
            "Reservation {} created for {} at {} ({} to {})",
            reservation.id,
            ctx.user_id,
            reservation.destination_id,
            reservation.start_date,
            reservation.end_date
        );
        self.emit(ReservationEvent::Created {
            reservation_id: reservation.id.clone(),
            user_id: reservation.user_id.clone(),
            destination_id: reservation.destination_id.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        });

        let payment = match self.orchestrator.initialize_payment(reservation.total_price).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Reservation {} left pending without payment: {}", reservation.id, e);
                return Err(BookingError::unconfirmed(&reservation.id, e));
            }
        };

        let mut patch = Row::new();
        patch.insert("payment_reference".into(), payment.reference.clone().into());
        let reservation = match self.update_pending(&reservation.id, None, patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                warn!("Reservation {} stopped being pending before payment was attached", reservation.id);
                return Err(BookingError::unconfirmed(
                    &reservation.id,
                    BookingError::NotFound(reservation.id.clone()),
                ));
            }
            Err(e) => return Err(BookingError::unconfirmed(&reservation.id, e)),
        };

        info!("Attached payment {} to reservation {}", payment.reference, reservation.id);
        self.emit(ReservationEvent::PaymentAttached {
            reservation_id: reservation.id.clone(),
            payment_reference: payment.reference.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        });

        Ok(CreatedReservation {
            reservation,
            payment,
        })
    }

    /// Transition: Pending → Confirmed, after the gateway accepted the payment.
    ///
    /// Repeating the call with the same reference returns the confirmed
    /// reservation without writing again.
    pub async fn confirm(
        &self,
        ctx: &UserContext,
        reservation_id: &str,
        payment_reference: &str,
    ) -> Result<Reservation, BookingError> {
        if payment_reference.trim().is_empty() {
            return Err(BookingError::Validation("payment reference is required".into()));
        }

        let current = self.fetch(ctx, reservation_id).await?;
        if already_confirmed(&current, payment_reference)? {
            info!("Reservation {} already confirmed with {}", reservation_id, payment_reference);
            return Ok(current);
        }

        let mut patch = Row::new();
        patch.insert("status".into(), ReservationStatus::Confirmed.as_str().into());
        patch.insert("payment_reference".into(), payment_reference.into());

        match self
            .update_pending(reservation_id, Some(&ctx.user_id), patch)
            .await?
        {
            Some(confirmed) => {
                info!("Reservation {} confirmed with {}", reservation_id, payment_reference);
                self.emit(ReservationEvent::Confirmed {
                    reservation_id: confirmed.id.clone(),
                    payment_reference: payment_reference.to_string(),
                    timestamp: chrono::Utc::now().timestamp(),
                });
                Ok(confirmed)
            }
            None => {
                // Someone else moved it first
                let current = self.fetch(ctx, reservation_id).await?;
                if already_confirmed(&current, payment_reference)? {
                    Ok(current)
                } else {
                    Err(BookingError::InvalidTransition {
                        from: current.status,
                        to: ReservationStatus::Confirmed,
                    })
                }
            }
        }
    }

    /// Pay for a pending reservation and confirm it.
    ///
    /// A reservation already confirmed with this intent is returned as is;
    /// the payment is never submitted twice. A decline leaves it `pending`.
    pub async fn checkout(
        &self,
        ctx: &UserContext,
        reservation_id: &str,
        intent: &PaymentIntent,
        payment_method: &str,
    ) -> Result<Reservation, BookingError> {
        let current = self.fetch(ctx, reservation_id).await?;
        if already_confirmed(&current, &intent.reference)? {
            return Ok(current);
        }

        self.orchestrator.confirm_payment(intent, payment_method).await?;

        self.confirm(ctx, reservation_id, &intent.reference)
            .await
            .map_err(|e| {
                warn!(
                    "Payment {} succeeded but reservation {} was not confirmed: {}",
                    intent.reference, reservation_id, e
                );
                BookingError::unconfirmed(reservation_id, e)
            })
    }

    /// Transition: Pending → Cancelled. Clears the payment reference.
    pub async fn cancel(&self, ctx: &UserContext, reservation_id: &str) -> Result<Reservation, BookingError> {
        let current = self.fetch(ctx, reservation_id).await?;
        match current.status {
            ReservationStatus::Pending => {}
            ReservationStatus::Cancelled => return Ok(current),
            from => {
                return Err(BookingError::InvalidTransition {
                    from,
                    to: ReservationStatus::Cancelled,
                })
            }
        }

        match self
            .update_pending(reservation_id, Some(&ctx.user_id), cancellation_patch())
            .await?
        {
            Some(cancelled) => {
                info!("Reservation {} cancelled by {}", reservation_id, ctx.user_id);
                self.emit(ReservationEvent::Cancelled {
                    reservation_id: cancelled.id.clone(),
                    reason: CancelReason::UserRequested,
                    timestamp: chrono::Utc::now().timestamp(),
                });
                Ok(cancelled)
            }
            None => {
                let current = self.fetch(ctx, reservation_id).await?;
                match current.status {
                    ReservationStatus::Cancelled => Ok(current),
                    from => Err(BookingError::InvalidTransition {
                        from,
                        to: ReservationStatus::Cancelled,
                    }),
                }
            }
        }
    }

    pub async fn get(&self, ctx: &UserContext, reservation_id: &str) -> Result<Reservation, BookingError> {
        self.fetch(ctx, reservation_id).await
    }

    /// The guest's reservations, newest first.
    pub async fn list(&self, ctx: &UserContext) -> Result<Vec<Reservation>, BookingError> {
        let query = Query::table(RESERVATIONS)
            .where_eq("user_id", ctx.user_id.as_str())
            .order_desc("created_at");
        let rows = self.store.query(&query).await?;

        let mut reservations = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn fetch(&self, ctx: &UserContext, reservation_id: &str) -> Result<Reservation, BookingError> {
        let query = Query::table(RESERVATIONS)
            .where_eq("id", reservation_id)
            .where_eq("user_id", ctx.user_id.as_str());
        let row = self
            .store
            .query(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::NotFound(reservation_id.to_string()))?;
        Ok(decode(row)?)
    }

    /// Patch a reservation only while it is still `pending`.
    /// `Ok(None)` means the guard did not match.
    pub(crate) async fn update_pending(
        &self,
        reservation_id: &str,
        user_id: Option<&str>,
        patch: Row,
    ) -> Result<Option<Reservation>, BookingError> {
        let mut filters = vec![
            Filter::equals("id", reservation_id),
            Filter::equals("status", ReservationStatus::Pending.as_str()),
        ];
        if let Some(user_id) = user_id {
            filters.push(Filter::equals("user_id", user_id));
        }

        let rows = self.store.update(RESERVATIONS, &filters, patch).await?;
        rows.into_iter()
            .next()
            .map(decode)
            .transpose()
            .map_err(BookingError::from)
    }
}

pub(crate) fn cancellation_patch() -> Row {
    let mut patch = Row::new();
    patch.insert("status".into(), ReservationStatus::Cancelled.as_str().into());
    patch.insert("payment_reference".into(), Value::Null);
    patch
}

/// `true` when the reservation is confirmed with exactly this reference.
fn already_confirmed(current: &Reservation, payment_reference: &str) -> Result<bool, BookingError> {
    match current.status {
        ReservationStatus::Pending => Ok(false),
        ReservationStatus::Confirmed if current.payment_reference.as_deref() == Some(payment_reference) => {
            Ok(true)
        }
        from => Err(BookingError::InvalidTransition {
            from,
            to: ReservationStatus::Confirmed,
        }),
    }
}

pub(crate) fn decode(row: Row) -> Result<Reservation, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn validate(ctx: &UserContext, request: &NewReservation) -> Result<(), BookingError> {
    if ctx.user_id.trim().is_empty() {
        return Err(BookingError::Validation("user id is required".into()));
    }
    if request.destination_id.trim().is_empty() {
        return Err(BookingError::Validation("destination id is required".into()));
    }
    if request.start_date > request.end_date {
        return Err(BookingError::Validation(format!(
            "start date {} is after end date {}",
            request.start_date, request.end_date
        )));
    }
    if request.number_of_people == 0 {
        return Err(BookingError::Validation("number of people must be at least 1".into()));
    }
    if request.total_price < 0.0 || to_minor_units(request.total_price).is_none() {
        return Err(BookingError::Validation(format!(
            "total price {} is not a valid amount",
            request.total_price
        )));
    }
    Ok(())
}
