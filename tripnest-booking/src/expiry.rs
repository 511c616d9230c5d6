use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tripnest_core::repository::{Query, RESERVATIONS};
use tripnest_core::BookingError;
use tripnest_shared::{CancelReason, ReservationEvent, ReservationStatus};

use crate::manager::{cancellation_patch, decode, ReservationManager};

impl ReservationManager {
    /// Cancel every `pending` reservation older than the configured TTL.
    ///
    /// Covers reservations whose payment never settled. Returns the ids that
    /// were expired by this sweep.
    pub async fn expire_abandoned(&self, now: DateTime<Utc>) -> Result<Vec<String>, BookingError> {
        let ttl = chrono::Duration::from_std(self.rules.pending_ttl())
            .map_err(|e| BookingError::Validation(format!("pending ttl out of range: {}", e)))?;
        let cutoff = now.checked_sub_signed(ttl).ok_or_else(|| {
            BookingError::Validation(format!("pending ttl of {}s is out of range", ttl.num_seconds()))
        })?;

        let query = Query::table(RESERVATIONS)
            .where_eq("status", ReservationStatus::Pending.as_str())
            .order_asc("created_at");
        let rows = self.store.query(&query).await?;

        let mut expired = Vec::new();
        for row in rows {
            let reservation = match decode(row) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Skipping unreadable pending reservation: {}", e);
                    continue;
                }
            };
            if reservation.created_at > cutoff {
                continue;
            }

            match self
                .update_pending(&reservation.id, None, cancellation_patch())
                .await?
            {
                Some(_) => {
                    info!(
                        "Expired reservation {} (pending since {})",
                        reservation.id, reservation.created_at
                    );
                    self.emit(ReservationEvent::Cancelled {
                        reservation_id: reservation.id.clone(),
                        reason: CancelReason::Expired,
                        timestamp: now.timestamp(),
                    });
                    expired.push(reservation.id);
                }
                None => debug!("Reservation {} settled before it could expire", reservation.id),
            }
        }

        Ok(expired)
    }
}
