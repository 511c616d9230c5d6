use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};
use tripnest_core::repository::{Query, RecordStore, Row, StoreError, RESERVATIONS};
use tripnest_core::rules::CancelledPolicy;
use tripnest_core::{BookingError, ConflictInfo};
use tripnest_shared::models::day::parse_day;
use tripnest_shared::ReservationStatus;

/// Days held by an existing reservation, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSpan {
    pub reservation_id: String,
    pub start: NaiveDate,
    /// First day that is free again.
    pub end: NaiveDate,
    pub status: ReservationStatus,
}

impl BookedSpan {
    pub fn new(
        reservation_id: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        status: ReservationStatus,
    ) -> Self {
        Self {
            reservation_id: reservation_id.into(),
            start,
            end,
            status,
        }
    }

    /// Lenient row decoding: only the two dates are required. A missing or
    /// unknown status counts as `pending` so the row keeps blocking.
    pub fn from_row(row: &Row) -> Option<Self> {
        let start = row.get("start_date").and_then(Value::as_str).and_then(parse_day)?;
        let end = row.get("end_date").and_then(Value::as_str).and_then(parse_day)?;
        let reservation_id = row
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = row
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(ReservationStatus::Pending);

        Some(Self {
            reservation_id,
            start,
            end,
            status,
        })
    }

    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

/// Decides whether a candidate stay overlaps the destination's reservations.
///
/// The scan is day by day over the candidate range, which is fine for the
/// handful of reservations a single destination carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityChecker {
    policy: CancelledPolicy,
}

impl AvailabilityChecker {
    pub fn new(policy: CancelledPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CancelledPolicy {
        self.policy
    }

    fn blocks(&self, span: &BookedSpan) -> bool {
        match self.policy {
            CancelledPolicy::Block => true,
            CancelledPolicy::Ignore => span.status != ReservationStatus::Cancelled,
        }
    }

    /// Rows whose dates do not parse are left out (fail-open).
    pub fn spans(&self, rows: &[Row]) -> Vec<BookedSpan> {
        rows.iter()
            .filter_map(|row| {
                let span = BookedSpan::from_row(row);
                if span.is_none() {
                    let id = row.get("id").and_then(serde_json::Value::as_str).unwrap_or("<unknown>");
                    warn!("Skipping reservation {} with unreadable dates", id);
                }
                span
            })
            .filter(|span| self.blocks(span))
            .collect()
    }

    /// First reservation holding any day of `[start, end]` (inclusive).
    pub fn find_conflict<'a>(
        &self,
        spans: &'a [BookedSpan],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<&'a BookedSpan> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .find_map(|day| spans.iter().find(|span| self.blocks(span) && span.covers(day)))
    }

    pub fn is_reserved(&self, spans: &[BookedSpan], day: NaiveDate) -> bool {
        spans.iter().any(|span| self.blocks(span) && span.covers(day))
    }

    /// Reserved days in `[from, to]`, for calendar highlighting.
    pub fn reserved_days(
        &self,
        spans: &[BookedSpan],
        from: NaiveDate,
        to: NaiveDate,
    ) -> BTreeSet<NaiveDate> {
        from.iter_days()
            .take_while(|day| *day <= to)
            .filter(|day| self.is_reserved(spans, *day))
            .collect()
    }

    pub async fn load(
        &self,
        store: &dyn RecordStore,
        destination_id: &str,
    ) -> Result<Vec<BookedSpan>, StoreError> {
        let query = Query::table(RESERVATIONS).where_eq("destination_id", destination_id);
        let rows = store.query(&query).await?;
        let spans = self.spans(&rows);
        debug!(
            "Loaded {} blocking spans for destination {} ({} rows)",
            spans.len(),
            destination_id,
            rows.len()
        );
        Ok(spans)
    }

    /// Fetch the destination's reservations and reject `[start, end]` if any day is taken.
    pub async fn check(
        &self,
        store: &dyn RecordStore,
        destination_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), BookingError> {
        let spans = self.load(store, destination_id).await?;
        match self.find_conflict(&spans, start, end) {
            Some(span) => Err(BookingError::Conflict(ConflictInfo::Detected {
                start,
                end,
                reservation_id: span.reservation_id.clone(),
            })),
            None => Ok(()),
        }
    }
}
