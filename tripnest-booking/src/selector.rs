use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};
use tripnest_core::repository::RecordStore;
use tripnest_core::{BookingError, ConflictInfo};

use crate::availability::{AvailabilityChecker, BookedSpan};
use crate::pricing;

/// Two-tap range selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    StartSelected {
        start: NaiveDate,
    },
    BothSelected {
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// What a single tap did to the selection.
#[derive(Debug)]
pub enum TapOutcome {
    /// Day is in the past or reserved; nothing changed.
    Disabled,
    Started(NaiveDate),
    /// A start was replaced, either because the tap preceded it or because
    /// a full range was already chosen.
    Restarted(NaiveDate),
    Completed { start: NaiveDate, end: NaiveDate },
    /// The range crossed a reserved day and the selection was discarded.
    Rejected(BookingError),
}

/// Calendar-side range picker for one destination.
///
/// Holds the destination's blocking spans as of the last fetch and never
/// writes anything; the chosen range is handed to the lifecycle manager.
#[derive(Debug, Clone)]
pub struct DateRangeSelector {
    destination_id: String,
    today: NaiveDate,
    checker: AvailabilityChecker,
    spans: Vec<BookedSpan>,
    selection: Selection,
    visible_month: NaiveDate,
}

impl DateRangeSelector {
    pub fn new(destination_id: impl Into<String>, today: NaiveDate, checker: AvailabilityChecker) -> Self {
        Self {
            destination_id: destination_id.into(),
            today,
            checker,
            spans: Vec::new(),
            selection: Selection::None,
            visible_month: first_of_month(today),
        }
    }

    pub fn with_spans(mut self, spans: Vec<BookedSpan>) -> Self {
        self.spans = spans;
        self
    }

    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn visible_month(&self) -> NaiveDate {
        self.visible_month
    }

    pub fn spans(&self) -> &[BookedSpan] {
        &self.spans
    }

    pub fn selected_start_date(&self) -> Option<NaiveDate> {
        match self.selection {
            Selection::None => None,
            Selection::StartSelected { start } | Selection::BothSelected { start, .. } => Some(start),
        }
    }

    /// Equals the start until a second day is chosen.
    pub fn selected_end_date(&self) -> Option<NaiveDate> {
        match self.selection {
            Selection::None => None,
            Selection::StartSelected { start } => Some(start),
            Selection::BothSelected { end, .. } => Some(end),
        }
    }

    /// Price of the completed range. `None` until both days are chosen.
    pub fn quote(&self, nightly_rate: f64, people: u32) -> Option<f64> {
        match self.selection {
            Selection::BothSelected { start, end } => Some(pricing::quote(nightly_rate, start, end, people)),
            _ => None,
        }
    }

    pub fn is_disabled(&self, day: NaiveDate) -> bool {
        day < self.today || self.checker.is_reserved(&self.spans, day)
    }

    pub fn tap(&mut self, day: NaiveDate) -> TapOutcome {
        if self.is_disabled(day) {
            return TapOutcome::Disabled;
        }

        match self.selection {
            Selection::None => {
                self.selection = Selection::StartSelected { start: day };
                TapOutcome::Started(day)
            }
            Selection::StartSelected { start } if day < start => {
                self.selection = Selection::StartSelected { start: day };
                TapOutcome::Restarted(day)
            }
            Selection::StartSelected { start } => self.complete(start, day),
            Selection::BothSelected { .. } => {
                self.selection = Selection::StartSelected { start: day };
                TapOutcome::Restarted(day)
            }
        }
    }

    fn complete(&mut self, start: NaiveDate, end: NaiveDate) -> TapOutcome {
        if let Some(span) = self.checker.find_conflict(&self.spans, start, end) {
            info!(
                "Selection {} to {} for destination {} overlaps reservation {}",
                start, end, self.destination_id, span.reservation_id
            );
            let err = BookingError::Conflict(ConflictInfo::Detected {
                start,
                end,
                reservation_id: span.reservation_id.clone(),
            });
            self.selection = Selection::None;
            return TapOutcome::Rejected(err);
        }

        self.selection = Selection::BothSelected { start, end };
        TapOutcome::Completed { start, end }
    }

    pub fn clear(&mut self) {
        self.selection = Selection::None;
    }

    /// Show another month. The selection is kept; the reservation set is
    /// fetched again so highlighting reflects the store.
    pub async fn change_month(
        &mut self,
        store: &dyn RecordStore,
        year: i32,
        month: u32,
    ) -> Result<(), BookingError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BookingError::Validation(format!("no such month: {}-{}", year, month)))?;
        self.visible_month = first;
        debug!("Calendar for {} moved to {}", self.destination_id, first);
        self.reload(store).await
    }

    /// Re-fetch the destination's reservations. On failure the previous
    /// spans stay in place.
    pub async fn reload(&mut self, store: &dyn RecordStore) -> Result<(), BookingError> {
        match self.checker.load(store, &self.destination_id).await {
            Ok(spans) => {
                self.spans = spans;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Keeping stale availability for {}: {}",
                    self.destination_id, e
                );
                Err(e.into())
            }
        }
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
