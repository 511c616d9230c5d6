use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::day;

/// Reservation status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            "completed" => Ok(ReservationStatus::Completed),
            other => Err(format!("unknown reservation status: {}", other)),
        }
    }
}

/// A stay at a destination, as persisted by the record store.
///
/// The store owns reservations; values of this type are transient copies
/// that are only as fresh as the last fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub destination_id: String,
    #[serde(with = "day::as_timestamp")]
    pub start_date: NaiveDate,
    #[serde(with = "day::as_timestamp")]
    pub end_date: NaiveDate,
    pub number_of_people: u32,
    pub total_price: f64,
    pub status: ReservationStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Booking request before the store has assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReservation {
    pub destination_id: String,
    #[serde(with = "day::as_timestamp")]
    pub start_date: NaiveDate,
    #[serde(with = "day::as_timestamp")]
    pub end_date: NaiveDate,
    pub number_of_people: u32,
    pub total_price: f64,
}

impl NewReservation {
    pub fn new(
        destination_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        number_of_people: u32,
        total_price: f64,
    ) -> Self {
        Self {
            destination_id: destination_id.into(),
            start_date,
            end_date,
            number_of_people,
            total_price,
        }
    }

    /// Field map for a fresh `pending` row owned by `user_id`.
    pub fn to_row(&self, user_id: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut row = serde_json::Map::new();
        row.insert("user_id".into(), user_id.into());
        row.insert("destination_id".into(), self.destination_id.clone().into());
        row.insert("start_date".into(), day::day_boundary(self.start_date).into());
        row.insert("end_date".into(), day::day_boundary(self.end_date).into());
        row.insert("number_of_people".into(), self.number_of_people.into());
        row.insert("total_price".into(), serde_json::json!(self.total_price));
        row.insert("status".into(), ReservationStatus::Pending.as_str().into());
        row.insert("payment_reference".into(), serde_json::Value::Null);
        row
    }
}
