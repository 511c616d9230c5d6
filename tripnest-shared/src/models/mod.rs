pub mod day;
pub mod events;
pub mod reservation;
