//! Connector contract every PMS vendor adapter implements. A connector
//! declares its [`ConnectorCapabilities`] up front; operations it doesn't
//! advertise fall back to a `NotSupported` default rather than requiring
//! every adapter to implement the full surface.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::Stream;

use super::types::{
    AvailabilityGrid, ConnectorCapabilities, ConnectorHealth, GuestProfile, NewReservation,
    RateQuote, Reservation, ReservationPatch,
};
use crate::error::Error;

pub type ReservationStream = Pin<Box<dyn Stream<Item = Result<Reservation, Error>> + Send>>;

/// How a guest-search request is framed — exactly one of these per call.
#[derive(Debug, Clone)]
pub enum GuestSearchQuery {
    Email(String),
    Name { first_name: String, last_name: String },
    Loyalty(String),
}

fn not_supported(op: &str) -> Error {
    Error::NotSupported(format!("connector does not advertise '{op}'"))
}

#[async_trait]
pub trait PmsConnector: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> ConnectorCapabilities;

    async fn get_availability(
        &self,
        _hotel_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
        _guest_count: Option<u32>,
        _room_type: Option<&str>,
    ) -> Result<AvailabilityGrid, Error> {
        Err(not_supported("availability"))
    }

    async fn quote_rate(
        &self,
        _hotel_id: &str,
        _room_type: &str,
        _rate_code: &str,
        _arrival: NaiveDate,
        _departure: NaiveDate,
        _guest_count: u32,
        _currency: &str,
    ) -> Result<RateQuote, Error> {
        Err(not_supported("rates"))
    }

    async fn create_reservation(&self, _req: NewReservation) -> Result<Reservation, Error> {
        Err(not_supported("reservations"))
    }

    async fn get_reservation(&self, _reservation_id: &str) -> Result<Reservation, Error> {
        Err(not_supported("reservations"))
    }

    async fn modify_reservation(
        &self,
        _reservation_id: &str,
        _patch: ReservationPatch,
    ) -> Result<Reservation, Error> {
        Err(not_supported("modifications"))
    }

    async fn cancel_reservation(&self, _reservation_id: &str, _reason: &str) -> Result<(), Error> {
        Err(not_supported("cancellations"))
    }

    async fn search_guest(&self, _query: GuestSearchQuery) -> Result<Vec<GuestProfile>, Error> {
        Err(not_supported("guest_search"))
    }

    async fn upsert_guest_profile(&self, _profile: GuestProfile) -> Result<GuestProfile, Error> {
        Err(not_supported("guest_search"))
    }

    async fn stream_arrivals(&self, _hotel_id: &str, _date: NaiveDate) -> Result<ReservationStream, Error> {
        Err(not_supported("stream_arrivals"))
    }

    async fn stream_in_house(&self, _hotel_id: &str) -> Result<ReservationStream, Error> {
        Err(not_supported("stream_in_house"))
    }

    async fn health_check(&self) -> ConnectorHealth;
}
