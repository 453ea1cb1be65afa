//! PMS Connector Contract: a vendor-agnostic trait every property
//! management system adapter implements, plus an Apaleo reference
//! adapter, client-credentials OAuth2 token management, and outbound
//! rate limiting.

pub mod apaleo;
pub mod connector;
pub mod oauth;
pub mod rate_limit;
pub mod types;

pub use apaleo::ApaleoConnector;
pub use connector::{GuestSearchQuery, PmsConnector, ReservationStream};
pub use oauth::OAuthTokenManager;
pub use rate_limit::OutboundRateLimiter;
pub use types::{
    AvailabilityGrid, ConnectorCapabilities, ConnectorHealth, GuestProfile, HealthStatus,
    NewReservation, RateQuote, Reservation, ReservationPatch, ReservationStatus, RoomAvailability,
};
