//! vnq-broker
//!
//! The signed REST broker adapter and the resilient WebSocket market-data
//! client.

pub mod auth;
pub mod rest_adapter;
pub mod ws_client;

pub use auth::{AuthError, TokenState, TOKEN_REFRESH_BUFFER};
pub use rest_adapter::{parse_order_type, SsiRestBroker, SsiRestBrokerConfig};
pub use ws_client::{parse_tick_message, ConnectionState, MarketDataClient};
