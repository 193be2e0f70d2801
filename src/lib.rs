pub mod config;
pub mod error;
pub mod operator;
pub mod snapshot;
pub mod store;
pub mod view;
pub mod ws;

// Re-export commonly used items
pub use config::Config;
pub use error::{AppError, Result};
pub use snapshot::{Alerts, HouseReading, PoleReading, SystemSnapshot, RELAY_COUNT};
pub use store::{CommandSink, RelayDispatch, TelemetryStore};
pub use ws::{ChannelManager, ChannelState, ClientCommand, ServerMessage, WsTransport};
