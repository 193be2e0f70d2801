pub mod channel;
pub mod protocol;
pub mod state;
pub mod transport;

pub use channel::{ChannelManager, DEFAULT_RECONNECT_DELAY};
pub use protocol::{ClientCommand, ServerMessage};
pub use state::{ChannelEvent, ChannelState, Effect};
pub use transport::{Connection, Transport, WsConnection, WsTransport};
