mod broadcast;
mod connection;
mod registry;
mod room;

pub use broadcast::BroadcastGroup;
pub use connection::{ClientConnection, ConnectionState};
pub use registry::{RoomRegistry, SyncStats};
pub use room::{RoomStats, SyncRoom};
