// Managers Module
//
// - BroadcastChannelManager: tokio broadcast channel carrying cycle reports
//   from the poll controller to the presentation side

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
