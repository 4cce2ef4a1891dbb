//! Active project switching.

mod broadcast;
mod coordinator;

pub use broadcast::{SelectionBroadcaster, SelectionEvent};
pub use coordinator::SwitchCoordinator;
