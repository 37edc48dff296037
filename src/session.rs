//! Player session core: the single owner of "what is loaded, at which index,
//! and is it playing", shared by the UI loop, the media-session callbacks and
//! the download workers.

mod controller;
mod error;
mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use state::{PlaybackState, SessionSnapshot};
