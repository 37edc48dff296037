//! Application module: the view model the TUI draws and the runtime mutates.
//!
//! The `App` model lives in `app::model`. It mirrors what the session
//! publishes and adds purely visual state (tabs, cursors, input buffers).

mod model;

pub use model::*;

#[cfg(test)]
mod tests;
