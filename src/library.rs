//! Local track library: the `Track` model, directory scanning and the
//! ordered registry of downloaded tracks.

mod display;
mod model;
mod registry;
mod scan;

pub use display::format_time;
pub use model::*;
pub use registry::{RegistryError, TrackRegistry};
pub(crate) use scan::{is_audio_file, tag_artists};

#[cfg(test)]
mod tests;
