//! Configuration module for bot playback and cache settings

mod settings;

pub use settings::*;
