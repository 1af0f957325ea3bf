//! Audio module: the volume/metering relay wrapped around the decoded
//! PCM stream on its way to the voice transport.

mod error;
mod relay;
#[cfg(test)]
mod tests;

pub use error::*;
pub use relay::*;
