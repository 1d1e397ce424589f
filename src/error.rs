use thiserror::Error;

/// Errors raised while building or running a [`Unet`](crate::Unet).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnetError {
    /// `down` must hold exactly one more stage than `up`.
    #[error("`down` must be 1 item longer than `up` (got {down} down and {up} up stages)")]
    Config { down: usize, up: usize },

    #[error("Expected {expected} feature channels in input, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error(
        "Input image shape must be divisible by {divisor} (got {shape:?}). \
         Please pad if necessary."
    )]
    IndivisibleShape { divisor: usize, shape: [usize; 4] },
}
