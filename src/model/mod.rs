mod blocks;
mod padding;
mod unet;

pub use blocks::{
    ConvBlock, ConvBlockConfig, ThinUnetDownBlock, ThinUnetDownBlockConfig, ThinUnetUpBlock,
    ThinUnetUpBlockConfig,
};

pub use padding::{pad_to_divisor, padding_for};
pub use unet::{DEFAULT_DESC_DIM, Unet, UnetConfig};
