use burn::{
    nn::{
        InstanceNorm, InstanceNormConfig, PRelu, PReluConfig,
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};
use nn::PaddingConfig2d;

/// Instance norm, PReLU, then a same-size convolution.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    norm: InstanceNorm<B>,
    activation: PRelu<B>,
    conv: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.norm.forward(x);
        let x = self.activation.forward(x);

        self.conv.forward(x)
    }

    pub fn in_channels(&self) -> usize {
        self.conv.weight.dims()[1] * self.conv.groups
    }

    pub fn out_channels(&self) -> usize {
        self.conv.weight.dims()[0]
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "5")]
    size: usize,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let padding = self.size / 2;

        ConvBlock {
            norm: InstanceNormConfig::new(self.input_channels)
                .with_affine(false)
                .init(device),
            activation: PReluConfig::new()
                .with_num_parameters(self.input_channels)
                .init(device),
            conv: Conv2dConfig::new(
                [self.input_channels, self.num_filters],
                [self.size, self.size],
            )
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .init(device),
        }
    }
}

/// Encoder stage of the thin U-Net.
///
/// Every block but the first halves the resolution with a 2x2 average pool
/// before its convolution.
#[derive(Module, Debug)]
pub struct ThinUnetDownBlock<B: Backend> {
    downsample: Option<AvgPool2d>,
    conv_block: ConvBlock<B>,
}

impl<B: Backend> ThinUnetDownBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.downsample {
            Some(pool) => pool.forward(x),
            None => x,
        };

        self.conv_block.forward(x)
    }

    pub fn is_first(&self) -> bool {
        self.downsample.is_none()
    }

    pub fn in_channels(&self) -> usize {
        self.conv_block.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.conv_block.out_channels()
    }
}

#[derive(Config, Debug)]
pub struct ThinUnetDownBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "5")]
    size: usize,
    #[config(default = "false")]
    is_first: bool,
}

impl ThinUnetDownBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ThinUnetDownBlock<B> {
        let downsample = (!self.is_first)
            .then(|| AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init());

        ThinUnetDownBlock {
            downsample,
            conv_block: ConvBlockConfig::new(self.input_channels, self.num_filters)
                .with_size(self.size)
                .init(device),
        }
    }
}

/// Decoder stage of the thin U-Net.
///
/// Upsamples the bottom map 2x, stacks the horizontal map on top of it along
/// the channel axis and convolves the result.
#[derive(Module, Debug)]
pub struct ThinUnetUpBlock<B: Backend> {
    conv_block: ConvBlock<B>,
    bottom_channels: usize,
}

impl<B: Backend> ThinUnetUpBlock<B> {
    pub fn forward(&self, bottom: Tensor<B, 4>, horizontal: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = bottom.dims();
        let bottom = interpolate(
            bottom,
            [height * 2, width * 2],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        let x = Tensor::cat(vec![bottom, horizontal], 1);

        self.conv_block.forward(x)
    }

    pub fn bottom_channels(&self) -> usize {
        self.bottom_channels
    }

    pub fn horizontal_channels(&self) -> usize {
        self.conv_block.in_channels() - self.bottom_channels
    }

    pub fn out_channels(&self) -> usize {
        self.conv_block.out_channels()
    }
}

#[derive(Config, Debug)]
pub struct ThinUnetUpBlockConfig {
    bottom_channels: usize,
    horizontal_channels: usize,
    num_filters: usize,
    #[config(default = "5")]
    size: usize,
}

impl ThinUnetUpBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ThinUnetUpBlock<B> {
        ThinUnetUpBlock {
            conv_block: ConvBlockConfig::new(
                self.bottom_channels + self.horizontal_channels,
                self.num_filters,
            )
            .with_size(self.size)
            .init(device),
            bottom_channels: self.bottom_channels,
        }
    }
}
