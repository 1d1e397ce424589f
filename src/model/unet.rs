use burn::prelude::*;

use crate::error::UnetError;

use super::blocks::{
    ThinUnetDownBlock, ThinUnetDownBlockConfig, ThinUnetUpBlock, ThinUnetUpBlockConfig,
};
use super::padding::pad_to_divisor;

/// Descriptor width of the pretrained DISK backbone.
pub const DEFAULT_DESC_DIM: usize = 128;

/// Thin U-Net feature backbone.
///
/// The encoder path keeps every intermediate feature map; the decoder path
/// walks them back youngest-first, merging each one into the running bottom
/// map until the input resolution is restored.
#[derive(Module, Debug)]
pub struct Unet<B: Backend> {
    path_down: Vec<ThinUnetDownBlock<B>>,
    path_up: Vec<ThinUnetUpBlock<B>>,
    in_features: usize,
    n_params: usize,
}

#[derive(Config, Debug)]
pub struct UnetConfig {
    #[config(default = "1")]
    in_features: usize,
    /// Output widths of the decoder stages.
    #[config(default = "Vec::new()")]
    up: Vec<usize>,
    /// Output widths of the encoder stages; one longer than `up`.
    #[config(default = "Vec::new()")]
    down: Vec<usize>,
    /// Convolution kernel size shared by every block.
    #[config(default = "5")]
    size: usize,
}

impl UnetConfig {
    /// Layout of the DISK detector backbone: `desc_dim` descriptor channels
    /// followed by one heatmap channel.
    pub fn disk(desc_dim: usize) -> Self {
        Self::new()
            .with_in_features(3)
            .with_size(5)
            .with_down(vec![16, 32, 64, 64, 64])
            .with_up(vec![64, 64, 64, desc_dim + 1])
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Unet<B>, UnetError> {
        if self.down.len() != self.up.len() + 1 {
            return Err(UnetError::Config {
                down: self.down.len(),
                up: self.up.len(),
            });
        }

        let down_dims: Vec<usize> = std::iter::once(self.in_features)
            .chain(self.down.iter().copied())
            .collect();

        let path_down: Vec<_> = down_dims
            .windows(2)
            .enumerate()
            .map(|(i, dims)| {
                ThinUnetDownBlockConfig::new(dims[0], dims[1])
                    .with_size(self.size)
                    .with_is_first(i == 0)
                    .init(device)
            })
            .collect();

        let bottom_dims = self.down.last().into_iter().chain(self.up.iter());
        let horizontal_dims = down_dims[..down_dims.len() - 1].iter().rev();

        let path_up: Vec<_> = bottom_dims
            .zip(horizontal_dims)
            .zip(self.up.iter())
            .map(|((&bottom, &horizontal), &out)| {
                ThinUnetUpBlockConfig::new(bottom, horizontal, out)
                    .with_size(self.size)
                    .init(device)
            })
            .collect();

        let mut unet = Unet {
            path_down,
            path_up,
            in_features: self.in_features,
            n_params: 0,
        };
        unet.n_params = unet.num_params();

        tracing::debug!(
            in_features = self.in_features,
            down = ?self.down,
            up = ?self.up,
            size = self.size,
            n_params = unet.n_params,
            "initialized unet"
        );

        Ok(unet)
    }
}

impl<B: Backend> Unet<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>, UnetError> {
        let shape = input.dims();
        let [_, channels, height, width] = shape;

        if channels != self.in_features {
            return Err(UnetError::ChannelMismatch {
                expected: self.in_features,
                actual: channels,
            });
        }

        let divisor = self.input_divisor();
        if height % divisor != 0 || width % divisor != 0 {
            return Err(UnetError::IndivisibleShape { divisor, shape });
        }

        // Horizontal maps, oldest first; `x` ends up as the bottom map.
        let mut features = Vec::with_capacity(self.path_down.len());
        let mut x = input;
        for block in &self.path_down {
            let next = block.forward(x.clone());
            features.push(x);
            x = next;
        }
        tracing::trace!(bottom = ?x.dims(), "encoder done");

        let mut bottom = x;
        for (block, horizontal) in self.path_up.iter().zip(features.into_iter().rev()) {
            bottom = block.forward(bottom, horizontal);
        }

        Ok(bottom)
    }

    /// Zero-pad `input` so its height and width satisfy [`Self::input_divisor`].
    pub fn pad_input(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        pad_to_divisor(input, self.input_divisor())
    }

    /// Spatial dimensions of the input must be multiples of this value.
    pub fn input_divisor(&self) -> usize {
        1 << self.path_up.len()
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Number of channels of the returned feature map.
    pub fn out_channels(&self) -> usize {
        self.path_up
            .last()
            .map(ThinUnetUpBlock::out_channels)
            .or_else(|| self.path_down.last().map(ThinUnetDownBlock::out_channels))
            .unwrap_or(self.in_features)
    }

    pub fn down(&self) -> Vec<usize> {
        self.path_down
            .iter()
            .map(ThinUnetDownBlock::out_channels)
            .collect()
    }

    pub fn up(&self) -> Vec<usize> {
        self.path_up
            .iter()
            .map(ThinUnetUpBlock::out_channels)
            .collect()
    }

    /// Total element count of all learnable parameters, taken at construction.
    pub fn n_params(&self) -> usize {
        self.n_params
    }

    pub fn path_down(&self) -> &[ThinUnetDownBlock<B>] {
        &self.path_down
    }

    pub fn path_up(&self) -> &[ThinUnetUpBlock<B>] {
        &self.path_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    fn small_config() -> UnetConfig {
        UnetConfig::new()
            .with_in_features(1)
            .with_down(vec![8, 16])
            .with_up(vec![8])
    }

    #[test]
    fn config_defaults() {
        let config = UnetConfig::new();
        assert_eq!(config.in_features, 1);
        assert!(config.up.is_empty());
        assert!(config.down.is_empty());
        assert_eq!(config.size, 5);
    }

    #[test]
    fn builds_one_block_per_stage() {
        let device = Default::default();
        let layouts: [(Vec<usize>, Vec<usize>); 4] = [
            (vec![4], vec![]),
            (vec![4, 6], vec![5]),
            (vec![4, 6, 8], vec![6, 3]),
            (vec![2, 2, 2, 2], vec![2, 2, 2]),
        ];

        for (down, up) in layouts {
            let unet = UnetConfig::new()
                .with_in_features(2)
                .with_size(3)
                .with_down(down.clone())
                .with_up(up.clone())
                .init::<B>(&device)
                .unwrap();

            assert_eq!(unet.path_down().len(), down.len());
            assert_eq!(unet.path_up().len(), up.len());
            assert_eq!(unet.down(), down);
            assert_eq!(unet.up(), up);
            assert_eq!(unet.input_divisor(), 1 << up.len());
        }
    }

    #[test]
    fn block_widths_follow_the_cascade() {
        let device = Default::default();
        let unet = UnetConfig::new()
            .with_in_features(3)
            .with_size(3)
            .with_down(vec![4, 6, 8])
            .with_up(vec![7, 5])
            .init::<B>(&device)
            .unwrap();

        let down_io: Vec<_> = unet
            .path_down()
            .iter()
            .map(|b| (b.in_channels(), b.out_channels(), b.is_first()))
            .collect();
        assert_eq!(down_io, vec![(3, 4, true), (4, 6, false), (6, 8, false)]);

        let up_io: Vec<_> = unet
            .path_up()
            .iter()
            .map(|b| (b.bottom_channels(), b.horizontal_channels(), b.out_channels()))
            .collect();
        assert_eq!(up_io, vec![(8, 6, 7), (7, 4, 5)]);
    }

    #[test]
    fn rejects_mismatched_stage_counts() {
        let device = Default::default();
        let layouts: [(Vec<usize>, Vec<usize>); 4] = [
            (vec![], vec![]),
            (vec![4], vec![4]),
            (vec![4, 8], vec![]),
            (vec![4, 8, 16], vec![8]),
        ];

        for (down, up) in layouts {
            let expected = UnetError::Config {
                down: down.len(),
                up: up.len(),
            };
            let result = UnetConfig::new()
                .with_down(down)
                .with_up(up)
                .init::<B>(&device);

            assert_eq!(result.err(), Some(expected));
        }
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let device = Default::default();
        let unet = small_config().init::<B>(&device).unwrap();

        let x = Tensor::<B, 4>::zeros([1, 3, 16, 16], &device);
        let err = unet.forward(x).unwrap_err();

        assert_eq!(
            err,
            UnetError::ChannelMismatch {
                expected: 1,
                actual: 3
            }
        );
        assert_eq!(err.to_string(), "Expected 1 feature channels in input, got 3");
    }

    #[test]
    fn rejects_indivisible_spatial_dims() {
        let device = Default::default();
        let unet = UnetConfig::new()
            .with_size(3)
            .with_down(vec![4, 4, 4])
            .with_up(vec![4, 4])
            .init::<B>(&device)
            .unwrap();

        for shape in [[1, 1, 10, 8], [1, 1, 8, 6], [2, 1, 3, 3]] {
            let x = Tensor::<B, 4>::zeros(shape, &device);
            let err = unet.forward(x).unwrap_err();

            assert_eq!(err, UnetError::IndivisibleShape { divisor: 4, shape });
            assert!(err.to_string().contains("divisible by 4"));
        }
    }

    #[test]
    fn forward_restores_input_resolution() {
        let device = Default::default();
        let unet = small_config().init::<B>(&device).unwrap();

        let x = Tensor::<B, 4>::random([1, 1, 16, 16], Distribution::Default, &device);
        let y = unet.forward(x).unwrap();

        assert_eq!(y.dims(), [1, 8, 16, 16]);
        assert_eq!(unet.out_channels(), 8);
    }

    #[test]
    fn without_decoder_returns_bottom_map() {
        let device = Default::default();
        let unet = UnetConfig::new()
            .with_in_features(2)
            .with_size(3)
            .with_down(vec![4])
            .init::<B>(&device)
            .unwrap();

        assert_eq!(unet.input_divisor(), 1);
        assert_eq!(unet.out_channels(), 4);

        let x = Tensor::<B, 4>::ones([2, 2, 7, 5], &device);
        assert_eq!(unet.forward(x).unwrap().dims(), [2, 4, 7, 5]);
    }

    #[test]
    fn parameter_count() {
        let device = Default::default();
        let unet = small_config().init::<B>(&device).unwrap();

        let blocks: usize = unet.path_down().iter().map(|b| b.num_params()).sum::<usize>()
            + unet.path_up().iter().map(|b| b.num_params()).sum::<usize>();
        assert_eq!(unet.n_params(), blocks);

        // (prelu + conv weight + conv bias) per stage: 1->8, 8->16, 16+8->8
        let expected = (1 + 8 * 25 + 8) + (8 + 16 * 8 * 25 + 16) + (24 + 8 * 24 * 25 + 8);
        assert_eq!(unet.n_params(), expected);

        let other = small_config().init::<B>(&device).unwrap();
        assert_eq!(other.n_params(), unet.n_params());
    }

    #[test]
    fn forward_is_deterministic() {
        let device = Default::default();
        let unet = small_config().init::<B>(&device).unwrap();
        let x = Tensor::<B, 4>::random([2, 1, 8, 8], Distribution::Default, &device);

        let first = unet.forward(x.clone()).unwrap().into_data();
        let second = unet.forward(x).unwrap().into_data();

        assert_eq!(
            first.to_vec::<f32>().unwrap(),
            second.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn disk_layout() {
        let device = Default::default();
        let config = UnetConfig::disk(8);
        assert_eq!(config.in_features, 3);
        assert_eq!(config.down, vec![16, 32, 64, 64, 64]);
        assert_eq!(config.up, vec![64, 64, 64, 9]);

        let unet = config.init::<B>(&device).unwrap();
        assert_eq!(unet.input_divisor(), 16);

        let x = Tensor::<B, 4>::random([1, 3, 18, 20], Distribution::Default, &device);
        assert!(matches!(
            unet.forward(x.clone()),
            Err(UnetError::IndivisibleShape { divisor: 16, .. })
        ));

        let padded = unet.pad_input(x);
        assert_eq!(padded.dims(), [1, 3, 32, 32]);
        assert_eq!(unet.forward(padded).unwrap().dims(), [1, 9, 32, 32]);
    }

    #[test]
    fn default_disk_descriptor_width() {
        let config = UnetConfig::disk(DEFAULT_DESC_DIM);
        assert_eq!(config.up.last(), Some(&(DEFAULT_DESC_DIM + 1)));
    }
}
