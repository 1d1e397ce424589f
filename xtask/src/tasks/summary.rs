use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use burn::{prelude::*, tensor::Distribution};
use clap::Args;
use disk_unet::{UnetConfig, model::DEFAULT_DESC_DIM};

#[derive(Args)]
pub struct SummaryArgs {
    /// Load the network layout from a saved config file.
    #[arg(short, long, conflicts_with_all = ["disk", "down", "up"])]
    pub config: Option<PathBuf>,

    /// Use the DISK backbone layout with the given descriptor width.
    #[arg(long, num_args = 0..=1, default_missing_value = "128")]
    pub disk: Option<usize>,

    #[arg(long, default_value_t = 1)]
    pub in_features: usize,

    /// Encoder widths, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub down: Vec<usize>,

    /// Decoder widths, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub up: Vec<usize>,

    #[arg(short, long, default_value_t = 5)]
    pub size: usize,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 64)]
    pub height: usize,

    #[arg(long, default_value_t = 64)]
    pub width: usize,

    /// Pad the input up to the network divisor instead of rejecting it.
    #[arg(long, action)]
    pub pad: bool,

    /// Write the resolved config to this path.
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SummaryArgs {
    fn unet_config(&self) -> Result<UnetConfig> {
        if let Some(path) = &self.config {
            return UnetConfig::load(path)
                .map_err(|e| anyhow!("Failed to load config {}: {:?}", path.display(), e));
        }

        if let Some(desc_dim) = self.disk {
            if desc_dim != DEFAULT_DESC_DIM {
                tracing::info!("Using non-default descriptor width {}", desc_dim);
            }
            return Ok(UnetConfig::disk(desc_dim));
        }

        Ok(UnetConfig::new()
            .with_in_features(self.in_features)
            .with_down(self.down.clone())
            .with_up(self.up.clone())
            .with_size(self.size))
    }
}

pub fn run(args: &SummaryArgs) -> Result<()> {
    #[cfg(not(feature = "wgpu"))]
    type MyBackend = burn::backend::NdArray<f32>;
    #[cfg(feature = "wgpu")]
    type MyBackend = burn::backend::Wgpu<f32, i32>;

    let device = Default::default();
    MyBackend::seed(args.seed);

    let config = args.unet_config()?;
    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        tracing::info!("Saved config to {}", path.display());
    }

    tracing::info!("Building U-Net...");
    let unet = config.init::<MyBackend>(&device)?;
    tracing::info!(
        "U-Net: {} input features, down {:?}, up {:?}, {} parameters",
        unet.in_features(),
        unet.down(),
        unet.up(),
        unet.n_params()
    );

    let input = Tensor::<MyBackend, 4>::random(
        [args.batch_size, unet.in_features(), args.height, args.width],
        Distribution::Default,
        &device,
    );
    let input = if args.pad {
        let padded = unet.pad_input(input);
        tracing::info!("Padded input to {:?}", padded.dims());
        padded
    } else {
        input
    };

    let output = unet.forward(input)?;
    tracing::info!("Output shape: {:?}", output.dims());

    Ok(())
}
