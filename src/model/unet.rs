//! Segmentation Network
//!
//! A U-Net style encoder/decoder built from Burn modules: four down levels of
//! double 3x3 convolutions, a bottleneck, and four transposed-convolution up
//! levels with skip connections. The head is a 1x1 convolution emitting one
//! logit channel per pixel. Input height and width must be divisible by 16.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the [`Unet`] model
#[derive(Config, Debug)]
pub struct UnetConfig {
    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Number of output logit channels (1 for binary segmentation)
    #[config(default = "1")]
    pub out_channels: usize,

    /// Filter count of the first encoder level; doubles per level
    #[config(default = "32")]
    pub base_filters: usize,
}

impl UnetConfig {
    /// Narrow variant for fast iteration on CPU.
    pub fn lite() -> Self {
        Self::new().with_base_filters(16)
    }
}

/// Two 3x3 convolutions, each followed by BatchNorm and ReLU
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> DoubleConv<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn1 = BatchNormConfig::new(out_channels).init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn2 = BatchNormConfig::new(out_channels).init(device);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.bn1.forward(x);
        let x = self.relu.forward(x);
        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);
        self.relu.forward(x)
    }
}

/// One decoder level: upsample, concatenate the skip, double conv
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    up: ConvTranspose2d<B>,
    conv: DoubleConv<B>,
}

impl<B: Backend> UpBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let up = ConvTranspose2dConfig::new([in_channels, out_channels], [2, 2])
            .with_stride([2, 2])
            .init(device);
        // After concatenation the skip doubles the channel count again.
        let conv = DoubleConv::new(out_channels * 2, out_channels, device);
        Self { up, conv }
    }

    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.up.forward(x);
        let x = Tensor::cat(vec![x, skip], 1);
        self.conv.forward(x)
    }
}

/// Binary segmentation U-Net
#[derive(Module, Debug)]
pub struct Unet<B: Backend> {
    enc1: DoubleConv<B>,
    enc2: DoubleConv<B>,
    enc3: DoubleConv<B>,
    enc4: DoubleConv<B>,
    bottleneck: DoubleConv<B>,
    pool: MaxPool2d,
    up4: UpBlock<B>,
    up3: UpBlock<B>,
    up2: UpBlock<B>,
    up1: UpBlock<B>,
    head: Conv2d<B>,
}

impl<B: Backend> Unet<B> {
    pub fn new(config: &UnetConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        let enc1 = DoubleConv::new(config.in_channels, base, device);
        let enc2 = DoubleConv::new(base, base * 2, device);
        let enc3 = DoubleConv::new(base * 2, base * 4, device);
        let enc4 = DoubleConv::new(base * 4, base * 8, device);
        let bottleneck = DoubleConv::new(base * 8, base * 16, device);

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let up4 = UpBlock::new(base * 16, base * 8, device);
        let up3 = UpBlock::new(base * 8, base * 4, device);
        let up2 = UpBlock::new(base * 4, base * 2, device);
        let up1 = UpBlock::new(base * 2, base, device);

        let head = Conv2dConfig::new([base, config.out_channels], [1, 1]).init(device);

        Self {
            enc1,
            enc2,
            enc3,
            enc4,
            bottleneck,
            pool,
            up4,
            up3,
            up2,
            up1,
            head,
        }
    }

    /// Forward pass.
    ///
    /// Input [batch, in_channels, H, W], output logits
    /// [batch, out_channels, H, W].
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let e1 = self.enc1.forward(x);
        let e2 = self.enc2.forward(self.pool.forward(e1.clone()));
        let e3 = self.enc3.forward(self.pool.forward(e2.clone()));
        let e4 = self.enc4.forward(self.pool.forward(e3.clone()));
        let b = self.bottleneck.forward(self.pool.forward(e4.clone()));

        let d4 = self.up4.forward(b, e4);
        let d3 = self.up3.forward(d4, e3);
        let d2 = self.up2.forward(d3, e2);
        let d1 = self.up1.forward(d2, e1);

        self.head.forward(d1)
    }

    /// Forward with sigmoid applied, for inference.
    pub fn forward_probabilities(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        burn::tensor::activation::sigmoid(self.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_unet_output_shape() {
        let device = Default::default();
        let config = UnetConfig::new().with_base_filters(4);
        let model = Unet::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 1, 32, 32]);
    }

    #[test]
    fn test_unet_probabilities_in_unit_interval() {
        let device = Default::default();
        let config = UnetConfig::lite().with_base_filters(4);
        let model = Unet::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 16, 16],
            burn::tensor::Distribution::Default,
            &device,
        );
        let probs = model.forward_probabilities(input);
        let values: Vec<f32> = probs.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_lite_config_is_narrower() {
        assert!(UnetConfig::lite().base_filters < UnetConfig::new().base_filters);
    }
}
