//! ResNet image classifiers (BasicBlock variants) in the torchvision layout.
//!
//! Parameter names mirror torchvision/timm checkpoints (`conv1`, `bn1`,
//! `layer1.0.conv1`, ..., `fc`) so pretrained safetensors load with only the
//! `downsample.{0,1}` keys remapped.

use std::fmt;
use std::str::FromStr;

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::traits::FeatureExtractor;

/// Layers a ResNet forward pass can be split at.
pub const RESNET_LAYERS: &[&str] = &["conv1", "layer1", "layer2", "layer3", "layer4"];

/// Number of ImageNet classes.
pub const IMAGENET_CLASSES: usize = 1000;

/// Supported ResNet depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResNetArch {
    /// ResNet-18: [2, 2, 2, 2] basic blocks.
    #[default]
    ResNet18,
    /// ResNet-34: [3, 4, 6, 3] basic blocks.
    ResNet34,
}

use burn::constant;
constant!(ResNetArch);

impl ResNetArch {
    /// All supported architectures.
    pub const ALL: [ResNetArch; 2] = [ResNetArch::ResNet18, ResNetArch::ResNet34];

    /// Registry name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet34 => "resnet34",
        }
    }

    /// Blocks per stage.
    #[must_use]
    pub const fn blocks(&self) -> [usize; 4] {
        match self {
            Self::ResNet18 => [2, 2, 2, 2],
            Self::ResNet34 => [3, 4, 6, 3],
        }
    }

    /// Hugging Face repository with the torchvision ImageNet weights.
    #[must_use]
    pub const fn hub_repo(&self) -> &'static str {
        match self {
            Self::ResNet18 => "timm/resnet18.tv_in1k",
            Self::ResNet34 => "timm/resnet34.tv_in1k",
        }
    }
}

impl fmt::Display for ResNetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResNetArch {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "resnet18" => Ok(Self::ResNet18),
            "resnet34" => Ok(Self::ResNet34),
            _ => Err(ModelError::UnknownArch(s.to_string())),
        }
    }
}

/// Configuration for a ResNet model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResNetConfig {
    /// Depth variant.
    pub arch: ResNetArch,
    /// Number of output classes.
    pub n_classes: usize,
    /// Channels of the first stage; doubles every stage. Pretrained weights need 64.
    pub base_width: usize,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self {
            arch: ResNetArch::ResNet18,
            n_classes: IMAGENET_CLASSES,
            base_width: 64,
        }
    }
}

impl ResNetConfig {
    /// Create a new config.
    pub fn new(arch: ResNetArch, n_classes: usize) -> Self {
        Self {
            arch,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the first-stage width.
    #[must_use]
    pub fn with_base_width(mut self, base_width: usize) -> Self {
        self.base_width = base_width;
        self
    }

    /// Channels of the last stage, i.e. the CAM feature map depth.
    #[must_use]
    pub fn feature_channels(&self) -> usize {
        self.base_width * 8
    }

    /// Initialize the model with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        ResNet::new(self.clone(), device)
    }
}

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

/// 1x1 projection on the residual path when the block changes shape.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        Self { conv, bn }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Residual block with two 3x3 convolutions and a skip connection.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    /// Create a new residual block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let conv1 = conv3x3(in_channels, out_channels, stride, device);
        let bn1 = BatchNormConfig::new(out_channels).init(device);
        let conv2 = conv3x3(out_channels, out_channels, 1, device);
        let bn2 = BatchNormConfig::new(out_channels).init(device);

        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + identity)
    }
}

/// ResNet image classifier.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    maxpool: MaxPool2d,
    layer1: Vec<BasicBlock<B>>,
    layer2: Vec<BasicBlock<B>>,
    layer3: Vec<BasicBlock<B>>,
    layer4: Vec<BasicBlock<B>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    #[module(skip)]
    arch: ResNetArch,
    #[module(skip)]
    n_classes: usize,
}

impl<B: Backend> ResNet<B> {
    /// Create a new ResNet model.
    pub fn new(config: ResNetConfig, device: &B::Device) -> Self {
        let width = config.base_width;
        let blocks = config.arch.blocks();

        let conv1 = Conv2dConfig::new([3, width], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(width).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let make_stage = |in_channels: usize, out_channels: usize, n: usize, stride: usize| {
            (0..n)
                .map(|i| {
                    if i == 0 {
                        BasicBlock::new(in_channels, out_channels, stride, device)
                    } else {
                        BasicBlock::new(out_channels, out_channels, 1, device)
                    }
                })
                .collect::<Vec<_>>()
        };

        let layer1 = make_stage(width, width, blocks[0], 1);
        let layer2 = make_stage(width, width * 2, blocks[1], 2);
        let layer3 = make_stage(width * 2, width * 4, blocks[2], 2);
        let layer4 = make_stage(width * 4, width * 8, blocks[3], 2);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(config.feature_channels(), config.n_classes).init(device);

        Self {
            conv1,
            bn1,
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool,
            fc,
            arch: config.arch,
            n_classes: config.n_classes,
        }
    }

    /// Architecture of this model.
    pub fn arch(&self) -> ResNetArch {
        self.arch
    }

    fn stage(&self, index: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let blocks = match index {
            0 => {
                let x = relu(self.bn1.forward(self.conv1.forward(x)));
                return self.maxpool.forward(x);
            }
            1 => &self.layer1,
            2 => &self.layer2,
            3 => &self.layer3,
            _ => &self.layer4,
        };
        blocks.iter().fold(x, |x, block| block.forward(x))
    }

    /// Forward pass returning logits.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = (0..RESNET_LAYERS.len()).fold(x, |x, i| self.stage(i, x));
        self.classify(features)
    }

    /// Forward pass returning probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.avgpool.forward(features);
        let [batch, channels, _, _] = pooled.dims();
        self.fc.forward(pooled.reshape([batch, channels]))
    }
}

impl<B: Backend> FeatureExtractor<B> for ResNet<B> {
    fn name(&self) -> &str {
        self.arch.name()
    }

    fn layer_names(&self) -> &'static [&'static str] {
        RESNET_LAYERS
    }

    fn cam_layer(&self) -> &'static str {
        "layer4"
    }

    fn forward_features(&self, x: Tensor<B, 4>, layer: &str) -> cam_core::Result<Tensor<B, 4>> {
        let last = self.layer_index(layer)?;
        Ok((0..=last).fold(x, |x, i| self.stage(i, x)))
    }

    fn forward_head(&self, features: Tensor<B, 4>, layer: &str) -> cam_core::Result<Tensor<B, 2>> {
        let first = self.layer_index(layer)? + 1;
        let features = (first..RESNET_LAYERS.len()).fold(features, |x, i| self.stage(i, x));
        Ok(self.classify(features))
    }

    fn class_weights(&self) -> Tensor<B, 2> {
        // Burn stores linear weights as (d_input, d_output).
        self.fc.weight.val().transpose()
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}
