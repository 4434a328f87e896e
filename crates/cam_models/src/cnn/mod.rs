//! Convolutional image classifiers.

mod resnet;

pub use resnet::{
    BasicBlock, Downsample, ResNet, ResNetArch, ResNetConfig, IMAGENET_CLASSES, RESNET_LAYERS,
};
