//! Deep-tier network architecture
//!
//! A compact CNN that maps a `[batch, 3, 224, 224]` image tensor with values
//! in [0, 1] to class logits. The weights come from an offline-trained record;
//! this module only has to rebuild the same architecture so the record can be
//! loaded into it.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// Configuration for the LeafDiseaseNet model
#[derive(Config, Debug)]
pub struct LeafDiseaseNetConfig {
    /// Number of output classes (length of the label mapping)
    pub num_classes: usize,

    /// Base number of convolutional filters, doubled at each block
    #[config(default = "32")]
    pub base_filters: usize,

    /// Units in the hidden fully connected layer
    #[config(default = "256")]
    pub hidden_units: usize,

    /// Dropout rate (identity at inference time)
    #[config(default = "0.3")]
    pub dropout_rate: f64,
}

impl LeafDiseaseNetConfig {
    /// Build the network with freshly initialized weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeafDiseaseNet<B> {
        let base = self.base_filters;

        // 224 -> 112 -> 56 -> 28 -> 14
        let blocks = vec![
            ConvBlock::new(3, base, device),
            ConvBlock::new(base, base * 2, device),
            ConvBlock::new(base * 2, base * 4, device),
            ConvBlock::new(base * 4, base * 8, device),
        ];

        LeafDiseaseNet {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(base * 8, self.hidden_units).init(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            classifier: LinearConfig::new(self.hidden_units, self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

/// Conv 3x3 -> BatchNorm -> ReLU -> MaxPool 2x2
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Deep-tier leaf disease classifier
///
/// Four conv blocks, global average pooling, then a two-layer head.
#[derive(Module, Debug)]
pub struct LeafDiseaseNet<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    global_pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    dropout: Dropout,
    classifier: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> LeafDiseaseNet<B> {
    /// Logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }

        // [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.classifier.forward(x)
    }

    /// Class probabilities of shape `[batch, num_classes]`
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
