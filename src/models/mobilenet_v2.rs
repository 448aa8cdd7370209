//! MobileNetV2 classification network.
//!
//! A torchvision-compatible MobileNetV2 built with candle-nn. Parameter
//! names mirror the torchvision module tree (`features.N...`,
//! `classifier.1`) so PyTorch checkpoints bind without renaming beyond what
//! the checkpoint normalizer already handles. Inference only: batch norm
//! always runs with stored statistics and no gradients are recorded.

use candle_core::{Module, ModuleT, Result, Tensor, D};
use candle_nn::{batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder};

/// Width of the final feature map fed to the classifier head.
const LAST_CHANNEL: usize = 1280;

/// Inverted-residual schedule: (expand ratio, out channels, repeats, stride).
const BLOCK_SCHEDULE: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// A torchvision `ConvBNReLU` unit: conv (no bias) at `.0`, batch norm at `.1`.
#[derive(Debug)]
struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
}

impl ConvBn {
    fn load(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        groups: usize,
    ) -> Result<Self> {
        let config = Conv2dConfig {
            padding: (kernel - 1) / 2,
            stride,
            groups,
            ..Default::default()
        };
        let conv = conv2d_no_bias(in_channels, out_channels, kernel, config, vb.pp("0"))?;
        let bn = batch_norm(out_channels, 1e-5, vb.pp("1"))?;
        Ok(Self { conv, bn })
    }

    fn forward_relu6(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = xs.apply(&self.conv)?;
        let xs = self.bn.forward_t(&xs, false)?;
        xs.clamp(0f32, 6f32)
    }
}

/// One inverted-residual block.
///
/// With expansion the submodules sit at `conv.0` (expand), `conv.1`
/// (depthwise), `conv.2`/`conv.3` (linear projection); without expansion the
/// depthwise unit moves to `conv.0` and the projection to `conv.1`/`conv.2`.
#[derive(Debug)]
struct InvertedResidual {
    expand: Option<ConvBn>,
    depthwise: ConvBn,
    project_conv: Conv2d,
    project_bn: BatchNorm,
    use_residual: bool,
}

impl InvertedResidual {
    fn load(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expand_ratio: usize,
    ) -> Result<Self> {
        let vb = vb.pp("conv");
        let hidden = in_channels * expand_ratio;

        let (expand, depthwise_idx, project_idx) = if expand_ratio == 1 {
            (None, 0usize, 1usize)
        } else {
            let expand = ConvBn::load(vb.pp("0"), in_channels, hidden, 1, 1, 1)?;
            (Some(expand), 1, 2)
        };

        let depthwise = ConvBn::load(vb.pp(depthwise_idx), hidden, hidden, 3, stride, hidden)?;

        let project_conv = conv2d_no_bias(
            hidden,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp(project_idx),
        )?;
        let project_bn = batch_norm(out_channels, 1e-5, vb.pp(project_idx + 1))?;

        Ok(Self {
            expand,
            depthwise,
            project_conv,
            project_bn,
            use_residual: stride == 1 && in_channels == out_channels,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut ys = xs.clone();
        if let Some(expand) = &self.expand {
            ys = expand.forward_relu6(&ys)?;
        }
        ys = self.depthwise.forward_relu6(&ys)?;
        ys = ys.apply(&self.project_conv)?;
        ys = self.project_bn.forward_t(&ys, false)?;
        if self.use_residual {
            ys = (xs + ys)?;
        }
        Ok(ys)
    }
}

/// The full MobileNetV2 classifier.
#[derive(Debug)]
pub struct MobileNetV2 {
    stem: ConvBn,
    blocks: Vec<InvertedResidual>,
    head: ConvBn,
    classifier: Linear,
}

impl MobileNetV2 {
    /// Builds the architecture and binds its parameters from `vb`.
    pub fn new(num_classes: usize, vb: VarBuilder) -> Result<Self> {
        let features = vb.pp("features");
        let stem = ConvBn::load(features.pp("0"), 3, 32, 3, 2, 1)?;

        let mut blocks = Vec::new();
        let mut in_channels = 32;
        let mut index = 1;
        for (expand_ratio, out_channels, repeats, stride) in BLOCK_SCHEDULE {
            for i in 0..repeats {
                let stride = if i == 0 { stride } else { 1 };
                blocks.push(InvertedResidual::load(
                    features.pp(index),
                    in_channels,
                    out_channels,
                    stride,
                    expand_ratio,
                )?);
                in_channels = out_channels;
                index += 1;
            }
        }

        let head = ConvBn::load(features.pp(index), in_channels, LAST_CHANNEL, 1, 1, 1)?;
        let classifier = linear(LAST_CHANNEL, num_classes, vb.pp("classifier").pp("1"))?;

        Ok(Self {
            stem,
            blocks,
            head,
            classifier,
        })
    }

    /// Computes per-class logits for an `(N, 3, H, W)` input tensor.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = self.stem.forward_relu6(xs)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let xs = self.head.forward_relu6(&xs)?;
        // Global average pool over the spatial dimensions.
        let xs = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        self.classifier.forward(&xs)
    }
}
