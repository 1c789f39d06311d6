// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model/extractor.rs - 特征提取骨干网络
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array1, Array3, Array4};
use thiserror::Error;
use tracing::debug;

use crate::model::nn;
use crate::model::Checkpoint;
use crate::model::CheckpointError;

#[derive(Error, Debug)]
pub enum ExtractError {
  #[error("输入张量形状无效: 期望 3 通道, 实际 {0} 通道")]
  BadInputChannels(usize),
}

/// 特征提取器：输入 (3, H, W) 的预处理图像，
/// 输出一组从高分辨率到低分辨率的来源特征图。
///
/// 解码管线只依赖这层接口；骨干网络可以替换而不影响检测头之后的阶段。
pub trait FeatureExtractor {
  /// 每个来源特征图的通道数，顺序与配置的特征图序列一致
  fn source_channels(&self) -> &[usize];

  fn extract(&self, input: &Array3<f32>) -> Result<Vec<Array3<f32>>, ExtractError>;
}

enum Op {
  Conv { weight: Array4<f32>, bias: Array1<f32>, stride: usize, padding: usize, dilation: usize },
  Relu,
  MaxPool { kernel: usize, stride: usize, padding: usize, ceil: bool },
}

impl Op {
  fn apply(&self, x: Array3<f32>) -> Array3<f32> {
    match self {
      Op::Conv { weight, bias, stride, padding, dilation } => {
        nn::conv2d(&x, weight, bias, *stride, *padding, *dilation)
      }
      Op::Relu => {
        let mut x = x;
        nn::relu(&mut x);
        x
      }
      Op::MaxPool { kernel, stride, padding, ceil } => {
        nn::max_pool2d(&x, *kernel, *stride, *padding, *ceil)
      }
    }
  }
}

struct ExtraConv {
  weight: Array4<f32>,
  bias: Array1<f32>,
  stride: usize,
  padding: usize,
}

enum VggItem {
  Conv(usize),
  Pool,
  PoolCeil,
}

// VGG16 主干配置，含 ceil 模式的第三级池化
const VGG_CFG: &[VggItem] = &[
  VggItem::Conv(64),
  VggItem::Conv(64),
  VggItem::Pool,
  VggItem::Conv(128),
  VggItem::Conv(128),
  VggItem::Pool,
  VggItem::Conv(256),
  VggItem::Conv(256),
  VggItem::Conv(256),
  VggItem::PoolCeil,
  VggItem::Conv(512),
  VggItem::Conv(512),
  VggItem::Conv(512),
  VggItem::Pool,
  VggItem::Conv(512),
  VggItem::Conv(512),
  VggItem::Conv(512),
];

// conv4_3 是第 10 个卷积，其 relu 之后截断出第一个来源特征图
const CONV4_3_CONV_COUNT: usize = 10;

// 追加的特征缩放层 (输出通道, 核, 步幅, 填充)；
// 下标 1、3、5 的输出是来源特征图，最后经全局平均池化得到末级来源
const EXTRAS_CFG: &[(usize, usize, usize, usize)] = &[
  (256, 1, 1, 0),
  (512, 3, 2, 1),
  (128, 1, 1, 0),
  (256, 3, 2, 1),
  (128, 1, 1, 0),
  (256, 3, 1, 0),
  (128, 1, 1, 0),
  (256, 3, 2, 1),
];

const EXTRA_SOURCE_INDICES: [usize; 3] = [1, 3, 5];

const SOURCE_CHANNELS: [usize; 6] = [512, 1024, 512, 256, 256, 256];

/// VGG16 + 额外层的骨干网络，产生 6 张来源特征图。
///
/// 300×300 输入下来源尺寸依次为 38、19、10、5、3、1；
/// conv4_3 的来源经过逐位置 L2 归一化并乘以学习到的逐通道缩放。
pub struct VggExtractor {
  vgg: Vec<Op>,
  conv4_3_cut: usize,
  l2norm_scale: Array1<f32>,
  extras: Vec<ExtraConv>,
  source_channels: Vec<usize>,
}

impl VggExtractor {
  /// 按固定拓扑从检查点取权重；任何形状不符都是致命错误
  pub fn from_checkpoint(checkpoint: &Checkpoint) -> Result<Self, CheckpointError> {
    let mut vgg = Vec::new();
    let mut conv4_3_cut = 0;
    let mut torch_index = 0;
    let mut conv_count = 0;
    let mut in_channels = 3;

    for item in VGG_CFG {
      match item {
        VggItem::Pool => {
          vgg.push(Op::MaxPool { kernel: 2, stride: 2, padding: 0, ceil: false });
          torch_index += 1;
        }
        VggItem::PoolCeil => {
          vgg.push(Op::MaxPool { kernel: 2, stride: 2, padding: 0, ceil: true });
          torch_index += 1;
        }
        VggItem::Conv(out_channels) => {
          let weight = checkpoint.tensor4(
            &format!("vgg.{torch_index}.weight"),
            [*out_channels, in_channels, 3, 3],
          )?;
          let bias = checkpoint.tensor1(&format!("vgg.{torch_index}.bias"), *out_channels)?;
          vgg.push(Op::Conv { weight, bias, stride: 1, padding: 1, dilation: 1 });
          vgg.push(Op::Relu);
          torch_index += 2;
          conv_count += 1;
          in_channels = *out_channels;
          if conv_count == CONV4_3_CONV_COUNT {
            conv4_3_cut = vgg.len();
          }
        }
      }
    }

    // pool5 + 空洞卷积 conv6 + 1×1 的 conv7
    vgg.push(Op::MaxPool { kernel: 3, stride: 1, padding: 1, ceil: false });
    torch_index += 1;
    let conv6_weight =
      checkpoint.tensor4(&format!("vgg.{torch_index}.weight"), [1024, 512, 3, 3])?;
    let conv6_bias = checkpoint.tensor1(&format!("vgg.{torch_index}.bias"), 1024)?;
    vgg.push(Op::Conv { weight: conv6_weight, bias: conv6_bias, stride: 1, padding: 6, dilation: 6 });
    vgg.push(Op::Relu);
    torch_index += 2;
    let conv7_weight =
      checkpoint.tensor4(&format!("vgg.{torch_index}.weight"), [1024, 1024, 1, 1])?;
    let conv7_bias = checkpoint.tensor1(&format!("vgg.{torch_index}.bias"), 1024)?;
    vgg.push(Op::Conv { weight: conv7_weight, bias: conv7_bias, stride: 1, padding: 0, dilation: 1 });
    vgg.push(Op::Relu);

    let l2norm_scale = checkpoint.tensor1("L2Norm.weight", 512)?;

    let mut extras = Vec::with_capacity(EXTRAS_CFG.len());
    let mut in_channels = 1024;
    for (index, (out_channels, kernel, stride, padding)) in EXTRAS_CFG.iter().enumerate() {
      let weight = checkpoint.tensor4(
        &format!("extras.{index}.weight"),
        [*out_channels, in_channels, *kernel, *kernel],
      )?;
      let bias = checkpoint.tensor1(&format!("extras.{index}.bias"), *out_channels)?;
      extras.push(ExtraConv { weight, bias, stride: *stride, padding: *padding });
      in_channels = *out_channels;
    }

    Ok(VggExtractor {
      vgg,
      conv4_3_cut,
      l2norm_scale,
      extras,
      source_channels: SOURCE_CHANNELS.to_vec(),
    })
  }
}

impl FeatureExtractor for VggExtractor {
  fn source_channels(&self) -> &[usize] {
    &self.source_channels
  }

  fn extract(&self, input: &Array3<f32>) -> Result<Vec<Array3<f32>>, ExtractError> {
    let (channels, _, _) = input.dim();
    if channels != 3 {
      return Err(ExtractError::BadInputChannels(channels));
    }

    let mut sources = Vec::with_capacity(self.source_channels.len());
    let mut x = input.clone();

    for op in &self.vgg[..self.conv4_3_cut] {
      x = op.apply(x);
    }
    sources.push(nn::l2_normalize(&x, &self.l2norm_scale));

    for op in &self.vgg[self.conv4_3_cut..] {
      x = op.apply(x);
    }
    sources.push(x.clone());

    for (index, conv) in self.extras.iter().enumerate() {
      x = nn::conv2d(&x, &conv.weight, &conv.bias, conv.stride, conv.padding, 1);
      nn::relu(&mut x);
      if EXTRA_SOURCE_INDICES.contains(&index) {
        sources.push(x.clone());
      }
    }
    sources.push(nn::global_avg_pool(&x));

    for (index, source) in sources.iter().enumerate() {
      let (c, h, w) = source.dim();
      debug!("来源特征图 {}: {}×{}×{}", index, c, h, w);
    }
    Ok(sources)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array;

  #[test]
  fn source_channels_match_topology() {
    assert_eq!(SOURCE_CHANNELS.len(), EXTRA_SOURCE_INDICES.len() + 3);
  }

  #[test]
  fn missing_backbone_weight_is_fatal() {
    let checkpoint = Checkpoint::from_json_str("{}").unwrap();
    assert!(matches!(
      VggExtractor::from_checkpoint(&checkpoint),
      Err(CheckpointError::MissingParam(_))
    ));
  }

  #[test]
  fn rejects_non_rgb_input() {
    // 无权重也能验证输入通道检查
    let extractor = VggExtractor {
      vgg: Vec::new(),
      conv4_3_cut: 0,
      l2norm_scale: Array1::zeros(512),
      extras: Vec::new(),
      source_channels: SOURCE_CHANNELS.to_vec(),
    };
    let bad = Array::zeros((1, 8, 8));
    assert!(matches!(extractor.extract(&bad), Err(ExtractError::BadInputChannels(1))));
  }
}
