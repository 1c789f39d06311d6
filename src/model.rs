// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个文本检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextDetection {
  /// 置信度得分（softmax 后的前景概率）
  pub score: f32,
  /// 边界框 [x_min, y_min, x_max, y_max]，原图像素坐标
  pub bbox: [f32; 4],
}

/// 单张图像的检测结果
#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[TextDetection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// 检测头的原始输出：逐锚框的回归偏移与类别得分的扁平序列。
///
/// 逐锚框顺序与锚框生成器完全一致（特征图序列 → 图内行主序 →
/// 位置内锚框变体）。该不变量把 loc、conf 与锚框三个数组钉在一起。
#[derive(Debug, Clone)]
pub struct RawPrediction {
  /// 每锚框 4 个回归偏移 [dx, dy, dw, dh]，长度 = 4 × 锚框数
  pub loc: Vec<f32>,
  /// 每锚框 num_classes 个类别得分，长度 = num_classes × 锚框数
  pub conf: Vec<f32>,
  pub num_classes: usize,
}

impl RawPrediction {
  /// 序列覆盖的锚框总数
  pub fn total_anchors(&self) -> usize {
    self.loc.len() / 4
  }
}

mod checkpoint;
mod extractor;
mod head;
mod nn;
mod textboxes;

pub use self::checkpoint::{Checkpoint, CheckpointError, TensorEntry};
pub use self::extractor::{ExtractError, FeatureExtractor, VggExtractor};
pub use self::head::{HeadError, MultiboxHead};
pub use self::textboxes::{TextBoxes, TextBoxesBuilder, TextBoxesError};
