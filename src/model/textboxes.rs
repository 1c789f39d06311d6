// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model/textboxes.rs - TextBoxes 文本检测模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::str::FromStr;

use image::RgbImage;
use ndarray::Array3;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::anchor::{self, AnchorBox};
use crate::config::{ConfigError, Device, Phase, TextBoxesConfig};
use crate::decode;
use crate::frame::DetectFrame;
use crate::model::head::HeadError;
use crate::model::nn;
use crate::model::{
  Checkpoint, CheckpointError, DetectResult, ExtractError, FeatureExtractor, Model, MultiboxHead,
  VggExtractor,
};
use crate::nms;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_TOP_K: usize = 200;

#[derive(Error, Debug)]
pub enum TextBoxesError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("检查点错误: {0}")]
  Checkpoint(#[from] CheckpointError),
  #[error("检测头错误: {0}")]
  Head(#[from] HeadError),
  #[error("特征提取错误: {0}")]
  Extract(#[from] ExtractError),
  #[error("来源特征图数量不匹配: 配置 {maps} 张, 提取器 {sources} 张")]
  SourceCountMismatch { maps: usize, sources: usize },
  #[error("锚框数量不匹配: 生成器 {anchors} 个, 检测头 {head} 个")]
  AnchorCountMismatch { anchors: usize, head: usize },
}

/// TextBoxes 检测模型：特征提取 → 检测头 → softmax → 解码 → 非极大值抑制。
///
/// 各阶段都是纯数据变换，无共享可变状态；锚框集在构建时生成一次，
/// 之后只读共享，多个并发推理调用可以安全使用同一个模型。
pub struct TextBoxes<X: FeatureExtractor> {
  config: TextBoxesConfig,
  anchors: Vec<AnchorBox>,
  extractor: X,
  head: MultiboxHead,
  threshold: f32,
  iou_threshold: f32,
  top_k: usize,
}

impl<X: FeatureExtractor> TextBoxes<X> {
  /// 组合各阶段并校验排序契约。
  ///
  /// 锚框生成器与检测头的锚框总数不一致是致命的配置错误：
  /// 下游所有解码结果都不可信。
  pub fn new(
    config: TextBoxesConfig,
    extractor: X,
    head: MultiboxHead,
    threshold: f32,
    iou_threshold: f32,
    top_k: usize,
  ) -> Result<Self, TextBoxesError> {
    config.validate()?;
    if extractor.source_channels().len() != config.maps.len() {
      return Err(TextBoxesError::SourceCountMismatch {
        maps: config.maps.len(),
        sources: extractor.source_channels().len(),
      });
    }

    let anchors = anchor::generate(&config);
    if anchors.len() != head.total_anchors() {
      return Err(TextBoxesError::AnchorCountMismatch {
        anchors: anchors.len(),
        head: head.total_anchors(),
      });
    }
    info!("模型构建完成: 配置 {}, 锚框 {} 个", config.name, anchors.len());

    Ok(TextBoxes { config, anchors, extractor, head, threshold, iou_threshold, top_k })
  }

  pub fn config(&self) -> &TextBoxesConfig {
    &self.config
  }

  pub fn anchors(&self) -> &[AnchorBox] {
    &self.anchors
  }

  // 预处理：缩放到网络输入尺寸，重排为 BGR 并减逐通道均值
  fn preprocess(&self, image: &RgbImage) -> Array3<f32> {
    let size = self.config.input_size;
    let resized =
      image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);

    let size = size as usize;
    let mut tensor = Array3::<f32>::zeros((3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
      let [r, g, b] = pixel.0;
      tensor[[0, y as usize, x as usize]] = b as f32 - self.config.mean[0];
      tensor[[1, y as usize, x as usize]] = g as f32 - self.config.mean[1];
      tensor[[2, y as usize, x as usize]] = r as f32 - self.config.mean[2];
    }
    tensor
  }
}

impl<X: FeatureExtractor> Model for TextBoxes<X> {
  type Input = DetectFrame;
  type Output = DetectResult;
  type Error = TextBoxesError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理图像 {}", input.image_id);
    let tensor = self.preprocess(&input.image);

    debug!("提取来源特征图");
    let sources = self.extractor.extract(&tensor)?;

    debug!("检测头前向");
    let mut raw = self.head.forward(&sources)?;
    if raw.total_anchors() != self.anchors.len() {
      return Err(TextBoxesError::AnchorCountMismatch {
        anchors: self.anchors.len(),
        head: raw.total_anchors(),
      });
    }

    // 逐锚框把类别得分归一化为概率
    for scores in raw.conf.chunks_mut(raw.num_classes) {
      nn::softmax(scores);
    }

    let candidates = decode::decode(
      &raw,
      &self.anchors,
      self.config.variances,
      self.threshold,
      input.width(),
      input.height(),
    );
    debug!("阈值之上的候选框 {} 个", candidates.len());

    let kept = nms::suppress(candidates, self.iou_threshold, self.top_k);
    debug!("抑制后保留 {} 个", kept.len());

    Ok(DetectResult { items: kept.into_boxed_slice() })
  }
}

/// 模型构建器：检查点路径加运行参数。
///
/// 阶段与设备都是显式参数；GPU 未实现，指定时回退到 CPU 并告警。
pub struct TextBoxesBuilder {
  checkpoint_path: String,
  config: TextBoxesConfig,
  phase: String,
  device: Device,
  threshold: f32,
  iou_threshold: f32,
  top_k: usize,
}

impl TextBoxesBuilder {
  pub fn new(checkpoint_path: impl Into<String>) -> Self {
    TextBoxesBuilder {
      checkpoint_path: checkpoint_path.into(),
      config: TextBoxesConfig::text_300(),
      phase: "test".to_string(),
      device: Device::Cpu,
      threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      top_k: DEFAULT_TOP_K,
    }
  }

  pub fn config(mut self, config: TextBoxesConfig) -> Self {
    self.config = config;
    self
  }

  pub fn phase(mut self, phase: impl Into<String>) -> Self {
    self.phase = phase.into();
    self
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  pub fn top_k(mut self, top_k: usize) -> Self {
    self.top_k = top_k;
    self
  }

  pub fn build(self) -> Result<TextBoxes<VggExtractor>, TextBoxesError> {
    let phase = Phase::from_str(&self.phase).map_err(TextBoxesError::Config)?;
    debug!("网络阶段: {:?}", phase);

    if self.device == Device::Gpu {
      warn!("GPU 执行环境不可用，回退到 CPU");
    }

    let checkpoint = Checkpoint::load(&self.checkpoint_path)?;
    let extractor = VggExtractor::from_checkpoint(&checkpoint)?;
    if extractor.source_channels().len() != self.config.maps.len() {
      return Err(TextBoxesError::SourceCountMismatch {
        maps: self.config.maps.len(),
        sources: extractor.source_channels().len(),
      });
    }
    let source_channels = extractor.source_channels().to_vec();
    let head = MultiboxHead::from_checkpoint(&checkpoint, &self.config, &source_channels)?;

    TextBoxes::new(
      self.config,
      extractor,
      head,
      self.threshold,
      self.iou_threshold,
      self.top_k,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_rejects_train_phase() {
    let result = TextBoxesBuilder::new("weights/tb.json").phase("train").build();
    assert!(matches!(result, Err(TextBoxesError::Config(ConfigError::UnsupportedPhase(_)))));
  }

  #[test]
  fn builder_propagates_missing_checkpoint() {
    let result = TextBoxesBuilder::new("/no/such/checkpoint.json").build();
    assert!(matches!(result, Err(TextBoxesError::Checkpoint(CheckpointError::IoError(_)))));
  }
}
