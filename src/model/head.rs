// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model/head.rs - 多框检测头
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array1, Array3, Array4};
use thiserror::Error;

use crate::config::TextBoxesConfig;
use crate::model::{Checkpoint, CheckpointError, RawPrediction};

#[derive(Error, Debug)]
pub enum HeadError {
  #[error("来源特征图数量不匹配: 期望 {expected}, 实际 {actual}")]
  SourceCountMismatch { expected: usize, actual: usize },
  #[error("来源特征图 {index} 形状不匹配: 期望 {expected_channels}×{expected_size}×{expected_size}, 实际 {actual_channels}×{actual_h}×{actual_w}")]
  SourceShapeMismatch {
    index: usize,
    expected_channels: usize,
    expected_size: usize,
    actual_channels: usize,
    actual_h: usize,
    actual_w: usize,
  },
}

struct HeadLayer {
  // 配置推导的期望输入形状，前向时校验
  in_channels: usize,
  map_size: usize,
  anchors_per_location: usize,
  loc_weight: Array4<f32>,
  loc_bias: Array1<f32>,
  conf_weight: Array4<f32>,
  conf_bias: Array1<f32>,
}

/// 多框检测头：每张来源特征图上两路并行的 1×1 投影，
/// 分别产生逐锚框的 4 个回归偏移和 num_classes 个类别得分。
///
/// 输出按锚框生成器的顺序串接：特征图序列 → 行主序位置 →
/// 位置内锚框变体。卷积通道布局为 (变体, 分量)，
/// 即回归通道 a·4+j、得分通道 a·num_classes+k。
/// 这个排序契约弄错不会报错，只会让每个解码框悄悄错位，
/// 因此形状全部在构建与前向时显式校验。
pub struct MultiboxHead {
  layers: Vec<HeadLayer>,
  num_classes: usize,
}

impl MultiboxHead {
  /// 按配置推导的拓扑从检查点取两路投影权重。
  ///
  /// 调用方保证 `source_channels` 与 `config.maps` 等长；
  /// 任何权重形状不符都是致命的配置错误。
  pub fn from_checkpoint(
    checkpoint: &Checkpoint,
    config: &TextBoxesConfig,
    source_channels: &[usize],
  ) -> Result<Self, CheckpointError> {
    let mut layers = Vec::with_capacity(config.maps.len());
    for (index, (map, &in_channels)) in config.maps.iter().zip(source_channels).enumerate() {
      let anchors = map.anchors_per_location();
      let loc_out = anchors * 4;
      let conf_out = anchors * config.num_classes;

      layers.push(HeadLayer {
        in_channels,
        map_size: map.size,
        anchors_per_location: anchors,
        loc_weight: checkpoint
          .tensor4(&format!("loc.{index}.weight"), [loc_out, in_channels, 1, 1])?,
        loc_bias: checkpoint.tensor1(&format!("loc.{index}.bias"), loc_out)?,
        conf_weight: checkpoint
          .tensor4(&format!("conf.{index}.weight"), [conf_out, in_channels, 1, 1])?,
        conf_bias: checkpoint.tensor1(&format!("conf.{index}.bias"), conf_out)?,
      });
    }

    Ok(MultiboxHead { layers, num_classes: config.num_classes })
  }

  /// 检测头覆盖的锚框总数，必须与锚框生成器的输出长度一致
  pub fn total_anchors(&self) -> usize {
    self.layers.iter().map(|l| l.map_size * l.map_size * l.anchors_per_location).sum()
  }

  /// 对全部来源特征图做投影并按锚框顺序串接
  pub fn forward(&self, sources: &[Array3<f32>]) -> Result<RawPrediction, HeadError> {
    if sources.len() != self.layers.len() {
      return Err(HeadError::SourceCountMismatch {
        expected: self.layers.len(),
        actual: sources.len(),
      });
    }

    let total = self.total_anchors();
    let mut loc = Vec::with_capacity(total * 4);
    let mut conf = Vec::with_capacity(total * self.num_classes);

    for (index, (layer, source)) in self.layers.iter().zip(sources).enumerate() {
      let (channels, h, w) = source.dim();
      if channels != layer.in_channels || h != layer.map_size || w != layer.map_size {
        return Err(HeadError::SourceShapeMismatch {
          index,
          expected_channels: layer.in_channels,
          expected_size: layer.map_size,
          actual_channels: channels,
          actual_h: h,
          actual_w: w,
        });
      }

      for row in 0..h {
        for col in 0..w {
          for channel in 0..layer.anchors_per_location * 4 {
            loc.push(project(source, &layer.loc_weight, &layer.loc_bias, channel, row, col));
          }
          for channel in 0..layer.anchors_per_location * self.num_classes {
            conf.push(project(source, &layer.conf_weight, &layer.conf_bias, channel, row, col));
          }
        }
      }
    }

    Ok(RawPrediction { loc, conf, num_classes: self.num_classes })
  }
}

// 单个输出通道在单个空间位置上的 1×1 投影
fn project(
  source: &Array3<f32>,
  weight: &Array4<f32>,
  bias: &Array1<f32>,
  channel: usize,
  row: usize,
  col: usize,
) -> f32 {
  let in_channels = weight.dim().1;
  let mut acc = bias[channel];
  for ic in 0..in_channels {
    acc += source[[ic, row, col]] * weight[[channel, ic, 0, 0]];
  }
  acc
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::anchor;
  use crate::config::FeatureMapSpec;
  use ndarray::Array;

  fn tiny_config() -> TextBoxesConfig {
    TextBoxesConfig {
      name: "tiny".to_string(),
      input_size: 8,
      num_classes: 2,
      variances: [0.1, 0.2],
      clip: true,
      mean: [0.0, 0.0, 0.0],
      maps: vec![
        FeatureMapSpec { size: 2, min_size: 0.4, max_size: 0.8, ratios: vec![2.0] },
        FeatureMapSpec { size: 1, min_size: 0.8, max_size: 1.0, ratios: vec![] },
      ],
    }
  }

  fn bias_only_head(config: &TextBoxesConfig, channels: &[usize]) -> MultiboxHead {
    let mut layers = Vec::new();
    for (map, &in_channels) in config.maps.iter().zip(channels) {
      let anchors = map.anchors_per_location();
      layers.push(HeadLayer {
        in_channels,
        map_size: map.size,
        anchors_per_location: anchors,
        loc_weight: Array4::zeros((anchors * 4, in_channels, 1, 1)),
        loc_bias: Array::from_iter((0..anchors * 4).map(|v| v as f32)),
        conf_weight: Array4::zeros((anchors * 2, in_channels, 1, 1)),
        conf_bias: Array::from_iter((0..anchors * 2).map(|v| v as f32 * 10.0)),
      });
    }
    MultiboxHead { layers, num_classes: config.num_classes }
  }

  #[test]
  fn anchor_total_matches_generator() {
    let config = tiny_config();
    let head = bias_only_head(&config, &[4, 8]);
    assert_eq!(head.total_anchors(), anchor::generate(&config).len());
    assert_eq!(head.total_anchors(), 2 * 2 * 3 + 1 * 1 * 2);
  }

  #[test]
  fn forward_emits_anchor_major_order() {
    let config = tiny_config();
    let head = bias_only_head(&config, &[4, 8]);
    let sources = vec![Array3::zeros((4, 2, 2)), Array3::zeros((8, 1, 1))];
    let raw = head.forward(&sources).unwrap();

    assert_eq!(raw.total_anchors(), head.total_anchors());
    assert_eq!(raw.loc.len(), raw.total_anchors() * 4);
    assert_eq!(raw.conf.len(), raw.total_anchors() * 2);

    // 第一张图每个位置 3 个变体：回归偏置按通道序 0..12 重复
    let per_loc: Vec<f32> = (0..12).map(|v| v as f32).collect();
    assert_eq!(&raw.loc[..12], per_loc.as_slice());
    assert_eq!(&raw.loc[12..24], per_loc.as_slice());
    // 得分按 (变体, 类别) 展开
    assert_eq!(&raw.conf[..6], &[0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
  }

  #[test]
  fn projection_mixes_input_channels() {
    let config = tiny_config();
    let in_channels = 2;
    let map = &config.maps[1];
    let anchors = map.anchors_per_location();
    let mut loc_weight = Array4::zeros((anchors * 4, in_channels, 1, 1));
    loc_weight[[0, 0, 0, 0]] = 1.0;
    loc_weight[[0, 1, 0, 0]] = 2.0;
    let layer = HeadLayer {
      in_channels,
      map_size: 1,
      anchors_per_location: anchors,
      loc_weight,
      loc_bias: Array1::zeros(anchors * 4),
      conf_weight: Array4::zeros((anchors * 2, in_channels, 1, 1)),
      conf_bias: Array1::zeros(anchors * 2),
    };
    let head = MultiboxHead { layers: vec![layer], num_classes: 2 };
    let source = Array::from_shape_vec((2, 1, 1), vec![3.0, 5.0]).unwrap();
    let raw = head.forward(&[source]).unwrap();
    assert_eq!(raw.loc[0], 13.0);
  }

  #[test]
  fn forward_rejects_wrong_source_shapes() {
    let config = tiny_config();
    let head = bias_only_head(&config, &[4, 8]);
    let too_few = vec![Array3::zeros((4, 2, 2))];
    assert!(matches!(head.forward(&too_few), Err(HeadError::SourceCountMismatch { .. })));

    let wrong_size = vec![Array3::zeros((4, 3, 3)), Array3::zeros((8, 1, 1))];
    assert!(matches!(head.forward(&wrong_size), Err(HeadError::SourceShapeMismatch { .. })));
  }

  #[test]
  fn checkpoint_shape_drift_is_fatal() {
    let config = tiny_config();
    // loc.0 权重按 4 锚框/位置给出，配置却要求 3 个
    let json = r#"{
      "loc.0.weight": { "shape": [16, 4, 1, 1], "data": [] },
      "loc.0.bias": { "shape": [16], "data": [] }
    }"#;
    let checkpoint = Checkpoint::from_json_str(json).unwrap();
    assert!(matches!(
      MultiboxHead::from_checkpoint(&checkpoint, &config, &[4, 8]),
      Err(CheckpointError::ShapeMismatch { .. })
    ));
  }
}
