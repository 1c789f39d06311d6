// 该文件是 Xunwen （寻文） 项目的一部分。
// src/anchor.rs - 默认锚框生成
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::config::TextBoxesConfig;

/// 中心形式的默认锚框，坐标归一化到 [0,1]。
///
/// 整套锚框在模型构建时生成一次，之后只读共享；
/// 其顺序与检测头输出的逐锚框顺序一一对应。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

impl AnchorBox {
  fn clamped(self) -> Self {
    AnchorBox {
      cx: self.cx.clamp(0.0, 1.0),
      cy: self.cy.clamp(0.0, 1.0),
      w: self.w.clamp(0.0, 1.0),
      h: self.h.clamp(0.0, 1.0),
    }
  }
}

/// 按配置生成全部默认锚框。
///
/// 顺序为：特征图按配置序列，图内按行主序遍历位置，
/// 每个位置依次是基准正方形、几何平均正方形、然后逐长宽比的矩形。
/// 检测头必须按完全相同的顺序输出偏移量与得分。
pub fn generate(config: &TextBoxesConfig) -> Vec<AnchorBox> {
  let mut anchors = Vec::with_capacity(config.total_anchors());

  for map in &config.maps {
    let size = map.size as f32;
    for row in 0..map.size {
      for col in 0..map.size {
        let cx = (col as f32 + 0.5) / size;
        let cy = (row as f32 + 0.5) / size;

        // 基准尺度的正方形
        let s = map.min_size;
        push(&mut anchors, config.clip, AnchorBox { cx, cy, w: s, h: s });

        // 与下一尺度几何平均的较大正方形
        let s_prime = (map.min_size * map.max_size).sqrt();
        push(&mut anchors, config.clip, AnchorBox { cx, cy, w: s_prime, h: s_prime });

        // 逐长宽比的矩形
        for &ratio in &map.ratios {
          let root = ratio.sqrt();
          push(&mut anchors, config.clip, AnchorBox { cx, cy, w: s * root, h: s / root });
        }
      }
    }
  }

  anchors
}

fn push(anchors: &mut Vec<AnchorBox>, clip: bool, anchor: AnchorBox) {
  anchors.push(if clip { anchor.clamped() } else { anchor });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{FeatureMapSpec, TextBoxesConfig};

  fn two_map_config() -> TextBoxesConfig {
    TextBoxesConfig {
      name: "test".to_string(),
      input_size: 300,
      num_classes: 2,
      variances: [0.1, 0.2],
      clip: true,
      mean: [104.0, 117.0, 123.0],
      maps: vec![
        FeatureMapSpec { size: 38, min_size: 0.1, max_size: 0.2, ratios: vec![2.0, 0.5] },
        FeatureMapSpec {
          size: 19,
          min_size: 0.2,
          max_size: 0.37,
          ratios: vec![2.0, 0.5, 3.0, 1.0 / 3.0],
        },
      ],
    }
  }

  #[test]
  fn count_matches_configuration() {
    let config = two_map_config();
    let anchors = generate(&config);
    assert_eq!(anchors.len(), 38 * 38 * 4 + 19 * 19 * 6);
    assert_eq!(anchors.len(), config.total_anchors());
  }

  #[test]
  fn anchors_are_well_formed() {
    let anchors = generate(&TextBoxesConfig::text_300());
    for anchor in &anchors {
      assert!(anchor.w > 0.0 && anchor.h > 0.0);
      assert!((0.0..=1.0).contains(&anchor.cx));
      assert!((0.0..=1.0).contains(&anchor.cy));
    }
  }

  #[test]
  fn clip_disabled_keeps_oversized_extents() {
    let mut config = TextBoxesConfig::text_300();
    config.clip = false;
    let anchors = generate(&config);
    // 最后一张 1×1 特征图的几何平均正方形超出 [0,1]
    assert!(anchors.iter().any(|a| a.w > 1.0));

    config.clip = true;
    let clipped = generate(&config);
    assert!(clipped.iter().all(|a| a.w <= 1.0 && a.h <= 1.0));
  }

  #[test]
  fn per_location_variant_order() {
    let config = two_map_config();
    let anchors = generate(&config);
    // 第一个位置 (0,0)：正方形 s、正方形 √(s·s')、比例 2、比例 1/2
    let s = 0.1f32;
    let s_prime = (0.1f32 * 0.2).sqrt();
    assert!((anchors[0].w - s).abs() < 1e-6);
    assert!((anchors[0].h - s).abs() < 1e-6);
    assert!((anchors[1].w - s_prime).abs() < 1e-6);
    assert!((anchors[2].w - s * 2.0f32.sqrt()).abs() < 1e-6);
    assert!((anchors[2].h - s / 2.0f32.sqrt()).abs() < 1e-6);
    assert!((anchors[3].w - s * 0.5f32.sqrt()).abs() < 1e-6);
  }

  #[test]
  fn cell_centers_follow_grid() {
    let config = two_map_config();
    let anchors = generate(&config);
    // (行 0, 列 1) 的第一个锚框中心
    let second_cell = &anchors[4];
    assert!((second_cell.cx - 1.5 / 38.0).abs() < 1e-6);
    assert!((second_cell.cy - 0.5 / 38.0).abs() < 1e-6);
  }
}
