// 该文件是 Xunwen （寻文） 项目的一部分。
// src/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::model::TextDetection;

/// 两个角点形式框的交并比，无重叠时为 0。
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 贪心抑制冗余重叠框。
///
/// 输入要求已按得分降序排列（解码器的输出即满足）。反复取出当前
/// 最高分的框输出，并删除与其 IoU 超过阈值的其余框，直到为空或
/// 已输出 `top_k` 个。单前景类，类别无关；空输入返回空输出。
pub fn suppress(
  detections: Vec<TextDetection>,
  iou_threshold: f32,
  top_k: usize,
) -> Vec<TextDetection> {
  let mut remaining = detections;
  let mut kept = Vec::new();

  while !remaining.is_empty() && kept.len() < top_k {
    let best = remaining.remove(0);
    remaining.retain(|other| iou(&best.bbox, &other.bbox) <= iou_threshold);
    kept.push(best);
  }

  kept
}
