// 该文件是 Xunwen （寻文） 项目的一部分。
// src/decode.rs - 锚框偏移解码与置信度过滤
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use crate::anchor::AnchorBox;
use crate::model::{RawPrediction, TextDetection};

/// 前景（文本）类别在得分通道中的下标；0 为背景。
const TEXT_CLASS: usize = 1;

/// 把检测头的原始输出解码为绝对坐标的候选框。
///
/// `raw.conf` 要求已经过 softmax 归一化。纯函数：相同输入必然产生
/// 相同输出，无隐藏状态。低于阈值的锚框直接丢弃（大多数锚框是背景，
/// 这是预期的常见情况，不是错误）。
///
/// 解码公式（方差缩放）：
///   cx = a.cx + dx·v0·a.w      w = a.w·exp(dw·v1)
///   cy = a.cy + dy·v0·a.h      h = a.h·exp(dh·v1)
/// 随后转为角点形式，并按原图宽高缩放到像素坐标。
/// 输出按得分降序排列（稳定排序，同分保持锚框原序）。
pub fn decode(
  raw: &RawPrediction,
  anchors: &[AnchorBox],
  variances: [f32; 2],
  threshold: f32,
  image_width: u32,
  image_height: u32,
) -> Vec<TextDetection> {
  let width = image_width as f32;
  let height = image_height as f32;
  let [v0, v1] = variances;

  let mut detections = Vec::new();
  for (index, anchor) in anchors.iter().enumerate() {
    let score = raw.conf[index * raw.num_classes + TEXT_CLASS];
    if score < threshold {
      continue;
    }

    let dx = raw.loc[index * 4];
    let dy = raw.loc[index * 4 + 1];
    let dw = raw.loc[index * 4 + 2];
    let dh = raw.loc[index * 4 + 3];

    let cx = anchor.cx + dx * v0 * anchor.w;
    let cy = anchor.cy + dy * v0 * anchor.h;
    let w = anchor.w * (dw * v1).exp();
    let h = anchor.h * (dh * v1).exp();

    detections.push(TextDetection {
      score,
      bbox: [
        (cx - w / 2.0) * width,
        (cy - h / 2.0) * height,
        (cx + w / 2.0) * width,
        (cy + h / 2.0) * height,
      ],
    });
  }

  detections.sort_by(|a, b| b.score.total_cmp(&a.score));
  detections
}
