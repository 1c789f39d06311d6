// 该文件是 Xunwen （寻文） 项目的一部分。
// src/frame.rs - 输入帧定义
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

use image::RgbImage;

/// 一张待检测图像及其标识。
///
/// 图像保持原始尺寸；缩放、通道重排与减均值由模型预处理完成，
/// 解码出的框坐标相对这里的原始宽高。
#[derive(Debug, Clone)]
pub struct DetectFrame {
  /// 图像标识（文件主名），输出文件 `res_<id>.txt` 由此决定
  pub image_id: String,
  /// 原始 RGB 图像
  pub image: RgbImage,
}

impl DetectFrame {
  pub fn new(image_id: impl Into<String>, image: RgbImage) -> Self {
    DetectFrame { image_id: image_id.into(), image }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
