// 该文件是 Xunwen （寻文） 项目的一部分。
// src/output/draw.rs - 检测结果可视化输出
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

use std::path::{Path, PathBuf};

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::frame::DetectFrame;
use crate::model::DetectResult;
use crate::output::{OutputError, Render};

const BOX_COLOR: [u8; 3] = [255, 0, 0];
const BOX_THICKNESS: i32 = 2;

/// 可视化输出：把保留下来的检测框画到原图上，
/// 存为 `<imageid>_det.png`。单前景类，只画边框不写标签。
pub struct DrawOutput {
  directory: PathBuf,
}

impl DrawOutput {
  pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, OutputError> {
    let directory = directory.as_ref().to_path_buf();
    std::fs::create_dir_all(&directory)
      .map_err(|source| OutputError::IoError { path: directory.clone(), source })?;
    Ok(DrawOutput { directory })
  }
}

impl Render<DetectFrame, DetectResult> for DrawOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &DetectFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let mut canvas = frame.image.clone();
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    for item in &result.items {
      let [xmin, ymin, xmax, ymax] = item.bbox;
      let xmin = (xmin as i32).clamp(0, width - 1);
      let ymin = (ymin as i32).clamp(0, height - 1);
      let xmax = (xmax as i32).clamp(0, width - 1);
      let ymax = (ymax as i32).clamp(0, height - 1);
      if xmin >= xmax || ymin >= ymax {
        continue;
      }

      for t in 0..BOX_THICKNESS {
        let rect_w = (xmax - xmin - 2 * t).max(1) as u32;
        let rect_h = (ymax - ymin - 2 * t).max(1) as u32;
        draw_hollow_rect_mut(
          &mut canvas,
          Rect::at(xmin + t, ymin + t).of_size(rect_w, rect_h),
          Rgb(BOX_COLOR),
        );
      }
    }

    let path = self.directory.join(format!("{}_det.png", frame.image_id));
    debug!("保存可视化 {}", path.display());
    canvas.save(&path)?;
    Ok(())
  }
}
