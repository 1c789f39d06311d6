// 该文件是 Xunwen （寻文） 项目的一部分。
// src/output/result_record.rs - 检测结果文本输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::frame::DetectFrame;
use crate::model::DetectResult;
use crate::output::{OutputError, Render};

/// 评测格式的结果输出：每张图像一个 `res_<imageid>.txt`，
/// 每个检测框一行 `xmin,ymin,xmax,ymax`（整数像素坐标），行尾 CRLF。
///
/// 没有检测框的图像同样产生输出文件，内容为空；零检测是正常结果，
/// 不是错误。
pub struct ResultRecordOutput {
  directory: PathBuf,
}

impl ResultRecordOutput {
  pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, OutputError> {
    let directory = directory.as_ref().to_path_buf();
    std::fs::create_dir_all(&directory)
      .map_err(|source| OutputError::IoError { path: directory.clone(), source })?;
    Ok(ResultRecordOutput { directory })
  }

  pub fn result_path(&self, image_id: &str) -> PathBuf {
    self.directory.join(format!("res_{image_id}.txt"))
  }
}

impl Render<DetectFrame, DetectResult> for ResultRecordOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &DetectFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let path = self.result_path(&frame.image_id);

    let mut text = String::new();
    for item in &result.items {
      let [xmin, ymin, xmax, ymax] = item.bbox;
      let _ = writeln!(
        text,
        "{},{},{},{}\r",
        xmin as i32, ymin as i32, xmax as i32, ymax as i32
      );
    }

    debug!("写出 {} ({} 个框)", path.display(), result.len());
    std::fs::write(&path, text).map_err(|source| OutputError::IoError { path, source })?;
    Ok(())
  }
}
