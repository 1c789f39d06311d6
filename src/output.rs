// 该文件是 Xunwen （寻文） 项目的一部分。
// src/output.rs - 输出模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use thiserror::Error;

mod draw;
mod result_record;

pub use draw::DrawOutput;
pub use result_record::ResultRecordOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 结果渲染 trait：把一帧的检测结果写到某个去处
pub trait Render<F, D> {
  type Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error>;
}
