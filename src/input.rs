// 该文件是 Xunwen （寻文） 项目的一部分。
// src/input.rs - 输入源模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use thiserror::Error;

mod image_dir;

pub use image_dir::ImageDirSource;

/// 单张图像层面的输入错误。
///
/// 数据集扫描中这类错误是可恢复的：跳过该图像并记录诊断，
/// 不中断整个扫描。
#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("图像解码错误: {path}: {source}")]
  ImageError {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("不是目录: {0}")]
  NotADirectory(PathBuf),
}
