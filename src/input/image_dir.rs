// 该文件是 Xunwen （寻文） 项目的一部分。
// src/input/image_dir.rs - 图像目录输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::{debug, info};

use crate::frame::DetectFrame;
use crate::input::InputError;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// 数据集目录输入源：按文件名顺序遍历目录中的图像文件。
///
/// 单张图像读取失败通过 `Err` 项暴露给调用方，迭代继续；
/// 一个损坏的文件不应中止整个数据集扫描。
pub struct ImageDirSource {
  entries: std::vec::IntoIter<PathBuf>,
}

impl ImageDirSource {
  pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, InputError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
      return Err(InputError::NotADirectory(directory.to_path_buf()));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(directory)
      .map_err(|source| InputError::IoError { path: directory.to_path_buf(), source })?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| is_image_file(path))
      .collect();
    entries.sort();

    info!("输入目录 {}: {} 张图像", directory.display(), entries.len());
    Ok(ImageDirSource { entries: entries.into_iter() })
  }

  fn load(path: &Path) -> Result<DetectFrame, InputError> {
    let image_id = path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    debug!("读取图像 {}", path.display());

    let reader = ImageReader::open(path)
      .map_err(|source| InputError::IoError { path: path.to_path_buf(), source })?;
    let image = reader
      .decode()
      .map_err(|source| InputError::ImageError { path: path.to_path_buf(), source })?;

    Ok(DetectFrame::new(image_id, image.into()))
  }
}

impl Iterator for ImageDirSource {
  type Item = Result<DetectFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.entries.next()?;
    Some(Self::load(&path))
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .map(|ext| {
      let lower = ext.to_string_lossy().to_lowercase();
      IMAGE_EXTENSIONS.contains(&lower.as_str())
    })
    .unwrap_or(false)
}
