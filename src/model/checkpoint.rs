// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model/checkpoint.rs - 模型权重检查点
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array4};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CheckpointError {
  #[error("检查点读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检查点解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("检查点缺少参数: {0}")]
  MissingParam(String),
  #[error("参数 {name} 形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },
  #[error("参数 {name} 数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { name: String, expected: usize, actual: usize },
}

/// 单个权重张量：形状加按行主序展平的数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorEntry {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 层名到权重张量的映射。
///
/// 名称沿用原始训练产物的 state-dict 约定
/// （`vgg.0.weight`、`extras.1.bias`、`L2Norm.weight`、`loc.3.weight` 等）。
/// 任何参数的形状与配置推导出的拓扑不一致都是致命错误，
/// 同一配置必然产生同一组张量形状。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
  tensors: HashMap<String, TensorEntry>,
}

impl Checkpoint {
  /// 从 JSON 文件加载检查点
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
    let path = path.as_ref();
    info!("加载检查点: {}", path.display());
    let file = std::fs::File::open(path)?;
    let checkpoint: Checkpoint = serde_json::from_reader(std::io::BufReader::new(file))?;
    debug!("检查点包含 {} 个参数", checkpoint.tensors.len());
    Ok(checkpoint)
  }

  pub fn from_json_str(text: &str) -> Result<Self, CheckpointError> {
    Ok(serde_json::from_str(text)?)
  }

  /// 由现成的张量映射构造（合成权重、测试工具用）
  pub fn from_tensors(tensors: HashMap<String, TensorEntry>) -> Self {
    Checkpoint { tensors }
  }

  pub fn len(&self) -> usize {
    self.tensors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tensors.is_empty()
  }

  fn entry(&self, name: &str, expected: &[usize]) -> Result<&TensorEntry, CheckpointError> {
    let entry =
      self.tensors.get(name).ok_or_else(|| CheckpointError::MissingParam(name.to_string()))?;
    if entry.shape != expected {
      return Err(CheckpointError::ShapeMismatch {
        name: name.to_string(),
        expected: expected.to_vec(),
        actual: entry.shape.clone(),
      });
    }
    let len: usize = entry.shape.iter().product();
    if entry.data.len() != len {
      return Err(CheckpointError::LengthMismatch {
        name: name.to_string(),
        expected: len,
        actual: entry.data.len(),
      });
    }
    Ok(entry)
  }

  /// 取出一维参数（偏置、逐通道缩放），校验长度
  pub fn tensor1(&self, name: &str, len: usize) -> Result<Array1<f32>, CheckpointError> {
    let entry = self.entry(name, &[len])?;
    Ok(Array1::from_vec(entry.data.clone()))
  }

  /// 取出四维卷积核参数，校验形状
  pub fn tensor4(&self, name: &str, shape: [usize; 4]) -> Result<Array4<f32>, CheckpointError> {
    let entry = self.entry(name, &shape)?;
    let array = Array4::from_shape_vec(
      (shape[0], shape[1], shape[2], shape[3]),
      entry.data.clone(),
    )
    .map_err(|_| CheckpointError::LengthMismatch {
      name: name.to_string(),
      expected: shape.iter().product(),
      actual: entry.data.len(),
    })?;
    Ok(array)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Checkpoint {
    Checkpoint::from_json_str(
      r#"{
        "loc.0.weight": { "shape": [8, 4, 1, 1], "data": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
          0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
          0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] },
        "loc.0.bias": { "shape": [8], "data": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8] }
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn loads_and_extracts() {
    let checkpoint = sample();
    assert_eq!(checkpoint.len(), 2);
    let weight = checkpoint.tensor4("loc.0.weight", [8, 4, 1, 1]).unwrap();
    assert_eq!(weight.dim(), (8, 4, 1, 1));
    let bias = checkpoint.tensor1("loc.0.bias", 8).unwrap();
    assert_eq!(bias[7], 0.8);
  }

  #[test]
  fn missing_param_is_fatal() {
    let checkpoint = sample();
    assert!(matches!(
      checkpoint.tensor1("conf.0.bias", 4),
      Err(CheckpointError::MissingParam(_))
    ));
  }

  #[test]
  fn wrong_shape_is_fatal() {
    let checkpoint = sample();
    let err = checkpoint.tensor4("loc.0.weight", [4, 8, 1, 1]).unwrap_err();
    assert!(matches!(err, CheckpointError::ShapeMismatch { .. }));
  }

  #[test]
  fn inconsistent_data_length_is_fatal() {
    let checkpoint = Checkpoint::from_json_str(
      r#"{ "L2Norm.weight": { "shape": [4], "data": [1.0, 2.0] } }"#,
    )
    .unwrap();
    assert!(matches!(
      checkpoint.tensor1("L2Norm.weight", 4),
      Err(CheckpointError::LengthMismatch { .. })
    ));
  }
}
