// 该文件是 Xunwen （寻文） 项目的一部分。
// src/config.rs - 检测器配置（锚框与检测头的共享排序契约）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("不支持的网络阶段: {0}")]
  UnsupportedPhase(String),
  #[error("未知的执行设备: {0}")]
  UnknownDevice(String),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// 执行设备。
///
/// 显式地作为参数贯穿模型构建流程，而不是全局的默认张量类型。
/// 当前仅实现 CPU 推理；GPU 在构建时回退到 CPU 并给出警告。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  Cpu,
  Gpu,
}

impl FromStr for Device {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cpu" => Ok(Device::Cpu),
      "gpu" | "cuda" => Ok(Device::Gpu),
      other => Err(ConfigError::UnknownDevice(other.to_string())),
    }
  }
}

/// 网络阶段。
///
/// 本项目只实现推理（test 阶段）；训练阶段属于非目标，
/// 解析到 train 或其他值都是致命的配置错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Test,
}

impl FromStr for Phase {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "test" => Ok(Phase::Test),
      "train" => Err(ConfigError::UnsupportedPhase(
        "train 阶段未实现（训练为非目标）".to_string(),
      )),
      other => Err(ConfigError::UnsupportedPhase(other.to_string())),
    }
  }
}

/// 单个来源特征图的锚框配置。
///
/// 每个空间位置产生 `2 + ratios.len()` 个锚框变体：
/// 基准尺度的正方形、与下一尺度几何平均的较大正方形，
/// 以及每个长宽比一个的矩形（宽 = s·√r，高 = s/√r）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMapSpec {
  /// 特征图边长（位置数 = size × size）
  pub size: usize,
  /// 基准尺度（相对输入尺寸归一化）
  pub min_size: f32,
  /// 下一级尺度，用于较大正方形锚框的几何平均
  pub max_size: f32,
  /// 长宽比列表（倒数需显式列出，如 [2.0, 0.5]）
  pub ratios: Vec<f32>,
}

impl FeatureMapSpec {
  /// 每个空间位置的锚框变体数
  pub fn anchors_per_location(&self) -> usize {
    2 + self.ratios.len()
  }

  /// 该特征图贡献的锚框总数
  pub fn anchor_count(&self) -> usize {
    self.size * self.size * self.anchors_per_location()
  }
}

/// 检测器配置。
///
/// 锚框生成器与检测头都从同一个配置对象推导各自的输出规模与顺序，
/// 这样两者之间的排序契约是显式的，而不是数组下标上的巧合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBoxesConfig {
  /// 配置名称（仅用于日志）
  pub name: String,
  /// 网络输入边长（预处理时图像缩放到该尺寸）
  pub input_size: u32,
  /// 类别数（背景 + 文本 = 2）
  pub num_classes: usize,
  /// 解码方差 [中心, 尺寸]
  pub variances: [f32; 2],
  /// 是否把锚框裁剪到 [0,1] 内
  pub clip: bool,
  /// 预处理逐通道均值（BGR 顺序）
  pub mean: [f32; 3],
  /// 来源特征图列表，从高分辨率到低分辨率排列
  pub maps: Vec<FeatureMapSpec>,
}

impl TextBoxesConfig {
  /// 300×300 输入的文本检测配置（TextBoxes 论文设定）
  pub fn text_300() -> Self {
    TextBoxesConfig {
      name: "text_300".to_string(),
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
        FeatureMapSpec {
          size: 10,
          min_size: 0.37,
          max_size: 0.54,
          ratios: vec![2.0, 0.5, 3.0, 1.0 / 3.0],
        },
        FeatureMapSpec {
          size: 5,
          min_size: 0.54,
          max_size: 0.71,
          ratios: vec![2.0, 0.5, 3.0, 1.0 / 3.0],
        },
        FeatureMapSpec { size: 3, min_size: 0.71, max_size: 0.88, ratios: vec![2.0, 0.5] },
        FeatureMapSpec { size: 1, min_size: 0.88, max_size: 1.05, ratios: vec![2.0, 0.5] },
      ],
    }
  }

  /// 所有特征图的锚框总数
  pub fn total_anchors(&self) -> usize {
    self.maps.iter().map(FeatureMapSpec::anchor_count).sum()
  }

  /// 从 JSON 文件加载配置
  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config: TextBoxesConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
  }

  /// 校验配置自洽性；失败属于致命的配置错误
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.input_size == 0 {
      return Err(ConfigError::Invalid("输入尺寸必须为正".to_string()));
    }
    if self.num_classes < 2 {
      return Err(ConfigError::Invalid(format!(
        "类别数必须至少为 2（背景 + 前景），实际为 {}",
        self.num_classes
      )));
    }
    if self.variances[0] <= 0.0 || self.variances[1] <= 0.0 {
      return Err(ConfigError::Invalid(format!("方差必须为正: {:?}", self.variances)));
    }
    if self.maps.is_empty() {
      return Err(ConfigError::Invalid("至少需要一个来源特征图".to_string()));
    }
    for (index, map) in self.maps.iter().enumerate() {
      if map.size == 0 {
        return Err(ConfigError::Invalid(format!("特征图 {} 尺寸为零", index)));
      }
      if map.min_size <= 0.0 || map.max_size <= map.min_size {
        return Err(ConfigError::Invalid(format!(
          "特征图 {} 尺度无效: min={}, max={}",
          index, map.min_size, map.max_size
        )));
      }
      if map.ratios.iter().any(|r| *r <= 0.0) {
        return Err(ConfigError::Invalid(format!("特征图 {} 含非正长宽比", index)));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn text_300_anchor_total() {
    let config = TextBoxesConfig::text_300();
    // 38²·4 + 19²·6 + 10²·6 + 5²·6 + 3²·4 + 1²·4 = 8732
    assert_eq!(config.total_anchors(), 8732);
    config.validate().unwrap();
  }

  #[test]
  fn phase_rejects_train_and_unknown() {
    assert!(Phase::from_str("test").is_ok());
    assert!(matches!(Phase::from_str("train"), Err(ConfigError::UnsupportedPhase(_))));
    assert!(matches!(Phase::from_str("deploy"), Err(ConfigError::UnsupportedPhase(_))));
  }

  #[test]
  fn device_parses() {
    assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
    assert_eq!(Device::from_str("gpu").unwrap(), Device::Gpu);
    assert!(Device::from_str("npu").is_err());
  }

  #[test]
  fn validate_rejects_bad_scales() {
    let mut config = TextBoxesConfig::text_300();
    config.maps[0].max_size = config.maps[0].min_size;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
  }
}
