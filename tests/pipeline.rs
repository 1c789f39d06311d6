// 该文件是 Xunwen （寻文） 项目的一部分。
// tests/pipeline.rs - 检测管线端到端测试
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use ndarray::Array3;

use xunwen::config::{FeatureMapSpec, TextBoxesConfig};
use xunwen::frame::DetectFrame;
use xunwen::model::{
  Checkpoint, ExtractError, FeatureExtractor, Model, MultiboxHead, TextBoxes, TextBoxesError,
};
use xunwen::output::{Render, ResultRecordOutput};

/// 返回固定特征图的提取器，用于让检测头的输出可以手工推算
struct FixedExtractor {
  maps: Vec<Array3<f32>>,
  channels: Vec<usize>,
}

impl FeatureExtractor for FixedExtractor {
  fn source_channels(&self) -> &[usize] {
    &self.channels
  }

  fn extract(&self, _input: &Array3<f32>) -> Result<Vec<Array3<f32>>, ExtractError> {
    Ok(self.maps.clone())
  }
}

fn tiny_config() -> TextBoxesConfig {
  TextBoxesConfig {
    name: "tiny".to_string(),
    input_size: 8,
    num_classes: 2,
    variances: [0.1, 0.2],
    clip: true,
    mean: [104.0, 117.0, 123.0],
    maps: vec![FeatureMapSpec { size: 1, min_size: 0.5, max_size: 0.72, ratios: vec![] }],
  }
}

// 1×1 特征图上 2 个锚框变体：全零权重，偏置让 0 号锚框是文本、1 号是背景
fn tiny_checkpoint() -> Checkpoint {
  Checkpoint::from_json_str(
    r#"{
      "loc.0.weight": { "shape": [8, 2, 1, 1],
        "data": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0] },
      "loc.0.bias": { "shape": [8], "data": [0, 0, 0, 0, 0, 0, 0, 0] },
      "conf.0.weight": { "shape": [4, 2, 1, 1], "data": [0, 0, 0, 0, 0, 0, 0, 0] },
      "conf.0.bias": { "shape": [4], "data": [0, 5, 5, 0] }
    }"#,
  )
  .unwrap()
}

fn tiny_model(threshold: f32) -> TextBoxes<FixedExtractor> {
  let config = tiny_config();
  let head = MultiboxHead::from_checkpoint(&tiny_checkpoint(), &config, &[2]).unwrap();
  let extractor =
    FixedExtractor { maps: vec![Array3::zeros((2, 1, 1))], channels: vec![2] };
  TextBoxes::new(config, extractor, head, threshold, 0.45, 200).unwrap()
}

#[test]
fn single_confident_anchor_comes_back_unchanged() {
  let model = tiny_model(0.5);
  let frame = DetectFrame::new("synthetic", RgbImage::new(100, 50));

  let result = model.infer(&frame).unwrap();
  assert_eq!(result.len(), 1);

  let item = result.items[0];
  assert!(item.score > 0.99);
  // 零偏移解码必须原样返回锚框，仅按原图尺寸缩放：
  // 锚框 (0.5, 0.5, 0.5, 0.5) → [25, 12.5, 75, 37.5]
  assert!((item.bbox[0] - 25.0).abs() < 1e-3);
  assert!((item.bbox[1] - 12.5).abs() < 1e-3);
  assert!((item.bbox[2] - 75.0).abs() < 1e-3);
  assert!((item.bbox[3] - 37.5).abs() < 1e-3);
}

#[test]
fn inference_is_deterministic() {
  let model = tiny_model(0.5);
  let frame = DetectFrame::new("synthetic", RgbImage::new(64, 64));
  let a = model.infer(&frame).unwrap();
  let b = model.infer(&frame).unwrap();
  assert_eq!(a.items, b.items);
}

#[test]
fn impossible_threshold_writes_empty_result_file() {
  let model = tiny_model(1.1);
  let frame = DetectFrame::new("blank", RgbImage::new(32, 32));
  let result = model.infer(&frame).unwrap();
  assert!(result.is_empty());

  let dir = std::env::temp_dir().join("xunwen-pipeline-empty-test");
  let output = ResultRecordOutput::new(&dir).unwrap();
  output.render_result(&frame, &result).unwrap();

  let path = dir.join("res_blank.txt");
  assert!(path.exists());
  assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
  std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn detections_written_in_eval_format() {
  let model = tiny_model(0.5);
  let frame = DetectFrame::new("img_7", RgbImage::new(100, 50));
  let result = model.infer(&frame).unwrap();

  let dir = std::env::temp_dir().join("xunwen-pipeline-record-test");
  let output = ResultRecordOutput::new(&dir).unwrap();
  output.render_result(&frame, &result).unwrap();

  let text = std::fs::read_to_string(dir.join("res_img_7.txt")).unwrap();
  assert_eq!(text, "25,12,75,37\r\n");
  std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn anchor_head_count_mismatch_is_fatal() {
  let config = tiny_config();
  let head = MultiboxHead::from_checkpoint(&tiny_checkpoint(), &config, &[2]).unwrap();

  // 同一检测头配上多一个长宽比的配置：锚框生成器会多出一个变体
  let mut drifted = config;
  drifted.maps[0].ratios = vec![2.0];
  let extractor = FixedExtractor { maps: vec![Array3::zeros((2, 1, 1))], channels: vec![2] };

  let result = TextBoxes::new(drifted, extractor, head, 0.5, 0.45, 200);
  assert!(matches!(result, Err(TextBoxesError::AnchorCountMismatch { anchors: 3, head: 2 })));
}
