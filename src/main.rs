// 该文件是 Xunwen （寻文） 项目的一部分。
// src/main.rs - 数据集评测主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use xunwen::config::{Device, TextBoxesConfig};
use xunwen::frame::DetectFrame;
use xunwen::input::ImageDirSource;
use xunwen::model::{DetectResult, TextBoxesBuilder};
use xunwen::output::{DrawOutput, OutputError, Render, ResultRecordOutput};
use xunwen::task::{BatchEvalTask, Task};

/// 评测输出：必写的结果文本，外加可选的可视化
struct EvalOutput {
  record: ResultRecordOutput,
  draw: Option<DrawOutput>,
}

impl Render<DetectFrame, DetectResult> for EvalOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &DetectFrame, result: &DetectResult) -> Result<(), Self::Error> {
    self.record.render_result(frame, result)?;
    if let Some(draw) = &self.draw {
      draw.render_result(frame, result)?;
    }
    Ok(())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  info!("检查点路径: {}", args.trained_model);
  info!("输入目录: {}", args.input);
  info!("输出目录: {}", args.output);
  info!("置信度阈值: {}", args.visual_threshold);
  info!("NMS 阈值: {}", args.nms_threshold);

  let config = match &args.config {
    Some(path) => {
      TextBoxesConfig::from_json_file(path).with_context(|| format!("无法加载配置: {}", path))?
    }
    None => TextBoxesConfig::text_300(),
  };
  info!("检测器配置: {}", config.name);

  let device = Device::from_str(&args.device)?;

  info!("正在加载模型...");
  let model = TextBoxesBuilder::new(&args.trained_model)
    .config(config)
    .phase(&args.phase)
    .device(device)
    .threshold(args.visual_threshold)
    .iou_threshold(args.nms_threshold)
    .top_k(args.top_k)
    .build()?;

  let input = ImageDirSource::new(&args.input)?;
  let output = EvalOutput {
    record: ResultRecordOutput::new(&args.output)?,
    draw: if args.visualize { Some(DrawOutput::new(&args.output)?) } else { None },
  };

  BatchEvalTask::default().with_jobs(args.jobs).run_task(input, model, output)
}
