// 该文件是 Xunwen （寻文） 项目的一部分。
// src/bin/detect_oneshot.rs - 单图检测演示
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;

use xunwen::input::ImageDirSource;
use xunwen::model::TextBoxesBuilder;
use xunwen::output::DrawOutput;
use xunwen::task::{OneShotTask, Task};

/// Xunwen 单图检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型检查点路径
  #[arg(long, value_name = "FILE")]
  pub trained_model: String,

  /// 输入图像目录（取第一张图像）
  #[arg(long, value_name = "DIR")]
  pub input: String,

  /// 可视化输出目录
  #[arg(long, value_name = "DIR")]
  pub output: String,

  /// 置信度阈值
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub visual_threshold: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("检查点路径: {}", args.trained_model);
  info!("输入目录: {}", args.input);
  info!("输出目录: {}", args.output);

  let model =
    TextBoxesBuilder::new(&args.trained_model).threshold(args.visual_threshold).build()?;
  let input = ImageDirSource::new(&args.input)?;
  let output = DrawOutput::new(&args.output)?;

  OneShotTask.run_task(input, model, output)
}
