// 该文件是 Xunwen （寻文） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;

/// Xunwen 数据集评测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型检查点路径（JSON 权重映射）
  #[arg(long, default_value = "weights/tb_80000.json", value_name = "FILE")]
  pub trained_model: String,

  /// 输入图像目录
  #[arg(long, value_name = "DIR")]
  pub input: String,

  /// 结果输出目录（每张图像一个 res_<imageid>.txt）
  #[arg(long, value_name = "DIR")]
  pub output: String,

  /// 检测器配置 JSON 文件；缺省使用内置 text_300 配置
  #[arg(long, value_name = "FILE")]
  pub config: Option<String>,

  /// 最终置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub visual_threshold: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// NMS 后每张图像最多保留的框数
  #[arg(long, default_value = "200", value_name = "COUNT")]
  pub top_k: usize,

  /// 网络阶段，仅支持 test
  #[arg(long, default_value = "test", value_name = "PHASE")]
  pub phase: String,

  /// 执行设备 (cpu / gpu)
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: String,

  /// 并行处理的线程数，0 表示顺序执行
  #[arg(long, default_value = "0", value_name = "JOBS")]
  pub jobs: usize,

  /// 同时输出画框的可视化图像
  #[arg(long)]
  pub visualize: bool,
}
