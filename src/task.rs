// 该文件是 Xunwen （寻文） 项目的一部分。
// src/task.rs - 任务编排
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{info, warn};

use crate::frame::DetectFrame;
use crate::input::InputError;
use crate::model::{DetectResult, Model};
use crate::output::Render;

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 单帧任务：取第一帧推理并输出，用于单图演示
pub struct OneShotTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<DetectFrame, InputError>>,
  M: Model<Input = DetectFrame, Output = DetectResult, Error = ME>,
  O: Render<DetectFrame, DetectResult, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))??;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，检测到 {} 个框，耗时: {:.2?}", result.len(), now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 数据集扫描任务。
///
/// 逐图推理并输出；单张图像的读取错误被隔离为跳过并记录，
/// 不中断扫描。图像之间无共享状态，`jobs > 0` 时用 rayon
/// 线程池并行处理；Ctrl-C 让扫描在当前图像之后干净退出。
#[derive(Default, Debug)]
pub struct BatchEvalTask {
  jobs: usize,
}

impl BatchEvalTask {
  /// `jobs` 为并行线程数，0 表示顺序执行
  pub fn with_jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<DetectFrame, InputError>> + Send,
  M: Model<Input = DetectFrame, Output = DetectResult, Error = ME> + Sync,
  O: Render<DetectFrame, DetectResult, Error = RE> + Sync,
> Task<I, M, O> for BatchEvalTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    let interrupted = Arc::new(AtomicBool::new(false));
    {
      let interrupted = interrupted.clone();
      if let Err(e) = ctrlc::set_handler(move || {
        warn!("收到中断信号，当前图像处理完后退出...");
        interrupted.store(true, Ordering::SeqCst);
      }) {
        warn!("无法安装中断处理器: {}", e);
      }
    }

    let processed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let boxes = AtomicUsize::new(0);

    let handle_item = |item: Result<DetectFrame, InputError>| -> Result<(), anyhow::Error> {
      let frame = match item {
        Ok(frame) => frame,
        Err(e) => {
          // 单张图像的错误不中止扫描
          warn!("跳过不可读图像: {}", e);
          skipped.fetch_add(1, Ordering::Relaxed);
          return Ok(());
        }
      };

      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      info!(
        "图像 {}: {} 个文本框, 耗时 {:.2?}",
        frame.image_id,
        result.len(),
        now.elapsed()
      );
      output.render_result(&frame, &result)?;

      processed.fetch_add(1, Ordering::Relaxed);
      boxes.fetch_add(result.len(), Ordering::Relaxed);
      Ok(())
    };

    info!("开始数据集扫描...");
    if self.jobs > 0 {
      let pool = rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build()?;
      info!("并行扫描, {} 个线程", self.jobs);
      pool.install(|| {
        input
          .take_while(|_| !interrupted.load(Ordering::SeqCst))
          .par_bridge()
          .try_for_each(handle_item)
      })?;
    } else {
      for item in input {
        if interrupted.load(Ordering::SeqCst) {
          warn!("中断信号接收，退出扫描");
          break;
        }
        handle_item(item)?;
      }
    }

    info!(
      "扫描完成: 处理 {} 张, 跳过 {} 张, 共 {} 个文本框",
      processed.load(Ordering::Relaxed),
      skipped.load(Ordering::Relaxed),
      boxes.load(Ordering::Relaxed)
    );
    Ok(())
  }
}
