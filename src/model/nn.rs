// 该文件是 Xunwen （寻文） 项目的一部分。
// src/model/nn.rs - ndarray 上的网络层运算
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array1, Array3, Array4};

const L2_NORM_EPS: f32 = 1e-10;

/// 二维卷积，输入 (C_in, H, W)，权重 (C_out, C_in, K, K)。
/// 越界位置按零填充处理。
pub fn conv2d(
  x: &Array3<f32>,
  weight: &Array4<f32>,
  bias: &Array1<f32>,
  stride: usize,
  padding: usize,
  dilation: usize,
) -> Array3<f32> {
  let (_, h, w) = x.dim();
  let (out_channels, in_channels, k_h, k_w) = weight.dim();

  let span_h = dilation * (k_h - 1) + 1;
  let span_w = dilation * (k_w - 1) + 1;
  let out_h = (h + 2 * padding - span_h) / stride + 1;
  let out_w = (w + 2 * padding - span_w) / stride + 1;

  let mut out = Array3::<f32>::zeros((out_channels, out_h, out_w));
  for oc in 0..out_channels {
    for oh in 0..out_h {
      for ow in 0..out_w {
        let mut acc = bias[oc];
        for ic in 0..in_channels {
          for kh in 0..k_h {
            let ih = (oh * stride + kh * dilation) as isize - padding as isize;
            if ih < 0 || ih >= h as isize {
              continue;
            }
            for kw in 0..k_w {
              let iw = (ow * stride + kw * dilation) as isize - padding as isize;
              if iw < 0 || iw >= w as isize {
                continue;
              }
              acc += x[[ic, ih as usize, iw as usize]] * weight[[oc, ic, kh, kw]];
            }
          }
        }
        out[[oc, oh, ow]] = acc;
      }
    }
  }
  out
}

pub fn relu(x: &mut Array3<f32>) {
  x.mapv_inplace(|v| v.max(0.0));
}

/// 二维最大池化。`ceil_mode` 下输出尺寸向上取整，
/// 但最后一个窗口必须从图内（含左填充）开始。
pub fn max_pool2d(
  x: &Array3<f32>,
  kernel: usize,
  stride: usize,
  padding: usize,
  ceil_mode: bool,
) -> Array3<f32> {
  let (channels, h, w) = x.dim();

  let out_len = |len: usize| {
    let eff = len + 2 * padding;
    let mut out =
      if ceil_mode { (eff - kernel).div_ceil(stride) + 1 } else { (eff - kernel) / stride + 1 };
    if ceil_mode && (out - 1) * stride >= len + padding {
      out -= 1;
    }
    out
  };
  let out_h = out_len(h);
  let out_w = out_len(w);

  let mut out = Array3::<f32>::zeros((channels, out_h, out_w));
  for c in 0..channels {
    for oh in 0..out_h {
      for ow in 0..out_w {
        let mut best = f32::NEG_INFINITY;
        for kh in 0..kernel {
          let ih = (oh * stride + kh) as isize - padding as isize;
          if ih < 0 || ih >= h as isize {
            continue;
          }
          for kw in 0..kernel {
            let iw = (ow * stride + kw) as isize - padding as isize;
            if iw < 0 || iw >= w as isize {
              continue;
            }
            best = best.max(x[[c, ih as usize, iw as usize]]);
          }
        }
        out[[c, oh, ow]] = best;
      }
    }
  }
  out
}

/// 逐空间位置跨通道 L2 归一化，再乘以逐通道的学习缩放。
pub fn l2_normalize(x: &Array3<f32>, scale: &Array1<f32>) -> Array3<f32> {
  let (channels, h, w) = x.dim();
  let mut out = Array3::<f32>::zeros((channels, h, w));
  for ih in 0..h {
    for iw in 0..w {
      let mut norm = 0.0f32;
      for c in 0..channels {
        norm += x[[c, ih, iw]] * x[[c, ih, iw]];
      }
      let norm = norm.sqrt() + L2_NORM_EPS;
      for c in 0..channels {
        out[[c, ih, iw]] = x[[c, ih, iw]] / norm * scale[c];
      }
    }
  }
  out
}

/// 全局平均池化到 (C, 1, 1)
pub fn global_avg_pool(x: &Array3<f32>) -> Array3<f32> {
  let (channels, h, w) = x.dim();
  let area = (h * w) as f32;
  let mut out = Array3::<f32>::zeros((channels, 1, 1));
  for c in 0..channels {
    let mut sum = 0.0f32;
    for ih in 0..h {
      for iw in 0..w {
        sum += x[[c, ih, iw]];
      }
    }
    out[[c, 0, 0]] = sum / area;
  }
  out
}

/// 就地 softmax 归一化
pub fn softmax(values: &mut [f32]) {
  let max = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
  let mut sum = 0.0f32;
  for v in values.iter_mut() {
    *v = (*v - max).exp();
    sum += *v;
  }
  for v in values.iter_mut() {
    *v /= sum;
  }
}
