use num_traits::Zero;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::scalar::Gemm;


#[cfg_attr(feature = "unsafe", allow(dead_code))]
fn naive_gemm<T>(_m: usize, k: usize, n: usize, a: &[T], b: &[T], c: &mut [T])
where
  T: Copy + Zero + std::ops::Mul<Output = T> + std::ops::AddAssign + Send + Sync,
{
  if n == 0 { return }
  let row = |(i, out): (usize, &mut [T])| {
    for (kk, &lhs) in a[i * k .. (i + 1) * k].iter().enumerate() {
      if lhs.is_zero() { continue }
      for (j, value) in out.iter_mut().enumerate() {
        *value += lhs * b[kk * n + j];
      }
    }
  };

  #[cfg(feature = "rayon")]
  c.par_chunks_mut(n).enumerate().for_each(row);

  #[cfg(not(feature = "rayon"))]
  c.chunks_mut(n).enumerate().for_each(row);
}

impl Gemm for f32 {
  #[cfg(feature = "unsafe")]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
    unsafe {
      matrixmultiply::sgemm(
        m, k, n,
        1.0,
        a.as_ptr(), k as isize, 1,
        b.as_ptr(), n as isize, 1,
        0.0,
        c.as_mut_ptr(), n as isize, 1,
      );
    }
  }

  #[cfg(not(feature = "unsafe"))]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    naive_gemm(m, k, n, a, b, c)
  }
}

impl Gemm for f64 {
  #[cfg(feature = "unsafe")]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
    unsafe {
      matrixmultiply::dgemm(
        m, k, n,
        1.0,
        a.as_ptr(), k as isize, 1,
        b.as_ptr(), n as isize, 1,
        0.0,
        c.as_mut_ptr(), n as isize, 1,
      );
    }
  }

  #[cfg(not(feature = "unsafe"))]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    naive_gemm(m, k, n, a, b, c)
  }
}
