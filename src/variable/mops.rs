use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, RealOps, Hops },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn shape(&self) -> &Shape {
    self.node.cell.data.shape()
  }

  fn sum(&self) -> Self {
    self.unary_op(Sum)
  }

  fn sum_rows(&self) -> Self {
    self.unary_op(SumRows)
  }

  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn powf(&self, exp: T) -> Self {
    self.unary_op(Powf { exp })
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn relu(&self) -> Self {
    self.unary_op(LeakyReLU { slope: T::zero() })
  }

  fn leaky_relu(&self, slope: T) -> Self {
    self.unary_op(LeakyReLU { slope })
  }

  fn sigmoid(&self) -> Self {
    self.unary_op(Sigmoid)
  }

  fn tanh(&self) -> Self {
    self.unary_op(Tanh)
  }

  fn cross_entropy(&self, labels: &[usize]) -> Self {
    self.unary_op(CrossEntropy { labels: labels.to_vec() })
  }
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self * -T::one()
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &tensor * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        self.binary_op($op, rhs)
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // tensor * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &tensor * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // tensor * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &tensor * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Variable::scalar(rhs)
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // tensor * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[derive(Debug, Clone)]
pub struct Add;

impl<T: Real> BinaryOp<T> for Add {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs + rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    (grad.reduce_to(lhs.shape()), grad.reduce_to(rhs.shape()))
  }
}


#[derive(Debug, Clone)]
pub struct Sub;

impl<T: Real> BinaryOp<T> for Sub {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs - rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    (grad.reduce_to(lhs.shape()), (-grad).reduce_to(rhs.shape()))
  }
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs * rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    ((grad * rhs).reduce_to(lhs.shape()), (grad * lhs).reduce_to(rhs.shape()))
  }
}


#[derive(Debug, Clone)]
pub struct Div;

impl<T: Real> BinaryOp<T> for Div {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs / rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    let grad_l = grad / rhs;
    let grad_r = &(-grad * lhs) / &rhs.vectorize(|a| a * a );
    (grad_l.reduce_to(lhs.shape()), grad_r.reduce_to(rhs.shape()))
  }
}


#[derive(Debug, Clone)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    (grad.mm(&rhs.transpose()), lhs.transpose().mm(grad))
  }
}


#[derive(Debug, Clone)]
pub struct Sum;

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum_all()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    Tensor::fill(&lhs.shape().dims, grad.item())
  }
}


#[derive(Debug, Clone)]
pub struct SumRows;

impl<T: Real> UnaryOp<T> for SumRows {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum_over_rows()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    Tensor::zeros(&lhs.shape().dims) + grad
  }
}


#[derive(Debug, Clone)]
pub struct Powf<T: Real> {
  exp: T,
}

impl<T: Real> UnaryOp<T> for Powf<T> {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.powf(self.exp)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let exp = self.exp;
    grad * &lhs.vectorize(|a| exp * a.powf(exp - T::one()) )
  }
}


#[derive(Debug, Clone)]
pub struct LeakyReLU<T: Real> {
  slope: T,
}

impl<T: Real> UnaryOp<T> for LeakyReLU<T> {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.leaky_relu(self.slope)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let slope = self.slope;
    grad * &lhs.vectorize(|a| if a > T::zero() { T::one() } else { slope })
  }
}


#[derive(Debug, Clone)]
pub struct Sigmoid;

impl<T: Real> UnaryOp<T> for Sigmoid {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sigmoid()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let sig = lhs.sigmoid();
    grad * &sig.vectorize(|s| s * (T::one() - s) )
  }
}


#[derive(Debug, Clone)]
pub struct Tanh;

impl<T: Real> UnaryOp<T> for Tanh {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    RealOps::tanh(lhs)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * &lhs.vectorize(|a| T::one() - a.tanh() * a.tanh() )
  }
}


#[derive(Debug, Clone)]
pub struct CrossEntropy {
  labels: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for CrossEntropy {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.cross_entropy(&self.labels)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let cols = lhs.shape().cols();
    let scale = grad.item() / real::<T>(self.labels.len() as f64);
    let probs = lhs.softmax_rows();
    {
      let mut data = probs.raw_mut();
      for (row, &label) in self.labels.iter().enumerate() {
        data[row * cols + label] -= T::one();
      }
    }
    probs * scale
  }
}
