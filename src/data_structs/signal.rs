use ndarray::{
    Array2,
    ArrayView1,
    ArrayView2,
};

/// Ordered input of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// One value per element.
    Vector(Vec<f64>),
    /// Square symmetric matrix over the elements, e.g. correlations.
    Matrix(Array2<f64>),
}

impl Signal {
    /// Number of elements (vector length or matrix side).
    pub fn len(&self) -> usize {
        match self {
            Signal::Vector(v) => v.len(),
            Signal::Matrix(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn is_matrix(&self) -> bool { matches!(self, Signal::Matrix(_)) }

    pub fn as_vector(&self) -> Option<ArrayView1<f64>> {
        match self {
            Signal::Vector(v) => Some(ArrayView1::from(v.as_slice())),
            Signal::Matrix(_) => None,
        }
    }

    pub fn as_matrix(&self) -> Option<ArrayView2<f64>> {
        match self {
            Signal::Matrix(m) => Some(m.view()),
            Signal::Vector(_) => None,
        }
    }
}

impl From<Vec<f64>> for Signal {
    fn from(value: Vec<f64>) -> Self { Signal::Vector(value) }
}

impl From<Array2<f64>> for Signal {
    fn from(value: Array2<f64>) -> Self { Signal::Matrix(value) }
}
