use std::iter::FusedIterator;

/// The indices of an element in an array, one per dimension.
pub type ArrayIndices = Vec<u64>;

/// Unravel a linearised index to ND indices, in C (row-major) order.
///
/// `indices[d] = (index / product(shape[d + 1..])) % shape[d]`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> ArrayIndices {
    let mut indices = vec![0; shape.len()];
    for (indices_i, &dim) in std::iter::zip(indices.iter_mut().rev(), shape.iter().rev()) {
        if dim != 0 {
            *indices_i = index % dim;
            index /= dim;
        }
    }
    indices
}

/// Ravel ND indices to a linearised index, in C (row-major) order.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// The indices of every element of an array shape.
///
/// Iterates over the last dimension fastest (i.e. C-contiguous order).
/// For example, a 2x3 array produces `[(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]`.
#[derive(Clone, Debug)]
pub struct Indices {
    shape: Vec<u64>,
    length: u64,
}

impl Indices {
    /// Create the indices of `shape`.
    #[must_use]
    pub fn new(shape: Vec<u64>) -> Self {
        let length = shape.iter().product();
        Self { shape, length }
    }

    /// Return the number of indices.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Returns true if the number of indices is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a new serial iterator.
    #[must_use]
    pub fn iter(&self) -> IndicesIterator<'_> {
        <&Self as IntoIterator>::into_iter(self)
    }
}

impl<'a> IntoIterator for &'a Indices {
    type Item = ArrayIndices;
    type IntoIter = IndicesIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        IndicesIterator {
            shape: &self.shape,
            index_front: 0,
            index_back: self.length,
        }
    }
}

/// Serial indices iterator.
///
/// See [`Indices`].
pub struct IndicesIterator<'a> {
    shape: &'a [u64],
    index_front: u64,
    index_back: u64,
}

impl Iterator for IndicesIterator<'_> {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index_front < self.index_back {
            let indices = unravel_index(self.index_front, self.shape);
            self.index_front += 1;
            Some(indices)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let length = usize::try_from(self.index_back - self.index_front).unwrap_or(usize::MAX);
        (length, Some(length))
    }
}

impl DoubleEndedIterator for IndicesIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.index_back > self.index_front {
            self.index_back -= 1;
            Some(unravel_index(self.index_back, self.shape))
        } else {
            None
        }
    }
}

impl ExactSizeIterator for IndicesIterator<'_> {}

impl FusedIterator for IndicesIterator<'_> {}
