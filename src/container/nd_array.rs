use ndarray::{Array, Dimension, IxDyn};

use crate::{
    datatype::Datatype,
    element::{Element, InvalidElementValueError},
    physical::{OutOfMemoryError, PhysicalBuffer, PhysicalBytes},
};

use super::{marshal_elements, unmarshal_elements, Container, Indices, MarshalError};

fn iter_u64_to_usize<'a, I: Iterator<Item = &'a u64>>(
    iter: I,
) -> Result<Vec<usize>, OutOfMemoryError> {
    iter.map(|&v| usize::try_from(v).map_err(|_| OutOfMemoryError::new(usize::MAX)))
        .collect()
}

impl<T: Element, D: Dimension> Container for Array<T, D> {
    fn element_datatype() -> Result<Datatype, MarshalError> {
        Ok(T::descriptor().datatype().clone())
    }

    fn static_rank() -> Option<usize> {
        D::NDIM
    }

    fn physical_shape(&self) -> Vec<u64> {
        self.shape().iter().map(|&dim| dim as u64).collect()
    }

    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError> {
        if let Some(elements) = self.as_slice() {
            return marshal_elements(elements);
        }

        // gather a non standard layout element-wise in C order
        let view = self.view().into_dyn();
        let mut buffer = PhysicalBuffer::allocate(T::descriptor().size(), self.len())?;
        for (index, indices) in Indices::new(self.physical_shape()).iter().enumerate() {
            let indices = iter_u64_to_usize(indices.iter())?;
            buffer.store(index, view[indices.as_slice()].to_physical()?)?;
        }
        Ok(buffer.into())
    }

    fn unmarshal(shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError> {
        let shape = iter_u64_to_usize(shape.iter())?;
        let elements = unmarshal_elements::<T>(buffer)?;
        let array = Array::from_shape_vec(IxDyn(&shape), elements)
            .map_err(|err| InvalidElementValueError::new(err.to_string()))?;
        array
            .into_dimensionality::<D>()
            .map_err(|_| MarshalError::RankMismatch {
                container: D::NDIM.unwrap_or(shape.len()),
                stored: shape.len(),
            })
    }
}
