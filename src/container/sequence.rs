use std::collections::VecDeque;

use crate::{
    datatype::Datatype,
    element::Element,
    physical::{PhysicalBuffer, PhysicalBytes},
};

use super::{marshal_elements, marshal_iter, unmarshal_elements, Container, MarshalError};

impl<T: Element> Container for Vec<T> {
    fn element_datatype() -> Result<Datatype, MarshalError> {
        Ok(T::descriptor().datatype().clone())
    }

    fn static_rank() -> Option<usize> {
        Some(1)
    }

    fn physical_shape(&self) -> Vec<u64> {
        vec![self.len() as u64]
    }

    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError> {
        marshal_elements(self.as_slice())
    }

    fn unmarshal(_shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError> {
        unmarshal_elements(buffer)
    }
}

impl<T: Element> Container for VecDeque<T> {
    fn element_datatype() -> Result<Datatype, MarshalError> {
        Ok(T::descriptor().datatype().clone())
    }

    fn static_rank() -> Option<usize> {
        Some(1)
    }

    fn physical_shape(&self) -> Vec<u64> {
        vec![self.len() as u64]
    }

    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError> {
        Ok(marshal_iter(self.len(), self)?.into())
    }

    fn unmarshal(_shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError> {
        unmarshal_elements(buffer).map(Self::from)
    }
}
