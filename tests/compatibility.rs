use std::{collections::BTreeMap, sync::Arc};

use h5bridge::{
    dataset::{Dataset, ElementCreateError},
    datatype::{Datatype, UnsupportedTypeError},
    element::Vector3,
    node::ElementPath,
    physical::PhysicalBuffer,
    storage::{store::MemoryStore, ReadableStorageTraits},
    MarshalError,
};

fn stored_bytes(store: &MemoryStore, path: &str, datatype: &Datatype, len: usize) -> Vec<u8> {
    let mut buffer = PhysicalBuffer::allocate(datatype.size(), len).unwrap();
    store
        .bulk_read(&ElementPath::new(path).unwrap(), datatype, &mut buffer)
        .unwrap();
    buffer.bytes().to_vec()
}

#[test]
fn write_mismatch_transfers_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = Dataset::create(store.clone(), "/values", &vec![1i32, 2, 3])?;
    let before = stored_bytes(&store, "/values", &Datatype::INT32, 3);

    // no implicit numeric conversion
    assert!(matches!(
        dataset.write(&vec![1i64, 2, 3]),
        Err(MarshalError::TypeMismatch { .. })
    ));
    assert!(matches!(
        dataset.write(&vec![1u32, 2, 3]),
        Err(MarshalError::TypeMismatch { .. })
    ));
    assert!(matches!(
        dataset.write(&vec![4i32, 5]),
        Err(MarshalError::DimensionMismatch {
            dimension: 0,
            container: 2,
            stored: 3
        })
    ));
    assert!(matches!(
        dataset.write_scalar(&4i32),
        Err(MarshalError::RankMismatch {
            container: 0,
            stored: 1
        })
    ));
    assert_eq!(stored_bytes(&store, "/values", &Datatype::INT32, 3), before);

    dataset.write(&vec![4i32, 5, 6])?;
    assert_eq!(dataset.retrieve::<Vec<i32>>()?, vec![4, 5, 6]);
    Ok(())
}

#[test]
fn type_is_checked_before_rank() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = Dataset::create(store, "/scalar", &vec![0.5f64])?;
    // both the type and the rank differ, the type is reported
    assert!(matches!(
        dataset.write_scalar(&1u8),
        Err(MarshalError::TypeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn read_mismatch_leaves_container() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = Dataset::create(store, "/names", &vec!["a".to_string(), "b".to_string()])?;

    let mut numbers = vec![1.0f64, 2.0];
    let err = dataset.read(&mut numbers).unwrap_err();
    assert_eq!(
        err.to_string(),
        "element datatype float64 does not match the stored datatype string"
    );
    assert_eq!(numbers, vec![1.0, 2.0]);

    let mut points = vec![Vector3::default()];
    assert!(dataset.read(&mut points).is_err());
    assert_eq!(points, vec![Vector3::default()]);

    let mut map: BTreeMap<String, String> = BTreeMap::from([("k".to_string(), "v".to_string())]);
    assert!(matches!(
        dataset.read(&mut map),
        Err(MarshalError::TypeMismatch { .. })
    ));
    assert_eq!(map.len(), 1);
    Ok(())
}

#[cfg(feature = "ndarray")]
#[test]
fn ndarray_rank_and_dimensions() -> Result<(), Box<dyn std::error::Error>> {
    use ndarray::{Array1, Array2, Array3};

    let store = Arc::new(MemoryStore::new());
    let array = Array2::<u16>::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as u16);
    let dataset = Dataset::create(store, "/matrix", &array)?;

    assert!(matches!(
        dataset.write(&Array2::<u16>::zeros((3, 2))),
        Err(MarshalError::DimensionMismatch {
            dimension: 0,
            container: 3,
            stored: 2
        })
    ));
    assert!(matches!(
        dataset.write(&Array2::<u16>::zeros((2, 4))),
        Err(MarshalError::DimensionMismatch {
            dimension: 1,
            container: 4,
            stored: 3
        })
    ));
    assert!(matches!(
        dataset.write(&Array3::<u16>::zeros((2, 3, 1))),
        Err(MarshalError::RankMismatch {
            container: 3,
            stored: 2
        })
    ));

    let mut wrong_rank = Array1::<u16>::zeros(6);
    assert!(matches!(
        dataset.read(&mut wrong_rank),
        Err(MarshalError::RankMismatch {
            container: 1,
            stored: 2
        })
    ));
    assert_eq!(wrong_rank, Array1::<u16>::zeros(6));
    assert_eq!(dataset.retrieve::<Array2<u16>>()?, array);
    Ok(())
}

#[test]
fn nested_compound_maps_are_unsupported() {
    let store = Arc::new(MemoryStore::new());
    let map: BTreeMap<u32, Vector3> = BTreeMap::from([(1, Vector3::new(1.0, 2.0, 3.0))]);
    assert!(matches!(
        Dataset::create(store.clone(), "/positions", &map),
        Err(ElementCreateError::MarshalError(MarshalError::UnsupportedType(
            UnsupportedTypeError::NestedCompound(_)
        )))
    ));
    assert!(store.element_paths().is_empty());
}

#[test]
fn dimension_out_of_range() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = Dataset::create(store, "/values", &vec![1u8, 2])?;
    assert_eq!(dataset.dimension(0)?, 2);
    assert_eq!(
        dataset.dimension(1).unwrap_err().to_string(),
        "dimension 1 is out of range for rank 1"
    );
    Ok(())
}
