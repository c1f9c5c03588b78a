//! The buffer size limit is global, so these tests run in their own binary.

use std::sync::Arc;

use h5bridge::{
    config::global_config_mut,
    dataset::{Dataset, ElementCreateError},
    storage::{store::MemoryStore, StorageError},
    MarshalError,
};

#[test]
fn buffer_size_limit() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let values: Vec<u8> = (0..=255).cycle().take(4096).collect();
    let dataset = Dataset::create(store.clone(), "/values", &values)?;
    let names: Vec<String> = (0..128).map(|i| i.to_string()).collect();
    let dataset_names = Dataset::create(store.clone(), "/names", &names)?;

    global_config_mut().set_buffer_size_limit(1024);

    let mut values_out = vec![1u8, 2, 3];
    match dataset.read(&mut values_out) {
        Err(MarshalError::OutOfMemory(err)) => assert_eq!(err.requested(), 4096),
        result => panic!("expected an out of memory error, got {result:?}"),
    }
    assert_eq!(values_out, vec![1, 2, 3]);

    // the borrowed fast path needs no buffer, the element-wise path does
    dataset.write(&values)?;
    assert!(matches!(
        dataset_names.write(&names),
        Err(MarshalError::OutOfMemory(_))
    ));

    assert!(matches!(
        Dataset::create(store.clone(), "/large", &vec![0u8; 2048]),
        Err(ElementCreateError::StorageError(StorageError::OutOfMemory(_)))
    ));
    assert!(matches!(
        Dataset::open(store.clone(), "/large"),
        Err(ElementCreateError::StorageError(StorageError::NotFound(_)))
    ));

    global_config_mut().set_buffer_size_limit(usize::MAX);
    let values_out: Vec<u8> = dataset.retrieve()?;
    assert_eq!(values_out, values);
    Ok(())
}
