//! Coverage for the backing stores that don't need a mapping: `HeapStorage`
//! over-aligned allocation, and `FixedStorage`'s bounded-capacity contract.
use vmtr::fixed_storage::FixedStorage;
use vmtr::heap_storage::HeapStorage;
use vmtr::TrVector;

#[test]
fn over_aligned_heap_storage_hands_back_aligned_elements() {
    let storage: HeapStorage<u8> = HeapStorage::with_alignment(64);
    let mut v: TrVector<u8, HeapStorage<u8>> = TrVector::with_backing(storage);
    for i in 0..200u8 {
        v.push(i);
    }
    assert_eq!(v.as_ptr() as usize % 64, 0, "backing allocation must honor the requested alignment");
    assert_eq!(v.len(), 200);
}

#[test]
fn fixed_storage_rejects_growth_past_its_capacity() {
    let mut v: TrVector<u32, FixedStorage<u32, 4>> = TrVector::with_backing(FixedStorage::new());
    for i in 0..4u32 {
        v.push(i);
    }
    assert_eq!(v.len(), 4);
    assert_eq!(v.capacity(), 4);
    assert!(v.try_push(4).is_err(), "pushing past CAP must fail, not reallocate");
    assert_eq!(v.as_slice(), &[0, 1, 2, 3]);
}

#[test]
fn fixed_storage_supports_remove_and_swap_remove_within_capacity() {
    let mut v: TrVector<i32, FixedStorage<i32, 8>> = TrVector::with_backing(FixedStorage::new());
    v.append_range([10, 20, 30, 40]);
    assert_eq!(v.remove(1), 20);
    assert_eq!(v.as_slice(), &[10, 30, 40]);
    assert_eq!(v.swap_remove(0), 10);
    assert_eq!(v.as_slice(), &[40, 30]);
}

#[test]
fn zero_sized_elements_do_not_panic_on_push_or_grow() {
    let mut v: TrVector<()> = TrVector::new();
    for _ in 0..1000 {
        v.push(());
    }
    assert_eq!(v.len(), 1000);
    v.truncate(10);
    assert_eq!(v.len(), 10);
}
