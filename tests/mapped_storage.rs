//! Direct coverage of `MappedStorage` and `HeaderInfo`, below the
//! `vm_vector`/`TrVector` layer.
use std::convert::TryInto;
use vmtr::flags::CreationDisposition;
use vmtr::mapped_storage::{HeaderInfo, MappedStorage};

#[test]
fn header_info_composes_with_alignment_padding() {
    let info = HeaderInfo::NONE.add_header(4, 4).add_header(8, 8);
    // The first 4-byte field starts at 0; the second, 8-byte-aligned field
    // must be padded up to offset 8, for a total size of 16 and an overall
    // alignment of 8 (the max of the two pieces).
    assert_eq!(info.size(), 16);
    assert_eq!(info.align(), 8);
}

#[test]
fn anonymous_mapped_storage_grows_and_reads_back_written_bytes() {
    let mut storage =
        MappedStorage::map_memory(HeaderInfo::NONE, std::mem::size_of::<u32>(), 0).expect("map_memory should succeed");
    storage.grow_to(64).expect("grow_to should succeed");
    storage.set_len(64).expect("set_len should succeed");
    assert_eq!(storage.len(), 64);
    assert!(storage.capacity() >= 64);

    unsafe {
        let data = storage.data_mut_ptr() as *mut u32;
        for i in 0..64u32 {
            data.add(i as usize).write(i * 7);
        }
    }
    unsafe {
        let data = storage.data_ptr() as *const u32;
        for i in 0..64u32 {
            assert_eq!(data.add(i as usize).read(), i * 7);
        }
    }
}

#[test]
fn shrink_to_then_grow_to_does_not_corrupt_retained_prefix() {
    let mut storage =
        MappedStorage::map_memory(HeaderInfo::NONE, std::mem::size_of::<u64>(), 0).expect("map_memory should succeed");
    storage.grow_to(32).expect("grow_to should succeed");
    storage.set_len(32).expect("set_len should succeed");
    unsafe {
        let data = storage.data_mut_ptr() as *mut u64;
        for i in 0..32u64 {
            data.add(i as usize).write(i);
        }
    }
    storage.set_len(8).expect("set_len should succeed");
    storage.shrink_to(8).expect("shrink_to should succeed");
    assert_eq!(storage.len(), 8);
    storage.grow_to(16).expect("grow_to should succeed");
    unsafe {
        let data = storage.data_ptr() as *const u64;
        for i in 0..8u64 {
            assert_eq!(data.add(i as usize).read(), i);
        }
    }
}

#[test]
fn file_backed_storage_persists_a_caller_owned_header() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("storage_header.vmtr");
    let header_info = HeaderInfo::new(8, 8);

    {
        let mut storage =
            MappedStorage::map_file(&path, CreationDisposition::CreateNew, header_info, 4, 10).expect("map_file should succeed");
        storage.header_mut().copy_from_slice(&0xdead_beef_u64.to_ne_bytes());
        storage.flush_blocking().expect("flush_blocking should succeed");
    }

    let storage =
        MappedStorage::map_file(&path, CreationDisposition::OpenExisting, header_info, 4, 0).expect("reopening should succeed");
    assert_eq!(storage.len(), 10);
    assert_eq!(u64::from_ne_bytes(storage.header().try_into().unwrap()), 0xdead_beef);
}

#[cfg(windows)]
#[test]
fn anonymous_windows_mapping_is_bounded_by_the_i32_max_ceiling() {
    // `Mapping::MAX_ANON_PF_SIZE` mirrors the single-reservation-per-process
    // ceiling the teacher's allocator-side sizing relies on.
    assert_eq!(vmtr::mapping::Mapping::MAX_ANON_PF_SIZE, i32::MAX as u64);
}
