//! Integration coverage for `vm_vector::{map_file, map_memory}`: anonymous
//! growth, file-backed persistence across a reopen, shrink semantics, and
//! rejection of a file whose stored layout doesn't match what's requested.
use std::convert::TryInto;
use vmtr::flags::CreationDisposition;
use vmtr::mapped_storage::HeaderInfo;
use vmtr::{map_file, map_memory};

#[test]
fn anonymous_vector_grows_past_many_reallocations() {
    let mut v = map_memory::<u64>(HeaderInfo::NONE).expect("map_memory should succeed");
    for i in 0..10_000u64 {
        v.push(i);
    }
    assert_eq!(v.len(), 10_000);
    for i in 0..10_000u64 {
        assert_eq!(v[i as usize], i);
    }
}

#[test]
fn file_backed_vector_survives_a_reopen() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("vector.vmtr");

    {
        let mut v = map_file::<u32>(&path, CreationDisposition::CreateNew, HeaderInfo::NONE)
            .expect("creating a new file-backed vector should succeed");
        for i in 0..500u32 {
            v.push(i * 3);
        }
        v.shrink_to_fit_fast().expect("shrink_to_fit should succeed");
    }

    let v = map_file::<u32>(&path, CreationDisposition::OpenExisting, HeaderInfo::NONE)
        .expect("reopening the same file should recover its contents");
    assert_eq!(v.len(), 500);
    for i in 0..500u32 {
        assert_eq!(v[i as usize], i * 3);
    }
}

#[test]
fn file_backed_vector_header_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("with_header.vmtr");
    let header_info = HeaderInfo::new(16, 8);

    {
        let mut v = map_file::<u64>(&path, CreationDisposition::CreateNew, header_info)
            .expect("creating should succeed");
        v.backing_mut().header_mut()[0..8].copy_from_slice(&42u64.to_ne_bytes());
        v.push(1);
        v.push(2);
        v.backing().flush_blocking().expect("flush should succeed");
    }

    let v = map_file::<u64>(&path, CreationDisposition::OpenExisting, header_info)
        .expect("reopening should recover the header and data");
    assert_eq!(u64::from_ne_bytes(v.backing().header()[0..8].try_into().unwrap()), 42);
    assert_eq!(v.as_slice(), &[1u64, 2u64]);
}

#[test]
fn reopening_with_a_mismatched_header_layout_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("mismatched.vmtr");

    {
        let mut v = map_file::<u64>(&path, CreationDisposition::CreateNew, HeaderInfo::new(8, 8))
            .expect("creating should succeed");
        v.push(7);
    }

    let reopened = map_file::<u64>(&path, CreationDisposition::OpenExisting, HeaderInfo::new(16, 8));
    assert!(reopened.is_err(), "a header layout mismatch must be rejected, not silently accepted");
}

#[test]
fn reopening_with_a_mismatched_element_size_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("wrong_width.vmtr");

    {
        let mut v = map_file::<u32>(&path, CreationDisposition::CreateNew, HeaderInfo::NONE)
            .expect("creating should succeed");
        v.push(1);
    }

    let reopened = map_file::<u64>(&path, CreationDisposition::OpenExisting, HeaderInfo::NONE);
    assert!(reopened.is_err(), "reopening a u32 file as a u64 vector must be rejected");
}

#[test]
fn corrupted_header_is_rejected_rather_than_trusted() {
    use std::io::Write;

    let dir = tempfile::tempdir().expect("tempdir should be creatable");
    let path = dir.path().join("corrupt.vmtr");
    let mut file = std::fs::File::create(&path).expect("file should be creatable");
    file.write_all(&[0xffu8; 64]).expect("write should succeed");
    drop(file);

    let reopened = map_file::<u32>(&path, CreationDisposition::OpenExisting, HeaderInfo::NONE);
    assert!(reopened.is_err(), "garbage bytes where sizes_hdr belongs must not be trusted");
}

#[test]
fn shrinking_a_mapped_vector_keeps_capacity_until_shrink_to_fit() {
    let mut v = map_memory::<u32>(HeaderInfo::NONE).expect("map_memory should succeed");
    for i in 0..256u32 {
        v.push(i);
    }
    let capacity_before = v.capacity();
    v.truncate(4);
    assert_eq!(v.len(), 4);
    assert_eq!(v.capacity(), capacity_before, "truncate alone must not release backing capacity");

    v.shrink_to_fit_fast().expect("shrink_to_fit should succeed");
    assert!(v.capacity() < capacity_before, "shrink_to_fit should give the now-unused capacity back");
    assert_eq!(v.as_slice(), &[0u32, 1, 2, 3]);
}
