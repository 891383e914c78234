//! Property-based coverage of `TrVector`'s universal invariants: length never
//! exceeds capacity, contents always match a plain `Vec` run through the same
//! operation sequence, and round-tripping through a `VmVector` file preserves
//! order and values exactly.
use proptest::collection::vec;
use proptest::prelude::*;
use vmtr::flags::CreationDisposition;
use vmtr::mapped_storage::HeaderInfo;
use vmtr::{map_file, TrVector};

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(i32),
    Pop,
    Truncate(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::Push),
        Just(Op::Pop),
        (0..32usize).prop_map(Op::Truncate),
    ]
}

proptest! {
    #[test]
    fn tr_vector_matches_a_reference_vec_over_random_ops(ops in vec(op_strategy(), 1..200)) {
        let mut v: TrVector<i32> = TrVector::new();
        let mut reference: Vec<i32> = Vec::new();

        for op in ops {
            match op {
                Op::Push(x) => {
                    v.push(x);
                    reference.push(x);
                }
                Op::Pop => {
                    prop_assert_eq!(v.pop(), reference.pop());
                }
                Op::Truncate(n) => {
                    v.truncate(n);
                    reference.truncate(n);
                }
            }
            prop_assert!(v.len() <= v.capacity());
            prop_assert_eq!(v.as_slice(), reference.as_slice());
        }
    }

    #[test]
    fn file_backed_vector_round_trips_arbitrary_u64_sequences(values in vec(any::<u64>(), 0..256)) {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let path = dir.path().join("roundtrip.vmtr");

        {
            let mut v = map_file::<u64>(&path, CreationDisposition::CreateNew, HeaderInfo::NONE)
                .expect("creating should succeed");
            for &value in &values {
                v.push(value);
            }
        }

        let v = map_file::<u64>(&path, CreationDisposition::OpenExisting, HeaderInfo::NONE)
            .expect("reopening should succeed");
        prop_assert_eq!(v.as_slice(), values.as_slice());
    }
}
