use ark_ff::Zero;
use shade_keychain::FieldElement;
use shade_privacy::{MerkleForest, PoseidonHasher, Tree, TreeError, ZeroHashes};

fn triad(seed: u64) -> [FieldElement; 3] {
    [
        FieldElement::from(seed * 3 + 1),
        FieldElement::from(seed * 3 + 2),
        FieldElement::from(seed * 3 + 3),
    ]
}

#[test]
fn full_tree_freezes_root_and_next_batch_opens_new_tree() {
    let depth = 3;
    let mut forest = MerkleForest::new(depth, FieldElement::zero()).unwrap();

    let mut last = None;
    for i in 0..4 {
        last = Some(forest.insert_batch(&triad(i)).unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.tree_id, 0);
    assert_eq!(forest.active_tree().final_root(), Some(last.root));

    let empty_root = ZeroHashes::new(&PoseidonHasher, &FieldElement::zero(), depth).empty_root();
    let fresh = Tree::new(1, depth, FieldElement::zero(), &PoseidonHasher).unwrap();
    assert_eq!(fresh.root(), empty_root);

    let first_in_new = forest.insert_batch(&triad(4)).unwrap();
    assert_eq!(first_in_new.tree_id, 1);
    assert_eq!(first_in_new.left_leaf_id, 0);

    let mut expected = fresh;
    let expected_batch = expected.insert_batch(&triad(4), &PoseidonHasher).unwrap();
    assert_eq!(first_in_new.root, expected_batch.root);

    // Frozen tree keeps answering with its final root whatever the hint
    assert!(forest.is_known_root(0, &last.root, 0));
    assert!(forest.is_known_root(0, &last.root, 200));
    assert!(!forest.is_known_root(0, &first_in_new.root, 0));
    assert!(forest.is_known_root(1, &first_in_new.root, 0));
}

#[test]
fn root_cache_slot_is_overwritten_after_256_batches() {
    let mut forest = MerkleForest::new(10, FieldElement::zero()).unwrap();
    let first = forest.insert_batch(&triad(0)).unwrap();
    assert_eq!(first.cache_index, 1);

    for i in 1..256 {
        forest.insert_batch(&triad(i)).unwrap();
    }
    // 255 later batches: still addressable
    assert!(forest.is_known_root(0, &first.root, first.cache_index));

    let wrapped = forest.insert_batch(&triad(256)).unwrap();
    assert_eq!(wrapped.cache_index, first.cache_index);
    assert!(!forest.is_known_root(0, &first.root, first.cache_index));
    assert!(forest.is_known_root(0, &wrapped.root, wrapped.cache_index));

    // Slot 0 only ever reflects the newest root
    assert!(forest.is_known_root(0, &wrapped.root, 0));
    assert!(!forest.is_known_root(0, &first.root, 0));
}

#[test]
fn every_inserted_leaf_has_a_valid_path() {
    let mut forest = MerkleForest::new(3, FieldElement::zero()).unwrap();
    for i in 0..6 {
        forest.insert_batch(&triad(i)).unwrap();
    }
    assert_eq!(forest.tree_count(), 2);

    for tree in forest.trees() {
        for triad_index in 0..tree.leaves_num() / 3 {
            for k in 0..3 {
                let leaf_index = triad_index * 4 + k;
                let proof = forest.gen_merkle_path(tree.id(), leaf_index).unwrap();
                assert!(forest.verify(&proof), "tree {} leaf {leaf_index}", tree.id());
                assert!(forest.is_known_root(tree.id(), &proof.root, 0));

                let mut tampered = proof.clone();
                tampered.leaf = FieldElement::from(999_999u64);
                assert!(!forest.verify(&tampered));
            }
        }
    }
}

#[test]
fn writer_misuse_is_reported() {
    let mut forest = MerkleForest::new(3, FieldElement::zero()).unwrap();
    let leaves = triad(0);
    assert_eq!(
        forest.insert_batch(&leaves[..1]),
        Err(TreeError::InvalidBatchSize(1))
    );
    assert_eq!(
        forest.insert_batch(&[leaves[0]; 4]),
        Err(TreeError::InvalidBatchSize(4))
    );

    forest.insert_batch(&leaves).unwrap();
    assert!(matches!(
        forest.gen_merkle_path(0, 3),
        Err(TreeError::LeafNotFound { .. })
    ));
    assert!(matches!(
        forest.gen_merkle_path(0, 4),
        Err(TreeError::LeafNotFound { .. })
    ));
}

#[test]
fn cloned_forest_is_a_point_in_time_view() {
    let mut forest = MerkleForest::new(4, FieldElement::zero()).unwrap();
    let inserted = forest.insert_batch(&triad(0)).unwrap();
    let reader = forest.clone();

    forest.insert_batch(&triad(1)).unwrap();

    let proof = reader.gen_merkle_path(0, 1).unwrap();
    assert_eq!(proof.root, inserted.root);
    assert!(reader.verify(&proof));
    assert!(forest.is_known_root(0, &proof.root, inserted.cache_index));
}
