use rand::{SeedableRng, rngs::StdRng};
use shade_keychain::{Scalar, derive_from_seed_hex, mul_base, random_scalar};
use shade_privacy::{
    MerkleForest, NoteMetadata, NoteRecord, Recovery, StealthAddress, StealthRecipient,
    StealthSender, create_with_randoms, recover_stealth, scan_notes,
};

#[test]
fn seed_recipient_recovers_fixed_random() {
    let root = derive_from_seed_hex("0xAABBCCDDEEFF").unwrap();
    let again = derive_from_seed_hex("0xAABBCCDDEEFF").unwrap();
    assert_eq!(root, again);

    // Root and channel roles played by the same keypair
    let rho_spend = Scalar::from(42u64);
    let rho_channel = Scalar::from(4242u64);
    let output =
        create_with_randoms(root.public_key(), root.public_key(), &rho_spend, &rho_channel)
            .unwrap();

    match recover_stealth(output.message.as_bytes(), root.private_key(), &root).unwrap() {
        Recovery::Recovered(spend) => {
            assert_eq!(spend.rho_spend, rho_spend);
            assert_eq!(spend.spend_pub, output.child_spend_pub);
            assert_eq!(mul_base(&spend.spend_priv), output.child_spend_pub);
        }
        Recovery::NotAddressedToUs => panic!("message should be ours"),
    }
}

#[test]
fn published_address_round_trips_into_sender() {
    let mut rng = StdRng::seed_from_u64(0);
    let recipient = StealthRecipient::random(&mut rng);
    let address = StealthAddress::from_hex(&recipient.address().to_hex()).unwrap();

    let rho_spend = random_scalar(&mut rng);
    let rho_channel = random_scalar(&mut rng);
    let output = StealthSender::new(address)
        .create_with_randoms(&rho_spend, &rho_channel)
        .unwrap();

    let spend = recipient
        .recover(output.message.as_bytes())
        .unwrap()
        .into_spend()
        .unwrap();
    assert_eq!(spend.rho_spend, rho_spend);
    assert_eq!(spend.spend_pub, output.child_spend_pub);
}

#[test]
fn send_insert_scan_and_prove() {
    let mut rng = StdRng::seed_from_u64(1);
    let alice = StealthRecipient::random(&mut rng);
    let bob = StealthRecipient::random(&mut rng);
    let mut forest = MerkleForest::new(4, Default::default()).unwrap();

    let mut records = Vec::new();
    for batch in 0..3u64 {
        let mut outputs = Vec::new();
        for k in 0..3u64 {
            let target = if (batch + k) % 3 == 0 { &alice } else { &bob };
            let output = StealthSender::new(target.address())
                .create(&mut rng)
                .unwrap();
            let meta = NoteMetadata::new((batch * 3 + k) as u128, 7, 1_700_000_000);
            outputs.push(NoteRecord::from_output(&output, meta));
        }

        let leaves: Vec<_> = outputs.iter().map(|r| r.commitment.to_field()).collect();
        let inserted = forest.insert_batch(&leaves).unwrap();
        for (k, record) in outputs.into_iter().enumerate() {
            records.push(record.with_position(inserted.tree_id, inserted.left_leaf_id + k as u64));
        }
    }

    let report = scan_notes(&alice, &records);
    assert_eq!(report.owned.len(), 3);

    for note in &report.owned {
        let position = note.record.position.unwrap();
        let witness = forest
            .spend_witness(note.spend.spend_priv, position.tree_id, position.leaf_id)
            .unwrap();
        assert!(forest.is_known_root(witness.tree_id, &witness.root, witness.cache_index_hint));

        let proof = forest
            .gen_merkle_path(position.tree_id, position.leaf_id)
            .unwrap();
        assert_eq!(proof.leaf, note.record.commitment.to_field());
        assert!(forest.verify(&proof));
    }
}
