//! End-to-end tests for building and finalizing create requests.

use capve_vm_options::{
    DesiredSpec, ExtraDisk, ImageRef, OptionBuilder, OverflowPolicy, StorageInjector,
    MAX_EXTRA_DISKS,
};
use proptest::prelude::*;
use rstest::rstest;

fn spec_with_disks(disks: Vec<ExtraDisk>) -> DesiredSpec {
    let mut spec: DesiredSpec = serde_json::from_value(serde_json::json!({
        "name": "vm-a",
        "image": { "url": "https://cloud-images.example/jammy-server.img" },
        "snippet_storage": "snippets",
        "image_storage": "images",
    }))
    .unwrap();
    spec.hardware.extra_disks = disks;
    spec
}

fn numbered_disks(n: usize) -> Vec<ExtraDisk> {
    (0..n)
        .map(|i| ExtraDisk::new(format!("pool{i}"), format!("{}G", 10 * (i + 1))))
        .collect()
}

const IMAGE_PATH: &str = "/var/lib/capve/images/jammy-server.raw";

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(5)]
#[case(6)]
fn test_slots_follow_declaration_order(#[case] count: usize) {
    let spec = spec_with_disks(numbered_disks(count));
    let req = OptionBuilder::default().build(&spec).unwrap();
    let scsi = &req.request().scsi;

    for (i, disk) in spec.hardware.extra_disks.iter().enumerate() {
        let expected = format!("{}:{},size={}", disk.storage, i + 1, disk.size);
        assert_eq!(scsi.get(i + 1), Some(expected.as_str()));
    }
    assert_eq!(scsi.occupied(), count + 1);
}

#[rstest]
#[case(7)]
#[case(12)]
fn test_overflow_truncates_without_error(#[case] count: usize) {
    let spec = spec_with_disks(numbered_disks(count));
    let req = OptionBuilder::new(OverflowPolicy::Truncate)
        .build(&spec)
        .expect("truncation is not an error");
    let scsi = &req.request().scsi;

    assert_eq!(scsi.occupied(), MAX_EXTRA_DISKS + 1);
    assert_eq!(scsi.get(6), Some("pool5:6,size=60G"));
    let serialized = serde_json::to_value(req.request()).unwrap();
    assert!(serialized.get("scsi7").is_none());
    assert!(!serialized.to_string().contains("pool6"));
}

#[test]
fn test_build_then_inject_end_to_end() {
    let spec = spec_with_disks(vec![
        ExtraDisk::new("local", "10G"),
        ExtraDisk::new("local", "20G"),
    ]);

    let provisional = OptionBuilder::default().build(&spec).unwrap();
    let scsi = &provisional.request().scsi;
    assert_eq!(scsi.root(), Some(format!("images:0,import-from={IMAGE_PATH}").as_str()));
    assert_eq!(scsi.get(1), Some("local:1,size=10G"));
    assert_eq!(scsi.get(2), Some("local:2,size=20G"));

    let finalized = StorageInjector::for_spec(&spec).inject(provisional, "fast-pool");
    let scsi = &finalized.request().scsi;
    assert_eq!(
        scsi.root(),
        Some(format!("fast-pool:0,import-from={IMAGE_PATH}").as_str())
    );
    assert_eq!(scsi.get(1), Some("local:1,size=10G"));
    assert_eq!(scsi.get(2), Some("local:2,size=20G"));
    assert_eq!(finalized.request().ide2, "file=fast-pool:cloudinit,media=cdrom");
    assert_eq!(finalized.storage(), "fast-pool");
}

#[test]
fn test_seven_disks_end_to_end() {
    let spec = spec_with_disks(numbered_disks(7));
    let provisional = OptionBuilder::default().build(&spec).unwrap();
    let finalized = StorageInjector::for_spec(&spec).inject(provisional, "fast-pool");
    let scsi = &finalized.request().scsi;

    let slots: Vec<usize> = scsi.iter().map(|(slot, _)| slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 4, 5, 6]);
    assert!(scsi.iter().all(|(_, value)| !value.starts_with("pool6:")));
}

#[test]
fn test_inject_overwrites_matching_values() {
    let mut spec = spec_with_disks(vec![]);
    spec.image_storage = "fast-pool".to_string();
    spec.image = ImageRef::new("https://cloud-images.example/jammy-server.img");

    let provisional = OptionBuilder::default().build(&spec).unwrap();
    let before = provisional.request().clone();
    let after = StorageInjector::for_spec(&spec).inject(provisional, "fast-pool");

    assert_eq!(after.request(), &before);
}

#[test]
fn test_inject_overwrites_tampered_slots() {
    let spec = spec_with_disks(vec![ExtraDisk::new("local", "10G")]);
    let injector = StorageInjector::for_spec(&spec);
    let provisional = OptionBuilder::default().build(&spec).unwrap();

    let mut raw = injector.inject(provisional, "fast-pool").into_inner();
    raw.ide2 = "file=other:cloudinit,media=cdrom".to_string();
    raw.scsi.set(0, "other:0,import-from=/tmp/x.raw".to_string()).unwrap();
    raw.scsi.set(4, "stale:4,size=1G".to_string()).unwrap();
    raw.storage = "other".to_string();

    let fixed = injector.inject(raw, "fast-pool");
    assert_eq!(fixed.request().ide2, "file=fast-pool:cloudinit,media=cdrom");
    assert_eq!(
        fixed.request().scsi.root(),
        Some(format!("fast-pool:0,import-from={IMAGE_PATH}").as_str())
    );
    assert_eq!(fixed.request().scsi.get(1), Some("local:1,size=10G"));
    assert_eq!(fixed.request().scsi.get(4), None);
    assert_eq!(fixed.storage(), "fast-pool");
}

fn disk_strategy() -> impl Strategy<Value = ExtraDisk> {
    ("[a-z]{1,8}", 1u32..2048).prop_map(|(storage, gb)| ExtraDisk::new(storage, format!("{gb}G")))
}

proptest! {
    #[test]
    fn prop_inject_is_idempotent(
        disks in prop::collection::vec(disk_strategy(), 0..10),
        storage in "[a-z][a-z0-9-]{0,12}",
    ) {
        let spec = spec_with_disks(disks);
        let injector = StorageInjector::for_spec(&spec);
        let provisional = OptionBuilder::default().build(&spec).unwrap();

        let once = injector.inject(provisional, &storage);
        let twice = injector.inject(once.clone(), &storage);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_slot_is_position_plus_one(disks in prop::collection::vec(disk_strategy(), 0..10)) {
        let spec = spec_with_disks(disks.clone());
        let req = OptionBuilder::default().build(&spec).unwrap();
        let scsi = &req.request().scsi;

        for (i, disk) in disks.iter().take(MAX_EXTRA_DISKS).enumerate() {
            let expected = format!("{}:{},size={}", disk.storage, i + 1, disk.size);
            prop_assert_eq!(scsi.get(i + 1), Some(expected.as_str()));
        }
        prop_assert_eq!(scsi.occupied(), disks.len().min(MAX_EXTRA_DISKS) + 1);
    }
}
