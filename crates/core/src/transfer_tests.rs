// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use super::*;
use crate::status::TransferStatus;
use chrono::Utc;

fn transfer(direction: TransferDirection) -> Transfer {
    Transfer {
        id: TransferId::new("/srv/gridmill/t1"),
        user_id: UserId::from_string("usr-a"),
        client_path: "/home/user/data.nii".into(),
        client_paths: None,
        direction,
        status: Transfer::initial_status(direction),
        expires_at: Utc::now(),
        registered_at_ms: 0,
        refs: BTreeSet::new(),
    }
}

#[test]
fn input_transfers_start_on_client() {
    assert_eq!(transfer(TransferDirection::In).status, TransferStatus::OnClient);
}

#[test]
fn output_transfers_start_nonexistent() {
    assert_eq!(transfer(TransferDirection::Out).status, TransferStatus::DoesNotExist);
}

#[test]
fn multi_file_transfer_is_a_directory() {
    let mut t = transfer(TransferDirection::In);
    assert!(!t.is_directory());
    t.client_paths = Some(vec!["data.img".into(), "data.hdr".into()]);
    assert!(t.is_directory());
}

#[test]
fn reference_tracking() {
    let mut t = transfer(TransferDirection::In);
    assert!(!t.is_referenced());
    t.refs.insert(crate::job::JobId::from_string("job-1"));
    assert!(t.is_referenced());
}

#[test]
fn temporary_decl_defaults() {
    let f = TemporaryDecl::file(".nii.gz");
    assert!(!f.is_directory);
    assert_eq!(f.suffix, ".nii.gz");
    assert_eq!(f.disposal_hours, crate::job::DEFAULT_DISPOSAL_HOURS);

    let d = TemporaryDecl::directory();
    assert!(d.is_directory);
    assert!(d.suffix.is_empty());
}
