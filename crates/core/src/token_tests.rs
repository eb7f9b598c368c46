// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

use super::*;

fn tid(s: &str) -> TransferId {
    TransferId::new(s)
}

#[test]
fn collect_transfers_walks_nested_tokens() {
    let token = CommandToken::Seq(vec![
        CommandToken::Transfer(tid("/srv/a")),
        CommandToken::Pair { transfer: tid("/srv/dir"), relative: "x.dat".into() },
        CommandToken::OptionPath {
            parent: Box::new(CommandToken::Transfer(tid("/srv/b"))),
            uri: "?format=nifti".into(),
        },
        CommandToken::literal("-v"),
    ]);

    let mut out = Vec::new();
    token.collect_transfers(&mut out);
    assert_eq!(out, vec![tid("/srv/a"), tid("/srv/dir"), tid("/srv/b")]);
}

#[test]
fn collect_temporaries_walks_nested_tokens() {
    let tmp = TemporaryId::from_string("tmp-1");
    let token = CommandToken::OptionPath {
        parent: Box::new(CommandToken::Seq(vec![
            CommandToken::Temporary(tmp),
            CommandToken::literal("out"),
        ])),
        uri: "?gz".into(),
    };

    let mut out = Vec::new();
    token.collect_temporaries(&mut out);
    assert_eq!(out, vec![tmp]);
}

#[test]
fn literals_collect_nothing() {
    let token = CommandToken::literal("echo");
    let mut transfers = Vec::new();
    let mut temps = Vec::new();
    token.collect_transfers(&mut transfers);
    token.collect_temporaries(&mut temps);
    assert!(transfers.is_empty());
    assert!(temps.is_empty());
}

#[test]
fn shared_path_is_not_a_transfer() {
    let token = CommandToken::Shared(SharedResourcePath::new("lab", "data-uuid", "in/img.nii"));
    let mut transfers = Vec::new();
    token.collect_transfers(&mut transfers);
    assert!(transfers.is_empty());
}

#[test]
fn token_serde_round_trip() {
    let token = CommandToken::Seq(vec![
        CommandToken::literal("cp"),
        CommandToken::Transfer(tid("/srv/in")),
        CommandToken::Temporary(TemporaryId::from_string("tmp-x")),
    ]);
    let json = serde_json::to_string(&token).unwrap();
    let parsed: CommandToken = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, token);
}

#[test]
fn transfer_id_displays_as_server_path() {
    assert_eq!(tid("/srv/gridmill/t1").to_string(), "/srv/gridmill/t1");
}
