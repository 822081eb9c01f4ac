use shadowrestore_core::{
    AddressingMode, CopyOutcome, Error, NotifyOutcome, RestoreRequest, Restorer, SkipReason,
    TimeBucket,
};
use shadowrestore_core::notify::file_url;
use std::path::PathBuf;

mod helpers;
use helpers::{
    destination, files_under, setup_test_env, setup_tracing, FakeSource, RecordingMailer,
    UnreachableSource, LISTED_TIMES, SNAPSHOT_TOKEN,
};

fn share_request(destination: PathBuf) -> RestoreRequest {
    RestoreRequest {
        date: "2019-03-08".to_string(),
        bucket: TimeBucket::Evening,
        system: "srv1".to_string(),
        addressing: AddressingMode::Share("share1".to_string()),
        relative_path: r"Team\User".to_string(),
        file: None,
        destination,
        recursive: None,
        notify: None,
        dry_run: false,
    }
}

#[test]
fn it_restores_a_single_file_from_the_nearest_snapshot() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        file: Some("report.docx".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(report.snapshot.raw, "3/7/2019 7:00:00 PM");
    assert_eq!(report.token, SNAPSHOT_TOKEN);
    assert_eq!(
        report.source_path,
        r"\\srv1\share1\@GMT-2019.03.07-18.00.00\Team\User"
    );
    assert_eq!(report.copy, CopyOutcome::Copied { files: 1, bytes: 17 });
    assert_eq!(files_under(&dest), vec!["report.docx"]);
    assert_eq!(
        report.notification,
        NotifyOutcome::Skipped(SkipReason::NoRecipient)
    );
}

#[test]
fn it_copies_the_whole_tree_in_share_mode() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let report = restorer.run_restore(&share_request(dest.clone())).unwrap();

    assert!(matches!(report.copy, CopyOutcome::Copied { files: 3, .. }));
    assert_eq!(
        files_under(&dest),
        vec!["drafts/v1.txt", "notes.txt", "report.docx"]
    );
}

#[test]
fn it_skips_tree_copy_in_drive_mode_by_default() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        addressing: AddressingMode::Drive('D'),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(
        report.source_path,
        r"\\srv1\D$\@GMT-2019.03.07-18.00.00\Team\User"
    );
    assert_eq!(
        report.copy,
        CopyOutcome::Skipped(SkipReason::RecursiveNotRequested)
    );
    assert!(files_under(&dest).is_empty());
}

#[test]
fn it_copies_the_tree_in_drive_mode_when_asked_to() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        addressing: AddressingMode::Drive('D'),
        recursive: Some(true),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert!(matches!(report.copy, CopyOutcome::Copied { files: 3, .. }));
    assert_eq!(files_under(&dest).len(), 3);
}

#[test]
fn it_honours_an_explicit_no_recursive_in_share_mode() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        recursive: Some(false),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(
        report.copy,
        CopyOutcome::Skipped(SkipReason::RecursiveNotRequested)
    );
}

#[test]
fn it_reports_a_file_missing_from_the_snapshot_without_failing() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        file: Some("budget.xlsx".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(
        report.copy,
        CopyOutcome::Skipped(SkipReason::FileNotInSnapshot {
            name: "budget.xlsx".to_string()
        })
    );
    assert!(files_under(&dest).is_empty());
}

#[test]
fn it_matches_the_requested_file_name_ignoring_case() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        file: Some("REPORT.DOCX".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert!(report.copy.restored_anything());
    assert_eq!(files_under(&dest), vec!["report.docx"]);
}

#[test]
fn it_copies_a_snapshot_path_that_names_a_file() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        relative_path: r"Team\User\report.docx".to_string(),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(report.copy, CopyOutcome::Copied { files: 1, bytes: 17 });
    assert_eq!(files_under(&dest), vec!["report.docx"]);
}

#[test]
fn it_copies_a_file_path_in_drive_mode_without_recursion() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        addressing: AddressingMode::Drive('D'),
        relative_path: r"Team\User\notes.txt".to_string(),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert!(report.copy.restored_anything());
    assert_eq!(files_under(&dest), vec!["notes.txt"]);
}

#[test]
fn it_checks_the_requested_name_against_a_file_path() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let matching = RestoreRequest {
        relative_path: r"Team\User\report.docx".to_string(),
        file: Some("report.docx".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&matching).unwrap();
    assert_eq!(report.copy, CopyOutcome::Copied { files: 1, bytes: 17 });

    let other = RestoreRequest {
        relative_path: r"Team\User\notes.txt".to_string(),
        file: Some("report.docx".to_string()),
        ..share_request(temp_dir.path().join("other"))
    };
    let report = restorer.run_restore(&other).unwrap();
    assert_eq!(
        report.copy,
        CopyOutcome::Skipped(SkipReason::FileNotInSnapshot {
            name: "report.docx".to_string()
        })
    );
    assert!(!temp_dir.path().join("other").exists());
}

#[test]
fn it_reports_a_snapshot_path_that_does_not_exist() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        relative_path: "Team/Nobody".to_string(),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert!(matches!(report.copy, CopyOutcome::NotFound { .. }));
    assert!(!dest.exists());
}

#[test]
fn it_picks_the_earlier_snapshot_when_the_target_precedes_a_later_one() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));

    // 18:00 on the 7th is an hour before that day's snapshot.
    let request = RestoreRequest {
        date: "03/07/2019".to_string(),
        dry_run: true,
        ..share_request(destination(&temp_dir))
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(report.snapshot.raw, "3/6/2019 7:00:00 PM");
    assert_eq!(report.token, "2019.03.06-18.00.00");
    assert!((report.snapshot.hours_from_target - 23.0).abs() < f64::EPSILON);
}

#[test]
fn it_fails_when_no_snapshot_precedes_the_target() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        date: "2019-03-01".to_string(),
        bucket: TimeBucket::Morning,
        ..share_request(dest.clone())
    };
    let result = restorer.run_restore(&request);

    assert!(matches!(result, Err(Error::NoSnapshotBefore { .. })));
    assert!(!dest.exists());
}

#[test]
fn it_rejects_an_unparseable_date() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));

    let request = RestoreRequest {
        date: "the day before yesterday".to_string(),
        ..share_request(destination(&temp_dir))
    };

    assert!(matches!(
        restorer.run_restore(&request),
        Err(Error::DateParse { .. })
    ));
}

#[test]
fn it_propagates_a_failed_listing() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, Box::new(UnreachableSource));

    let result = restorer.run_restore(&share_request(destination(&temp_dir)));

    assert!(matches!(result, Err(Error::RemoteCall { ref host, .. }) if host == "srv1"));
}

#[test]
fn it_copies_nothing_on_a_dry_run() {
    let (temp_dir, settings) = setup_test_env();
    let mailer = RecordingMailer::default();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES))
        .with_mailer(Box::new(mailer.clone()));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        dry_run: true,
        notify: Some("user@example.com".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(report.copy, CopyOutcome::Skipped(SkipReason::DryRun));
    assert_eq!(
        report.notification,
        NotifyOutcome::Skipped(SkipReason::DryRun)
    );
    assert!(!dest.exists());
    assert!(mailer.sent.borrow().is_empty());
}

#[test]
fn it_notifies_the_recipient_after_a_restore() {
    setup_tracing();
    let (temp_dir, settings) = setup_test_env();
    let mailer = RecordingMailer::default();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES))
        .with_mailer(Box::new(mailer.clone()));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        file: Some("report.docx".to_string()),
        notify: Some("user@example.com".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(
        report.notification,
        NotifyOutcome::Sent {
            recipient: "user@example.com".to_string()
        }
    );
    let sent = mailer.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "user@example.com");
    assert!(sent[0].subject.contains("srv1"));
    assert!(sent[0].subject.contains("3/7/2019 7:00:00 PM"));
    assert!(sent[0].html_body.contains(&format!(
        "<a href=\"{}\">{}</a>",
        file_url(&dest),
        dest.display()
    )));
    assert!(sent[0].html_body.contains("href=\"file://"));
}

#[test]
fn it_does_not_notify_when_nothing_was_restored() {
    let (temp_dir, settings) = setup_test_env();
    let mailer = RecordingMailer::default();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES))
        .with_mailer(Box::new(mailer.clone()));

    let request = RestoreRequest {
        file: Some("budget.xlsx".to_string()),
        notify: Some("user@example.com".to_string()),
        ..share_request(destination(&temp_dir))
    };
    let report = restorer.run_restore(&request).unwrap();

    assert_eq!(
        report.notification,
        NotifyOutcome::Skipped(SkipReason::NothingRestored)
    );
    assert!(mailer.sent.borrow().is_empty());
}

#[test]
fn it_keeps_the_restore_when_the_mail_relay_fails() {
    let (temp_dir, settings) = setup_test_env();
    let mailer = RecordingMailer {
        fail: true,
        ..Default::default()
    };
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES))
        .with_mailer(Box::new(mailer));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        file: Some("notes.txt".to_string()),
        notify: Some("user@example.com".to_string()),
        ..share_request(dest.clone())
    };
    let report = restorer.run_restore(&request).unwrap();

    assert!(matches!(report.notification, NotifyOutcome::Failed { .. }));
    assert_eq!(files_under(&dest), vec!["notes.txt"]);
}

#[test]
fn it_refuses_to_start_when_notification_has_no_mailer() {
    let (temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));
    let dest = destination(&temp_dir);

    let request = RestoreRequest {
        notify: Some("user@example.com".to_string()),
        ..share_request(dest.clone())
    };

    assert!(matches!(
        restorer.run_restore(&request),
        Err(Error::MailerMissing)
    ));
    assert!(!dest.exists());
}

#[test]
fn it_lists_snapshots_oldest_first_and_marks_the_selection() {
    let (_temp_dir, settings) = setup_test_env();
    let times = ["3/12/2019 6:00:00 PM", "3/6/2019 7:00:00 PM", "3/7/2019 7:00:00 PM"];
    let restorer = Restorer::new(settings, FakeSource::boxed(&times));

    let target = restorer.target_time("2019-03-08", TimeBucket::Noon).unwrap();
    let listed = restorer.list_snapshots("srv1", Some(target)).unwrap();

    let tokens: Vec<_> = listed.iter().map(|s| s.token.as_deref().unwrap()).collect();
    assert_eq!(
        tokens,
        vec!["2019.03.06-18.00.00", "2019.03.07-18.00.00", "2019.03.12-18.00.00"]
    );
    let selected: Vec<_> = listed.iter().filter(|s| s.selected).collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].token.as_deref(), Some(SNAPSHOT_TOKEN));
}

#[test]
fn it_lists_without_selecting_when_no_target_is_given() {
    let (_temp_dir, settings) = setup_test_env();
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));

    let listed = restorer.list_snapshots("srv1", None).unwrap();

    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|s| !s.selected));
}

#[test]
fn it_lists_a_snapshot_whose_token_cannot_be_resolved() {
    setup_tracing();
    let (_temp_dir, mut settings) = setup_test_env();
    settings.snapshots.dst.shift_hours = i64::MAX;
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));

    let listed = restorer.list_snapshots("srv1", None).unwrap();

    let tokens: Vec<_> = listed.iter().map(|s| s.token.as_deref()).collect();
    assert_eq!(tokens, vec![None, None, Some("2019.03.12-18.00.00")]);
}

#[test]
fn it_fails_a_restore_when_the_dst_shift_is_out_of_range() {
    let (temp_dir, mut settings) = setup_test_env();
    settings.snapshots.dst.shift_hours = i64::MAX;
    let restorer = Restorer::new(settings, FakeSource::boxed(&LISTED_TIMES));

    let result = restorer.run_restore(&share_request(destination(&temp_dir)));

    assert!(matches!(result, Err(Error::DstShiftOutOfRange(i64::MAX))));
}
