use docmigrate::errors::{ErrorCategory, ErrorKind};
use docmigrate::migration::MigrationRecord;
use docmigrate::migrator::{into_triple, Migrator};
use docmigrate::reconcile::Target;
use docmigrate::store::{order_by, LedgerStore, SortOrder, VersionFilter};
use docmigrate_int_test::test_util::{
    cleanup, create_test_context, run_test, standard_migrations, FlakyStore,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_undeclared_target_touches_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            let db = ctx.db();
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Version(2))?;

            for target in [5, -1, 100] {
                let (old, new, err) = into_triple(migrator.set_version("app", target));
                let err = err.unwrap();
                assert_eq!(err.kind(), &ErrorKind::TargetVersionNotFound);
                assert_eq!(err.category(), ErrorCategory::Precondition);
                assert_eq!((old, new), (-1, -1));
            }
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stamp_forward_runs_no_bodies() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            let db = ctx.db();
            migrator.init("app")?;

            let change = migrator.set_version("app", 3)?;
            assert_eq!((change.old_version, change.new_version), (0, 3));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2, 3]);
            assert!(db.calls().is_empty());

            let change = migrator.up(&db, "app", Target::Latest)?;
            assert_eq!((change.old_version, change.new_version), (3, 4));
            assert_eq!(db.calls(), vec!["up:4"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stamp_backward_runs_no_bodies() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            let db = ctx.db();
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Latest)?;
            db.clear_calls();

            let change = migrator.set_version("app", 1)?;
            assert_eq!((change.old_version, change.new_version), (4, 1));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1]);
            assert!(db.calls().is_empty());
            assert!(db.has_collection("app_audit"));

            let change = migrator.set_version("app", 0)?;
            assert_eq!((change.old_version, change.new_version), (1, 0));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stamp_repairs_drift() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            let db = ctx.db();
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Version(2))?;

            // left behind by a build that is gone
            ctx.store()
                .insert("app_migrations", &MigrationRecord::new(7, "stray"))?;
            let err = migrator.reset(&db, "app").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::MigrationsAbsent);

            let change = migrator.set_version("app", 4)?;
            assert_eq!((change.old_version, change.new_version), (7, 4));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2, 3, 4]);

            let change = migrator.reset(&db, "app")?;
            assert_eq!((change.old_version, change.new_version), (4, 0));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_same_version_keeps_records() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            let db = ctx.db();
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Latest)?;

            let ids = |ctx: &docmigrate_int_test::test_util::TestContext| {
                ctx.store()
                    .find(
                        "app_migrations",
                        VersionFilter::All,
                        &order_by(SortOrder::Ascending),
                    )
                    .and_then(|cursor| cursor.collect_records())
                    .map(|records| {
                        records
                            .iter()
                            .map(|r| r.id().cloned())
                            .collect::<Vec<_>>()
                    })
            };

            let before = ids(&ctx)?;
            let change = migrator.set_version("app", 4)?;
            assert!(change.is_noop());
            assert_eq!(ids(&ctx)?, before);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stamp_empty_ledger() {
    run_test(
        create_test_context,
        |ctx| {
            let migrator = ctx.migrator(standard_migrations());
            ctx.store().create_collection("app_migrations")?;

            let change = migrator.set_version("app", 2)?;
            assert_eq!((change.old_version, change.new_version), (-1, 2));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_purge_reports_untouched_head() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let flaky = FlakyStore::new(ctx.store());
            let migrator = Migrator::new(LedgerStore::new(flaky.clone()), standard_migrations());
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Version(2))?;

            flaky.fail_purges(true);
            let (old, new, err) = into_triple(migrator.set_version("app", 4));
            assert_eq!(err.unwrap().kind(), &ErrorKind::MigrationFailed);
            assert_eq!((old, new), (2, 2));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_bulk_insert_reports_emptied_ledger() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let flaky = FlakyStore::new(ctx.store());
            let migrator = Migrator::new(LedgerStore::new(flaky.clone()), standard_migrations());
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Version(2))?;

            flaky.fail_inserts_after(0);
            let (old, new, err) = into_triple(migrator.set_version("app", 3));
            assert_eq!(err.unwrap().kind(), &ErrorKind::MigrationFailed);
            assert_eq!((old, new), (2, -1));
            assert!(ctx.ledger_versions("app_migrations")?.is_empty());

            // stamping again once the store recovers repairs the ledger
            flaky.heal();
            let change = migrator.set_version("app", 3)?;
            assert_eq!((change.old_version, change.new_version), (-1, 3));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2, 3]);
            Ok(())
        },
        cleanup,
    )
}
