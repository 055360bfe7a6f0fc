use docmigrate::errors::{ErrorCategory, ErrorKind};
use docmigrate::migrator::{into_triple, CancelToken};
use docmigrate::reconcile::Target;
use docmigrate_int_test::test_util::{cleanup, create_test_context, run_test, standard_migrations};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_cancel_between_up_steps() {
    run_test(
        create_test_context,
        |ctx| {
            let token = CancelToken::new();
            let migrator = ctx.cancellable_migrator(standard_migrations(), token.clone())?;
            let db = ctx.db();
            migrator.init("app")?;

            let hook_token = token.clone();
            db.on_call(move |call| {
                if call == "up:2" {
                    hook_token.cancel();
                }
            });

            let (old, new, err) = into_triple(migrator.up(&db, "app", Target::Latest));
            let err = err.unwrap();
            assert_eq!(err.kind(), &ErrorKind::Cancelled);
            assert_eq!(err.category(), ErrorCategory::PartialApplication);
            assert_eq!((old, new), (0, 2));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2]);

            token.reset();
            let change = migrator.up(&db, "app", Target::Latest)?;
            assert_eq!((change.old_version, change.new_version), (2, 4));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cancelled_before_start_runs_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let token = CancelToken::new();
            let migrator = ctx.cancellable_migrator(standard_migrations(), token.clone())?;
            let db = ctx.db();
            migrator.init("app")?;

            token.cancel();
            let (old, new, err) = into_triple(migrator.up(&db, "app", Target::Latest));
            assert_eq!(err.unwrap().kind(), &ErrorKind::Cancelled);
            assert_eq!((old, new), (0, 0));
            assert!(db.calls().is_empty());

            // init, version and set_version are single steps and ignore the token
            assert_eq!(migrator.version("app")?.new_version, 0);
            let change = migrator.set_version("app", 2)?;
            assert_eq!((change.old_version, change.new_version), (0, 2));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cancel_between_reset_steps() {
    run_test(
        create_test_context,
        |ctx| {
            let token = CancelToken::new();
            let migrator = ctx.cancellable_migrator(standard_migrations(), token.clone())?;
            let db = ctx.db();
            migrator.init("app")?;
            migrator.up(&db, "app", Target::Latest)?;

            let hook_token = token.clone();
            db.on_call(move |call| {
                if call == "down:3" {
                    hook_token.cancel();
                }
            });

            let (old, new, err) = into_triple(migrator.reset(&db, "app"));
            assert_eq!(err.unwrap().kind(), &ErrorKind::Cancelled);
            assert_eq!((old, new), (4, 2));
            assert_eq!(ctx.ledger_versions("app_migrations")?, vec![0, 1, 2]);

            // down rolls back a single step and is not interrupted
            let change = migrator.down(&db, "app")?;
            assert_eq!((change.old_version, change.new_version), (2, 1));
            Ok(())
        },
        cleanup,
    )
}
