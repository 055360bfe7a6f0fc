use docmigrate::errors::MigrateResult;
use docmigrate::migration::MigrationSet;
use docmigrate_int_test::test_util::{cleanup, collection_migration, create_test_context};

fn main() -> MigrateResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let count = 2000;
    let migrations = MigrationSet::new(
        (1..=count)
            .map(|version| collection_migration(version, &format!("c{}", version)))
            .collect(),
    )?;
    let migrator = ctx.migrator(migrations);
    let db = ctx.db();

    migrator.init("stress")?;

    let start = std::time::Instant::now();
    let change = migrator.run(&db, "stress", &["up"])?;
    println!("Applied {} migrations ({}) in {:?}", count, change, start.elapsed());

    let start = std::time::Instant::now();
    for _ in 0..100 {
        migrator.version("stress")?;
    }
    println!("Read the ledger head 100 times in {:?}", start.elapsed());

    let start = std::time::Instant::now();
    let change = migrator.run(&db, "stress", &["set_version", "1000"])?;
    println!("Stamped ledger ({}) in {:?}", change, start.elapsed());

    let start = std::time::Instant::now();
    let change = migrator.run(&db, "stress", &["reset"])?;
    println!("Rolled back ({}) in {:?}", change, start.elapsed());

    cleanup(ctx)
}
