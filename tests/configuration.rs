use std::fs;
use std::time::Duration;

use sqlforge::config::{init_tracing, Settings};
use sqlforge::driver::ConnectionTarget;
use sqlforge::prefix::TablePrefixes;
use sqlforge::statement::StatementBuilder;

#[test]
fn file_settings_drive_the_session() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let database = dir.path().join("ledger.db");
    let config_file = dir.path().join("sqlforge.toml");
    fs::write(
        &config_file,
        format!(
            "database = '{}'\n\
             busy_timeout_ms = 250\n\
             query_timeout_ms = 2000\n\
             log_filter = 'sqlforge=debug'\n\
             \n\
             [prefixes]\n\
             owner = 'main'\n\
             qualifier = 'acct'\n",
            database.display()
        ),
    )
    .expect("config file written");

    let settings = Settings::load_from(&config_file).expect("settings load");
    assert_eq!(settings.connection_target().unwrap(), ConnectionTarget::File(database.clone()));
    assert_eq!(settings.busy_timeout(), Duration::from_millis(250));
    assert_eq!(settings.query_options().timeout, Some(Duration::from_secs(2)));
    assert_eq!(settings.prefixes(), &TablePrefixes::new("main", "acct", ""));

    let session = settings.session().expect("session opens");
    let mut ddl = StatementBuilder::with_prefixes(settings.prefixes().clone());
    ddl.append("CREATE TABLE {owner}{qualifier}Entry (Amount INTEGER)");
    assert_eq!(ddl.sql(), "CREATE TABLE main.acct_Entry (Amount INTEGER)");
    session.execute_non_query(ddl.build()).unwrap();

    let mut insert = StatementBuilder::with_prefixes(settings.prefixes().clone());
    insert.insert_into("{owner}{qualifier}Entry", &[("Amount", 42.into())]);
    assert_eq!(session.execute_non_query(insert.build()).unwrap(), 1);

    let mut sum = StatementBuilder::with_prefixes(settings.prefixes().clone());
    sum.select(&["SUM(Amount)"]).from("{qualifier}Entry");
    assert_eq!(session.execute_scalar::<i64>(sum.build()).unwrap(), Some(42));
    assert!(database.exists(), "file database must be created");
}

#[test]
fn tracing_installs_once() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_from(dir.path().join("missing.toml")).unwrap();
    assert_eq!(settings.log_filter, "info");
    let first = init_tracing(&settings);
    let second = init_tracing(&settings);
    assert!(!second, "a second subscriber must not replace the first");
    let _ = first;
}
