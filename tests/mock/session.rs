use std::thread;

use sqlbind::mock::{MockDriver, MockEvent};
use sqlbind::{
    Error, Field, Op, Opener, QueryMap, Record, Shape, Value, DRIVER_POSTGRES, DRIVER_SQLITE3,
};

use crate::{exec, Exec, Users, DELETE, INSERT};

const SCHEMA: &str = "CREATE TABLE users (name TEXT)";

#[test]
fn it_releases_earlier_statements_when_a_slot_fails() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3).fail_prepare(DELETE);

    let err = Opener::new(Users::new())
        .open(&driver, "mock://")
        .unwrap_err();

    match &err {
        Error::Prepare {
            index: 1,
            name: "delete",
            source,
        } => assert!(source.as_database_error().is_some(), "{source:?}"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(driver.count(&MockEvent::CloseStatement(INSERT.into())), 1);
    assert_eq!(driver.open_statements(), 0);
    assert!(driver.is_connection_closed());

    Ok(())
}

#[test]
fn it_requires_schema_for_the_active_driver() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let err = Opener::new(Users::new())
        .schema(QueryMap::new().with(DRIVER_POSTGRES, SCHEMA))
        .open(&driver, "mock://")
        .unwrap_err();

    assert!(
        matches!(
            &err,
            Error::UnsupportedDriver { driver, what: "schema statements" } if driver == DRIVER_SQLITE3
        ),
        "{err:?}"
    );

    assert_eq!(driver.count(&MockEvent::ExecuteBatch(SCHEMA.into())), 0);
    assert!(driver.is_connection_closed());

    Ok(())
}

#[test]
fn it_applies_schema_before_binding() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let (_users, cleanup) = Opener::new(Users::new())
        .schema(QueryMap::from([(DRIVER_SQLITE3, SCHEMA), (DRIVER_POSTGRES, "-- postgres")]))
        .open(&driver, "mock://")?;

    let events = driver.events();
    let schema = events
        .iter()
        .position(|e| *e == MockEvent::ExecuteBatch(SCHEMA.into()));
    let first_prepare = events
        .iter()
        .position(|e| matches!(e, MockEvent::Prepare(_)));

    assert!(schema.is_some());
    assert!(schema < first_prepare);

    cleanup.call();

    Ok(())
}

#[test]
fn it_closes_the_connection_when_schema_fails() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3).fail_batch();

    let err = Opener::new(Users::new())
        .schema(QueryMap::from([(DRIVER_SQLITE3, SCHEMA)]))
        .open(&driver, "mock://")
        .unwrap_err();

    assert!(err.as_database_error().is_some(), "{err:?}");
    assert_eq!(driver.count(&MockEvent::Prepare(INSERT.into())), 0);
    assert!(driver.is_connection_closed());

    Ok(())
}

#[test]
fn it_reports_connection_failures() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3).fail_connect();
    let err = Opener::new(Users::new()).open(&driver, "mock://").unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err:?}");

    let driver = MockDriver::new(DRIVER_SQLITE3).fail_ping();
    let err = Opener::new(Users::new()).open(&driver, "mock://").unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err:?}");
    assert!(driver.is_connection_closed());

    Ok(())
}

#[test]
fn it_cleans_up_once() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);
    let (users, cleanup) = Opener::new(Users::new()).open(&driver, "mock://")?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cleanup = cleanup.clone();
            thread::spawn(move || cleanup.call())
        })
        .collect();

    for handle in handles {
        handle.join().expect("cleanup thread panicked");
    }

    cleanup.call();

    assert_eq!(driver.count(&MockEvent::CloseConnection), 1);
    assert_eq!(driver.count(&MockEvent::CloseStatement(INSERT.into())), 1);
    assert_eq!(driver.count(&MockEvent::CloseStatement(DELETE.into())), 1);

    // every bound operation fails afterwards
    let err = users.create.get()(&[Value::from("late")]).unwrap_err();
    assert!(matches!(err, Error::Closed(_)), "{err:?}");

    Ok(())
}

struct Bare {
    create: Op<Bare, Exec>,
}

impl Record<Bare> for Bare {
    fn shape(&mut self) -> Shape<'_, Bare> {
        Shape::Struct(vec![Field::op("create", &mut self.create)])
    }
}

#[test]
fn it_keeps_operations_alive_without_the_cleanup_handle() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let (bare, _) = Opener::new(Bare {
        create: Op::new(exec(INSERT)),
    })
    .open(&driver, "mock://")?;

    assert_eq!(bare.create.get()(&[Value::from("alice")])?, 1);
    assert_eq!(driver.open_statements(), 1);
    assert!(!driver.is_connection_closed());

    // dropping the aggregate releases nothing either
    drop(bare);
    assert_eq!(driver.count(&MockEvent::CloseStatement(INSERT.into())), 0);
    assert_eq!(driver.count(&MockEvent::CloseConnection), 0);

    Ok(())
}
