use sqlbind::mock::{MockDriver, MockEvent};
use sqlbind::{
    Cleanup, Error, Field, Op, Opener, Owner, Params, QueryMap, Record, Shape, Value,
    DRIVER_POSTGRES, DRIVER_SQLITE3,
};

use crate::{exec, Exec, Users, DELETE, INSERT};

#[test]
fn it_binds_every_pending_slot() -> anyhow::Result<()> {
    sqlbind_test::setup_if_needed();

    let driver = MockDriver::new(DRIVER_SQLITE3);
    let (users, cleanup) = Opener::new(Users::new()).open(&driver, "mock://users")?;

    assert!(users.create.is_bound());
    assert!(users.delete.is_bound());
    assert_eq!(driver.open_statements(), 2);

    assert_eq!(users.create.get()(&[Value::from("alice")])?, 1);
    assert_eq!(
        driver.events(),
        [
            MockEvent::Connect("mock://users".into()),
            MockEvent::Ping,
            MockEvent::Prepare(INSERT.into()),
            MockEvent::Prepare(DELETE.into()),
            MockEvent::Execute(INSERT.into()),
        ]
    );

    let assigned = users.cleanup.as_ref().expect("cleanup field assigned");
    assert!(!assigned.is_released());

    cleanup.call();

    assert!(assigned.is_released());
    assert_eq!(driver.open_statements(), 0);
    assert!(driver.is_connection_closed());

    Ok(())
}

struct Mixed {
    public: Op<Mixed, Exec>,
    hidden: Op<Mixed, Exec>,
    preset: Op<Mixed, Exec>,
    empty: Op<Mixed, Exec>,
    label: String,
    cleanup: Option<Cleanup>,
}

impl Record<Mixed> for Mixed {
    fn shape(&mut self) -> Shape<'_, Mixed> {
        Shape::Struct(vec![
            Field::value("label"),
            Field::op("public", &mut self.public),
            Field::op("hidden", &mut self.hidden).private(),
            Field::op("preset", &mut self.preset),
            Field::op("empty", &mut self.empty),
            Field::cleanup(&mut self.cleanup),
        ])
    }
}

#[test]
fn it_skips_ineligible_fields() -> anyhow::Result<()> {
    // the hidden slot would fail if it were prepared
    let driver = MockDriver::new(DRIVER_SQLITE3).fail_prepare(DELETE);

    let preset: Box<Exec> = Box::new(|_: &[Value]| -> sqlbind::Result<u64> { Ok(42) });
    let mixed = Mixed {
        public: Op::new(exec(INSERT)),
        hidden: Op::new(exec(DELETE)),
        preset: Op::bound(preset),
        empty: Op::empty(),
        label: String::from("untouched"),
        cleanup: None,
    };

    let (mixed, _cleanup) = Opener::new(mixed).open(&driver, "mock://")?;

    assert_eq!(driver.count(&MockEvent::Prepare(INSERT.into())), 1);
    assert_eq!(driver.count(&MockEvent::Prepare(DELETE.into())), 0);

    assert!(mixed.public.is_bound());
    assert!(!mixed.hidden.is_bound());
    assert_eq!(mixed.preset.get()(&[])?, 42);
    assert!(matches!(mixed.empty.try_get(), Err(Error::Unbound)));
    assert_eq!(mixed.label, "untouched");
    assert!(mixed.cleanup.is_some());

    Ok(())
}

#[derive(Debug)]
struct Scalar(#[allow(dead_code)] i64);

impl Record<Scalar> for Scalar {
    fn shape(&mut self) -> Shape<'_, Scalar> {
        Shape::Other
    }
}

#[test]
fn it_rejects_targets_without_fields() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let err = Opener::new(Scalar(7)).open(&driver, "mock://").unwrap_err();

    match err {
        Error::InvalidTargetKind { type_name } => assert!(type_name.ends_with("Scalar"), "{type_name}"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(driver.is_connection_closed());

    Ok(())
}

struct Accounts {
    create: Op<Accounts, Exec>,
    delete: Op<Accounts, Exec>,
    rename: Op<Accounts, Exec>,
}

impl Record<Accounts> for Accounts {
    fn shape(&mut self) -> Shape<'_, Accounts> {
        Shape::Struct(vec![
            Field::op("create", &mut self.create),
            Field::op("delete", &mut self.delete),
            Field::op("rename", &mut self.rename),
        ])
    }
}

fn rename(owner: &Owner<Accounts>, _: &Params) -> sqlbind::Result<Box<Exec>> {
    let owner = owner.clone();

    Ok(Box::new(move |args: &[Value]| -> sqlbind::Result<u64> {
        let accounts = owner.get()?;

        let deleted = accounts.delete.get()(&args[..1])?;
        let created = accounts.create.get()(&args[1..])?;

        Ok(deleted + created)
    }))
}

#[test]
fn it_lets_slots_call_sibling_operations() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let accounts = Accounts {
        create: Op::new(exec(INSERT)),
        delete: Op::new(exec(DELETE)),
        rename: Op::with_owner(rename),
    };

    let (accounts, cleanup) = Opener::new(accounts).open(&driver, "mock://")?;

    assert_eq!(accounts.rename.get()(&[Value::from("old"), Value::from("new")])?, 2);

    let executed: Vec<_> = driver
        .events()
        .into_iter()
        .filter(|e| matches!(e, MockEvent::Execute(_)))
        .collect();

    assert_eq!(
        executed,
        [MockEvent::Execute(DELETE.into()), MockEvent::Execute(INSERT.into())]
    );

    cleanup.call();

    let err = accounts.rename.get()(&[Value::from("new"), Value::from("old")]).unwrap_err();
    assert!(matches!(err, Error::Closed("statement")), "{err:?}");

    Ok(())
}

fn exec_by_driver(
    queries: QueryMap,
) -> impl FnOnce(&Params) -> sqlbind::Result<Box<Exec>> + Send + Sync + 'static {
    move |params: &Params| {
        let stmt = params.prepare_by_driver(&queries)?;

        let exec: Box<Exec> = Box::new(move |args: &[Value]| -> sqlbind::Result<u64> {
            Ok(stmt.execute(args)?.rows_affected)
        });

        Ok(exec)
    }
}

#[derive(Debug)]
struct ByDriver {
    create: Op<ByDriver, Exec>,
}

impl Record<ByDriver> for ByDriver {
    fn shape(&mut self) -> Shape<'_, ByDriver> {
        Shape::Struct(vec![Field::op("create", &mut self.create)])
    }
}

#[test]
fn it_requires_a_statement_for_the_active_driver() -> anyhow::Result<()> {
    let missing = QueryMap::from([(DRIVER_POSTGRES, INSERT)]);
    let empty = QueryMap::from([(DRIVER_SQLITE3, ""), (DRIVER_POSTGRES, INSERT)]);

    for queries in [missing, empty] {
        let driver = MockDriver::new(DRIVER_SQLITE3);

        let err = Opener::new(ByDriver {
            create: Op::new(exec_by_driver(queries)),
        })
        .open(&driver, "mock://")
        .unwrap_err();

        match &err {
            Error::Prepare {
                index: 0,
                name: "create",
                source,
            } => assert!(
                matches!(
                    &**source,
                    Error::UnsupportedDriver { driver, what: "statement" } if driver == DRIVER_SQLITE3
                ),
                "{source:?}"
            ),
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(driver.count(&MockEvent::Prepare(INSERT.into())), 0);
        assert!(driver.is_connection_closed());
    }

    Ok(())
}

#[test]
fn it_prepares_the_statement_of_the_active_driver() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let (by_driver, cleanup) = Opener::new(ByDriver {
        create: Op::new(exec_by_driver(QueryMap::from([
            (DRIVER_SQLITE3, INSERT),
            (DRIVER_POSTGRES, DELETE),
        ]))),
    })
    .open(&driver, "mock://")?;

    assert_eq!(by_driver.create.get()(&[Value::from("alice")])?, 1);
    assert_eq!(driver.count(&MockEvent::Prepare(INSERT.into())), 1);
    assert_eq!(driver.count(&MockEvent::Prepare(DELETE.into())), 0);

    cleanup.call();

    Ok(())
}

struct Guarded {
    create: Op<Guarded, Exec>,
    cleanup: Option<Cleanup>,
    private: bool,
}

impl Record<Guarded> for Guarded {
    fn shape(&mut self) -> Shape<'_, Guarded> {
        let cleanup = Field::cleanup(&mut self.cleanup);

        Shape::Struct(vec![
            Field::op("create", &mut self.create),
            if self.private { cleanup.private() } else { cleanup },
        ])
    }
}

#[test]
fn it_leaves_a_private_cleanup_field_alone() -> anyhow::Result<()> {
    let driver = MockDriver::new(DRIVER_SQLITE3);

    let (guarded, cleanup) = Opener::new(Guarded {
        create: Op::new(exec(INSERT)),
        cleanup: None,
        private: true,
    })
    .open(&driver, "mock://")?;

    assert!(guarded.create.is_bound());
    assert!(guarded.cleanup.is_none());

    cleanup.call();

    Ok(())
}

#[test]
fn it_leaves_an_assigned_cleanup_field_alone() -> anyhow::Result<()> {
    let earlier = MockDriver::new(DRIVER_SQLITE3);
    let (_users, earlier_cleanup) = Opener::new(Users::new()).open(&earlier, "mock://earlier")?;

    let driver = MockDriver::new(DRIVER_SQLITE3);
    let (guarded, cleanup) = Opener::new(Guarded {
        create: Op::new(exec(INSERT)),
        cleanup: Some(earlier_cleanup.clone()),
        private: false,
    })
    .open(&driver, "mock://")?;

    cleanup.call();
    assert!(driver.is_connection_closed());

    // still the earlier session's release function
    let kept = guarded.cleanup.as_ref().expect("cleanup field kept");
    assert!(!kept.is_released());
    assert!(!earlier.is_connection_closed());

    earlier_cleanup.call();
    assert!(kept.is_released());

    Ok(())
}
