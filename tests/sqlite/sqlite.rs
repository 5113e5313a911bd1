use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use sqlbind::sqlite::Sqlite;
use sqlbind::{
    bin_to_str, Cleanup, Error, Field, Op, Opener, Params, Query, QueryMap, Record, Shape, Tx,
    TxOp, Value, DRIVER_SQLITE3,
};
use sqlbind_test::database_url;

#[derive(Debug, Default, PartialEq)]
struct User {
    id: u64,
    name: String,
    data: Vec<u8>,
}

type AddUser = dyn Fn(Option<&Tx>, &str) -> sqlbind::Result<i64> + Send + Sync;
type GetUsers = dyn Fn() -> sqlbind::Result<Vec<User>> + Send + Sync;
type GetUser = dyn Fn(i64) -> sqlbind::Result<User> + Send + Sync;
type Work<'a> = dyn Fn(&Tx) -> sqlbind::Result<()> + 'a;
type Atomically = dyn Fn(&Work<'_>) -> sqlbind::Result<()> + Send + Sync;

struct Db {
    get_users: Op<Db, GetUsers>,
    get_user: Op<Db, GetUser>,
    atomically: Op<Db, Atomically>,
    private: Private,
    cleanup: Option<Cleanup>,
}

struct Private {
    add_user: Op<Db, AddUser>,
}

impl Record<Db> for Db {
    fn shape(&mut self) -> Shape<'_, Db> {
        Shape::Struct(vec![
            Field::op("get_users", &mut self.get_users),
            Field::op("get_user", &mut self.get_user),
            Field::op("atomically", &mut self.atomically),
            Field::value("private").private(),
            Field::cleanup(&mut self.cleanup),
        ])
    }
}

impl Record<Db> for Private {
    fn shape(&mut self) -> Shape<'_, Db> {
        Shape::Struct(vec![Field::op("add_user", &mut self.add_user)])
    }
}

fn private(db: &mut Db) -> &mut dyn Record<Db> {
    &mut db.private
}

fn add_user(params: &Params) -> sqlbind::Result<Box<AddUser>> {
    let stmt = params.prepare_by_driver(&QueryMap::from([(
        DRIVER_SQLITE3,
        "INSERT INTO user (name, data) VALUES (?, ?)",
    )]))?;
    let params = params.clone();

    Ok(Box::new(
        move |tx: Option<&Tx>, name: &str| -> sqlbind::Result<i64> {
            params.tx(tx).run(|tx| {
                let done = tx
                    .stmt(&stmt)
                    .execute(&[Value::from(name), Value::from(bin_to_str(b"test"))])?;

                Ok(done.last_insert_id.unwrap_or_default())
            })
        },
    ))
}

fn scan_user(row: &sqlbind::Row) -> sqlbind::Result<User> {
    let mut user = User::default();

    Query::new()
        .dest(&mut user.id)
        .dest(&mut user.name)
        .dest(&mut user.data)
        .scan(row)?;

    Ok(user)
}

fn get_users(params: &Params) -> sqlbind::Result<Box<GetUsers>> {
    let stmt = params.prepare("SELECT id, name, data FROM user ORDER BY id")?;

    Ok(Box::new(move || -> sqlbind::Result<Vec<User>> {
        stmt.fetch_all(&[])?.iter().map(scan_user).collect()
    }))
}

fn get_user(params: &Params) -> sqlbind::Result<Box<GetUser>> {
    let stmt = params.prepare("SELECT id, name, data FROM user WHERE id = ?")?;

    Ok(Box::new(move |id: i64| -> sqlbind::Result<User> {
        let mut user = User::default();

        Query::new()
            .bind(id)
            .dest(&mut user.id)
            .dest(&mut user.name)
            .dest(&mut user.data)
            .query_row(&stmt)?;

        Ok(user)
    }))
}

fn atomically(params: &Params) -> sqlbind::Result<Box<Atomically>> {
    let params = params.clone();

    Ok(Box::new(move |work: &Work<'_>| params.tx(None).run(work)))
}

fn open(url: &str) -> anyhow::Result<(Arc<Db>, Cleanup)> {
    let db = Db {
        get_users: Op::new(get_users),
        get_user: Op::new(get_user),
        atomically: Op::new(atomically),
        private: Private {
            add_user: Op::new(add_user),
        },
        cleanup: None,
    };

    let opened = Opener::new(db)
        .schema(QueryMap::from([(
            DRIVER_SQLITE3,
            "CREATE TABLE IF NOT EXISTS user (id INTEGER PRIMARY KEY, name TEXT, data TEXT);",
        )]))
        .record(private)
        .open(&Sqlite, url)?;

    Ok(opened)
}

#[test]
fn it_adds_and_lists_users() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;

    let id = db.private.add_user.get()(None, "test_user")?;
    assert_eq!(id, 1);

    let users = db.get_users.get()()?;
    assert_eq!(
        users,
        [User {
            id: 1,
            name: "test_user".into(),
            data: b"test".to_vec(),
        }]
    );

    assert_eq!(db.get_user.get()(1)?.name, "test_user");

    cleanup.call();

    Ok(())
}

#[test]
fn it_reports_missing_rows() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;

    let err = db.get_user.get()(42).unwrap_err();
    assert!(matches!(err, Error::RowNotFound), "{err:?}");

    cleanup.call();

    Ok(())
}

#[test]
fn it_shares_a_transaction_between_operations() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;
    let add_user = db.private.add_user.get();

    // the unit of work fails after both inserts, so neither row is kept
    let outcome = db.atomically.get()(&|tx: &Tx| -> sqlbind::Result<()> {
        add_user(Some(tx), "first")?;
        add_user(Some(tx), "second")?;
        Err(Error::RowNotFound)
    });

    assert!(matches!(outcome, Err(Error::RowNotFound)));
    assert!(db.get_users.get()()?.is_empty());

    db.atomically.get()(&|tx: &Tx| -> sqlbind::Result<()> {
        add_user(Some(tx), "first")?;
        add_user(Some(tx), "second")?;
        Ok(())
    })?;

    assert_eq!(db.get_users.get()()?.len(), 2);

    cleanup.call();

    Ok(())
}

#[test]
fn it_fails_after_cleanup() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;

    cleanup.call();
    cleanup.call();

    let err = db.get_users.get()().unwrap_err();
    assert!(matches!(err, Error::Closed(_)), "{err:?}");

    // the transaction can no longer begin on the closed connection
    let err = db.private.add_user.get()(None, "late").unwrap_err();
    assert!(
        matches!(err, Error::Transaction { op: TxOp::Begin, .. }),
        "{err:?}"
    );

    Ok(())
}

#[test]
fn it_opens_a_shared_memory_uri() -> anyhow::Result<()> {
    sqlbind_test::setup_if_needed();

    let (db, cleanup) = open("file:sqlbind_uri_test?mode=memory&cache=shared")?;

    db.private.add_user.get()(None, "uri_user")?;
    assert_eq!(db.get_users.get()()?.len(), 1);

    cleanup.call();

    Ok(())
}

#[test]
fn it_waits_for_a_transaction_held_by_another_thread() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;
    let add_user = db.private.add_user.get();
    let begun = Barrier::new(2);

    thread::scope(|s| -> anyhow::Result<()> {
        let holder = s.spawn(|| {
            db.atomically.get()(&|tx: &Tx| -> sqlbind::Result<()> {
                add_user(Some(tx), "rolled back")?;
                begun.wait();
                thread::sleep(Duration::from_millis(100));
                Err(Error::RowNotFound)
            })
        });

        begun.wait();

        // runs in its own transaction once the other one is rolled back
        add_user(None, "kept")?;

        let outcome = holder.join().expect("transaction thread panicked");
        assert!(matches!(outcome, Err(Error::RowNotFound)), "{outcome:?}");

        Ok(())
    })?;

    let users = db.get_users.get()()?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "kept");

    cleanup.call();

    Ok(())
}

#[test]
fn it_keeps_other_threads_out_of_an_open_transaction() -> anyhow::Result<()> {
    let (db, cleanup) = open(&database_url())?;
    let add_user = db.private.add_user.get();
    let begun = Barrier::new(2);

    thread::scope(|s| -> anyhow::Result<()> {
        let holder = s.spawn(|| {
            db.atomically.get()(&|tx: &Tx| -> sqlbind::Result<()> {
                add_user(Some(tx), "uncommitted")?;
                begun.wait();
                thread::sleep(Duration::from_millis(100));
                Err(Error::RowNotFound)
            })
        });

        begun.wait();

        // a plain statement never sees the uncommitted row
        assert!(db.get_users.get()()?.is_empty());

        let outcome = holder.join().expect("transaction thread panicked");
        assert!(matches!(outcome, Err(Error::RowNotFound)), "{outcome:?}");

        Ok(())
    })?;

    cleanup.call();

    Ok(())
}
