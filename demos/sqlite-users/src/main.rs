use std::env;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Serialize, Serializer};
use sqlbind::sqlite::Sqlite;
use sqlbind::{
    bin_to_str, Cleanup, Field, Op, Opener, Params, Query, QueryMap, Record, Row, Shape, Tx,
    Value, DRIVER_SQLITE3,
};

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    Add { name: String },
    List,
}

#[derive(Debug, Default, Serialize)]
struct User {
    id: u64,
    name: String,
    #[serde(serialize_with = "as_base64")]
    data: Vec<u8>,
}

fn as_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&bin_to_str(data))
}

type AddUser = dyn Fn(Option<&Tx>, &str) -> sqlbind::Result<()> + Send + Sync;
type GetUsers = dyn Fn() -> sqlbind::Result<Vec<User>> + Send + Sync;

struct Db {
    get_users: Op<Db, GetUsers>,
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

fn add_user(params: &Params) -> sqlbind::Result<Box<AddUser>> {
    let stmt = params.prepare_by_driver(&QueryMap::from([(
        DRIVER_SQLITE3,
        "INSERT INTO user (name, data) VALUES (?, ?)",
    )]))?;
    let params = params.clone();

    Ok(Box::new(
        move |tx: Option<&Tx>, name: &str| -> sqlbind::Result<()> {
            params.tx(tx).run(|tx| {
                tx.stmt(&stmt)
                    .execute(&[Value::from(name), Value::from(bin_to_str(b"test"))])?;
                Ok(())
            })
        },
    ))
}

fn get_users(params: &Params) -> sqlbind::Result<Box<GetUsers>> {
    let stmt = params.prepare("SELECT id, name, data FROM user")?;

    Ok(Box::new(move || -> sqlbind::Result<Vec<User>> {
        stmt.fetch_all(&[])?.iter().map(scan_user).collect()
    }))
}

fn scan_user(row: &Row) -> sqlbind::Result<User> {
    let mut user = User::default();

    Query::new()
        .dest(&mut user.id)
        .dest(&mut user.name)
        .dest(&mut user.data)
        .scan(row)?;

    Ok(user)
}

fn private(db: &mut Db) -> &mut dyn Record<Db> {
    &mut db.private
}

fn open(url: &str) -> sqlbind::Result<(Arc<Db>, Cleanup)> {
    let db = Db {
        get_users: Op::new(get_users),
        private: Private {
            add_user: Op::new(add_user),
        },
        cleanup: None,
    };

    Opener::new(db)
        .schema(QueryMap::from([(
            DRIVER_SQLITE3,
            "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT,
                data TEXT
            );",
        )]))
        .record(private)
        .open(&Sqlite, url)
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();
    let url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| String::from("file::memory:?mode=memory&cache=shared"));

    let (db, cleanup) = open(&url)?;

    match args.cmd {
        Some(Command::Add { name }) => {
            println!("Adding new user '{name}'");
            db.private.add_user.get()(None, &name)?;
        }
        Some(Command::List) => {}
        None => {
            db.private.add_user.get()(None, "test_user")?;
        }
    }

    let users = db.get_users.get()()?;
    println!("{}", serde_json::to_string(&users)?);

    cleanup.call();

    Ok(())
}
