//! Discovery and binding of operation slots.
//!
//! An aggregate describes its own fields by implementing [`Record`]. The binder walks
//! those fields in declaration order and prepares every eligible slot: a field of kind
//! operation, exported, and not yet bound. Everything else is skipped silently, so
//! helper fields and already populated slots can live next to bindable ones.
//!
//! ```rust,ignore
//! struct Db {
//!     get_users: Op<Db, GetUsers>,
//!     hits: u64,
//!     cleanup: Option<Cleanup>,
//! }
//!
//! impl Record<Db> for Db {
//!     fn shape(&mut self) -> Shape<'_, Db> {
//!         Shape::Struct(vec![
//!             Field::op("get_users", &mut self.get_users),
//!             Field::value("hits"),
//!             Field::cleanup(&mut self.cleanup),
//!         ])
//!     }
//! }
//! ```

mod op;

use std::any::type_name;

pub use op::{Op, Owner, Preparation, Slot};

use crate::cleanup::Cleanup;
use crate::error::{Error, Result};
use crate::params::Params;

/// Name of the field that receives the session's [`Cleanup`].
pub const CLEANUP_FIELD: &str = "cleanup";

/// A type whose fields can be bound by a session over aggregate `A`.
///
/// `A` is the primary aggregate handed to the opener. Extra records reachable from it
/// implement `Record<A>` as well, so their aggregate-aware slots see the same owner.
pub trait Record<A> {
    fn shape(&mut self) -> Shape<'_, A>;

    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// What a [`Record`] looks like to the binder.
pub enum Shape<'a, A> {
    /// A record with named fields, in declaration order.
    Struct(Vec<Field<'a, A>>),

    /// Anything that is not a record; binding it fails with [`Error::InvalidTargetKind`].
    Other,
}

/// One field of a [`Record`].
pub struct Field<'a, A> {
    name: &'static str,
    exported: bool,
    kind: FieldKind<'a, A>,
}

enum FieldKind<'a, A> {
    Op(&'a mut dyn Slot<A>),
    Cleanup(&'a mut Option<Cleanup>),
    Value,
}

impl<'a, A> Field<'a, A> {
    /// An operation slot.
    pub fn op(name: &'static str, slot: &'a mut dyn Slot<A>) -> Self {
        Self {
            name,
            exported: true,
            kind: FieldKind::Op(slot),
        }
    }

    /// The slot that receives the session's release function.
    pub fn cleanup(slot: &'a mut Option<Cleanup>) -> Self {
        Self {
            name: CLEANUP_FIELD,
            exported: true,
            kind: FieldKind::Cleanup(slot),
        }
    }

    /// A field that is not callable. The binder never touches it.
    pub fn value(name: &'static str) -> Self {
        Self {
            name,
            exported: true,
            kind: FieldKind::Value,
        }
    }

    /// Marks the field as not settable from outside the record.
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }
}

/// Binds operation slots against one session.
pub struct Binder<'p, A> {
    params: &'p Params,
    owner: Owner<A>,
}

impl<'p, A> Binder<'p, A> {
    pub(crate) fn new(params: &'p Params, owner: Owner<A>) -> Self {
        Self { params, owner }
    }

    /// Prepares every eligible slot of `record`, in declaration order.
    ///
    /// The first failure stops the pass and is reported with the zero-based index of
    /// the field.
    pub fn bind(&self, record: &mut dyn Record<A>) -> Result<()> {
        let type_name = record.type_name();

        for (index, field) in struct_fields(record, type_name)?.into_iter().enumerate() {
            let Field {
                name,
                exported,
                kind,
            } = field;

            let FieldKind::Op(slot) = kind else {
                tracing::trace!(target: "sqlbind::bind", record = type_name, field = name, "skipping non-callable field");
                continue;
            };

            if !exported || slot.is_set() {
                tracing::trace!(
                    target: "sqlbind::bind",
                    record = type_name,
                    field = name,
                    exported,
                    "skipping ineligible slot"
                );
                continue;
            }

            match slot.prepare(&self.owner, self.params) {
                Ok(true) => {
                    tracing::debug!(target: "sqlbind::bind", record = type_name, field = name, index, "bound operation slot");
                }

                Ok(false) => {
                    tracing::trace!(target: "sqlbind::bind", record = type_name, field = name, "slot has no preparation");
                }

                Err(source) => {
                    return Err(Error::Prepare {
                        index,
                        name,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(())
    }

    /// Installs `cleanup` into the record's cleanup field, if it has an unset, exported one.
    ///
    /// Returns whether the field was assigned.
    pub fn assign_cleanup(&self, record: &mut dyn Record<A>, cleanup: &Cleanup) -> Result<bool> {
        let type_name = record.type_name();

        for field in struct_fields(record, type_name)? {
            if field.name != CLEANUP_FIELD || !field.exported {
                continue;
            }

            if let FieldKind::Cleanup(slot) = field.kind {
                if slot.is_none() {
                    *slot = Some(cleanup.clone());
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}

fn struct_fields<'r, A>(
    record: &'r mut dyn Record<A>,
    type_name: &'static str,
) -> Result<Vec<Field<'r, A>>> {
    match record.shape() {
        Shape::Struct(fields) => Ok(fields),
        Shape::Other => Err(Error::InvalidTargetKind { type_name }),
    }
}
