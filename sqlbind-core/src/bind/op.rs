use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::{Arc, Weak};

use crate::error::{Error, Result};
use crate::params::Params;

/// A weak handle to the aggregate being bound.
///
/// Handed to aggregate-aware descriptors so the callables they build can reach sibling
/// operations. It upgrades once the session is open; during binding the aggregate is
/// still under construction and [`upgrade`](Self::upgrade) returns `None`.
pub struct Owner<A>(Weak<A>);

impl<A> Owner<A> {
    pub(crate) fn new(aggregate: Weak<A>) -> Self {
        Self(aggregate)
    }

    pub fn upgrade(&self) -> Option<Arc<A>> {
        self.0.upgrade()
    }

    /// Like [`upgrade`](Self::upgrade), but fails with [`Error::Closed`] when the
    /// aggregate is gone.
    pub fn get(&self) -> Result<Arc<A>> {
        self.upgrade().ok_or(Error::Closed("aggregate"))
    }
}

impl<A> Clone for Owner<A> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<A> Debug for Owner<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owner").field(&self.0.strong_count()).finish()
    }
}

/// Knows how to compile itself into the callable of an operation slot.
pub enum Preparation<A, F: ?Sized> {
    /// Needs only the session context.
    SelfContained(Box<dyn FnOnce(&Params) -> Result<Box<F>> + Send + Sync>),

    /// Also receives the owning aggregate, for callables that use sibling operations.
    #[allow(clippy::type_complexity)]
    AggregateAware(Box<dyn FnOnce(&Owner<A>, &Params) -> Result<Box<F>> + Send + Sync>),
}

impl<A, F: ?Sized> Preparation<A, F> {
    fn kind(&self) -> &'static str {
        match self {
            Preparation::SelfContained(_) => "self-contained",
            Preparation::AggregateAware(_) => "aggregate-aware",
        }
    }
}

enum State<A, F: ?Sized> {
    Empty,
    Pending(Preparation<A, F>),
    Bound(Box<F>),
}

/// An operation slot: a field the session fills with a ready-to-call database operation.
///
/// `F` is the callable, typically `dyn Fn(..) -> Result<..> + Send + Sync`.
///
/// ```rust,ignore
/// type GetUsers = dyn Fn() -> sqlbind::Result<Vec<User>> + Send + Sync;
///
/// fn get_users(params: &Params) -> sqlbind::Result<Box<GetUsers>> {
///     let stmt = params.prepare("SELECT id, name, data FROM user")?;
///     Ok(Box::new(move || { /* .. */ }))
/// }
///
/// let slot: Op<Db, GetUsers> = Op::new(get_users);
/// ```
pub struct Op<A, F: ?Sized> {
    state: State<A, F>,
}

impl<A, F: ?Sized> Op<A, F> {
    /// A slot prepared from the session context alone.
    pub fn new<P>(prepare: P) -> Self
    where
        P: FnOnce(&Params) -> Result<Box<F>> + Send + Sync + 'static,
    {
        Self::from_preparation(Preparation::SelfContained(Box::new(prepare)))
    }

    /// A slot whose preparation also receives the owning aggregate.
    pub fn with_owner<P>(prepare: P) -> Self
    where
        P: FnOnce(&Owner<A>, &Params) -> Result<Box<F>> + Send + Sync + 'static,
    {
        Self::from_preparation(Preparation::AggregateAware(Box::new(prepare)))
    }

    pub fn from_preparation(preparation: Preparation<A, F>) -> Self {
        Self {
            state: State::Pending(preparation),
        }
    }

    /// A slot that already holds its callable; binding leaves it alone.
    pub fn bound(callable: Box<F>) -> Self {
        Self {
            state: State::Bound(callable),
        }
    }

    /// A slot without a descriptor; binding leaves it alone.
    pub fn empty() -> Self {
        Self { state: State::Empty }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, State::Bound(_))
    }

    /// Returns the bound callable.
    ///
    /// # Panics
    /// If the slot was never bound. See [`try_get`](Self::try_get) for a non-panicking version.
    #[track_caller]
    pub fn get(&self) -> &F {
        match self.try_get() {
            Ok(callable) => callable,
            Err(error) => panic!("{error}"),
        }
    }

    pub fn try_get(&self) -> Result<&F> {
        match &self.state {
            State::Bound(callable) => Ok(&**callable),
            _ => Err(Error::Unbound),
        }
    }
}

impl<A, F: ?Sized> Default for Op<A, F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A, F: ?Sized> Debug for Op<A, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Empty => "empty",
            State::Pending(preparation) => preparation.kind(),
            State::Bound(_) => "bound",
        };

        f.debug_tuple("Op").field(&state).finish()
    }
}

/// A field the binder can fill.
///
/// Implemented by [`Op`]; implement it for custom slot types.
pub trait Slot<A> {
    /// `true` if the slot already holds its callable.
    fn is_set(&self) -> bool;

    /// Runs the slot's descriptor and installs the result.
    ///
    /// Returns `Ok(false)` when there was nothing to prepare.
    fn prepare(&mut self, owner: &Owner<A>, params: &Params) -> Result<bool>;
}

impl<A, F: ?Sized> Slot<A> for Op<A, F> {
    fn is_set(&self) -> bool {
        self.is_bound()
    }

    fn prepare(&mut self, owner: &Owner<A>, params: &Params) -> Result<bool> {
        let callable = match mem::replace(&mut self.state, State::Empty) {
            State::Pending(Preparation::SelfContained(prepare)) => prepare(params)?,
            State::Pending(Preparation::AggregateAware(prepare)) => prepare(owner, params)?,
            state => {
                self.state = state;
                return Ok(false);
            }
        };

        self.state = State::Bound(callable);

        Ok(true)
    }
}
