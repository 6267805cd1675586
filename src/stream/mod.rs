//! Stream combinators

mod coalesce;

pub use coalesce::{Coalesce, CoalesceExt, Coalesced};
