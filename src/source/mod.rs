//! The two issue sources. Both produce the same normalized [`Issue`](crate::issue::Issue)
//! list, so everything downstream is source-agnostic.

pub(crate) mod export;
pub(crate) mod rest;
