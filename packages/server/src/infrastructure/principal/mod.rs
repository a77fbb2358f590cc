//! PrincipalResolver の実装

pub mod static_table;

pub use static_table::{PrincipalTableError, StaticPrincipalResolver};
