//! Sqlforge – parameterized SQL statements, nested criteria, and typed rows.
//!
//! Sqlforge turns fluent query construction into SQL text in which every
//! user supplied value travels as a bound parameter, executes it through a
//! small driver abstraction, and maps result rows back onto Rust values.
//!
//! ## Modules
//! * [`statement`] – The [`statement::StatementBuilder`] and the immutable
//!   [`statement::CompiledStatement`] it builds.
//! * [`params`] – Named and generated parameters, see [`params::ParameterSet`].
//! * [`criteria`] – Field predicates and a compiler for nested AND/OR groups.
//! * [`paging`] – Row-number windows around an inner select.
//! * [`hydrate`] – Member maps cached per type, lenient coercion, and the
//!   [`hydrate::Hydrator`] that fills values from rows.
//! * [`driver`] – The connection boundary and its SQLite implementation.
//! * [`session`] – Blocking and cancellable non-blocking execution.
//! * [`config`] – Settings from file and environment, and tracing setup.
//!
//! ## Hydration
//! Rust has no runtime reflection, so a type takes part in hydration by
//! implementing [`hydrate::Hydrate`] and listing its members with their
//! setters. The list is built once per type and shared through the
//! [`hydrate::FieldCache`]. Columns are matched to members by name, ignoring
//! case; values that cannot be coerced leave the member at its default.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use sqlforge::criteria::Criteria;
//! use sqlforge::driver::SqliteDriver;
//! use sqlforge::hydrate::{Hydrate, MemberMap};
//! use sqlforge::session::Session;
//! use sqlforge::statement::{SortOrder, StatementBuilder};
//!
//! #[derive(Default)]
//! struct Person {
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! impl Hydrate for Person {
//!     fn describe(map: &mut MemberMap<Self>) {
//!         map.field("Name", |p, v| p.name = v).field("Age", |p, v| p.age = v);
//!     }
//! }
//!
//! let session = Session::new(Arc::new(SqliteDriver::in_memory().unwrap()));
//! let mut ddl = StatementBuilder::new();
//! ddl.append("CREATE TABLE Person (Name TEXT, Age INTEGER)");
//! session.execute_non_query(ddl.build()).unwrap();
//!
//! let mut insert = StatementBuilder::new();
//! insert.append("INSERT INTO Person (Name, Age) VALUES ('Alice', 34), ('Bob', NULL)");
//! session.execute_non_query(insert.build()).unwrap();
//!
//! let mut criteria = Criteria::new();
//! criteria.begin_group().starts_with("Name", "Al").or().is_null("Age").end_group();
//! let mut query = StatementBuilder::new();
//! query.select(&["Name", "Age"]).from("Person").append("WHERE");
//! criteria.compile(&mut query);
//! query.order_by("Name", SortOrder::Ascending);
//!
//! let people: Vec<Person> = session.query_many(query.build()).unwrap();
//! assert_eq!(people.len(), 2);
//! assert_eq!(people[0].age, Some(34));
//! assert_eq!(people[1].age, None);
//! ```
//!
//! ## License
//! Dual licensed under Apache-2.0 and MIT.

pub mod cancel;
pub mod config;
pub mod criteria;
pub mod driver;
pub mod error;
pub mod hydrate;
pub mod paging;
pub mod params;
pub mod prefix;
pub mod session;
pub mod statement;
pub mod value;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use session::{QueryOptions, Session};
pub use statement::{CompiledStatement, StatementBuilder};
pub use value::{Kind, Value};
