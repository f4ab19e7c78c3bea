//! iSJTU Client Library
//!
//! This library provides an async client for the iSJTU educational
//! administration portal, covering the JAccount captcha login flow,
//! transparent session renewal, and the portal's query endpoints.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`session`] - Authenticated HTTP session with cookie persistence
//! - [`client`] - One method per portal function (schedule, scores, ...)
//! - [`query`] - Lazy paginated query cache
//! - [`results`] - Typed record collections with in-memory filtering
//! - [`models`] - Typed portal records and their display-string parsers
//! - [`recognizer`] - Pluggable captcha recognition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use isjtu::{Client, Session};
//!
//! # async fn example() -> isjtu::Result<()> {
//! let session = Arc::new(Session::new()?);
//! session.login("student", "password").await?;
//!
//! let client = Client::new(session);
//! let schedule = client.schedule(2023, 0).await?;
//! for course in &schedule {
//!     println!("{} on day {}", course.name, course.day);
//! }
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod consts;
pub mod error;
pub mod lazy;
pub mod models;
pub mod parse;
pub mod query;
pub mod recognizer;
pub mod results;
pub mod session;

// Re-export commonly used types
pub use client::{Client, CourseFilter, SelectionClass, SelectionSector};
pub use error::{Error, Result};
pub use lazy::Deferred;
pub use models::{
    Exam, Gender, Gpa, GpaQueryParams, LibCourse, Profile, ScheduleCourse, Score, ScoreFactor,
};
pub use query::{Page, PageFetcher, QueryResult};
pub use recognizer::{JcssRecognizer, Recognizer};
pub use results::{FilterValue, Filterable, Results};
pub use session::{RequestOptions, Session, SessionBuilder, SessionData, StoredCookie};
