//! `notekit init`: scaffold `.notekit/` and the data repository.
//!
//! ```no_run
//! use nk_core::init::{generate_notekit_structure, InitOptions};
//!
//! # async fn example() -> Result<(), nk_core::init::InitError> {
//! let data_dir = generate_notekit_structure(InitOptions {
//!     minimal: true,
//!     ..InitOptions::default()
//! })
//! .await?;
//! println!("notes live in {}", data_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_notekit_structure, InitOptions};
pub use templates::{get_template, list_templates};
