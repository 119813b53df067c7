pub mod accessor;
pub mod api;
pub mod bundler;
pub mod config;
pub mod error;
pub mod expander;
pub mod format;
pub mod pointer;
pub mod resolver;
pub mod separator;
pub mod stacked;
pub mod utils;
pub mod value;

pub use api::{bundle_file, bundle_value, expand_file, expand_value, separate_file, Output};
pub use config::{BundleOptions, ConflictPolicy, SectionRules, SeparateOptions};
pub use error::{AccessError, RefError};
pub use resolver::{FileIdentity, GlobalRef, Resolver};
pub use value::Value;
