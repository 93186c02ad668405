//! Dynamic query engine: parameterized templates, parameter validation,
//! placeholder substitution and execution statistics.

pub mod error;
pub mod recorder;
pub mod substitute;
pub mod template;
pub mod types;
pub mod validator;
pub mod value;

pub use error::{CoercionError, QueryError};
pub use recorder::{next_average, record_execution};
pub use substitute::{placeholders, substitute, unresolved_placeholders};
pub use template::NewQueryTemplate;
pub use types::*;
pub use validator::validate;
pub use value::{ObjectId, ParamValue};
