// handlers/protected/queries/mod.rs - Query template endpoints

use serde::Deserialize;
use serde_json::{Map, Value};

pub mod create;   // POST /api/queries
pub mod delete;   // DELETE /api/queries/:name
pub mod execute;  // POST /api/queries/execute
pub mod list;     // GET /api/queries
pub mod render;   // POST /api/queries/:name/render
pub mod restore;  // POST /api/queries/:name/restore
pub mod show;     // GET /api/queries/:name
pub mod update;   // PUT /api/queries/:name
pub mod validate; // POST /api/queries/:name/validate

pub use create::query_create;
pub use delete::query_delete;
pub use execute::query_execute;
pub use list::query_list;
pub use render::query_render;
pub use restore::query_restore;
pub use show::query_show;
pub use update::query_update;
pub use validate::query_validate;

/// Body of the validate and render endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ParametersBody {
    #[serde(default)]
    pub parameters: Map<String, Value>,
}
