//! Phase 2: Compilation
//!
//! Compiles the task list request of every environment. A failing
//! environment does not stop its siblings: every failure is logged and the
//! first one is returned once all environments have been tried.

use log::{error, info};

use super::CompiledEnvironment;
use crate::context::CompileContext;
use crate::error::{Error, Result};
use crate::inventory::TaskListRequest;
use crate::tasklist::TasklistCompiler;

/// Compiles `requests` in order.
pub fn execute(
    ctx: &mut CompileContext,
    requests: &[TaskListRequest],
) -> Result<Vec<CompiledEnvironment>> {
    info!("Compiling {} task list(s)", requests.len());
    let mut compiled = Vec::with_capacity(requests.len());
    let mut first_error: Option<Error> = None;

    for request in requests {
        let result = TasklistCompiler::new(ctx).compile_request(request);
        match result {
            Ok(tasklist) => compiled.push(CompiledEnvironment {
                name: request.env_name.clone(),
                kind: request.env_kind,
                id: request.env_id,
                tasklist,
            }),
            Err(e) => {
                error!("Failed to compile tasks of '{}': {}", request.env_name, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(compiled),
    }
}
