//! Orchestrator for compiling and rendering an environment
//!
//! Coordinates the phases behind the two operations callers need:
//! [`compile`] (phases 1-2) and [`render`] (phases 3-4).

use std::path::PathBuf;

use super::write::{self, RoleDownloader};
use super::{compilation, expansion, layout, CompiledModel};
use crate::config::RenderOptions;
use crate::context::CompileContext;
use crate::error::Result;
use crate::filesystem::MemoryFS;
use crate::frkl::Document;

/// Compiles configuration sources (paths, URLs or abbreviations).
///
/// 1. Expand the sources into the inventory and task list requests
/// 2. Compile every request
pub fn compile(ctx: &mut CompileContext, sources: &[String]) -> Result<CompiledModel> {
    let expansion = expansion::execute(ctx, sources)?;
    let environments = compilation::execute(ctx, &expansion.requests)?;
    Ok(CompiledModel {
        inventory: expansion.inventory,
        environments,
    })
}

/// Compiles documents that are already parsed.
pub fn compile_documents(
    ctx: &mut CompileContext,
    documents: Vec<Document>,
) -> Result<CompiledModel> {
    let expansion = expansion::execute_documents(ctx, documents)?;
    let environments = compilation::execute(ctx, &expansion.requests)?;
    Ok(CompiledModel {
        inventory: expansion.inventory,
        environments,
    })
}

/// Lays the model out without writing it.
pub fn stage(model: &CompiledModel, options: &RenderOptions) -> Result<MemoryFS> {
    layout::execute(model, options)
}

/// Renders the model into `options.target` and returns the directory
/// written (which carries the timestamp suffix, if requested).
///
/// 1. Lay the environment out in memory
/// 2. Write it to disk and install external roles
pub fn render(
    model: &CompiledModel,
    options: &RenderOptions,
    downloader: &dyn RoleDownloader,
) -> Result<PathBuf> {
    let staged = layout::execute(model, options)?;
    write::execute(&staged, options, downloader)
}
