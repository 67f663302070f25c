//! Tool dispatch.
//!
//! Everything between a model's tool call and the text that goes back into
//! the conversation: the merged catalog, the router that picks a session,
//! the wrapper argument transforms, result normalization and rendering.

mod catalog;
mod render;
mod result;
mod router;
mod wrappers;

pub use catalog::{LocalTool, ToolCatalog, ToolDescriptor, ToolRoute, ToolSpec, LOCAL_TOOLS, PASSTHROUGH_TOOL};
pub use render::render;
pub use result::ToolResult;
pub use router::{DispatchRouter, PendingCall, RoutedResult};
pub use wrappers::{
    filter_stage_paths, is_stageable, normalize, resolve_under, transform, WorkspaceRoots, WrapperError, WrapperFamily,
    WrapperKind,
};
