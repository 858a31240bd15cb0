//! The call machine as seen by the loader

use callframe_channel_core::CallFrameId;

use crate::context::LoaderContext;

/// Process-side hooks into the call machine
///
/// `execute` is the dynamic-loading primitive used by the fetch-execute
/// strategy: it links and runs downloaded bundle code, which sets up
/// process-wide state. It runs at most once per successful load.
pub trait CallMachineRuntime: Send + Sync {
    /// Run freshly downloaded bundle code
    fn execute(&self, code: &str, context: &LoaderContext) -> Result<(), String>;

    /// Point an already-running call machine at a new call frame
    fn setup_call_frame(&self, call_frame_id: &CallFrameId);
}
