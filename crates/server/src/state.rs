use mcqgen_core::Config;

use crate::pipeline::Pipeline;

/// Immutable state shared by all handlers.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
}
