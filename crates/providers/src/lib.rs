pub mod gemini_live;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use gemini_live::GeminiLiveBackend;
pub use traits::{
    ClientTurn, FragmentReceiver, LiveBackend, LiveSession, LiveSessionConfig, SessionCallbacks,
};
pub use util::resolve_api_key;
