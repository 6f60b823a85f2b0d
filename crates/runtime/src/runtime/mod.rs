pub mod prompt;
pub mod turn;

pub use prompt::build_prompt;
pub use turn::{TurnOrchestrator, TurnSettings};
