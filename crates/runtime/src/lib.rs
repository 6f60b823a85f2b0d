//! `ta-runtime`: drives persona turns against a live backend.
//!
//! [`runtime::TurnOrchestrator`] is the entry point: it turns a
//! [`TurnRequest`](ta_domain::persona::TurnRequest) into one streaming
//! session and folds the fragments it receives into a single
//! [`TurnResult`](ta_domain::stream::TurnResult).  The `talkagent` binary
//! in [`cli`] is the caller that keeps history and shows fallback replies.

pub mod audio;
pub mod cli;
pub mod runtime;
