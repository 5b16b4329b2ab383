//! Turn runtime: the conversation graph and its nodes, streaming, per-thread
//! serialization and cancellation.
//!
//! Entry point: [`run_turn`] takes a thread id and user message and returns
//! a stream of [`TurnEvent`]s suitable for SSE or non-streaming aggregation.

pub mod actions;
pub mod cancel;
pub mod graph;
pub mod intent;
pub mod nodes;
pub mod router;
pub mod session_lock;
pub mod sink;
pub mod turn;

pub use graph::{Graph, NodeId, Route, StateUpdate, TurnContext, TurnOutcome};
pub use turn::{collect, failure_message, run_turn, TurnEvent, TurnInput};
