//! Conversation routing: decide who answers each inbound record.
//!
//! Per batch:
//! 1. Reactivation sweep (opportunistic, once per webhook call)
//! 2. Normalize and filter the envelope
//! 3. Per record, under the thread's lock:
//!    - echoes: own reply, human takeover, or unrecognized
//!    - messages: skip if a human holds the thread, else classify and
//!      either hand off or forward to the AI backend

pub mod dispatch;
pub mod echo;
pub mod error;
pub mod locks;
pub mod pipeline;
pub mod queue;

pub use {
    dispatch::{AI_FAILURE_REASON, AiDispatcher, DispatchOutcome},
    echo::{BotEchoFlags, EchoAction, classify_echo},
    error::{Error, Result},
    locks::{ThreadGuard, ThreadLocks},
    pipeline::{
        BatchReport, FRUSTRATED_REASON, NEED_HUMAN_REASON, Pipeline, PipelineDeps, RecordOutcome,
    },
    queue::BatchQueue,
};
