//! Wire protocol between the master and its workers.
//!
//! Each worker owns two pipes: the master writes [`Problem`] frames to the
//! worker's stdin, and the worker writes [`Answer`] frames to its stdout.
//! Both directions use the same framing: a fixed header that starts with the
//! total frame size, followed by the raw payload.

pub mod codec;
pub mod message;

pub use codec::{DEFAULT_MAX_FRAME_BYTES, Frame, encode, read_frame, write_frame};
pub use message::{ANSWER_HEADER_LEN, Answer, PROBLEM_HEADER_LEN, Problem, ProblemKind};
