// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Operation trees - a normalized, typed view of bound code.
//!
//! Every bound construct maps to exactly one `Operation`. Implicit
//! conversions and defaults appear as explicit nodes flagged implicit, and
//! constants are folded where the operands allow it.

pub mod builder;
pub mod display;
pub mod fold;
pub mod operation;
pub mod pattern;

pub use builder::{binary_operator_kind, negate, unary_operator_kind, OperationTreeBuilder};
pub use display::render_indented;
pub use operation::{
    BinaryOperatorKind, BranchKind, CaptureId, CaseClauseKind, Descendants, LoopKind, Operation,
    OperationFlags, OperationKind, UnaryOperatorKind,
};
pub use pattern::{BinaryPatternOp, PatternDecision, PatternDecisionBuilder, PatternInfo, PatternKind};
