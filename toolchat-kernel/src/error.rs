//! Kernel error types.

use thiserror::Error;
use toolchat_primitives::ErrorCategory;

use crate::plan::ToolKind;

/// Problems found while turning an [`ActionPlan`](crate::ActionPlan) into an
/// [`Action`](crate::Action).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A required field is absent or empty.
    #[error("missing required argument `{field}` for `{tool}`")]
    MissingArgument {
        /// Plan identifier.
        tool: ToolKind,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A field is present but unusable.
    #[error("invalid argument `{field}` for `{tool}`: {reason}")]
    InvalidArgument {
        /// Plan identifier.
        tool: ToolKind,
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// `bootstrap-repo` was given something other than a directory name.
    #[error("cannot bootstrap repository `{name}`: {reason}")]
    InvalidRepositoryName {
        /// Name as typed.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl DispatchError {
    /// Argument problems are never retried.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Argument
    }

    /// Name of the field at fault.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingArgument { field, .. } | Self::InvalidArgument { field, .. } => field,
            Self::InvalidRepositoryName { .. } => "name",
        }
    }
}

/// Why a planner reply could not be used as a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// No balanced `{...}` span was found.
    #[error("reply contains no JSON object")]
    NoObject,

    /// A span was found but is not a plan.
    #[error("malformed plan: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },

    /// The plan names a tool outside the supported set.
    #[error("unsupported tool `{tool}`")]
    UnknownTool {
        /// Identifier found in the reply.
        tool: String,
    },
}

impl PlanError {
    /// Planner failures are parse failures.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Parse
    }
}
