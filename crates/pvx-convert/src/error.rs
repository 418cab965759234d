use pvx_core::connector::SubfieldError;
use pvx_core::types::TypeParseError;
use pvx_protocol::block::BlockError;
use pvx_protocol::task_id::TaskIdError;

/// Errors raised while translating a fragment. Every error aborts the current
/// translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),
    #[error("Unsupported connector: {0}")]
    UnsupportedConnector(String),
    #[error("Table {0} must have filter pushdown enabled")]
    FilterPushdownRequired(String),
    #[error("Unsupported plan node: {0}")]
    UnsupportedPlanNode(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A coordinator invariant does not hold.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// True for errors caused by the query or the plan, false for internal failures.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ConvertError::Internal(_))
    }
}

impl From<TypeParseError> for ConvertError {
    fn from(err: TypeParseError) -> Self {
        ConvertError::UnsupportedType(err.to_string())
    }
}

impl From<BlockError> for ConvertError {
    fn from(err: BlockError) -> Self {
        ConvertError::InvalidInput(err.to_string())
    }
}

impl From<SubfieldError> for ConvertError {
    fn from(err: SubfieldError) -> Self {
        ConvertError::InvalidInput(err.to_string())
    }
}

impl From<TaskIdError> for ConvertError {
    fn from(err: TaskIdError) -> Self {
        ConvertError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
