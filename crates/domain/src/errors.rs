//! 领域错误定义。

use thiserror::Error;

/// 领域层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入校验失败
    #[error("invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    /// 存活房间名已被占用
    #[error("a live room with this name already exists")]
    DuplicateRoomName,

    /// 房间内参与者名已被占用
    #[error("participant name already taken in this room")]
    DuplicateParticipantName,

    /// 房间不存在或已过期
    #[error("room not found")]
    RoomNotFound,

    /// 房间口令校验失败
    #[error("bad room credential")]
    BadCredential,

    /// 目标房间或参与者在本次调用前已被清除
    #[error("stale session: room or participant no longer exists")]
    StaleSession,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 领域层结果类型
pub type DomainResult<T> = Result<T, DomainError>;
