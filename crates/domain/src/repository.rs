//! 仓储层错误定义。
//!
//! 所有仓储接口统一返回该错误类型，由应用层映射为对外语义。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// 记录不存在
    #[error("record not found")]
    NotFound,

    /// 唯一性约束冲突
    #[error("conflict: {0}")]
    Conflict(String),

    /// 底层存储错误，始终向上传播
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// 仓储层结果类型
pub type RepositoryResult<T> = Result<T, RepositoryError>;
