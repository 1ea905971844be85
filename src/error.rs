use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::features::restore::models::ErrorResponse;

/// 对外统一的内部错误提示（不泄露任何内部细节）
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal server error occurred. Please try again later.";

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 请求中不存在名为 `file` 的文件字段
    #[error("No file part")]
    NoFilePart,

    /// 文件字段的文件名为空
    #[error("No selected file")]
    NoSelectedFile,

    /// 远端返回的结果路径为空或文件不存在
    #[error("Failed to retrieve the restored image")]
    RestoredImageMissing,

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 远端修复服务错误
    #[error("修复服务错误: {0}")]
    Restore(#[from] RestoreError),
}

/// 远端修复服务错误类型
#[derive(Error, Debug)]
pub enum RestoreError {
    /// 客户端在启动时未能初始化
    #[error("修复服务客户端不可用")]
    Unavailable,

    /// 客户端配置无效
    #[error("配置无效: {0}")]
    InvalidConfig(String),

    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 远端在结果流中报告了错误
    #[error("远端报告错误: {0}")]
    Upstream(String),

    /// 无效的响应
    #[error("无效的响应: {0}")]
    InvalidResponse(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(String),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    Json(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoFilePart | AppError::NoSelectedFile => StatusCode::BAD_REQUEST,
            AppError::RestoredImageMissing | AppError::Internal(_) | AppError::Restore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回给调用方的错误文案
    ///
    /// 仅客户端输入错误与结果缺失使用具体文案，其余一律使用固定提示。
    pub fn public_message(&self) -> String {
        match self {
            AppError::NoFilePart | AppError::NoSelectedFile | AppError::RestoredImageMissing => {
                self.to_string()
            }
            AppError::Internal(_) | AppError::Restore(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for RestoreError {
    fn from(err: reqwest::Error) -> Self {
        RestoreError::Network(err.to_string())
    }
}

impl From<std::io::Error> for RestoreError {
    fn from(err: std::io::Error) -> Self {
        RestoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RestoreError {
    fn from(err: serde_json::Error) -> Self {
        RestoreError::Json(err.to_string())
    }
}
