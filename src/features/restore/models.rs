use serde::{Deserialize, Serialize};

/// 修复成功响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RestoreResponse {
    /// 恒为 true
    #[schema(example = true)]
    pub success: bool,
    /// 修复后图片的 Base64 编码（标准字母表，带填充）
    pub image: String,
}

/// 失败响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// 恒为 false
    #[schema(example = false)]
    pub success: bool,
    /// 面向调用方的错误文案
    #[schema(example = "No file part")]
    pub error: String,
}

/// `POST /restore` 的 multipart 表单（仅用于 OpenAPI 文档）
#[derive(Debug, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct RestoreUpload {
    /// 待修复的图片文件
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
