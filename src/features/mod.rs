/// 健康检查
pub mod health;
/// 照片修复中继
pub mod restore;
