use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tokio::fs::File;

/// 扩展名的最大长度（超出则视为不可信，直接丢弃）
const MAX_EXTENSION_LEN: usize = 8;

/// 单个请求的临时文件暂存区。
///
/// 文件名由 `tempfile` 随机生成并以 `create_new` 打开，并发请求之间不会互相覆盖；
/// 返回的 `TempPath` 在离开作用域时删除文件。
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 确保暂存目录存在
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// 创建一个新的上传暂存文件，返回其清理守卫与可写句柄
    pub async fn create_upload(&self, extension: Option<&str>) -> io::Result<(TempPath, File)> {
        self.create("upload_", extension).await
    }

    /// 创建一个新的结果文件，返回其清理守卫与可写句柄
    pub async fn create_result(&self, extension: Option<&str>) -> io::Result<(TempPath, File)> {
        self.create("result_", extension).await
    }

    async fn create(&self, prefix: &str, extension: Option<&str>) -> io::Result<(TempPath, File)> {
        self.ensure_dir().await?;
        let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let named = Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        let (file, path) = named.into_parts();
        Ok((path, File::from_std(file)))
    }
}

/// 接管服务返回的结果文件：守卫释放时删除，文件不存在也不报错
pub fn adopt_result(path: impl Into<PathBuf>) -> TempPath {
    TempPath::from_path(path)
}

/// 从客户端文件名中提取安全的扩展名（1-8 个 ASCII 字母数字，转小写）
pub fn sanitize_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{StagingArea, adopt_result, sanitize_extension};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn sanitize_extension_accepts_plain_suffix() {
        assert_eq!(sanitize_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(sanitize_extension("a.b.webp").as_deref(), Some("webp"));
    }

    #[test]
    fn sanitize_extension_rejects_unsafe_suffix() {
        assert_eq!(sanitize_extension("noext"), None);
        assert_eq!(sanitize_extension("trailing."), None);
        assert_eq!(sanitize_extension("x.p/ng"), None);
        assert_eq!(sanitize_extension("x.averyverylongext"), None);
    }

    #[tokio::test]
    async fn upload_guard_removes_file_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path().join("nested"));

        let (guard, mut file) = staging.create_upload(Some("png")).await.expect("create");
        file.write_all(b"data").await.expect("write");
        file.flush().await.expect("flush");
        drop(file);

        let path = guard.to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
        assert!(name.starts_with("upload_"));

        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn uploads_get_distinct_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let (a, _fa) = staging.create_upload(None).await.expect("create a");
        let (b, _fb) = staging.create_upload(None).await.expect("create b");
        assert_ne!(a.to_path_buf(), b.to_path_buf());
    }

    #[tokio::test]
    async fn kept_result_survives_guard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let (guard, _file) = staging.create_result(Some("webp")).await.expect("create");
        let kept = guard.keep().expect("keep");
        assert!(kept.exists());
        assert_eq!(kept.extension().and_then(|e| e.to_str()), Some("webp"));
    }

    #[test]
    fn adopted_result_is_removed_and_missing_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("restored.png");
        std::fs::write(&path, b"png").expect("write");
        drop(adopt_result(&path));
        assert!(!path.exists());

        drop(adopt_result(dir.path().join("never-created")));
    }
}
