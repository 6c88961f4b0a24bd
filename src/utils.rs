use crate::error::UyuniError;

/// RPM 文件名拆出的 NVREA 各段
#[derive(Debug, Clone, PartialEq)]
pub struct PackageNvrea {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: String,
    pub architecture: String,
}

/// 拆分 RPM 文件名
///
/// 布局固定为 `name-[epoch:]version-release.arch.rpm`，
/// 例如 `foo-1.0-1.i386.rpm` 或 `bar-9:1.0-1.x86_64.rpm`。
///
/// # 示例
/// ```
/// use rs_uyuni::utils::split_rpm_filename;
///
/// let nvrea = split_rpm_filename("zlib-1.2.11-3.x86_64.rpm").unwrap();
/// assert_eq!(nvrea.name, "zlib");
/// assert_eq!(nvrea.architecture, "x86_64");
/// ```
pub fn split_rpm_filename(file_name: &str) -> Result<PackageNvrea, UyuniError> {
    let invalid = || UyuniError::UnsupportedRequest(format!("Invalid RPM file name: {file_name:?}"));

    let stem = file_name.strip_suffix(".rpm").unwrap_or(file_name);
    let (rest, architecture) = stem.rsplit_once('.').ok_or_else(invalid)?;
    let (rest, release) = rest.rsplit_once('-').ok_or_else(invalid)?;
    let (name, version) = rest.rsplit_once('-').ok_or_else(invalid)?;
    if name.is_empty() || version.is_empty() || release.is_empty() || architecture.is_empty() {
        return Err(invalid());
    }

    // epoch 可能以 "epoch:version" 的形式嵌在版本段里
    let (epoch, version) = match version.split_once(':') {
        Some((epoch, version)) => (epoch.to_string(), version.to_string()),
        None => (String::new(), version.to_string()),
    };

    Ok(PackageNvrea {
        name: name.to_string(),
        version,
        release: release.to_string(),
        epoch,
        architecture: architecture.to_string(),
    })
}

/// 给脚本补上 shebang（已有则原样返回）
pub fn ensure_shebang(command: &str) -> String {
    if command.starts_with("#!/") {
        command.to_string()
    } else {
        format!("#!/bin/sh\n{command}")
    }
}
