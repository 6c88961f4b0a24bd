use serde::Serialize;
use thiserror::Error;

/// 错误分类：与 Uyuni 服务端交互时的所有失败情况
///
/// 调用方只依赖枚举变体（kind），不解析消息文本；
/// 服务端 fault 文本的子串匹配只发生在 `api::fault` 中。
#[derive(Error, Debug, Serialize)]
pub enum UyuniError {
    #[error("{0}")]
    Session(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    ApiLevelNotSupported(String),

    #[error("{0}")]
    EmptySet(String),

    #[error("{0}")]
    UnsupportedFilter(String),

    #[error("{0}")]
    UnsupportedRequest(String),

    #[error("Invalid hostname format: {0}")]
    InvalidHostnameFormat(String),

    #[error("{0}")]
    CustomVariableExists(String),

    #[error("{0}")]
    SnapshotExists(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Client is not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Failed to verify SSL certificate: {0}")]
    SslVerification(String),

    #[error("{0}")]
    Timeout(String),

    /// 连接辅助函数的包装错误，保留原始错误供调用方区分
    #[error("{message}")]
    Connection {
        message: String,
        source: Box<UyuniError>,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for UyuniError {
    fn from(error: std::io::Error) -> Self {
        UyuniError::Io(error.to_string())
    }
}
