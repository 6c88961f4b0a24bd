use crate::api::fault::session_error;
use crate::error::UyuniError;
use crate::rpc::{HttpTransport, RpcError, RpcTransport, RpcValue};
use crate::types::ConnectionConfig;
use tracing::{debug, info};

/// Uyuni XML-RPC 客户端
///
/// 一个实例独占一个已认证会话：构造时登录并校验 API 版本，
/// 之后所有调用都带上会话令牌。没有显式 logout，会话随实例存活。
pub struct UyuniClient {
    pub(super) transport: Box<dyn RpcTransport>,
    pub(super) session_key: String,
    username: String,
    api_version: String,
}

impl UyuniClient {
    /// 支持的最低 API 版本
    pub const API_MIN: u32 = 24;

    /// 建立到 Uyuni 服务器的连接（HTTPS）
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, UyuniError> {
        debug!(
            "About to create Uyuni client '{}'@'{}'",
            config.username, config.hostname
        );
        let transport = HttpTransport::new(config).map_err(session_error)?;
        Self::login(Box::new(transport), &config.username, &config.password).await
    }

    /// 在给定传输上登录并校验 API 版本
    ///
    /// 独立于 `connect`，测试可以注入脚本化的传输。
    pub async fn login(
        transport: Box<dyn RpcTransport>,
        username: &str,
        password: &str,
    ) -> Result<Self, UyuniError> {
        let result = transport
            .call(
                "auth.login",
                &[RpcValue::string(username), RpcValue::string(password)],
            )
            .await;

        let session_key = match result {
            Ok(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    UyuniError::Session("auth.login did not return a session key".to_string())
                })?,
            // 2950 是固定的凭据错误代码
            Err(RpcError::Fault(fault)) if fault.code == 2950 => {
                return Err(UyuniError::InvalidCredentials(format!(
                    "Wrong credentials supplied: {:?}",
                    fault.message
                )));
            }
            Err(err) => return Err(session_error(err)),
        };

        let mut client = Self {
            transport,
            session_key,
            username: username.to_string(),
            api_version: String::new(),
        };
        client.api_version = client.validate_api_support().await?;
        info!("Supported API version {} found", client.api_version);
        Ok(client)
    }

    /// 校验服务器 API 版本不低于 `API_MIN`
    ///
    /// 版本缺失、不可解析或过低都按不支持处理。
    async fn validate_api_support(&self) -> Result<String, UyuniError> {
        let value = self
            .transport
            .call("api.getVersion", &[])
            .await
            .map_err(session_error)?;

        let level = value
            .as_str()
            .ok_or_else(|| {
                UyuniError::ApiLevelNotSupported("Unable to verify API version".to_string())
            })?
            .trim()
            .to_string();
        let parsed: f64 = level.parse().map_err(|_| {
            UyuniError::ApiLevelNotSupported("Unable to verify API version".to_string())
        })?;
        if parsed < f64::from(Self::API_MIN) {
            return Err(UyuniError::ApiLevelNotSupported(format!(
                "Your API version ({level:?}) doesn't support required calls. \
                 You'll need API version ({}) or higher!",
                Self::API_MIN
            )));
        }
        Ok(level)
    }

    /// 服务器报告的 API 版本
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// 会话所属的登录用户
    pub fn username(&self) -> &str {
        &self.username
    }

    /// 发起一次带会话令牌的调用
    pub(super) async fn call(
        &self,
        method: &str,
        params: Vec<RpcValue>,
    ) -> Result<RpcValue, RpcError> {
        let mut full = Vec::with_capacity(params.len() + 1);
        full.push(RpcValue::Str(self.session_key.clone()));
        full.extend(params);
        self.transport.call(method, &full).await
    }
}
