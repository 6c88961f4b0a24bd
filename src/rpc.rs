//! XML-RPC 编解码与传输层
//!
//! Uyuni API 走 HTTPS 上的 XML-RPC（固定路径 /rpc/api）。这里实现
//! 请求编码、响应/fault 解析，以及一个可替换的传输 trait：
//! 生产环境用 `HttpTransport`，测试用脚本化的 mock。

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::ConnectionConfig;

/// HTTP 请求超时
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("rs-uyuni/", env!("CARGO_PKG_VERSION"));

/// XML-RPC 值
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
    DateTime(String),
    Base64(String),
    Array(Vec<RpcValue>),
    Struct(HashMap<String, RpcValue>),
    Nil,
}

impl RpcValue {
    pub fn string(value: impl Into<String>) -> Self {
        RpcValue::Str(value.into())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RpcValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RpcValue::Bool(value) => Some(*value),
            // Uyuni 偶尔用 0/1 表示布尔
            RpcValue::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::Str(value) | RpcValue::DateTime(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RpcValue]> {
        match self {
            RpcValue::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, RpcValue>> {
        match self {
            RpcValue::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// struct 成员访问
    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.as_struct().and_then(|members| members.get(key))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(RpcValue::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(RpcValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(RpcValue::as_bool)
    }
}

/// 服务端 fault：数字代码 + 自由文本
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Remote fault {}: {}", .0.code, .0.message)]
    Fault(Fault),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("SSL certificate verification failed: {0}")]
    SslVerification(String),

    #[error("Malformed XML-RPC response: {0}")]
    Malformed(String),
}

/// 传输抽象：一次方法调用，返回解析后的值或错误
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue, RpcError>;
}

/// 基于 reqwest 的 HTTPS 传输
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self, RpcError> {
        let mut builder = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT);
        if !config.verify_ssl {
            // 自签名部署关闭证书校验
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: format!("https://{}:{}/rpc/api", config.hostname, config.port),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue, RpcError> {
        debug!("Calling {} on {}", method, self.endpoint);
        let body = encode_method_call(method, params);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let text = response
            .text()
            .await
            .map_err(classify_transport_error)?;
        parse_response(&text)
    }
}

/// reqwest 错误归类：证书问题单独上报，其余按传输错误处理
fn classify_transport_error(error: reqwest::Error) -> RpcError {
    let mut messages = vec![error.to_string()];
    let mut source = std::error::Error::source(&error);
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    let chain = messages.join(": ");
    let lowered = chain.to_lowercase();
    if lowered.contains("certificate") || lowered.contains("unknownissuer") {
        RpcError::SslVerification(chain)
    } else {
        RpcError::Transport(chain)
    }
}

/// 当前本地时间，编码为 XML-RPC dateTime.iso8601
pub fn now_datetime() -> RpcValue {
    RpcValue::DateTime(format_datetime(&chrono::Local::now()))
}

pub fn format_datetime(when: &chrono::DateTime<chrono::Local>) -> String {
    when.format("%Y%m%dT%H:%M:%S").to_string()
}

// =========================================================================
// 编码
// =========================================================================

pub fn encode_method_call(method: &str, params: &[RpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape_xml(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn encode_value(value: &RpcValue, out: &mut String) {
    out.push_str("<value>");
    match value {
        RpcValue::Int(i) => {
            out.push_str("<int>");
            out.push_str(&i.to_string());
            out.push_str("</int>");
        }
        RpcValue::Bool(b) => {
            out.push_str("<boolean>");
            out.push_str(if *b { "1" } else { "0" });
            out.push_str("</boolean>");
        }
        RpcValue::Str(s) => {
            out.push_str("<string>");
            out.push_str(&escape_xml(s));
            out.push_str("</string>");
        }
        RpcValue::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        RpcValue::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape_xml(s));
            out.push_str("</dateTime.iso8601>");
        }
        RpcValue::Base64(s) => {
            out.push_str("<base64>");
            out.push_str(s);
            out.push_str("</base64>");
        }
        RpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        RpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape_xml(name));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        RpcValue::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match rest.find(';') {
            Some(end) => {
                let entity = &rest[1..end];
                match entity {
                    "amp" => out.push('&'),
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "quot" => out.push('"'),
                    "apos" => out.push('\''),
                    _ => {
                        let decoded = entity
                            .strip_prefix("#x")
                            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                            .or_else(|| {
                                entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
                            })
                            .and_then(char::from_u32);
                        match decoded {
                            Some(ch) => out.push(ch),
                            // 未知实体原样保留
                            None => out.push_str(&rest[..=end]),
                        }
                    }
                }
                rest = &rest[end + 1..];
            }
            None => {
                out.push_str(rest);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// =========================================================================
// 解析
// =========================================================================

pub fn parse_response(body: &str) -> Result<RpcValue, RpcError> {
    let mut parser = Parser::new(body);
    parser.skip_declaration();
    parser.expect("<methodResponse>")?;

    if parser.consume("<fault>") {
        let value = parser.parse_value()?;
        parser.expect("</fault>")?;
        parser.expect("</methodResponse>")?;
        let code = value
            .get_i64("faultCode")
            .ok_or_else(|| RpcError::Malformed("fault without faultCode".to_string()))?;
        let message = value.get_str("faultString").unwrap_or_default().to_string();
        return Err(RpcError::Fault(Fault {
            code: code as i32,
            message,
        }));
    }

    if parser.consume("<params/>") {
        parser.expect("</methodResponse>")?;
        return Ok(RpcValue::Nil);
    }
    parser.expect("<params>")?;
    parser.expect("<param>")?;
    let value = parser.parse_value()?;
    parser.expect("</param>")?;
    parser.expect("</params>")?;
    parser.expect("</methodResponse>")?;
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_declaration(&mut self) {
        self.skip_whitespace();
        if self.rest().starts_with("<?") {
            if let Some(idx) = self.rest().find("?>") {
                self.pos += idx + 2;
            }
        }
    }

    /// 尝试消费一个固定 token（前导空白忽略）
    fn consume(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), RpcError> {
        if self.consume(token) {
            Ok(())
        } else {
            Err(RpcError::Malformed(format!(
                "expected {token:?} at offset {}",
                self.pos
            )))
        }
    }

    fn peek_is(&mut self, prefix: &str) -> bool {
        self.skip_whitespace();
        self.rest().starts_with(prefix)
    }

    /// 读取到下一个 '<' 为止的原始文本
    fn read_raw_text(&mut self) -> &'a str {
        let start = self.pos;
        match self.rest().find('<') {
            Some(idx) => {
                self.pos += idx;
                &self.input[start..self.pos]
            }
            None => {
                self.pos = self.input.len();
                &self.input[start..]
            }
        }
    }

    fn text_until(&mut self, close: &str) -> Result<&'a str, RpcError> {
        let text = self.read_raw_text();
        self.expect(close)?;
        Ok(text)
    }

    fn parse_int(&mut self, close: &str) -> Result<RpcValue, RpcError> {
        let text = self.text_until(close)?;
        let parsed = text
            .trim()
            .parse::<i64>()
            .map_err(|_| RpcError::Malformed(format!("invalid integer {text:?}")))?;
        Ok(RpcValue::Int(parsed))
    }

    fn parse_value(&mut self) -> Result<RpcValue, RpcError> {
        if self.consume("<value/>") {
            return Ok(RpcValue::Str(String::new()));
        }
        self.expect("<value>")?;
        self.skip_whitespace();

        let value = if self.consume("<int>") {
            self.parse_int("</int>")?
        } else if self.consume("<i4>") {
            self.parse_int("</i4>")?
        } else if self.consume("<boolean>") {
            let text = self.text_until("</boolean>")?;
            let trimmed = text.trim();
            RpcValue::Bool(trimmed == "1" || trimmed.eq_ignore_ascii_case("true"))
        } else if self.consume("<string/>") {
            RpcValue::Str(String::new())
        } else if self.consume("<string>") {
            RpcValue::Str(unescape_xml(self.text_until("</string>")?))
        } else if self.consume("<double>") {
            let text = self.text_until("</double>")?;
            let parsed = text
                .trim()
                .parse::<f64>()
                .map_err(|_| RpcError::Malformed(format!("invalid double {text:?}")))?;
            RpcValue::Double(parsed)
        } else if self.consume("<dateTime.iso8601>") {
            RpcValue::DateTime(self.text_until("</dateTime.iso8601>")?.trim().to_string())
        } else if self.consume("<base64>") {
            RpcValue::Base64(self.text_until("</base64>")?.trim().to_string())
        } else if self.consume("<nil/>") {
            RpcValue::Nil
        } else if self.consume("<array>") {
            let mut items = Vec::new();
            if !self.consume("<data/>") {
                self.expect("<data>")?;
                while self.peek_is("<value") {
                    items.push(self.parse_value()?);
                }
                self.expect("</data>")?;
            }
            self.expect("</array>")?;
            RpcValue::Array(items)
        } else if self.consume("<struct>") {
            let mut members = HashMap::new();
            while self.consume("<member>") {
                self.expect("<name>")?;
                let name = unescape_xml(self.read_raw_text());
                self.expect("</name>")?;
                let member = self.parse_value()?;
                self.expect("</member>")?;
                members.insert(name, member);
            }
            self.expect("</struct>")?;
            RpcValue::Struct(members)
        } else {
            // 无类型标签的 <value> 等价于字符串
            RpcValue::Str(unescape_xml(self.read_raw_text()))
        };

        self.expect("</value>")?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_method_call() {
        let body = encode_method_call(
            "auth.login",
            &[RpcValue::string("admin"), RpcValue::string("s3cret")],
        );
        assert!(body.starts_with("<?xml version=\"1.0\"?><methodCall>"));
        assert!(body.contains("<methodName>auth.login</methodName>"));
        assert!(body.contains("<value><string>admin</string></value>"));
        assert!(body.ends_with("</params></methodCall>"));
    }

    #[test]
    fn test_encode_escapes_strings() {
        let body = encode_method_call("m", &[RpcValue::string("a<b & c>d")]);
        assert!(body.contains("a&lt;b &amp; c&gt;d"));
    }

    #[test]
    fn test_encode_nested_values() {
        let body = encode_method_call(
            "m",
            &[RpcValue::Array(vec![RpcValue::Int(1), RpcValue::Int(2)])],
        );
        assert!(body.contains(
            "<array><data><value><int>1</int></value><value><int>2</int></value></data></array>"
        ));
    }

    #[test]
    fn test_parse_scalar_response() {
        let body = "<?xml version=\"1.0\"?>\n<methodResponse><params><param>\
                    <value><string>session-token</string></value>\
                    </param></params></methodResponse>";
        let value = parse_response(body).unwrap();
        assert_eq!(value, RpcValue::Str("session-token".to_string()));
    }

    #[test]
    fn test_parse_untyped_value_is_string() {
        let body = "<methodResponse><params><param><value>25.0</value></param></params></methodResponse>";
        let value = parse_response(body).unwrap();
        assert_eq!(value.as_str(), Some("25.0"));
    }

    #[test]
    fn test_parse_struct_and_array() {
        let body = "<methodResponse><params><param><value><array><data>\
                    <value><struct>\
                    <member><name>id</name><value><i4>1000010000</i4></value></member>\
                    <member><name>name</name><value><string>web01</string></value></member>\
                    </struct></value>\
                    </data></array></value></param></params></methodResponse>";
        let value = parse_response(body).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get_i64("id"), Some(1000010000));
        assert_eq!(items[0].get_str("name"), Some("web01"));
    }

    #[test]
    fn test_parse_fault() {
        let body = "<methodResponse><fault><value><struct>\
                    <member><name>faultCode</name><value><int>2950</int></value></member>\
                    <member><name>faultString</name><value><string>Either the password or username is incorrect</string></value></member>\
                    </struct></value></fault></methodResponse>";
        match parse_response(body) {
            Err(RpcError::Fault(fault)) => {
                assert_eq!(fault.code, 2950);
                assert!(fault.message.contains("incorrect"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_array() {
        let body = "<methodResponse><params><param><value><array><data></data></array></value></param></params></methodResponse>";
        let value = parse_response(body).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_parse_tolerates_pretty_printing() {
        let body = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                    <methodResponse>\n  <params>\n    <param>\n      \
                    <value>\n        <boolean>1</boolean>\n      </value>\n    \
                    </param>\n  </params>\n</methodResponse>\n";
        let value = parse_response(body).unwrap();
        assert_eq!(value.as_bool(), Some(true));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_response("not xml at all"),
            Err(RpcError::Malformed(_))
        ));
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_xml("a&lt;b&gt;&amp;&quot;&apos;"), "a<b>&\"'");
        assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
        // 未知实体原样保留
        assert_eq!(unescape_xml("&nbsp;"), "&nbsp;");
    }

    #[test]
    fn test_format_datetime() {
        let when = chrono::Local.with_ymd_and_hms(2022, 8, 7, 15, 4, 5).unwrap();
        assert_eq!(format_datetime(&when), "20220807T15:04:05");
    }
}
