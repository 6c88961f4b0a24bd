use crate::api::UyuniClient;
use crate::config::InventoryConfig;
use crate::error::UyuniError;
use crate::helpers::resolve_host_id;
use crate::inventory::UyuniInventory;
use crate::modules::{GroupState, ModuleRunner};
use crate::rpc::{Fault, RpcError, RpcTransport, RpcValue};
use crate::types::HostRef;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 脚本化传输：按顺序回放预置响应并记录调用
struct MockTransport {
    responses: Mutex<VecDeque<Result<RpcValue, RpcError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    fn new(responses: Vec<Result<RpcValue, RpcError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for Arc<MockTransport> {
    async fn call(&self, method: &str, _params: &[RpcValue]) -> Result<RpcValue, RpcError> {
        self.calls.lock().unwrap().push(method.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::Transport(format!("unexpected call to {method}"))))
    }
}

fn s(value: &str) -> RpcValue {
    RpcValue::string(value)
}

fn int(value: i64) -> RpcValue {
    RpcValue::Int(value)
}

fn array(items: Vec<RpcValue>) -> RpcValue {
    RpcValue::Array(items)
}

fn rstruct(pairs: Vec<(&str, RpcValue)>) -> RpcValue {
    RpcValue::Struct(
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

fn fault(code: i32, message: &str) -> Result<RpcValue, RpcError> {
    Err(RpcError::Fault(Fault {
        code,
        message: message.to_string(),
    }))
}

/// 登录 + 版本校验之后追加给定响应
async fn connected(
    extra: Vec<Result<RpcValue, RpcError>>,
) -> (UyuniClient, Arc<MockTransport>) {
    let mut responses = vec![Ok(s("0x0sessionkey")), Ok(s("25.0"))];
    responses.extend(extra);
    let mock = MockTransport::new(responses);
    let client = UyuniClient::login(Box::new(mock.clone()), "admin", "admin")
        .await
        .expect("login should succeed");
    (client, mock)
}

#[tokio::test]
async fn test_login_rejects_unsupported_api_level() {
    let mock = MockTransport::new(vec![Ok(s("0x0sessionkey")), Ok(s("23.0"))]);
    let result = UyuniClient::login(Box::new(mock), "admin", "admin").await;
    assert!(matches!(result, Err(UyuniError::ApiLevelNotSupported(_))));
}

#[tokio::test]
async fn test_login_rejects_unparsable_api_level() {
    let mock = MockTransport::new(vec![Ok(s("0x0sessionkey")), Ok(s("beta"))]);
    let result = UyuniClient::login(Box::new(mock), "admin", "admin").await;
    assert!(matches!(result, Err(UyuniError::ApiLevelNotSupported(_))));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    // 2950 是凭据错误的固定 fault 代码
    let mock = MockTransport::new(vec![fault(2950, "Either the password or username is incorrect")]);
    let result = UyuniClient::login(Box::new(mock), "admin", "wrong").await;
    assert!(matches!(result, Err(UyuniError::InvalidCredentials(_))));
}

#[tokio::test]
async fn test_numeric_host_ref_resolves_without_remote_call() {
    let (client, mock) = connected(vec![]).await;
    let id = resolve_host_id(&client, &HostRef::Id(1000010000))
        .await
        .unwrap();
    assert_eq!(id, 1000010000);
    // 只有登录和版本查询
    assert_eq!(mock.calls(), vec!["auth.login", "api.getVersion"]);
}

#[tokio::test]
async fn test_named_host_ref_issues_exactly_one_lookup() {
    let (client, mock) = connected(vec![Ok(array(vec![rstruct(vec![
        ("id", int(1000010000)),
        ("name", s("web01.localdomain.loc")),
    ])]))])
    .await;

    let id = resolve_host_id(&client, &HostRef::parse("web01.localdomain.loc"))
        .await
        .unwrap();
    assert_eq!(id, 1000010000);
    assert_eq!(
        mock.calls(),
        vec!["auth.login", "api.getVersion", "system.getId"]
    );
}

#[tokio::test]
async fn test_unknown_host_name_is_empty_set() {
    let (client, _mock) = connected(vec![Ok(array(vec![]))]).await;
    let result = client.get_host_id("ghost.localdomain.loc").await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_hostgroup_unable_to_locate_is_empty_set() {
    let (client, _mock) = connected(vec![fault(
        -210,
        "Unable to locate or access server group: nonexistent",
    )])
    .await;
    let result = client.get_hosts_by_hostgroup("nonexistent").await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_no_pending_reboots_is_not_an_error() {
    let (client, _mock) = connected(vec![Ok(array(vec![]))]).await;
    let hosts = client.get_hosts_by_required_reboot().await.unwrap();
    assert!(hosts.is_empty());
}

#[tokio::test]
async fn test_install_upgrades_rejects_empty_input_before_any_call() {
    let (client, mock) = connected(vec![]).await;
    let result = client.install_upgrades(1000010000, vec![]).await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_install_patches_returns_action_ids() {
    let (client, _mock) = connected(vec![Ok(array(vec![int(31), int(32)]))]).await;
    let action_ids = client.install_patches(1000010000, vec![2433]).await.unwrap();
    assert_eq!(action_ids, vec![31, 32]);
}

#[tokio::test]
async fn test_erratum_covered_upgrades_are_excluded() {
    let upgradable = array(vec![
        rstruct(vec![("name", s("zlib")), ("to_package_id", int(11))]),
        rstruct(vec![("name", s("vim")), ("to_package_id", int(22))]),
    ]);
    let (client, _mock) = connected(vec![
        Ok(upgradable),
        // zlib 已被一个 erratum 覆盖
        Ok(array(vec![rstruct(vec![("advisory", s("SUSE-2024-1"))])])),
        Ok(array(vec![])),
    ])
    .await;

    let upgrades = client.get_host_upgrades(1000010000).await.unwrap();
    assert_eq!(upgrades.len(), 1);
    assert_eq!(upgrades[0].name, "vim");
}

#[tokio::test]
async fn test_reboot_unknown_server_is_empty_set() {
    let (client, _mock) = connected(vec![fault(-1, "Could not find server 42")]).await;
    let result = client.reboot_host(42).await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_wait_for_action_returns_terminal_status() {
    let running = array(vec![rstruct(vec![
        ("id", int(7)),
        ("name", s("Patch Update")),
        ("successful_count", int(0)),
        ("failed_count", int(0)),
    ])]);
    let finished = array(vec![rstruct(vec![
        ("id", int(7)),
        ("name", s("Patch Update")),
        ("successful_count", int(1)),
        ("failed_count", int(0)),
    ])]);
    let (client, _mock) = connected(vec![Ok(running), Ok(finished)]).await;

    let status = client
        .wait_for_action(7, 1000010000, Duration::from_secs(5), Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(status.successful_count, 1);
    assert!(status.is_terminal());
}

#[tokio::test]
async fn test_wait_for_action_times_out() {
    let running = array(vec![rstruct(vec![
        ("id", int(7)),
        ("name", s("Patch Update")),
        ("successful_count", int(0)),
        ("failed_count", int(0)),
    ])]);
    let responses = std::iter::repeat_with(|| Ok(running.clone()))
        .take(50)
        .collect();
    let (client, _mock) = connected(responses).await;

    let result = client
        .wait_for_action(
            7,
            1000010000,
            Duration::from_millis(30),
            Duration::from_millis(10),
        )
        .await;
    assert!(matches!(result, Err(UyuniError::Timeout(_))));
}

#[tokio::test]
async fn test_custom_value_requires_defined_key_per_host() {
    let (client, _mock) = connected(vec![
        fault(-1, "Custom info key owner was not defined"),
        fault(-1, "Custom info key owner was not defined"),
    ])
    .await;

    // 两台主机各自独立报 empty-set
    for system_id in [1000010000, 1000010001] {
        let result = client
            .host_add_custom_variable(system_id, "owner", "sgiertz")
            .await;
        assert!(matches!(result, Err(UyuniError::EmptySet(_))));
    }
}

#[tokio::test]
async fn test_create_custom_variable_reports_existing_key() {
    let (client, _mock) = connected(vec![fault(-1, "Key 'owner' already exists")]).await;
    let result = client.create_custom_variable("owner", "host owner").await;
    assert!(matches!(result, Err(UyuniError::CustomVariableExists(_))));
}

#[tokio::test]
async fn test_module_install_patches_rejects_conflicting_filters() {
    let (client, mock) = connected(vec![]).await;
    let runner = ModuleRunner::new(&client);

    let include = vec!["openSUSE-2022-10013".to_string()];
    let exclude = vec!["openSUSE-SLE-15.3-2022-2118".to_string()];
    let result = runner
        .install_patches("1000010000", Some(&include), Some(&exclude))
        .await;

    assert!(matches!(result, Err(UyuniError::UnsupportedFilter(_))));
    // 过滤器冲突必须在任何远程调用之前被拒绝
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_module_install_upgrades_without_candidates_is_unchanged() {
    let (client, _mock) = connected(vec![Ok(array(vec![]))]).await;
    let runner = ModuleRunner::new(&client);

    let outcome = runner
        .install_upgrades("1000010000", None, None)
        .await
        .unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
async fn test_module_install_upgrades_applies_blocklist() {
    let upgradable = array(vec![
        rstruct(vec![("name", s("kernel-default")), ("to_package_id", int(11))]),
        rstruct(vec![("name", s("vim")), ("to_package_id", int(22))]),
    ]);
    let (client, _mock) = connected(vec![
        Ok(upgradable),
        Ok(array(vec![])),
        Ok(array(vec![])),
        // schedulePackageInstall
        Ok(int(77)),
    ])
    .await;
    let runner = ModuleRunner::new(&client);

    let exclude = vec!["kernel".to_string()];
    let outcome = runner
        .install_upgrades("1000010000", None, Some(&exclude))
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.action_ids, vec![77]);
}

#[tokio::test]
async fn test_module_reboot_host_reports_action_id() {
    let (client, _mock) = connected(vec![Ok(int(55))]).await;
    let runner = ModuleRunner::new(&client);

    let outcome = runner.reboot_host("1000010000").await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.action_ids, vec![55]);
}

#[tokio::test]
async fn test_module_system_group_creates_when_missing() {
    let created = rstruct(vec![
        ("id", int(9)),
        ("name", s("debian-hosts")),
        ("description", s("Debian servers")),
    ]);
    let (client, _mock) = connected(vec![Ok(created)]).await;
    let runner = ModuleRunner::new(&client);

    let outcome = runner
        .system_group("debian-hosts", "Debian servers", GroupState::Present)
        .await
        .unwrap();
    assert!(outcome.changed);
}

#[tokio::test]
async fn test_module_system_group_unchanged_when_description_matches() {
    let details = rstruct(vec![
        ("id", int(9)),
        ("name", s("debian-hosts")),
        ("description", s("Debian servers")),
    ]);
    let (client, _mock) = connected(vec![
        fault(-1, "System group 'debian-hosts' already exists"),
        Ok(details),
    ])
    .await;
    let runner = ModuleRunner::new(&client);

    let outcome = runner
        .system_group("debian-hosts", "Debian servers", GroupState::Present)
        .await
        .unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
async fn test_module_system_group_absent_is_idempotent() {
    let (client, _mock) = connected(vec![fault(
        -1,
        "Unable to locate or access server group: devuan-hosts",
    )])
    .await;
    let runner = ModuleRunner::new(&client);

    let outcome = runner
        .system_group("devuan-hosts", "", GroupState::Absent)
        .await
        .unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
async fn test_inventory_build_populates_hosts_and_groups() {
    let (client, _mock) = connected(vec![
        // systemgroup.listAllGroups
        Ok(array(vec![rstruct(vec![("name", s("dev"))])])),
        // system.listSystems
        Ok(array(vec![rstruct(vec![
            ("id", int(1000010000)),
            ("name", s("web01")),
        ])])),
        // system.listSuggestedReboot
        Ok(array(vec![rstruct(vec![
            ("id", int(1000010000)),
            ("name", s("web01")),
        ])])),
        // system.listGroups
        Ok(array(vec![rstruct(vec![
            ("system_group_name", s("dev")),
            ("subscribed", int(1)),
        ])])),
        // system.getNetwork
        Ok(rstruct(vec![
            ("ip", s("192.168.180.10")),
            ("ip6", s("")),
        ])),
    ])
    .await;

    let config = InventoryConfig {
        host: "uyuni.example.com".to_string(),
        user: "admin".to_string(),
        password: "admin".to_string(),
        port: 443,
        verify_ssl: true,
        only_powered_on: true,
        ipv6_only: false,
        show_custom_values: false,
        groups: None,
        pending_reboot_only: false,
    };
    let inventory = UyuniInventory::build(&client, &config).await.unwrap();

    assert_eq!(inventory.hosts.len(), 1);
    let host = &inventory.hosts["web01"];
    assert_eq!(host.address.as_deref(), Some("192.168.180.10"));
    assert!(host.requires_reboot);
    assert_eq!(host.groups, vec!["dev".to_string()]);
    assert_eq!(inventory.hosts_in_group("dev"), vec!["web01".to_string()]);
}

#[tokio::test]
async fn test_organization_filter_falls_back_to_all_hosts() {
    // 服务端不支持按组织过滤，行为是直接返回全部主机
    let (client, mock) = connected(vec![Ok(array(vec![rstruct(vec![
        ("id", int(1000010000)),
        ("name", s("web01")),
    ])]))])
    .await;

    let hosts = client.get_hosts_by_organization("Default").await.unwrap();
    assert_eq!(hosts, vec![1000010000]);
    assert_eq!(mock.calls().last().map(String::as_str), Some("system.listSystems"));
}

#[tokio::test]
async fn test_patch_already_installed_cross_references_action_history() {
    let history = array(vec![rstruct(vec![
        ("id", int(41)),
        ("name", s("Patch Update")),
        ("successful_count", int(1)),
        ("failed_count", int(0)),
        (
            "additional_info",
            array(vec![rstruct(vec![(
                "detail",
                s("openSUSE-2020-1001 installed successfully"),
            )])]),
        ),
    ])]);
    let patch_details = rstruct(vec![("id", int(2433))]);

    let (client, _mock) = connected(vec![Ok(history.clone()), Ok(patch_details.clone())]).await;
    let installed = crate::helpers::patch_already_installed(&client, 1000010000, &[2433])
        .await
        .unwrap();
    assert!(installed);

    // 只要有一个补丁不在历史里就算未安装
    let (client, _mock) = connected(vec![Ok(history), Ok(patch_details)]).await;
    let installed = crate::helpers::patch_already_installed(&client, 1000010000, &[2433, 9999])
        .await
        .unwrap();
    assert!(!installed);
}

#[tokio::test]
async fn test_missing_patch_fault_is_empty_set() {
    let (client, _mock) = connected(vec![fault(
        -211,
        "The patch openSUSE-2099-1 cannot be found",
    )])
    .await;
    let result = client.get_patch_by_name("openSUSE-2099-1").await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_package_lookup_by_file_name() {
    let (client, _mock) = connected(vec![Ok(array(vec![rstruct(vec![
        ("id", int(501)),
        ("name", s("zlib")),
        ("version", s("1.2.11")),
        ("release", s("3")),
        ("epoch", s("")),
    ])]))])
    .await;

    let packages = client
        .get_package_by_file_name("zlib-1.2.11-3.x86_64.rpm")
        .await
        .unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id, 501);
}

#[tokio::test]
async fn test_unknown_action_chain_is_empty_set() {
    let (client, _mock) = connected(vec![fault(-1, "no such action chain: maintenance")]).await;
    let result = client.run_actionchain("maintenance").await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_actionchain_add_upgrades_rejects_empty_input() {
    let (client, mock) = connected(vec![]).await;
    let result = client
        .actionchain_add_upgrades("maintenance", 1000010000, vec![])
        .await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_empty_action_chain_is_empty_set() {
    let (client, _mock) = connected(vec![Ok(array(vec![]))]).await;
    let result = client.get_actionchain_actions("maintenance").await;
    assert!(matches!(result, Err(UyuniError::EmptySet(_))));
}

#[tokio::test]
async fn test_apply_highstate_returns_action_id() {
    let (client, _mock) = connected(vec![Ok(int(88))]).await;
    let action_id = client.apply_highstate(1000010000, true).await.unwrap();
    assert_eq!(action_id, 88);
}

#[tokio::test]
async fn test_errata_task_status_queries_by_type() {
    let (client, mock) = connected(vec![Ok(array(vec![]))]).await;
    let actions = client.get_errata_task_status(1000010000).await.unwrap();
    assert!(actions.is_empty());
    assert_eq!(
        mock.calls().last().map(String::as_str),
        Some("system.listSystemEvents")
    );
}

#[tokio::test]
async fn test_connection_helper_preserves_original_error() {
    use crate::helpers::configure_connection;
    use crate::types::ConnectionConfig;

    // 不可解析的主机名会在传输层失败，包装错误必须保留原始错误
    let config = ConnectionConfig {
        hostname: "".to_string(),
        ..ConnectionConfig::default()
    };
    match configure_connection(&config).await {
        Err(UyuniError::Connection { source, .. }) => {
            assert!(matches!(*source, UyuniError::Session(_)));
        }
        Err(other) => panic!("expected connection error, got {other:?}"),
        Ok(_) => panic!("expected connection error"),
    }
}
