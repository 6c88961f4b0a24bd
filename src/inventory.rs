//! 清单填充
//!
//! 一次运行调用若干列表操作，把主机、组和变量填进内存结构，
//! 对应 YAML 清单源的行为。

use crate::api::UyuniClient;
use crate::config::InventoryConfig;
use crate::error::UyuniError;
use std::collections::HashMap;
use tracing::{debug, info};

/// 清单里的一台主机
#[derive(Debug, Clone)]
pub struct InventoryHost {
    pub name: String,
    /// 连接地址（ipv6_only 时取 v6 地址）
    pub address: Option<String>,
    pub groups: Vec<String>,
    pub variables: HashMap<String, String>,
    pub requires_reboot: bool,
}

/// 内存清单：主机、组、变量
#[derive(Debug, Default)]
pub struct UyuniInventory {
    pub hosts: HashMap<String, InventoryHost>,
    pub groups: HashMap<String, Vec<String>>,
}

impl UyuniInventory {
    /// 按配置从服务器填充清单
    pub async fn build(
        client: &UyuniClient,
        config: &InventoryConfig,
    ) -> Result<Self, UyuniError> {
        let mut inventory = Self::default();

        let all_groups = client.get_all_hostgroups().await?;
        let hosts = client.get_all_hosts().await?;

        // 限定组选择（未配置时取全部组）
        let groups: Vec<String> = match &config.groups {
            Some(wanted) => all_groups
                .into_iter()
                .filter(|group| wanted.contains(group))
                .collect(),
            None => all_groups,
        };
        for group in &groups {
            inventory.groups.entry(group.clone()).or_default();
        }

        let pending_reboot = client.get_hosts_by_required_reboot().await?;

        for host in hosts {
            // 无组主机不是错误
            let host_groups = match client.get_hostgroups_by_host(host.id).await {
                Ok(host_groups) => host_groups,
                Err(UyuniError::EmptySet(_)) => Vec::new(),
                Err(err) => return Err(err),
            };

            if let Some(wanted) = &config.groups {
                if !host_groups.iter().any(|group| wanted.contains(group)) {
                    debug!("Skipping {} (not in requested groups)", host.name);
                    continue;
                }
            }

            let requires_reboot = pending_reboot.contains(&host.name);
            if config.pending_reboot_only && !requires_reboot {
                continue;
            }

            let network = client.get_host_network(host.id).await?;
            let address = if config.ipv6_only {
                Some(network.ip6).filter(|ip| !ip.is_empty())
            } else {
                Some(network.ip).filter(|ip| !ip.is_empty())
            };

            let variables = if config.show_custom_values {
                client.get_host_params(host.id).await?
            } else {
                HashMap::new()
            };

            for group in &host_groups {
                if groups.contains(group) {
                    inventory
                        .groups
                        .entry(group.clone())
                        .or_default()
                        .push(host.name.clone());
                }
            }

            inventory.hosts.insert(
                host.name.clone(),
                InventoryHost {
                    name: host.name,
                    address,
                    groups: host_groups,
                    variables,
                    requires_reboot,
                },
            );
        }

        info!(
            "Populated inventory with {} hosts in {} groups",
            inventory.hosts.len(),
            inventory.groups.len()
        );
        Ok(inventory)
    }

    pub fn host_names(&self) -> Vec<&String> {
        self.hosts.keys().collect()
    }

    pub fn hosts_in_group(&self, group: &str) -> Vec<String> {
        self.groups.get(group).cloned().unwrap_or_default()
    }
}
