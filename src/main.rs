use anyhow::Result;
use rs_uyuni::{
    ConnectionConfig, InventoryConfig, MockRebootEventSource, ModuleSpec,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化tracing日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("=== rs-uyuni Demo ===\n");

    // 演示连接配置与模块定义
    demo_module_specs()?;

    // 演示清单配置
    demo_inventory_config()?;

    // 演示 mock 事件源
    demo_mock_event_source().await?;

    Ok(())
}

fn demo_module_specs() -> Result<()> {
    println!("📋 1. 连接配置与模块定义");
    println!("──────────────────────────────────────────────");

    let connection = ConnectionConfig::builder()
        .hostname("192.168.180.1")
        .username("admin")
        .password("admin") // 仅为演示
        .verify_ssl(false)
        .build();
    println!(
        "✅ 已配置连接: {}@{}:{}",
        connection.username, connection.hostname, connection.port
    );

    let specs = vec![
        ModuleSpec::is_reboot_required("server.localdomain.loc"),
        ModuleSpec::InstallPatches {
            name: "server.localdomain.loc".to_string(),
            include_patches: None,
            exclude_patches: Some(vec![
                "openSUSE-2022-10013".to_string(),
                "openSUSE-SLE-15.3-2022-2118".to_string(),
            ]),
        },
        ModuleSpec::reboot_host("server.localdomain.loc"),
        ModuleSpec::apply_highstate("server.localdomain.loc", true),
    ];

    println!("📦 模块定义（YAML）:");
    println!("{}", serde_yaml::to_string(&specs)?);

    println!("💡 注意: 演示环境没有可用的 Uyuni 服务器，实际执行需要:");
    println!("   - 配置正确的服务器地址和认证信息");
    println!("   - 服务器 API 版本不低于 24");
    println!();
    Ok(())
}

fn demo_inventory_config() -> Result<()> {
    println!("📂 2. 清单配置");
    println!("──────────────────────────────────────────────");

    let config = InventoryConfig {
        host: "192.168.180.1".to_string(),
        user: "admin".to_string(),
        password: "admin".to_string(),
        port: 443,
        verify_ssl: false,
        only_powered_on: true,
        ipv6_only: false,
        show_custom_values: true,
        groups: Some(vec!["dev".to_string(), "demo".to_string()]),
        pending_reboot_only: false,
    };

    match config.save_to_yaml("demo.uyuni.yml") {
        Ok(_) => println!("✅ 清单配置已保存到 demo.uyuni.yml"),
        Err(e) => println!("❌ 保存配置失败: {e}"),
    }

    let reloaded = InventoryConfig::from_yaml_file("demo.uyuni.yml")?;
    println!("📊 配置统计:");
    println!("   - 服务器: {}:{}", reloaded.host, reloaded.port);
    println!("   - 限定组: {:?}", reloaded.groups);
    println!("   - 显示自定义变量: {}", reloaded.show_custom_values);
    println!();
    Ok(())
}

async fn demo_mock_event_source() -> Result<()> {
    println!("🚀 3. Mock 事件源");
    println!("──────────────────────────────────────────────");

    let source = MockRebootEventSource::new(Duration::from_millis(200));
    let (tx, mut rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { source.run(tx, shutdown_rx).await });

    for i in 1..=3 {
        if let Some(event) = rx.recv().await {
            println!("   事件 {}: {}", i, serde_json::to_string(&event)?);
        }
    }

    shutdown_tx.send(true)?;
    handle.await??;
    println!("✅ 事件源已停止");
    println!();
    Ok(())
}
