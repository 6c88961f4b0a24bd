//! 服务端 fault 归类
//!
//! 远端协议除数字 fault 代码外只有自由文本，归类只能靠子串匹配。
//! 所有匹配模式集中在这里的规则表里，服务端措辞变化时只改一处。

use crate::error::UyuniError;
use crate::rpc::RpcError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FaultKind {
    Session,
    EmptySet,
    CustomVariableExists,
    AlreadyExists,
}

/// 一条归类规则：全部 needle 命中（大小写无关）才算匹配
pub(crate) struct FaultRule {
    pub needles: &'static [&'static str],
    pub kind: FaultKind,
    pub label: &'static str,
}

const fn rule(
    needles: &'static [&'static str],
    kind: FaultKind,
    label: &'static str,
) -> FaultRule {
    FaultRule {
        needles,
        kind,
        label,
    }
}

// 规则表按操作族划分，needle 均为小写。

pub(crate) const SYSTEM_SCOPED: &[FaultRule] = &[rule(
    &["no such system"],
    FaultKind::Session,
    "System not found",
)];

pub(crate) const SYSTEM_LOOKUP: &[FaultRule] = &[rule(
    &["no such system"],
    FaultKind::EmptySet,
    "System not found",
)];

pub(crate) const HOSTGROUP_LOOKUP: &[FaultRule] = &[rule(
    &["unable to locate"],
    FaultKind::EmptySet,
    "No systems found",
)];

pub(crate) const PATCH_LOOKUP: &[FaultRule] = &[
    rule(&["no such patch"], FaultKind::EmptySet, "Patch not found"),
    rule(
        &["the patch", "cannot be found"],
        FaultKind::EmptySet,
        "Patch not found",
    ),
];

pub(crate) const PACKAGE_LOOKUP: &[FaultRule] = &[rule(
    &["no such package"],
    FaultKind::EmptySet,
    "Package not found",
)];

pub(crate) const INSTALL_PATCHES: &[FaultRule] = &[
    rule(&["no such system"], FaultKind::Session, "System not found"),
    rule(
        &["no errata to apply"],
        FaultKind::EmptySet,
        "No applicable errata to apply",
    ),
    rule(&["invalid errata"], FaultKind::EmptySet, "Errata not found"),
];

pub(crate) const INSTALL_UPGRADES: &[FaultRule] = &[
    rule(&["no such system"], FaultKind::Session, "System not found"),
    rule(
        &["cannot find package"],
        FaultKind::EmptySet,
        "Upgrade not found",
    ),
];

pub(crate) const REBOOT: &[FaultRule] = &[rule(
    &["could not find server"],
    FaultKind::EmptySet,
    "System not found",
)];

pub(crate) const RUN_COMMAND: &[FaultRule] = &[rule(
    &["no such system"],
    FaultKind::EmptySet,
    "System not found",
)];

pub(crate) const USER_LOOKUP: &[FaultRule] = &[rule(
    &["could not find user"],
    FaultKind::EmptySet,
    "User not found",
)];

pub(crate) const CUSTOM_KEY_CREATE: &[FaultRule] = &[rule(
    &["already exists"],
    FaultKind::CustomVariableExists,
    "Key already exists",
)];

pub(crate) const CUSTOM_KEY_MODIFY: &[FaultRule] = &[rule(
    &["does not exist"],
    FaultKind::EmptySet,
    "Key does not exist",
)];

pub(crate) const CUSTOM_VALUE: &[FaultRule] = &[rule(
    &["was not defined"],
    FaultKind::EmptySet,
    "Custom variable does not exist",
)];

pub(crate) const CHAIN_CREATE: &[FaultRule] = &[rule(
    &["is missing"],
    FaultKind::EmptySet,
    "Label missing",
)];

pub(crate) const CHAIN_LOOKUP: &[FaultRule] = &[rule(
    &["no such action chain"],
    FaultKind::EmptySet,
    "Action chain not found",
)];

pub(crate) const CHAIN_ADD_PATCHES: &[FaultRule] = &[
    rule(
        &["no such action chain"],
        FaultKind::EmptySet,
        "Action chain not found",
    ),
    rule(
        &["could not find errata"],
        FaultKind::EmptySet,
        "At least one patch not found",
    ),
];

pub(crate) const CHAIN_ADD_UPGRADES: &[FaultRule] = &[
    rule(
        &["no such action chain"],
        FaultKind::EmptySet,
        "Action chain not found",
    ),
    rule(
        &["invalid package"],
        FaultKind::EmptySet,
        "At least one package upgrade not found",
    ),
];

pub(crate) const GROUP_CREATE: &[FaultRule] = &[rule(
    &["already exists"],
    FaultKind::AlreadyExists,
    "System group already exists",
)];

pub(crate) const GROUP_LOOKUP: &[FaultRule] = &[rule(
    &["unable to locate"],
    FaultKind::EmptySet,
    "System group not found",
)];

/// 按规则表归类一次调用错误
///
/// fault 文本未命中任何规则时回落到通用会话错误；
/// 传输层错误不经过规则表。
pub(crate) fn classify(err: RpcError, rules: &[FaultRule]) -> UyuniError {
    match err {
        RpcError::Fault(fault) => {
            let message = fault.message.to_lowercase();
            for rule in rules {
                if rule.needles.iter().all(|needle| message.contains(needle)) {
                    return build(rule.kind, format!("{}: {:?}", rule.label, fault.message));
                }
            }
            UyuniError::Session(format!(
                "Generic remote communication error: {:?}",
                fault.message
            ))
        }
        other => session_error(other),
    }
}

/// 无规则表的调用直接走这里
pub(crate) fn session_error(err: RpcError) -> UyuniError {
    match err {
        RpcError::Fault(fault) => UyuniError::Session(format!(
            "Generic remote communication error: {:?}",
            fault.message
        )),
        RpcError::SslVerification(message) => UyuniError::SslVerification(message),
        RpcError::Transport(message) | RpcError::Malformed(message) => {
            UyuniError::Session(message)
        }
    }
}

fn build(kind: FaultKind, message: String) -> UyuniError {
    match kind {
        FaultKind::Session => UyuniError::Session(message),
        FaultKind::EmptySet => UyuniError::EmptySet(message),
        FaultKind::CustomVariableExists => UyuniError::CustomVariableExists(message),
        FaultKind::AlreadyExists => UyuniError::AlreadyExists(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Fault;

    fn fault(message: &str) -> RpcError {
        RpcError::Fault(Fault {
            code: -1,
            message: message.to_string(),
        })
    }

    #[test]
    fn test_classify_matches_known_variant() {
        let err = classify(
            fault("Unable to locate or access server group: demo"),
            HOSTGROUP_LOOKUP,
        );
        assert!(matches!(err, UyuniError::EmptySet(_)));
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let err = classify(fault("NO SUCH SYSTEM - sorry"), SYSTEM_LOOKUP);
        assert!(matches!(err, UyuniError::EmptySet(_)));
    }

    #[test]
    fn test_classify_composite_rule_needs_all_needles() {
        // "cannot be found" 单独出现不算补丁缺失
        let err = classify(fault("the channel cannot be found"), PATCH_LOOKUP);
        assert!(matches!(err, UyuniError::Session(_)));

        let err = classify(
            fault("The patch openSUSE-2020-1001 cannot be found"),
            PATCH_LOOKUP,
        );
        assert!(matches!(err, UyuniError::EmptySet(_)));
    }

    #[test]
    fn test_classify_unmatched_fault_is_generic_session() {
        let err = classify(fault("internal server error"), INSTALL_PATCHES);
        match err {
            UyuniError::Session(message) => {
                assert!(message.contains("Generic remote communication error"))
            }
            other => panic!("expected session error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_install_patches_variants() {
        assert!(matches!(
            classify(fault("No errata to apply"), INSTALL_PATCHES),
            UyuniError::EmptySet(_)
        ));
        assert!(matches!(
            classify(fault("Invalid errata id 4711"), INSTALL_PATCHES),
            UyuniError::EmptySet(_)
        ));
        assert!(matches!(
            classify(fault("No such system 12345"), INSTALL_PATCHES),
            UyuniError::Session(_)
        ));
    }

    #[test]
    fn test_classify_custom_variable_rules() {
        assert!(matches!(
            classify(fault("Key 'owner' already exists"), CUSTOM_KEY_CREATE),
            UyuniError::CustomVariableExists(_)
        ));
        assert!(matches!(
            classify(fault("Key 'owner' does not exist"), CUSTOM_KEY_MODIFY),
            UyuniError::EmptySet(_)
        ));
        assert!(matches!(
            classify(fault("Custom info key owner was not defined"), CUSTOM_VALUE),
            UyuniError::EmptySet(_)
        ));
    }

    #[test]
    fn test_ssl_error_passes_through() {
        let err = classify(
            RpcError::SslVerification("self signed certificate".to_string()),
            SYSTEM_LOOKUP,
        );
        assert!(matches!(err, UyuniError::SslVerification(_)));
    }

    #[test]
    fn test_transport_error_becomes_session() {
        let err = session_error(RpcError::Transport("connection refused".to_string()));
        assert!(matches!(err, UyuniError::Session(_)));
    }
}
