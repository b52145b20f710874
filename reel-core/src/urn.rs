//! Urn helpers
//!
//! Every entity is addressed by an urn of the shape `urn:<namespace>:<rest>`.
//! Entities created by this system live under the `urn:reel:` namespace,
//! plugins carry their type in a `plugin:<type>:` segment.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

/// Namespace prefix for urns generated by this system
pub const URN_BASE: &str = "urn:reel:";

static URN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^urn:[a-z0-9][a-z0-9-]{0,31}:[a-z0-9()+,\-.:=@;$_!*'%/?#]+$").unwrap()
});

static PLUGIN_URN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^urn:[a-z0-9][a-z0-9-]{0,31}:plugin:(?<type>[^:]+):.+$").unwrap());

/// Check that `urn` is well formed
pub fn is_valid(urn: &str) -> bool {
    URN_PATTERN.is_match(urn)
}

/// Check that `urn` is well formed and lives under `urn:reel:<segment>`
///
/// # Arguments
/// * `urn` - The urn to check
/// * `segment` - Entity segment, e.g. `"job:"`
pub fn validate_urn(urn: &str, segment: &str) -> bool {
    is_valid(urn)
        && urn
            .strip_prefix(URN_BASE)
            .is_some_and(|rest| rest.starts_with(segment))
}

/// Check that `urn` is a well formed plugin urn
pub fn is_plugin_urn(urn: &str) -> bool {
    is_valid(urn) && PLUGIN_URN_PATTERN.is_match(urn)
}

/// Extract the plugin type from `urn:<ns>:plugin:<type>:<instance>`
pub fn plugin_type_from_urn(urn: &str) -> Option<&str> {
    PLUGIN_URN_PATTERN
        .captures(urn)
        .and_then(|caps| caps.name("type"))
        .map(|m| m.as_str())
}

/// Build a fresh urn for an entity segment (`job`, `task`, `plan`)
pub fn new_urn(segment: &str, id: Uuid) -> String {
    format!("{}{}:{}", URN_BASE, segment, id)
}

/// Build a plugin urn for an instance of `plugin_type`
pub fn plugin_urn(plugin_type: &str, instance: &str) -> String {
    format!("{}plugin:{}:{}", URN_BASE, plugin_type, instance)
}
