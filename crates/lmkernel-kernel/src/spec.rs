//! Kernel metadata: the kernel spec a host lists, and the info reply a kernel gives.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lmkernel_core::config::KernelConfig;

use crate::protocol::{KernelInfoReply, LanguageInfo, PROTOCOL_VERSION, ReplyStatus};

/// Implementation name reported in `kernel_info_reply`.
pub const IMPLEMENTATION: &str = "lmkernel";

/// Metadata a host uses to list and launch a kernel (`kernel.json` shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Registry key; not part of `kernel.json`.
    #[serde(skip)]
    pub name: String,
    pub display_name: String,
    pub language: String,
    /// Launch arguments. Empty for kernels started in-process by a registry.
    pub argv: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl KernelSpec {
    pub fn from_config(config: &KernelConfig) -> Self {
        Self {
            name: config.name.clone(),
            display_name: config.display_name.clone(),
            language: config.language.clone(),
            argv: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// The static `kernel_info_reply` for kernels launched from this spec.
    pub fn kernel_info(&self) -> KernelInfoReply {
        KernelInfoReply {
            status: ReplyStatus::Ok,
            protocol_version: PROTOCOL_VERSION.to_string(),
            implementation: IMPLEMENTATION.to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            language_info: LanguageInfo {
                name: self.language.clone(),
                version: "1.0".to_string(),
                mimetype: "text/plain".to_string(),
                file_extension: ".txt".to_string(),
            },
            banner: format!("{}: prompts are sent to an on-device language model", self.display_name),
            help_links: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_serialises_to_kernel_json() {
        let spec = KernelSpec::from_config(&KernelConfig::default());
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "display_name": "On-device Language Model",
                "language": "text",
                "argv": [],
                "metadata": {}
            })
        );
    }

    #[test]
    fn kernel_info_is_plain_text() {
        let info = KernelSpec::from_config(&KernelConfig::default()).kernel_info();
        assert_eq!(info.protocol_version, "5.3");
        assert_eq!(info.implementation, "lmkernel");
        assert_eq!(info.language_info.mimetype, "text/plain");
        assert!(info.help_links.is_empty());
    }
}
