use crate::values::pascal_case;

/// Core synth state handed to every construct's `config` function.
///
/// Constructs are "modules": the composing stack sets the current module name
/// before invoking a construct, and the construct derives the logical ids of
/// everything it creates from that name. Warnings are collected here rather
/// than failing the synth, and are reported once the template is built.
#[derive(Debug, Default)]
pub struct L0Core {
    compiler_warning_messages: Vec<String>,
    current_module_name: String,
}

impl L0Core {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_module(&mut self, name: &str) {
        self.current_module_name = name.to_string();
    }

    pub fn users_module_name(&self) -> String {
        self.current_module_name.clone()
    }

    /// the logical id for a resource created by the current module.
    /// `site_bucket` with suffix `Policy` becomes `SiteBucketPolicy`.
    pub fn logical_name(&self, suffix: &str) -> String {
        logical_name_for(&self.current_module_name, suffix)
    }

    pub fn compiler_warning(&mut self, msg: &str) {
        let msg = if self.current_module_name.is_empty() {
            msg.to_string()
        } else {
            format!("{}: {}", self.current_module_name, msg)
        };
        self.compiler_warning_messages.push(msg);
    }

    pub fn warnings(&self) -> &[String] {
        &self.compiler_warning_messages
    }
}

/// same as [`L0Core::logical_name`] but for a module other than the current one.
/// useful when a construct must reference a resource that is created later.
pub fn logical_name_for(module_name: &str, suffix: &str) -> String {
    format!("{}{}", pascal_case(module_name), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_names_follow_the_current_module() {
        let mut core = L0Core::new();
        core.set_current_module("site_bucket");
        assert_eq!(core.logical_name(""), "SiteBucket");
        assert_eq!(core.logical_name("Policy"), "SiteBucketPolicy");
        core.set_current_module("preview_bucket");
        assert_eq!(core.logical_name(""), "PreviewBucket");
    }

    #[test]
    fn warnings_are_prefixed_with_the_module() {
        let mut core = L0Core::new();
        core.compiler_warning("global");
        core.set_current_module("deploy_role");
        core.compiler_warning("broad grant");
        assert_eq!(core.warnings(), &["global".to_string(), "deploy_role: broad grant".to_string()]);
    }
}
