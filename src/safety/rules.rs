//! Denylist rules applied to candidate source text

use std::sync::LazyLock;

use regex::Regex;

use crate::config::RuleSpec;
use crate::error::{OuroborosError, Result};

/// Whether a rule may be turned off through configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    /// Bypasses memory or type safety; always enforced
    Baseline,
    /// Built-in denylist entry; can be disabled by id
    Default,
    /// Supplied by configuration
    Custom,
}

/// A single denylist entry
#[derive(Debug, Clone)]
pub struct SafetyRule {
    pub id: String,
    pub description: String,
    pub class: RuleClass,
    regex: Regex,
}

impl SafetyRule {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        class: RuleClass,
        pattern: &str,
    ) -> Result<Self> {
        let id = id.into();
        let regex = Regex::new(pattern)
            .map_err(|e| OuroborosError::Config(format!("invalid pattern for safety rule '{}': {}", id, e)))?;
        Ok(Self {
            id,
            description: description.into(),
            class,
            regex,
        })
    }

    /// Build a custom rule from configuration
    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        let description = if spec.description.is_empty() {
            format!("matches denylisted pattern '{}'", spec.pattern)
        } else {
            spec.description.clone()
        };
        Self::new(spec.id.clone(), description, RuleClass::Custom, &spec.pattern)
    }

    /// Byte offset of the first match, if any
    pub fn find(&self, source: &str) -> Option<usize> {
        self.regex.find(source).map(|m| m.start())
    }
}

fn builtin(id: &str, description: &str, class: RuleClass, pattern: &str) -> SafetyRule {
    SafetyRule::new(id, description, class, pattern).expect("built-in safety pattern compiles")
}

/// Unsafe-memory rules; never disabled
pub static BASELINE_RULES: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        builtin(
            "unsafe-memory",
            "uses the unsafe keyword or package to bypass memory safety",
            RuleClass::Baseline,
            r"\bunsafe\b",
        ),
        builtin(
            "transmute",
            "reinterprets memory with transmute",
            RuleClass::Baseline,
            r"\btransmute\b",
        ),
        builtin(
            "raw-pointer",
            "declares raw pointers",
            RuleClass::Baseline,
            r"\*\s*(?:const|mut)\s",
        ),
    ]
});

/// Capability denylist enabled unless configuration disables it
pub static DEFAULT_RULES: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        builtin(
            "process-spawn",
            "spawns processes",
            RuleClass::Default,
            r#"\bstd::process\b|\bprocess::(?:Command|exit)\b|\bCommand::new\b|"os/exec"|\bsyscall\b"#,
        ),
        builtin(
            "network-access",
            "opens network connections",
            RuleClass::Default,
            r#"\bstd::net\b|\bTcp(?:Stream|Listener)\b|\bUdpSocket\b|\breqwest\b|\bhyper\b|"net(?:/http)?""#,
        ),
        builtin(
            "filesystem-write",
            "writes to the filesystem",
            RuleClass::Default,
            concat!(
                // path-qualified calls
                r"\bfs::(?:write|remove_file|remove_dir(?:_all)?|rename|create_dir(?:_all)?|copy|hard_link|soft_link|set_permissions)\b",
                // brace and glob imports, including aliases
                r"|\bfs::\{[^}]*\b(?:write|remove_file|remove_dir(?:_all)?|rename|create_dir(?:_all)?|copy|hard_link|soft_link|set_permissions|OpenOptions)\b",
                r"|\bfs::\*",
                r"|\bFile::(?:create(?:_new)?|options)\b|\bOpenOptions\b",
                r"|\.(?:write|append|create|create_new|truncate)\(\s*true\s*\)",
                r"|\bos\.(?:WriteFile|Create|Remove(?:All)?|Rename|Mkdir(?:All)?)\b",
            ),
        ),
        builtin(
            "foreign-function",
            "declares foreign functions or links native code",
            RuleClass::Default,
            r#"\bextern\s+"C"|#\[\s*link\b|#\[\s*no_mangle\b|\bimport\s+"C""#,
        ),
        builtin(
            "inline-assembly",
            "contains inline assembly",
            RuleClass::Default,
            r"\b(?:global_)?asm!\s*[\(\{\[]",
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> &'static SafetyRule {
        BASELINE_RULES
            .iter()
            .chain(DEFAULT_RULES.iter())
            .find(|r| r.id == id)
            .unwrap()
    }

    #[test]
    fn test_unsafe_memory_matches_rust_and_go() {
        let unsafe_rule = rule("unsafe-memory");
        assert!(unsafe_rule.find("fn f() { unsafe { *p = 1; } }").is_some());
        assert!(unsafe_rule.find("import \"unsafe\"").is_some());
        assert!(unsafe_rule.find("_ = unsafe.Pointer(nil)").is_some());
        assert!(unsafe_rule.find("let unsafely_named = 1;").is_none());
    }

    #[test]
    fn test_raw_pointer_and_transmute() {
        assert!(rule("raw-pointer").find("let p: *const u8 = x;").is_some());
        assert!(rule("raw-pointer").find("fn f(p: *mut i32)").is_some());
        assert!(rule("raw-pointer").find("let product = a * b;").is_none());
        assert!(rule("transmute").find("std::mem::transmute::<u32, f32>(x)").is_some());
    }

    #[test]
    fn test_default_rules() {
        assert!(rule("process-spawn").find("std::process::Command::new(\"ls\")").is_some());
        assert!(rule("process-spawn").find("import \"os/exec\"").is_some());
        assert!(rule("network-access").find("use std::net::TcpStream;").is_some());
        assert!(rule("network-access").find("import \"net/http\"").is_some());
        assert!(rule("filesystem-write").find("std::fs::write(path, data)").is_some());
        assert!(rule("filesystem-write").find("os.WriteFile(p, b, 0644)").is_some());
        assert!(rule("filesystem-write").find("std::fs::read_to_string(p)").is_none());
        assert!(rule("foreign-function").find("extern \"C\" { fn abs(x: i32) -> i32; }").is_some());
        assert!(rule("inline-assembly").find("asm!(\"nop\")").is_some());
    }

    #[test]
    fn test_filesystem_write_through_imports_and_options() {
        let fs_write = rule("filesystem-write");
        assert!(fs_write.find("use std::fs::{write};\nfn run() { write(\"/etc/x\", \"y\").ok(); }").is_some());
        assert!(fs_write.find("use std::fs::{self, write as w};").is_some());
        assert!(fs_write.find("use std::fs::{File, OpenOptions};").is_some());
        assert!(fs_write.find("use std::fs::*;").is_some());
        assert!(fs_write.find("std::fs::File::options().write(true).open(p)").is_some());
        assert!(fs_write.find("opts.append( true )").is_some());
    }

    #[test]
    fn test_filesystem_reads_are_allowed() {
        let fs_write = rule("filesystem-write");
        assert!(fs_write.find("use std::fs::{self, File};\nlet s = fs::read_to_string(p);").is_none());
        assert!(fs_write.find("let f = File::open(p)?;").is_none());
        assert!(fs_write.find("out.write_all(bytes)?; out.write(buf)?;").is_none());
    }

    #[test]
    fn test_rule_classes() {
        assert!(BASELINE_RULES.iter().all(|r| r.class == RuleClass::Baseline));
        assert!(DEFAULT_RULES.iter().all(|r| r.class == RuleClass::Default));
    }

    #[test]
    fn test_custom_rule_from_spec() {
        let spec = RuleSpec {
            id: "no-env".to_string(),
            pattern: r"\bstd::env\b".to_string(),
            description: String::new(),
        };
        let custom = SafetyRule::from_spec(&spec).unwrap();
        assert_eq!(custom.class, RuleClass::Custom);
        assert!(custom.description.contains("std::env"));
        assert_eq!(custom.find("let v = std::env::var(\"X\");"), Some(8));
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let spec = RuleSpec {
            id: "broken".to_string(),
            pattern: "(".to_string(),
            description: String::new(),
        };
        let err = SafetyRule::from_spec(&spec).unwrap_err();
        assert!(matches!(err, OuroborosError::Config(msg) if msg.contains("broken")));
    }
}
