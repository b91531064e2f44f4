//! Ouroboros Loop - safety check, compile, register
//!
//! Per call: `START -> SAFETY_CHECK -> {REJECTED_UNSAFE | COMPILE} ->
//! {COMPILE_FAILED | REGISTERED} -> END`. A failed manifest write withdraws
//! the published artifact, so the tools dir never holds an unregistered tool. Stats are updated once, after the
//! terminal branch is known, so a cancelled call leaves them untouched.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::compiler::{CompileOutcome, CompilerAdapter, Toolchain};
use crate::config::Config;
use crate::detection::{clamp_score, normalize_tool_name};
use crate::error::{OuroborosError, Result};
use crate::safety::SafetyValidator;

use super::outcome::{FailureKind, GenerationOutcome, GenerationRequest, ToolMetadata};
use super::stats::{LoopStats, LoopStatsSnapshot, Terminal};

/// Score used when a request carries a non-finite priority or confidence
const NEUTRAL_SCORE: f64 = 0.5;

pub struct Ouroboros<T: Toolchain> {
    config: Arc<Config>,
    validator: SafetyValidator,
    compiler: CompilerAdapter<T>,
    stats: LoopStats,
}

impl<T: Toolchain> Ouroboros<T> {
    pub fn new(config: Arc<Config>, toolchain: T) -> Result<Self> {
        config.validate()?;
        let validator = SafetyValidator::from_config(&config.safety)?;
        let compiler = CompilerAdapter::new(&config, toolchain);
        Ok(Self {
            config,
            validator,
            compiler,
            stats: LoopStats::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        self.compiler.toolchain()
    }

    /// Current counters; never mutates them
    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.snapshot()
    }

    /// Validate, compile and register one candidate tool.
    ///
    /// Every terminal branch is an `Ok` outcome with a stage-prefixed message
    /// and exactly one stats update. A name that normalizes to nothing can't
    /// be published and is reported as an infrastructure failure once the
    /// safety check has passed. `Err` is returned only on cancellation, which
    /// leaves the stats untouched.
    pub async fn generate_tool_from_code(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome> {
        if cancel.is_cancelled() {
            return Err(OuroborosError::Cancelled);
        }

        let dry_run = request.dry_run.unwrap_or(self.config.tools.dry_run);
        let normalized = normalize_tool_name(&request.name);
        let name = normalized.clone().unwrap_or_else(|| request.name.trim().to_string());
        log::info!("Generating tool {:?} (dry_run={})", name, dry_run);

        if let Err(violation) = self.validator.check(&request.source_code) {
            self.stats.record(Terminal::SafetyViolation);
            tracing::warn!(tool = %name, rule = %violation.rule_id, line = violation.line, "Candidate rejected by safety check");
            return Ok(GenerationOutcome::rejected_unsafe(&violation));
        }

        let mut metadata = ToolMetadata::new(
            &name,
            request.purpose,
            clamp_score(request.priority, NEUTRAL_SCORE),
            clamp_score(request.confidence, NEUTRAL_SCORE),
            hex::encode(Sha256::digest(request.source_code.as_bytes())),
        );

        if dry_run {
            metadata.dry_run = true;
            self.stats.record(Terminal::Success);
            tracing::info!(tool = %name, "Dry run passed safety check");
            return Ok(GenerationOutcome::registered(metadata));
        }

        let Some(name) = normalized else {
            let error = OuroborosError::InvalidInput(format!("unusable tool name '{}'", request.name));
            return Ok(self.infrastructure_failure(&name, error));
        };

        let compiled = match self.compiler.compile(&name, &request.source_code, cancel).await {
            Ok(compiled) => compiled,
            Err(OuroborosError::Cancelled) => {
                log::info!("Generation of {} cancelled", name);
                return Err(OuroborosError::Cancelled);
            }
            Err(e) => return Ok(self.infrastructure_failure(&name, e)),
        };

        match compiled {
            CompileOutcome::Failed { diagnostics } => {
                self.stats.record(Terminal::CompilationFailure);
                tracing::warn!(tool = %name, "Candidate failed to compile");
                log::debug!("Diagnostics for {}:\n{}", name, diagnostics);
                Ok(GenerationOutcome::compile_failed(FailureKind::Compilation, diagnostics))
            }
            CompileOutcome::Built {
                source_path,
                artifact_path,
            } => {
                metadata.source_path = Some(source_path);
                metadata.artifact_path = Some(artifact_path);
                if let Err(e) = self.write_manifest(&metadata) {
                    self.compiler.unpublish(&name).await;
                    return Ok(self.infrastructure_failure(&name, e));
                }
                self.stats.record(Terminal::Success);
                tracing::info!(tool = %name, artifact = ?metadata.artifact_path, "Tool registered");
                Ok(GenerationOutcome::registered(metadata))
            }
        }
    }

    fn infrastructure_failure(&self, name: &str, error: OuroborosError) -> GenerationOutcome {
        self.stats.record(Terminal::CompilationFailure);
        tracing::error!(tool = %name, error = %error, "Build infrastructure failure");
        GenerationOutcome::compile_failed(FailureKind::Infrastructure, error.to_string())
    }

    /// Write `<name>.json` next to the artifact, replacing any previous manifest
    fn write_manifest(&self, metadata: &ToolMetadata) -> Result<PathBuf> {
        let path = self.config.tools.dir.join(format!("{}.json", metadata.name));
        let mut staged = tempfile::Builder::new()
            .prefix(&format!("{}-", metadata.name))
            .suffix(".json")
            .tempfile_in(self.config.staging_dir())?;
        serde_json::to_writer_pretty(staged.as_file_mut(), metadata)?;
        staged.persist(&path).map_err(|e| OuroborosError::Io(e.error))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::MockToolchain;
    use crate::config::SafetyConfig;
    use tempfile::TempDir;

    const BENIGN: &str = "pub fn run(input: &str) -> Result<String, String> { Ok(input.to_uppercase()) }";
    const GO_UNSAFE: &str = "package tools; import \"unsafe\"; func Unsafe() { _ = unsafe.Pointer(nil) }";

    fn ouroboros(temp: &TempDir, toolchain: MockToolchain) -> Ouroboros<MockToolchain> {
        Ouroboros::new(Arc::new(Config::with_tools_dir(temp.path())), toolchain).unwrap()
    }

    fn tools_dir_entries(temp: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(temp.path())
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| n != ".staging")
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_unsafe_code_rejected_before_compile() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("unsafe_tool", "p", GO_UNSAFE), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error_message.starts_with("safety check failed: "));
        assert_eq!(outcome.failure, Some(FailureKind::Safety));
        assert_eq!(loop_.toolchain().build_count(), 0);
        assert_eq!(
            loop_.stats(),
            LoopStatsSnapshot {
                total_attempts: 1,
                safety_violations: 1,
                compilation_failures: 0,
                successes: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_successful_build_registers_tool() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());
        let request = GenerationRequest::new("Upper Caser", "upper-case input", BENIGN)
            .with_priority(0.7)
            .with_confidence(0.9);

        let outcome = loop_
            .generate_tool_from_code(request, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.error_message.is_empty());
        let metadata = outcome.metadata.unwrap();
        assert_eq!(metadata.name, "upper_caser");
        assert_eq!(metadata.purpose, "upper-case input");
        assert_eq!(metadata.priority, 0.7);
        assert_eq!(metadata.confidence, 0.9);
        assert_eq!(metadata.source_sha256.len(), 64);
        assert!(!metadata.dry_run);
        assert_eq!(outcome.artifact_path, metadata.artifact_path);
        assert!(outcome.artifact_path.unwrap().exists());

        let manifest: ToolMetadata =
            serde_json::from_str(&std::fs::read_to_string(temp.path().join("upper_caser.json")).unwrap()).unwrap();
        assert_eq!(manifest.source_sha256, metadata.source_sha256);
        assert_eq!(loop_.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_compile_failure_counts_and_reports_diagnostics() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::failing("error[E0308]: mismatched types"));

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("bad", "p", BENIGN), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_message, "compilation failed: error[E0308]: mismatched types");
        assert_eq!(outcome.failure, Some(FailureKind::Compilation));
        assert!(outcome.metadata.is_none());
        assert!(tools_dir_entries(&temp).is_empty());
        let stats = loop_.stats();
        assert_eq!(stats.compilation_failures, 1);
        assert_eq!(stats.safety_violations, 0);
        assert_eq!(stats.total_attempts, 1);
    }

    #[tokio::test]
    async fn test_infrastructure_failure_uses_compilation_channel() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::default().then_unavailable("rustc: command not found"));

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("tool", "p", BENIGN), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.error_message.starts_with("compilation failed: "));
        assert!(outcome.error_message.contains("rustc: command not found"));
        assert_eq!(outcome.failure, Some(FailureKind::Infrastructure));
        assert_eq!(loop_.stats().compilation_failures, 1);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let tools_dir = temp.path().join("tools");
        let config = Arc::new(Config::with_tools_dir(&tools_dir));
        let loop_ = Ouroboros::new(config, MockToolchain::passing()).unwrap();

        let outcome = loop_
            .generate_tool_from_code(
                GenerationRequest::new("dry", "p", BENIGN).with_dry_run(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.artifact_path.is_none());
        assert!(outcome.metadata.unwrap().dry_run);
        assert_eq!(loop_.toolchain().build_count(), 0);
        assert!(!tools_dir.exists());
        assert_eq!(loop_.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_dry_run_default_from_config() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_tools_dir(temp.path());
        config.tools.dry_run = true;
        let loop_ = Ouroboros::new(Arc::new(config), MockToolchain::passing()).unwrap();

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("dry", "p", BENIGN), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(loop_.toolchain().build_count(), 0);

        let outcome = loop_
            .generate_tool_from_code(
                GenerationRequest::new("wet", "p", BENIGN).with_dry_run(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(loop_.toolchain().build_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_still_rejects_unsafe_code() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());

        let outcome = loop_
            .generate_tool_from_code(
                GenerationRequest::new("t", "p", GO_UNSAFE).with_dry_run(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.is_safety_failure());
        assert_eq!(loop_.stats().safety_violations, 1);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_stats_untouched() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(
            &temp,
            MockToolchain::passing().with_delay(std::time::Duration::from_secs(5)),
        );
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = loop_
            .generate_tool_from_code(GenerationRequest::new("slow", "p", BENIGN), &cancel)
            .await;

        assert!(matches!(result, Err(OuroborosError::Cancelled)));
        assert_eq!(loop_.stats(), LoopStatsSnapshot::default());
        assert!(tools_dir_entries(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_unusable_name_counts_as_infrastructure_failure() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("../..", "p", BENIGN), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.error_message.starts_with("compilation failed: "));
        assert!(outcome.error_message.contains("unusable tool name"));
        assert_eq!(outcome.failure, Some(FailureKind::Infrastructure));
        assert_eq!(loop_.toolchain().build_count(), 0);
        let stats = loop_.stats();
        assert_eq!((stats.total_attempts, stats.compilation_failures), (1, 1));
        assert!(tools_dir_entries(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_code_with_empty_name_is_safety_violation() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("", "p", GO_UNSAFE), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.is_safety_failure());
        let stats = loop_.stats();
        assert_eq!((stats.total_attempts, stats.safety_violations), (1, 1));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_need_usable_name() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());

        let outcome = loop_
            .generate_tool_from_code(
                GenerationRequest::new("  ", "p", BENIGN).with_dry_run(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.metadata.unwrap().dry_run);
        assert_eq!(loop_.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_manifest_failure_withdraws_artifact() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());
        std::fs::create_dir_all(temp.path().join("blocked.json").join("occupied")).unwrap();

        let outcome = loop_
            .generate_tool_from_code(GenerationRequest::new("blocked", "p", BENIGN), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.error_message.starts_with("compilation failed: "));
        assert_eq!(outcome.failure, Some(FailureKind::Infrastructure));
        assert_eq!(loop_.toolchain().build_count(), 1);
        assert_eq!(loop_.stats().compilation_failures, 1);
        assert_eq!(tools_dir_entries(&temp), vec!["blocked.json"]);
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());
        let request = GenerationRequest::new("t", "p", BENIGN)
            .with_priority(3.0)
            .with_confidence(f64::NAN)
            .with_dry_run(true);

        let metadata = loop_
            .generate_tool_from_code(request, &CancellationToken::new())
            .await
            .unwrap()
            .metadata
            .unwrap();

        assert_eq!(metadata.priority, 1.0);
        assert_eq!(metadata.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_same_name_last_writer_wins() {
        let temp = TempDir::new().unwrap();
        let loop_ = ouroboros(&temp, MockToolchain::passing());
        let second = "pub fn run(input: &str) -> Result<String, String> { Ok(input.to_lowercase()) }";

        for source in [BENIGN, second] {
            let outcome = loop_
                .generate_tool_from_code(GenerationRequest::new("caser", "p", source), &CancellationToken::new())
                .await
                .unwrap();
            assert!(outcome.success);
        }

        assert_eq!(std::fs::read_to_string(temp.path().join("caser.rs")).unwrap(), second);
        assert_eq!(loop_.stats().successes, 2);
    }

    #[test]
    fn test_new_rejects_invalid_safety_config() {
        let mut config = Config::default();
        config.safety = SafetyConfig {
            disabled_rules: vec!["unsafe-memory".to_string()],
            ..Default::default()
        };
        assert!(Ouroboros::new(Arc::new(config), MockToolchain::passing()).is_err());
    }
}
