//! Sequential install and check workflows over a resolved manifest.
//!
//! Every descriptor is processed to completion before the next one starts:
//!
//! ```text
//! Bound → Downloaded → Extracted → Normalized → Materialized
//!   └──────────────┴────────────┴────────────┴──→ Failed
//! ```
//!
//! A failure only ends its own descriptor. Errors are collected into the
//! returned [`PipelineReport`] and the run carries on with the next entry.
//!
//! Repository-backed descriptors sharing a repository are fetched and
//! checked out once, when the first of them is reached, and every target of
//! the group is installed from that one checkout.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::archive::hotfix;
use crate::config::PipelineConfig;
use crate::download::{
    bind_source, GitSource, HttpClient, ModSource, ReqwestClient, SourceContext,
};
use crate::error::{ModError, ModResult};
use crate::hash::ProgressCallback;
use crate::install::Materializer;
use crate::report::{Diagnostic, ModState, PipelineReport};
use crate::resolver::{GitResourceGroup, ModDescriptor, ModKind, Resolution};

/// Called on every state transition with the mod name.
pub type StateCallback = Box<dyn Fn(&str, ModState) + Send + Sync>;

const SCRATCH_PREFIX: &str = "modforge-install-";

/// Drives descriptors through download, extraction and installation.
pub struct Pipeline {
    cache_dir: PathBuf,
    sources: SourceContext,
    materializer: Materializer,
    use_cache: bool,
    on_state: Option<StateCallback>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("cache_dir", &self.cache_dir)
            .field("sources", &self.sources)
            .field("materializer", &self.materializer)
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline using the given HTTP client for every request.
    pub fn new(config: &PipelineConfig, client: Arc<dyn HttpClient>) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            sources: SourceContext::from_config(config, client),
            materializer: Materializer::new(config.mods_dir.clone()),
            use_cache: true,
            on_state: None,
        }
    }

    /// Create a pipeline with a blocking HTTP client built from `config`.
    pub fn from_config(config: &PipelineConfig) -> ModResult<Self> {
        let client = ReqwestClient::from_config(config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Reuse cached archives whose checksum still matches (default: on).
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Report `(bytes_done, bytes_total)` of downloads and verifications.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.sources = self.sources.with_progress(progress);
        self
    }

    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.on_state = Some(callback);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    fn transition(&self, name: &str, state: ModState) {
        tracing::debug!(mod_name = %name, state = state.name(), "State change");
        if let Some(callback) = &self.on_state {
            callback(name, state);
        }
    }

    fn finish(&self, report: &mut PipelineReport, name: &str, state: ModState) {
        self.transition(name, state);
        report.record(name, state);
    }

    fn fail(&self, report: &mut PipelineReport, name: &str, error: &ModError) {
        self.transition(name, ModState::Failed);
        report.fail(name, error);
    }

    /// Install every descriptor in order.
    ///
    /// Outcomes follow manifest order, except that every target of a
    /// repository group is reported where the group's first target appears.
    pub fn install(&self, resolution: &Resolution) -> PipelineReport {
        let mut report = PipelineReport::new();
        report.diagnostics.extend(resolution.diagnostics.iter().cloned());

        let groups = resolution.git_groups();
        let mut fetched: HashSet<&str> = HashSet::new();

        tracing::info!(
            mods = resolution.descriptors.len(),
            repositories = groups.len(),
            "Installing mods"
        );

        for descriptor in &resolution.descriptors {
            match descriptor.kind {
                ModKind::Separator => {
                    match self.materializer.install_separator(descriptor) {
                        Ok(()) => self.finish(&mut report, &descriptor.name, ModState::Materialized),
                        Err(e) => self.fail(&mut report, &descriptor.name, &e),
                    }
                }
                ModKind::GitResource => {
                    let group = descriptor
                        .repository
                        .as_deref()
                        .and_then(|r| groups.iter().find(|g| g.repository == r));
                    match group {
                        Some(group) => {
                            if fetched.insert(group.repository.as_str()) {
                                self.install_group(group, &mut report);
                            }
                        }
                        None => {
                            let error = ModError::InvalidUrl(format!(
                                "no repository for {}",
                                descriptor.content_url
                            ));
                            self.fail(&mut report, &descriptor.name, &error);
                        }
                    }
                }
                ModKind::Default | ModKind::GalleryHosted => {
                    match self.install_archive(descriptor) {
                        Ok(diagnostics) => {
                            for diagnostic in diagnostics {
                                report.warn(diagnostic);
                            }
                            self.finish(&mut report, &descriptor.name, ModState::Materialized);
                        }
                        Err(e) => self.fail(&mut report, &descriptor.name, &e),
                    }
                }
            }
        }

        tracing::info!(
            installed = report.with_state(ModState::Materialized).len(),
            failed = report.errors.len(),
            "Install finished"
        );
        report
    }

    fn install_archive(&self, descriptor: &ModDescriptor) -> ModResult<Vec<Diagnostic>> {
        let name = descriptor.name.as_str();
        let mut source = bind_source(descriptor, &self.sources)?.ok_or_else(|| {
            ModError::InvalidUrl(format!("{} has no download URL", name))
        })?;
        self.transition(name, ModState::Bound);

        tracing::info!(mod_name = %name, kind = %descriptor.kind, "Installing mod");
        let archive = source.download(&self.cache_dir, self.use_cache, None)?;
        self.transition(name, ModState::Downloaded);

        let scratch = scratch_dir()?;
        source.extract(scratch.path())?;
        self.transition(name, ModState::Extracted);

        hotfix::apply_all(scratch.path())?;
        self.transition(name, ModState::Normalized);

        self.materializer
            .install(descriptor, scratch.path(), &file_name(&archive))
    }

    fn install_group(&self, group: &GitResourceGroup, report: &mut PipelineReport) {
        tracing::info!(
            repository = %group.repository,
            targets = group.targets.len(),
            "Installing repository resources"
        );

        let (checkout, installation_file) = match self.fetch_group(group) {
            Ok(fetched) => fetched,
            Err(e) => {
                for target in &group.targets {
                    self.fail(report, &target.name, &e);
                }
                return;
            }
        };

        for target in &group.targets {
            match self
                .materializer
                .install_git_target(target, checkout.path(), &installation_file)
            {
                Ok(()) => self.finish(report, &target.name, ModState::Materialized),
                Err(e) => self.fail(report, &target.name, &e),
            }
        }
    }

    /// Fetch a repository once and check it out into a scratch directory.
    fn fetch_group(&self, group: &GitResourceGroup) -> ModResult<(TempDir, String)> {
        let each = |state| {
            for target in &group.targets {
                self.transition(&target.name, state);
            }
        };

        let mut source = GitSource::from_url(&group.repository, self.sources.git_binary.clone())?;
        each(ModState::Bound);

        source.download(&self.cache_dir, self.use_cache, None)?;
        each(ModState::Downloaded);

        let scratch = scratch_dir()?;
        source.extract(scratch.path())?;
        each(ModState::Extracted);

        hotfix::apply_all(scratch.path())?;
        each(ModState::Normalized);

        Ok((scratch, source.installation_file()))
    }

    /// Verify every cached artifact without installing.
    ///
    /// With `refresh`, missing or stale artifacts are fetched again;
    /// otherwise each discrepancy becomes an error in the report. A
    /// repository shared by several descriptors is checked once.
    pub fn check(&self, resolution: &Resolution, refresh: bool) -> PipelineReport {
        let mut report = PipelineReport::new();
        report.diagnostics.extend(resolution.diagnostics.iter().cloned());

        let mut repositories: HashMap<String, Result<(), String>> = HashMap::new();

        for descriptor in &resolution.descriptors {
            let name = descriptor.name.as_str();

            let result = match (&descriptor.kind, descriptor.repository.as_ref()) {
                (ModKind::GitResource, Some(repository)) => repositories
                    .entry(repository.clone())
                    .or_insert_with(|| self.check_one(descriptor, refresh).map_err(|e| e.to_string()))
                    .clone(),
                _ => self.check_one(descriptor, refresh).map_err(|e| e.to_string()),
            };

            match result {
                Ok(()) => self.finish(&mut report, name, ModState::Verified),
                Err(error) => {
                    self.transition(name, ModState::Failed);
                    report.fail(name, error);
                }
            }
        }

        tracing::info!(
            verified = report.with_state(ModState::Verified).len(),
            failed = report.errors.len(),
            "Check finished"
        );
        report
    }

    fn check_one(&self, descriptor: &ModDescriptor, refresh: bool) -> ModResult<()> {
        let Some(mut source) = bind_source(descriptor, &self.sources)? else {
            tracing::debug!(mod_name = %descriptor.name, "Nothing to check");
            return Ok(());
        };
        self.transition(&descriptor.name, ModState::Bound);
        source.check(&self.cache_dir, refresh)
    }
}

fn scratch_dir() -> ModResult<TempDir> {
    tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|e| ModError::CreateDirFailed {
            path: std::env::temp_dir(),
            source: e,
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
