use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_store};
use crate::convo::adapters::TranscriptAdapter;
use crate::convo::config::load_config;
use crate::convo::import::{
    ImportOptions as DirectoryOptions, ImportSummary, SourceKind, import_directory,
    import_history_export, import_single_file,
};
use crate::convo::noise::NoiseProfile;
use crate::convo::paths::resolve_paths;

#[derive(Debug, Clone)]
pub enum ImportTarget {
    Directory {
        source: SourceKind,
        dir: Option<PathBuf>,
    },
    File {
        path: PathBuf,
        session_key: Option<String>,
    },
    History {
        path: PathBuf,
        session_key: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub target: ImportTarget,
    pub channel: Option<String>,
    pub dry_run: bool,
}

fn noise_profile(target: &ImportTarget) -> NoiseProfile {
    match target {
        ImportTarget::Directory {
            source: SourceKind::Feishu,
            ..
        } => NoiseProfile::Feishu,
        _ => NoiseProfile::General,
    }
}

fn summarize(report: &mut CommandReport, summary: &ImportSummary) -> Result<()> {
    for file in &summary.files {
        if file.error.is_some() {
            report.issue(file.render());
        } else {
            report.detail(file.render());
        }
    }
    report.detail(format!(
        "files scanned={} selected={} failed={}",
        summary.scanned_files, summary.selected_files, summary.failed_files
    ));
    report.detail(format!(
        "imported={} skipped={} final_count={}{}",
        summary.imported,
        summary.skipped,
        summary.final_count,
        if summary.dry_run { " (dry-run)" } else { "" }
    ));
    report.set_data(summary)
}

pub fn run(opts: &ImportOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("import");

    let channel = opts
        .channel
        .clone()
        .unwrap_or_else(|| cfg.import.default_channel.clone());
    let canonicalizer = cfg.canonicalizer(noise_profile(&opts.target))?;
    let adapter = TranscriptAdapter::new(&canonicalizer, &channel);

    let summary = match &opts.target {
        ImportTarget::Directory { source, dir } => {
            let dir = dir.clone().unwrap_or_else(|| paths.openclaw_sessions_dir.clone());
            report.detail(format!("source={} dir={}", source.label(), dir.display()));
            if !dir.is_dir() {
                report.issue(format!("sessions dir does not exist: {}", dir.display()));
                return Ok(report);
            }
            let dir_opts = DirectoryOptions {
                source: *source,
                sniff_bytes: cfg.import.sniff_bytes,
                dry_run: opts.dry_run,
            };
            import_directory(&mut store, &adapter, &dir, &dir_opts)?
        }
        ImportTarget::File { path, session_key } => {
            report.detail(format!("source=file path={}", path.display()));
            import_single_file(
                &mut store,
                &adapter,
                path,
                session_key.as_deref(),
                opts.dry_run,
            )?
        }
        ImportTarget::History { path, session_key } => {
            report.detail(format!("source=history path={}", path.display()));
            import_history_export(
                &mut store,
                &adapter,
                path,
                session_key.as_deref(),
                opts.dry_run,
            )?
        }
    };

    summarize(&mut report, &summary)?;
    Ok(report)
}
