use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar};

use readqc::analysis::{AnalysisListener, AnalysisQueue};
use readqc::cli::Args;
use readqc::config::QcConfig;
use readqc::error::QcError;
use readqc::modules::{self, QcModule};
use readqc::progress::percent_bar;
use readqc::report::{summary, write_archive, BufferSink};
use readqc::seq::{casava_basename, open_source, SequenceSource, SourceGroup};

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.to_config();
    let queue = AnalysisQueue::new(config.slots());
    let observer: Arc<CliObserver> = Arc::new(CliObserver::new(config.quiet));

    for source in open_all_sources(&args.files, &config)? {
        queue.enqueue(source, modules::battery(&config), vec![observer.clone()]);
    }

    queue.wait_idle();

    let failures = observer.failures();
    if failures > 0 {
        anyhow::bail!("{} of {} analyses failed", failures, args.files.len());
    }
    Ok(())
}

/// One source per file, except in Casava mode where files sharing a split
/// stem are merged into a single grouped source.
fn open_all_sources(
    files: &[PathBuf],
    config: &QcConfig,
) -> anyhow::Result<Vec<Box<dyn SequenceSource>>> {
    if !config.casava {
        return files.iter().map(|f| Ok(open_source(f, config)?)).collect();
    }

    let mut grouped: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = match casava_basename(&file_name) {
            Ok(stem) => stem,
            Err(e) => {
                log::warn!("{}: {}; analysing the file on its own", file_name, e);
                file_name
            }
        };
        grouped.entry(stem).or_default().push(file.clone());
    }

    let mut sources: Vec<Box<dyn SequenceSource>> = Vec::with_capacity(grouped.len());
    for members in grouped.into_values() {
        let opened = members
            .iter()
            .map(|f| open_source(f, config))
            .collect::<Result<Vec<_>, _>>()?;
        let mut opened = opened;
        if opened.len() == 1 {
            sources.push(opened.remove(0));
        } else {
            sources.push(Box::new(SourceGroup::new(opened)));
        }
    }
    Ok(sources)
}

/// Terminal-facing observer: progress bars while analyses run, report and
/// summary files when they complete.
struct CliObserver {
    progress: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    quiet: bool,
    failed: AtomicUsize,
}

impl CliObserver {
    fn new(quiet: bool) -> CliObserver {
        CliObserver {
            progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            quiet,
            failed: AtomicUsize::new(0),
        }
    }

    fn failures(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn take_bar(&self, source_name: &str) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(source_name)
    }

    fn write_reports(&self, source_name: &str, modules: &[Box<dyn QcModule>]) -> anyhow::Result<()> {
        let stem = source_name
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(source_name);

        let mut sink = BufferSink::new();
        write_archive(&mut sink, modules)?;
        fs::write(format!("{}_qc_data.txt", stem), sink.data_document())?;
        fs::write(
            format!("{}_qc_summary.txt", stem),
            summary(modules, source_name),
        )?;
        Ok(())
    }
}

impl AnalysisListener for CliObserver {
    fn analysis_started(&self, source_name: &str) {
        if self.quiet {
            return;
        }
        match percent_bar(source_name.to_string()) {
            Ok(bar) => {
                let bar = self.progress.add(bar);
                self.bars
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(source_name.to_string(), bar);
            }
            Err(e) => log::warn!("no progress bar for {}: {}", source_name, e),
        }
    }

    fn analysis_progress(&self, source_name: &str, _records: u64, percent: f64) {
        let bars = self.bars.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(bar) = bars.get(source_name) {
            // Byte-estimate sources can legitimately report past 100.
            bar.set_position(percent.clamp(0.0, 100.0) as u64);
        }
    }

    fn analysis_complete(&self, source_name: &str, modules: &[Box<dyn QcModule>]) {
        if let Some(bar) = self.take_bar(source_name) {
            bar.finish_with_message(format!("{} done", source_name));
        }
        if let Err(e) = self.write_reports(source_name, modules) {
            log::error!("could not write report for {}: {}", source_name, e);
            self.failed.fetch_add(1, Ordering::SeqCst);
            return;
        }
        if !self.quiet {
            print!("{}", summary(modules, source_name));
        }
    }

    fn analysis_error(&self, source_name: &str, error: &QcError) {
        if let Some(bar) = self.take_bar(source_name) {
            bar.abandon_with_message(format!("{} failed", source_name));
        }
        eprintln!("Failed to process {}: {}", source_name, error);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}
