use std::sync::Arc;

use crate::error::QcError;
use crate::modules::QcModule;
use crate::seq::SequenceSource;

/// Observer of one analysis task's lifecycle. Every observer sees
/// `analysis_started` once and then exactly one of `analysis_complete` or
/// `analysis_error`, with any number of progress events in between.
pub trait AnalysisListener: Send + Sync {
    fn analysis_started(&self, source_name: &str);

    fn analysis_progress(&self, source_name: &str, records: u64, percent: f64);

    /// The task finished cleanly. The module battery is finalized; reading
    /// results from it is safe from any number of observers.
    fn analysis_complete(&self, source_name: &str, modules: &[Box<dyn QcModule>]);

    fn analysis_error(&self, source_name: &str, error: &QcError);
}

/// Runs one record source to exhaustion through one module battery,
/// fanning lifecycle events out to the attached listeners.
pub struct AnalysisRunner {
    listeners: Vec<Arc<dyn AnalysisListener>>,
}

/// Progress is reported every time percent-complete advances by this much
/// past the last reported value.
const PROGRESS_STEP: f64 = 5.0;

impl AnalysisRunner {
    pub fn new() -> AnalysisRunner {
        AnalysisRunner {
            listeners: Vec::new(),
        }
    }

    pub fn with_listeners(listeners: Vec<Arc<dyn AnalysisListener>>) -> AnalysisRunner {
        AnalysisRunner { listeners }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn AnalysisListener>) {
        self.listeners.push(listener);
    }

    /// Drive the source to exhaustion. Decode failures stop this task
    /// only; the partial battery still carries everything accumulated up
    /// to the failure, but no completion event is sent for it.
    pub fn run(
        &self,
        mut source: Box<dyn SequenceSource>,
        mut modules: Vec<Box<dyn QcModule>>,
    ) -> Vec<Box<dyn QcModule>> {
        let name = source.name().to_string();

        for listener in &self.listeners {
            listener.analysis_started(&name);
        }

        let mut records = 0u64;
        let mut last_reported = 0.0f64;

        while source.has_next() {
            let record = match source.next_record() {
                Ok(record) => record,
                Err(error) => {
                    log::error!("analysis of {} failed: {}", name, error);
                    for listener in &self.listeners {
                        listener.analysis_error(&name, &error);
                    }
                    return modules;
                }
            };
            records += 1;

            for module in modules.iter_mut() {
                if record.filtered && module.ignores_filtered() {
                    continue;
                }
                module.process_sequence(&record);
            }

            let percent = source.percent_complete();
            if percent - last_reported >= PROGRESS_STEP {
                last_reported = percent;
                for listener in &self.listeners {
                    listener.analysis_progress(&name, records, percent);
                }
            }
        }

        for listener in &self.listeners {
            listener.analysis_complete(&name, &modules);
        }
        modules
    }
}

impl Default for AnalysisRunner {
    fn default() -> Self {
        AnalysisRunner::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::{QcError, Result};
    use crate::modules::BasicStats;
    use crate::report::BufferSink;
    use crate::seq::{SeqRecord, SequenceSource};

    pub(crate) struct ScriptedSource {
        name: String,
        records: Vec<Result<SeqRecord>>,
        delivered: usize,
        total: usize,
    }

    impl ScriptedSource {
        pub(crate) fn new(name: &str, records: Vec<Result<SeqRecord>>) -> ScriptedSource {
            let total = records.len();
            ScriptedSource {
                name: name.to_string(),
                records,
                delivered: 0,
                total,
            }
        }

        fn ok_records(name: &str, count: usize) -> ScriptedSource {
            let records = (0..count)
                .map(|i| {
                    Ok(SeqRecord::new(
                        std::sync::Arc::from(name),
                        format!("read{}", i),
                        b"ACGT".to_vec(),
                        b"IIII".to_vec(),
                    ))
                })
                .collect();
            ScriptedSource::new(name, records)
        }
    }

    impl SequenceSource for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> &std::path::Path {
            std::path::Path::new("scripted")
        }

        fn has_next(&mut self) -> bool {
            self.delivered < self.total
        }

        fn next_record(&mut self) -> Result<SeqRecord> {
            let next = self.records.remove(0);
            self.delivered += 1;
            next
        }

        fn percent_complete(&self) -> f64 {
            self.delivered as f64 / self.total as f64 * 100.0
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
        progress_events: AtomicU64,
    }

    impl AnalysisListener for RecordingListener {
        fn analysis_started(&self, source_name: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("started:{}", source_name));
        }

        fn analysis_progress(&self, _source_name: &str, _records: u64, _percent: f64) {
            self.progress_events.fetch_add(1, Ordering::SeqCst);
        }

        fn analysis_complete(&self, source_name: &str, modules: &[Box<dyn QcModule>]) {
            let mut sink = BufferSink::new();
            for module in modules {
                module.write_report(&mut sink).unwrap();
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("complete:{}", source_name));
        }

        fn analysis_error(&self, source_name: &str, _error: &QcError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{}", source_name));
        }
    }

    #[test]
    fn clean_run_emits_started_then_complete() {
        let listener = Arc::new(RecordingListener::default());
        let mut runner = AnalysisRunner::new();
        runner.add_listener(listener.clone());

        let source = ScriptedSource::ok_records("sample.fastq", 40);
        runner.run(Box::new(source), vec![Box::new(BasicStats::new())]);

        let events = listener.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["started:sample.fastq", "complete:sample.fastq"]
        );
        // 40 records at 2.5% each cross the 5% step on every other record.
        assert_eq!(listener.progress_events.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn decode_failure_emits_error_without_complete() {
        let listener = Arc::new(RecordingListener::default());
        let mut runner = AnalysisRunner::new();
        runner.add_listener(listener.clone());

        let records = vec![
            Ok(SeqRecord::new(
                Arc::from("broken.fastq"),
                "read0".to_string(),
                b"ACGT".to_vec(),
                b"IIII".to_vec(),
            )),
            Err(QcError::Format("truncated record".to_string())),
        ];
        let source = ScriptedSource::new("broken.fastq", records);
        runner.run(Box::new(source), vec![Box::new(BasicStats::new())]);

        let events = listener.events.lock().unwrap();
        assert_eq!(*events, vec!["started:broken.fastq", "error:broken.fastq"]);
    }

    #[test]
    fn filtered_records_skip_opted_out_modules() {
        struct CountingModule {
            seen: u64,
        }

        impl QcModule for CountingModule {
            fn name(&self) -> &'static str {
                "counting"
            }
            fn description(&self) -> &'static str {
                "counts"
            }
            fn process_sequence(&mut self, _record: &SeqRecord) {
                self.seen += 1;
            }
            fn reset(&mut self) {
                self.seen = 0;
            }
            fn raises_error(&self) -> bool {
                false
            }
            fn raises_warning(&self) -> bool {
                false
            }
            fn write_report(&self, sink: &mut dyn crate::report::ReportSink) -> Result<()> {
                sink.data().push_str(&format!("seen\t{}\n", self.seen));
                Ok(())
            }
        }

        let mut filtered = SeqRecord::new(
            Arc::from("f.fastq"),
            "read0".to_string(),
            b"ACGT".to_vec(),
            b"IIII".to_vec(),
        );
        filtered.filtered = true;
        let clean = SeqRecord::new(
            Arc::from("f.fastq"),
            "read1".to_string(),
            b"ACGT".to_vec(),
            b"IIII".to_vec(),
        );

        let source = ScriptedSource::new("f.fastq", vec![Ok(filtered), Ok(clean)]);
        let runner = AnalysisRunner::new();
        let modules = runner.run(
            Box::new(source),
            vec![Box::new(CountingModule { seen: 0 })],
        );

        let mut sink = BufferSink::new();
        modules[0].write_report(&mut sink).unwrap();
        assert_eq!(sink.data_document(), "seen\t1\n");
    }
}
