use crate::error::Result;
use crate::modules::{ModuleStatus, QcModule};

pub const TOOL_NAME: &str = "ReadQC";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sink a module writes its report into: an appendable rendered-document
/// buffer, an appendable raw-data buffer, and named byte entries for plot
/// assets. Rasterizing the named entries into actual images is the report
/// writer's job, not the module's.
pub trait ReportSink {
    fn html(&mut self) -> &mut String;

    fn data(&mut self) -> &mut String;

    /// Start a named entry (e.g. `Images/per_base_quality.png`) and return
    /// its byte buffer.
    fn named_entry(&mut self, name: &str) -> &mut Vec<u8>;
}

/// In-memory sink used by the CLI driver and tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    html: String,
    data: String,
    entries: Vec<(String, Vec<u8>)>,
}

impl BufferSink {
    pub fn new() -> BufferSink {
        BufferSink::default()
    }

    pub fn html_document(&self) -> &str {
        &self.html
    }

    pub fn data_document(&self) -> &str {
        &self.data
    }

    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }
}

impl ReportSink for BufferSink {
    fn html(&mut self) -> &mut String {
        &mut self.html
    }

    fn data(&mut self) -> &mut String {
        &mut self.data
    }

    fn named_entry(&mut self, name: &str) -> &mut Vec<u8> {
        self.entries.push((name.to_string(), Vec::new()));
        &mut self.entries.last_mut().expect("just pushed").1
    }
}

/// Write every module's report into `sink`, framed the way the archive
/// writer expects: a version metadata line, then per module a
/// `>>name<TAB>status` header, the module's own data block, and an
/// `>>END_MODULE` trailer.
pub fn write_archive(sink: &mut dyn ReportSink, modules: &[Box<dyn QcModule>]) -> Result<()> {
    sink.data()
        .push_str(&format!("##{}\t{}\n", TOOL_NAME, TOOL_VERSION));

    for module in modules {
        sink.data()
            .push_str(&format!(">>{}\t{}\n", module.name(), module.status()));
        module.write_report(sink)?;
        sink.data().push_str(">>END_MODULE\n");
    }
    Ok(())
}

/// The summary index: one `STATUS<TAB>module name<TAB>source` line per
/// module.
pub fn summary(modules: &[Box<dyn QcModule>], source_name: &str) -> String {
    let mut out = String::new();
    for module in modules {
        let status = match module.status() {
            ModuleStatus::Pass => "PASS",
            ModuleStatus::Warn => "WARN",
            ModuleStatus::Fail => "FAIL",
        };
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            status,
            module.name(),
            source_name
        ));
    }
    out
}
