use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

const PERCENT_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}";

/// Percent-scale bar the CLI attaches to each running analysis. Positions
/// run 0 to 100; the caller feeds clamped completion percentages.
pub fn percent_bar(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::default_bar().template(PERCENT_TEMPLATE)?);
    bar.set_message(message.into());
    Ok(bar)
}
