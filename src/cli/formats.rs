use crate::report::ReportFormat;

/// `formats`: one line per format with its id, label and description.
pub fn execute() {
    for format in ReportFormat::all() {
        println!(
            "{:<24} {:<24} {}",
            format.as_str(),
            format.label(),
            format.description()
        );
    }
}
