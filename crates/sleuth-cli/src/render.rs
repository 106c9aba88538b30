use console::style;
use sleuth::agent::Termination;
use sleuth::researcher::ResearchReport;

/// Human readable version of a research report
pub fn render_report(report: &ResearchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        style(&report.entity_name).bold(),
        style(format!("({})", report.website)).dim()
    ));
    out.push('\n');

    let width = report
        .data_points
        .iter()
        .map(|point| point.name.len())
        .max()
        .unwrap_or(0);
    for point in &report.data_points {
        let name = format!("{:width$}", point.name, width = width);
        match &point.value {
            Some(value) => {
                out.push_str(&format!("  {}  {}", style(name).cyan(), value));
                if let Some(reference) = &point.reference {
                    out.push_str(&format!("  {}", style(reference).dim()));
                }
                out.push('\n');
            }
            None => out.push_str(&format!("  {}  {}\n", style(name).cyan(), style("not found").yellow())),
        }
    }

    if !report.links_scraped.is_empty() {
        out.push_str(&format!("\n{}\n", style("Scraped").bold()));
        for link in report.links_scraped.as_slice() {
            out.push_str(&format!("  {}\n", link));
        }
    }

    if !report.summary.is_empty() {
        out.push_str(&format!("\n{}\n", report.summary));
    }

    match &report.termination {
        Some(Termination::TurnLimit) => {
            out.push_str(&format!("\n{}\n", style("Stopped at the turn limit").yellow()))
        }
        Some(Termination::CompletionFailed(reason)) => {
            out.push_str(&format!("\n{} {}\n", style("Stopped early:").red(), reason))
        }
        Some(Termination::Completed) | None => {}
    }
    out
}
