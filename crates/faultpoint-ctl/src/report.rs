//! Format injector statistics for human consumption.

use crate::demo::DriveSummary;
use faultpoint_core::{FaultKind, FaultPointInfo, InjectorReport};

/// Format an injector report, plus the workload outcome if there was one.
pub fn format_report(report: &InjectorReport, workload: Option<&DriveSummary>) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  Fault Injection Report\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    output.push_str(&format!("Seed:                   {}\n", report.seed));
    output.push_str(&format!("Fault points:           {}\n", report.points));
    output.push_str(&format!("Fault groups:           {}\n", report.groups.len()));
    output.push_str(&format!("Faults injected:        {}\n", report.total_injected()));
    output.push('\n');

    if let Some(summary) = workload {
        output.push_str("─── Workload ──────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Iterations:             {}\n", summary.iterations));
        output.push_str(&format!("Succeeded:              {}\n", summary.ok));
        output.push_str(&format!("Failed with error:      {}\n", summary.errors));
        output.push_str(&format!("Aborted by panic:       {}\n", summary.panics));
        output.push('\n');
    }

    for group in &report.groups {
        output.push_str(&format!(
            "─── Group {:<3} ({} points) ─────────────────────────────────────────────\n",
            group.id, group.members
        ));
        for stats in &group.kinds {
            let rate = if stats.hits > 0 {
                stats.injected as f64 / stats.hits as f64 * 100.0
            } else {
                0.0
            };
            output.push_str(&format!(
                "  {:<6} {} hits {:>8}  injected {:>8} ({:>5.1}%)  times {:>4}  p={:<3} every {}",
                stats.kind,
                if stats.enabled { "on " } else { "off" },
                stats.hits,
                stats.injected,
                rate,
                stats.times,
                stats.probability,
                stats.interval
            ));
            match stats.kind {
                FaultKind::Delay => {
                    output.push_str(&format!("  {}us", stats.delay_us.unwrap_or(0)));
                }
                FaultKind::Error => {
                    output.push_str(&format!("  [{}]", stats.errors.as_deref().unwrap_or("")));
                }
                FaultKind::Panic => {}
            }
            if stats.task_filter {
                output.push_str("  (marked tasks only)");
            }
            output.push('\n');
        }
        output.push('\n');
    }

    output
}

/// Format a fault point listing with a header row.
pub fn format_listing(rows: &[FaultPointInfo]) -> String {
    let mut output = String::from("DEP GROUP CLASS  ADDRESS            LOCATION\n");
    for row in rows {
        output.push_str(&row.to_string());
        output.push('\n');
    }
    output
}
