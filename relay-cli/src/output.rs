// Output formatting helpers for CLI commands

use std::time::Duration;

use relay_engine::{ContainerMetadata, Disposition, PlanId};

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Short tag for a finished step
pub fn symbol(disposition: &Disposition) -> &'static str {
    match disposition {
        Disposition::Succeeded => "OK",
        Disposition::Failed => "FAIL",
        Disposition::TimedOut(_) => "TIMEOUT",
        Disposition::Aborted => "ABORT",
        Disposition::Errored(_) => "ERROR",
    }
}

/// "==> Build #7 (4 plans)"
pub fn build_header(build_id: u64, total_plans: usize) {
    println!();
    eprintln!("\x1b[1m==> Build #{} ({} plans)\x1b[0m", build_id, total_plans);
}

pub fn step_started(plan_id: &PlanId, metadata: &ContainerMetadata) {
    println!("      [{}] {}", plan_id, metadata);
}

/// Step output, indented; stderr lines in red
pub fn step_output(line: &str, is_error: bool) {
    if is_error {
        eprintln!("\x1b[31m        | {}\x1b[0m", line);
    } else {
        println!("        | {}", line);
    }
}

pub fn step_finished(disposition: &Disposition, duration: Duration) {
    let message = format!(
        "        {} ({:.2}s)",
        symbol(disposition),
        duration.as_secs_f64()
    );
    if disposition.succeeded() {
        eprintln!("\x1b[32m{}\x1b[0m", message);
    } else {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }
}

/// Final line of a build: check mark on success, cross otherwise
pub fn build_finished(disposition: &Disposition, duration: Duration) {
    println!();
    if disposition.succeeded() {
        eprintln!(
            "\x1b[1;32m  \u{2713}\x1b[0m Build succeeded in {:.2}s",
            duration.as_secs_f64()
        );
    } else {
        eprintln!(
            "\x1b[1;31m  \u{2717}\x1b[0m Build {} after {:.2}s",
            disposition,
            duration.as_secs_f64()
        );
    }
}
