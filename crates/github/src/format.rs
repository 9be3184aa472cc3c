//! Markdown rendering of job snapshots for comment bodies.

use mvbot_core::job::Job;
use mvbot_core::types::Timestamp;

const PROGRESS_BAR_WIDTH: usize = 10;

/// Body of the comment posted when a command is accepted.
pub fn accepted_message(job: &Job) -> String {
    format!(
        "👀 **Command Accepted**\n\n\
         **Job ID:** `{}`\n\
         **Command:** `{}`\n\
         **Type:** {}\n\n\
         *This comment will be updated as the job progresses.*",
        job.id,
        command_text(job),
        job.kind,
    )
}

/// Replaces the accepted comment when the job id turned out to be taken.
pub fn duplicate_message(job: &Job) -> String {
    format!(
        "⚠️ **Command Not Started**\n\n\
         **Job ID:** `{}`\n\
         **Command:** `{}`\n\n\
         A job with this id is already tracked.",
        job.id,
        command_text(job),
    )
}

/// Body for a job that is still running.
pub fn progress_message(job: &Job, now: Timestamp) -> String {
    let mut message = format!(
        "🔄 **Job In Progress**\n\n\
         **Job ID:** `{}`\n\
         **Command:** `{}`\n\
         **Status:** {}",
        job.id,
        command_text(job),
        job.status,
    );

    if let Some(progress) = &job.progress {
        message.push_str(&format!(
            "\n\n**Progress:** {:.1}% [{}]\n\
             **Current Step:** {}\n\
             **Steps:** {}/{}",
            progress.percentage,
            progress_bar(progress.percentage),
            progress.current_step,
            progress.completed_steps,
            progress.total_steps,
        ));
        if let Some(eta) = progress.eta_secs {
            message.push_str(&format!("\n**ETA:** {}", format_duration(eta as i64)));
        }
    }

    message.push_str(&format!("\n\n*Last updated: {}*", now.format("%H:%M:%S UTC")));
    message
}

/// Body for a job that finished with a result.
pub fn final_message(job: &Job, now: Timestamp) -> String {
    let success = job.result.as_ref().is_some_and(|r| r.success);
    let (emoji, heading) = if success {
        ("✅", "Completed Successfully")
    } else {
        ("❌", "Failed")
    };
    let finished_at = job.completed_at.unwrap_or(now);

    let mut message = format!(
        "{emoji} **Job {heading}**\n\n\
         **Job ID:** `{}`\n\
         **Command:** `{}`\n\
         **Status:** {}\n\
         **Duration:** {}",
        job.id,
        command_text(job),
        job.status,
        format_duration((finished_at - job.created_at).num_seconds()),
    );

    if let Some(result) = &job.result {
        if result.success && !result.metrics.is_empty() {
            message.push_str("\n\n**Results:**");
            for (name, value) in &result.metrics {
                message.push_str(&format!("\n- **{name}:** {value}"));
            }
        }
        if !result.artifacts.is_empty() {
            message.push_str("\n\n**Generated Artifacts:**");
            for artifact in &result.artifacts {
                message.push_str(&format!("\n- {artifact}"));
            }
        }
        if let (false, Some(error)) = (result.success, &result.error_message) {
            message.push_str(&format!("\n\n**Error:** {error}"));
        }
    }

    message.push_str(&format!(
        "\n\n*Completed at: {}*",
        finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    message
}

/// Ten-cell bar, one filled cell per full 10%.
pub fn progress_bar(percentage: f64) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 10.0).floor() as usize).min(PROGRESS_BAR_WIDTH);
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// `1h 2m 3s`, `2m 3s` or `3s`. Negative input renders as `0s`.
pub fn format_duration(total_secs: i64) -> String {
    let total = total_secs.max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn command_text(job: &Job) -> &str {
    job.config
        .get("raw_command")
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
}
