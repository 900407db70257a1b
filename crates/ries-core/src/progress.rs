//! Stage progress for TTY and non-TTY environments.
//!
//! TTY mode: one spinner line per pipeline stage, kept after completion.
//! Non-TTY mode: hidden bars; stage results go to the log instead.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::pipeline::Stage;

fn stage_style() -> Option<ProgressStyle> {
    ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}").ok()
}

/// Central progress context shared by the pipeline and the log bridge.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws anything.
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner line for a stage. Update with `set_message`, close with
    /// [`finish_stage`].
    pub fn stage_line(&self, stage: Stage) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        if let Some(style) = stage_style() {
            pb.set_style(style);
        }
        pb.set_prefix(stage.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop a stage spinner, leaving `msg` on its line.
pub fn finish_stage(pb: &ProgressBar, msg: impl Into<String>) {
    pb.finish_with_message(msg.into());
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
