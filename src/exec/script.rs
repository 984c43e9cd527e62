// src/exec/script.rs

//! Self-reporting wrapper scripts for BACKGROUND and REMOTE jobs.
//!
//! The wrapper runs the job command with its output redirected to per-job
//! log files, reports the exit status through the notifier program, then
//! deletes itself. File names derive from the job id only.

use crate::types::JobId;

pub fn script_name(id: JobId) -> String {
    format!("job_{id}.sh")
}

pub fn stdout_log_name(id: JobId) -> String {
    format!("job_{id}.out")
}

pub fn stderr_log_name(id: JobId) -> String {
    format!("job_{id}.err")
}

/// How a wrapper reaches the completion listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTarget {
    pub program: String,
    pub host: String,
    pub port: u16,
    pub done_token: String,
    pub failed_token: String,
}

/// A wrapper script ready to be rendered.
#[derive(Debug, Clone)]
pub struct WrapperScript<'a> {
    pub id: JobId,
    pub command: &'a str,
    pub stdout_log: String,
    pub stderr_log: String,
    pub notify: &'a NotifyTarget,
}

impl WrapperScript<'_> {
    pub fn render(&self) -> String {
        let n = self.notify;
        let notify = format!(
            "{} {} {}",
            shell_quote(&n.program),
            shell_quote(&n.host),
            n.port
        );

        format!(
            "#!/bin/sh\n\
             # cmdseq wrapper for job {id}\n\
             (\n\
             {command}\n\
             ) >{out} 2>{err} </dev/null\n\
             rc=$?\n\
             if [ \"$rc\" -eq 0 ]; then\n\
             \x20 {notify} {done} {id}\n\
             else\n\
             \x20 {notify} {failed} {id}\n\
             fi\n\
             rm -f -- \"$0\"\n\
             exit \"$rc\"\n",
            id = self.id,
            command = self.command,
            out = shell_quote(&self.stdout_log),
            err = shell_quote(&self.stderr_log),
            notify = notify,
            done = shell_quote(&n.done_token),
            failed = shell_quote(&n.failed_token),
        )
    }
}

/// Single-quote `s` for POSIX `sh`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> NotifyTarget {
        NotifyTarget {
            program: "/opt/cmdseq/cmdseq-notify".into(),
            host: "127.0.0.1".into(),
            port: 5555,
            done_token: "DONE".into(),
            failed_token: "FAILED".into(),
        }
    }

    #[test]
    fn wrapper_reports_both_outcomes_and_removes_itself() {
        let notify = target();
        let script = WrapperScript {
            id: 17,
            command: "ogr2ogr out.shp in.gml",
            stdout_log: "/work/job_17.out".into(),
            stderr_log: "/work/job_17.err".into(),
            notify: &notify,
        }
        .render();

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("\nogr2ogr out.shp in.gml\n"));
        assert!(script.contains(">'/work/job_17.out' 2>'/work/job_17.err'"));
        assert!(script.contains("'/opt/cmdseq/cmdseq-notify' '127.0.0.1' 5555 'DONE' 17"));
        assert!(script.contains("'/opt/cmdseq/cmdseq-notify' '127.0.0.1' 5555 'FAILED' 17"));
        assert!(script.contains("rm -f -- \"$0\""));
    }

    #[test]
    fn quoting_survives_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn file_names_follow_job_id() {
        assert_eq!(script_name(3), "job_3.sh");
        assert_eq!(stdout_log_name(3), "job_3.out");
        assert_eq!(stderr_log_name(3), "job_3.err");
    }
}
