use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);
// Linux truncates process names (comm) to 15 bytes.
const TRUNCATED_NAME_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub name: String,
    /// `None` when the process image could not be inspected.
    pub exe: Option<PathBuf>,
}

pub trait ProcessControl {
    fn processes_named(&self, file_name: &str) -> Vec<RunningProcess>;
    fn wait_for_exit(&self, pid: u32);
    fn spawn(&self, program: &Path, arguments: Option<&str>) -> io::Result<()>;
}

pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn processes_named(&self, file_name: &str) -> Vec<RunningProcess> {
        let mut system = System::new();
        system.refresh_processes();

        let mut matches = system
            .processes()
            .values()
            .filter(|process| process_name_matches(process.name(), file_name))
            .map(|process| RunningProcess {
                pid: process.pid().as_u32(),
                name: process.name().to_string(),
                exe: process.exe().map(Path::to_path_buf),
            })
            .collect::<Vec<_>>();
        matches.sort_by_key(|process| process.pid);
        matches
    }

    fn wait_for_exit(&self, pid: u32) {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        while system.refresh_process(pid) {
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn spawn(&self, program: &Path, arguments: Option<&str>) -> io::Result<()> {
        build_launch_command(program, arguments)
            .spawn()
            .map(|_child| ())
    }
}

pub(crate) fn process_name_matches(process_name: &str, file_name: &str) -> bool {
    if process_name.is_empty() {
        return false;
    }
    if process_name.eq_ignore_ascii_case(file_name) {
        return true;
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    if process_name.eq_ignore_ascii_case(stem) {
        return true;
    }

    process_name.len() == TRUNCATED_NAME_LEN && file_name.starts_with(process_name)
}

pub(crate) fn build_launch_command(program: &Path, arguments: Option<&str>) -> Command {
    let mut command = Command::new(program);
    if let Some(arguments) = arguments {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.raw_arg(arguments);
        }
        #[cfg(not(windows))]
        {
            command.args(split_command_line(arguments));
        }
    }
    command
}

/// Splits a command line on whitespace; single or double quotes group words.
pub fn split_command_line(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
