use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use dialoguer::{theme::ColorfulTheme, Input, Select};
use swapover_applier::{LockHolder, Operator, ProgressSink, RunReport};
use swapover_core::{LockChoice, ProgressEvent};

use crate::render::{render_status_line, OutputStyle, TerminalProgress};

/// Worker-to-terminal traffic, delivered in emission order.
pub(crate) enum UiMessage {
    Progress(ProgressEvent),
    LockedFile {
        path: PathBuf,
        holder: LockHolder,
        reply: Sender<LockChoice>,
    },
    Failure {
        message: String,
        ack: Sender<()>,
    },
    Finished(RunReport),
}

pub(crate) struct ChannelSink {
    tx: Sender<UiMessage>,
}

impl ChannelSink {
    pub(crate) fn new(tx: Sender<UiMessage>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(UiMessage::Progress(event));
    }
}

/// Forwards operator questions to the terminal thread and blocks for the answer.
pub(crate) struct ChannelOperator {
    tx: Sender<UiMessage>,
    fallback: LockChoice,
}

impl ChannelOperator {
    pub(crate) fn new(tx: Sender<UiMessage>, fallback: LockChoice) -> Self {
        Self { tx, fallback }
    }
}

impl Operator for ChannelOperator {
    fn on_locked_file(&self, path: &Path, holder: &LockHolder) -> LockChoice {
        let (reply, answer) = mpsc::channel();
        let request = UiMessage::LockedFile {
            path: path.to_path_buf(),
            holder: holder.clone(),
            reply,
        };
        if self.tx.send(request).is_err() {
            return self.fallback;
        }
        answer.recv().unwrap_or(self.fallback)
    }

    fn on_failure(&self, message: &str) {
        let (ack, acknowledged) = mpsc::channel();
        let notice = UiMessage::Failure {
            message: message.to_string(),
            ack,
        };
        if self.tx.send(notice).is_ok() {
            let _ = acknowledged.recv();
        }
    }
}

pub(crate) trait SessionView {
    fn progress(&mut self, event: &ProgressEvent);
    fn ask_locked_file(&mut self, path: &Path, holder: &LockHolder) -> LockChoice;
    fn show_failure(&mut self, message: &str);
}

/// Consumes worker messages until the run report arrives. `None` means the
/// worker went away without reporting.
pub(crate) fn drive_session(rx: Receiver<UiMessage>, view: &mut dyn SessionView) -> Option<RunReport> {
    for message in rx {
        match message {
            UiMessage::Progress(event) => view.progress(&event),
            UiMessage::LockedFile {
                path,
                holder,
                reply,
            } => {
                let choice = view.ask_locked_file(&path, &holder);
                let _ = reply.send(choice);
            }
            UiMessage::Failure { message, ack } => {
                view.show_failure(&message);
                let _ = ack.send(());
            }
            UiMessage::Finished(report) => return Some(report),
        }
    }
    None
}

pub(crate) struct TerminalView {
    style: OutputStyle,
    interactive: bool,
    fallback: LockChoice,
    progress: TerminalProgress,
}

impl TerminalView {
    pub(crate) fn new(style: OutputStyle, interactive: bool, fallback: LockChoice) -> Self {
        Self {
            style,
            interactive: interactive && style != OutputStyle::Json,
            fallback,
            progress: TerminalProgress::start(style),
        }
    }

    pub(crate) fn into_progress(self) -> TerminalProgress {
        self.progress
    }
}

impl SessionView for TerminalView {
    fn progress(&mut self, event: &ProgressEvent) {
        self.progress.update(event);
    }

    fn ask_locked_file(&mut self, path: &Path, holder: &LockHolder) -> LockChoice {
        if !self.interactive {
            return self.fallback;
        }

        let fallback = self.fallback;
        self.progress.suspend(|| {
            let items = ["Retry - try to replace the file again", "Abort the update"];
            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt(locked_file_prompt(path, holder))
                .items(&items)
                .default(0)
                .interact();
            match selection {
                Ok(0) => LockChoice::Retry,
                Ok(_) => LockChoice::Abort,
                Err(_) => fallback,
            }
        })
    }

    fn show_failure(&mut self, message: &str) {
        let line = render_status_line(self.style, "err", message);
        let interactive = self.interactive;
        self.progress.suspend(|| {
            eprintln!("{line}");
            if interactive {
                let _ = Input::<String>::new()
                    .with_prompt("The update failed. Press Enter to exit")
                    .allow_empty(true)
                    .interact_text();
            }
        });
    }
}

pub(crate) fn locked_file_prompt(path: &Path, holder: &LockHolder) -> String {
    format!("{} is in use by {holder}", path.display())
}
