use tokio_util::sync::CancellationToken;

use crate::attachment::PendingAttachment;
use crate::conversation::{Conversation, Role, Turn};
use crate::error::{ChatError, STOPPED_MESSAGE};
use crate::render::{format_response, Reveal, RevealStep};

/// Prompt sent on behalf of the user when an image is attached.
pub const DEFAULT_IMAGE_PROMPT: &str = "
You are an AI assistant. Analyze the uploaded image and answer the following questions in normal text format:
- What is the major problem visible in the image?
- How should it be resolved?
- Any precautions or additional advice?
Please format the answer like this:

Problem: ...
Solution: ...
Precautions: ...
";

const IMAGE_USER_LABEL: &str = "Analyzing uploaded image...";
const IMAGE_PLACEHOLDER: &str = "Analyzing image...";
const PLACEHOLDER: &str = "Just a sec..";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// Submitted, waiting out the dispatch delay.
    AwaitingSubmit,
    /// Request in flight or reveal in progress.
    Responding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Loading,
    Complete,
    Error,
}

/// A rendered bubble in the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    pub status: EntryStatus,
}

/// Work the host has to schedule on the session's behalf.
#[derive(Debug)]
pub enum Effect {
    /// Call `dispatch_ready(epoch)` after the submit delay.
    ScheduleDispatch { epoch: u64 },
    /// Issue the completion request, then call `response_received(epoch, ..)`.
    Send {
        epoch: u64,
        contents: Vec<Turn>,
        cancel: CancellationToken,
    },
    ScrollToEnd,
}

/// Conversation state and the idle/responding gate for one chat window.
pub struct Session {
    conversation: Conversation,
    entries: Vec<ChatEntry>,
    mode: Mode,
    pending: Option<PendingAttachment>,
    notice: Option<String>,
    // Advanced by stop and delete-all; work tagged with an older epoch is dropped.
    epoch: u64,
    prompt: Option<String>,
    placeholder: &'static str,
    active: Option<usize>,
    cancel: CancellationToken,
    reveal: Option<Reveal>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            conversation: Conversation::new(),
            entries: Vec::new(),
            mode: Mode::Idle,
            pending: None,
            notice: None,
            epoch: 0,
            prompt: None,
            placeholder: PLACEHOLDER,
            active: None,
            cancel: CancellationToken::new(),
            reveal: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_some()
    }

    /// True while the bot bubble shows a placeholder.
    pub fn is_waiting(&self) -> bool {
        !self.is_idle() && !self.is_revealing()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn pending(&self) -> Option<&PendingAttachment> {
        self.pending.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Start a turn from typed text. Ignored when the text is blank or a
    /// response is already under way.
    pub fn submit(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() || !self.is_idle() {
            return Vec::new();
        }
        self.begin(text.to_string(), text.to_string(), PLACEHOLDER)
    }

    /// Hold an attachment for the next turn. Images are submitted straight
    /// away with the default analysis prompt.
    pub fn attach(&mut self, attachment: PendingAttachment) -> Vec<Effect> {
        let is_image = attachment.is_image;
        self.notice = None;
        self.pending = Some(attachment);

        if is_image && self.is_idle() {
            return self.begin(
                DEFAULT_IMAGE_PROMPT.to_string(),
                IMAGE_USER_LABEL.to_string(),
                IMAGE_PLACEHOLDER,
            );
        }
        Vec::new()
    }

    pub fn attachment_failed(&mut self, err: &ChatError) {
        tracing::error!("Attachment rejected: {}", err);
        self.notice = Some(err.user_message());
    }

    pub fn cancel_attachment(&mut self) {
        self.pending = None;
    }

    fn begin(&mut self, prompt: String, shown: String, placeholder: &'static str) -> Vec<Effect> {
        let inline = self.pending.take().map(|a| a.to_inline_data());
        self.conversation.append(Turn::user(prompt.clone(), inline));
        self.entries.push(ChatEntry {
            role: Role::User,
            text: shown,
            status: EntryStatus::Complete,
        });

        self.notice = None;
        self.prompt = Some(prompt);
        self.placeholder = placeholder;
        self.mode = Mode::AwaitingSubmit;

        vec![
            Effect::ScrollToEnd,
            Effect::ScheduleDispatch { epoch: self.epoch },
        ]
    }

    /// The submit delay elapsed: show the bot placeholder and send.
    pub fn dispatch_ready(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.epoch || self.mode != Mode::AwaitingSubmit {
            return Vec::new();
        }

        self.mode = Mode::Responding;
        // A reveal halted by stop may not have seen its last tick yet.
        self.reveal = None;
        self.cancel = CancellationToken::new();
        self.entries.push(ChatEntry {
            role: Role::Model,
            text: self.placeholder.to_string(),
            status: EntryStatus::Loading,
        });
        self.active = Some(self.entries.len() - 1);

        tracing::debug!("Dispatching turn {} (epoch {})", self.conversation.len(), epoch);

        vec![
            Effect::ScrollToEnd,
            Effect::Send {
                epoch,
                contents: self.conversation.snapshot(),
                cancel: self.cancel.clone(),
            },
        ]
    }

    pub fn response_received(&mut self, epoch: u64, result: Result<String, ChatError>) -> Vec<Effect> {
        if epoch != self.epoch || self.mode != Mode::Responding || self.reveal.is_some() {
            tracing::debug!("Dropping response for stale epoch {}", epoch);
            return Vec::new();
        }

        match result {
            Ok(raw) => {
                let structured = self.prompt.as_deref() == Some(DEFAULT_IMAGE_PROMPT);
                let text = format_response(&raw, structured);
                self.conversation.append(Turn::model(text.clone()));
                if let Some(entry) = self.active_entry_mut() {
                    entry.text.clear();
                }
                self.reveal = Some(Reveal::new(&text, self.cancel.clone()));
                Vec::new()
            }
            Err(err) => {
                if err.is_cancelled() {
                    tracing::info!("Response cancelled");
                } else {
                    tracing::warn!("Response failed: {}", err);
                }
                let message = err.user_message();
                if let Some(entry) = self.active_entry_mut() {
                    entry.text = message;
                    entry.status = EntryStatus::Error;
                }
                self.finish();
                vec![Effect::ScrollToEnd]
            }
        }
    }

    /// Advance the reveal by one word.
    pub fn tick(&mut self) -> Vec<Effect> {
        let step = match self.reveal.as_mut() {
            Some(reveal) => reveal.step(),
            None => return Vec::new(),
        };

        match step {
            RevealStep::Word(text) => {
                if let Some(entry) = self.active_entry_mut() {
                    entry.text = text;
                }
                vec![Effect::ScrollToEnd]
            }
            RevealStep::Finished => {
                if let Some(entry) = self.active_entry_mut() {
                    entry.status = EntryStatus::Complete;
                }
                self.reveal = None;
                self.finish();
                Vec::new()
            }
            RevealStep::Halted => {
                tracing::debug!("Reveal halted");
                self.reveal = None;
                Vec::new()
            }
        }
    }

    /// Abort whatever is under way and return to idle. Already revealed
    /// words stay on screen; a running reveal halts on its next tick.
    pub fn stop(&mut self) {
        self.pending = None;
        self.cancel.cancel();

        let was_revealing = self.reveal.is_some();
        if let Some(entry) = self.active_entry_mut() {
            if was_revealing {
                entry.status = EntryStatus::Complete;
            } else {
                entry.text = STOPPED_MESSAGE.to_string();
                entry.status = EntryStatus::Error;
            }
        }

        if !self.is_idle() {
            tracing::info!("Response stopped by user");
        }
        self.epoch += 1;
        self.finish();
    }

    /// Forget the whole conversation, even mid-response.
    pub fn delete_all(&mut self) {
        self.cancel.cancel();
        self.epoch += 1;
        if !self.conversation.is_empty() {
            tracing::info!("Clearing {} turn(s)", self.conversation.len());
        }
        self.conversation.clear();
        self.entries.clear();
        self.finish();
    }

    fn finish(&mut self) {
        self.mode = Mode::Idle;
        self.active = None;
        self.prompt = None;
    }

    fn active_entry_mut(&mut self) -> Option<&mut ChatEntry> {
        let index = self.active?;
        self.entries.get_mut(index)
    }
}
