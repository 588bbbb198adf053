mod attachment;
mod config;
mod conversation;
mod error;
mod gemini;
mod preferences;
mod render;
mod session;

use iced::{
    widget::{button, column, container, row, scrollable, text, text_input, text_input::Id, Column},
    Element, Length, Task, Theme, Font, Subscription, Color,
    time,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment, Padding, Size,
    window,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use attachment::{AttachmentKind, PendingAttachment};
use conversation::Role;
use error::ChatError;
use gemini::GeminiClient;
use preferences::ThemePreference;
use session::{ChatEntry, Effect, EntryStatus, Session};

const ERROR_COLOR: Color = Color::from_rgb(0.84, 0.16, 0.22);
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repairvision=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load();
    let window_size = Size::new(config.window.width as f32, config.window.height as f32);
    let min_size = Size::new(config.window.min_width as f32, config.window.min_height as f32);

    iced::application("RepairVision", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: window_size,
            min_size: Some(min_size),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    Suggestion(String),
    FileDropped(PathBuf),
    AttachmentLoaded(Result<PendingAttachment, ChatError>),
    CancelAttachment,
    DispatchReady(u64),
    ResponseReceived(u64, Result<String, ChatError>),
    RevealTick,
    SpinnerTick,
    Stop,
    DeleteAll,
    ToggleTheme,
}

struct App {
    session: Session,
    client: GeminiClient,
    input_text: String,
    input_id: Id,
    chat_id: scrollable::Id,
    suggestions: Vec<String>,
    submit_delay: Duration,
    reveal_tick: Duration,
    spinner_frame: usize,
    theme: ThemePreference,
    preferences_path: PathBuf,
}

impl App {
    fn new(config: config::Config) -> (Self, Task<Message>) {
        let preferences_path = preferences::preferences_path();
        let theme = preferences::load_theme(&preferences_path);
        let client = GeminiClient::with_config(&config.gemini);

        tracing::info!("Using model {}", client.get_model());

        let input_id = Id::unique();

        let app = App {
            session: Session::new(),
            client,
            input_text: String::new(),
            input_id: input_id.clone(),
            chat_id: scrollable::Id::unique(),
            suggestions: config.chat.suggestions,
            submit_delay: Duration::from_millis(config.chat.submit_delay_ms),
            reveal_tick: Duration::from_millis(config.chat.reveal_tick_ms.max(1)),
            spinner_frame: 0,
            theme,
            preferences_path,
        };

        (app, text_input::focus(input_id))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => {
                let effects = self.session.submit(&self.input_text);
                if !effects.is_empty() {
                    self.input_text.clear();
                }
                self.run_effects(effects)
            }
            Message::Suggestion(prompt) => {
                self.input_text = prompt;
                self.update(Message::Submit)
            }
            Message::FileDropped(path) => {
                tracing::debug!("File dropped: {}", path.display());
                Task::perform(attachment::read_attachment(path), Message::AttachmentLoaded)
            }
            Message::AttachmentLoaded(Ok(attachment)) => {
                let effects = self.session.attach(attachment);
                self.run_effects(effects)
            }
            Message::AttachmentLoaded(Err(e)) => {
                self.session.attachment_failed(&e);
                Task::none()
            }
            Message::CancelAttachment => {
                self.session.cancel_attachment();
                Task::none()
            }
            Message::DispatchReady(epoch) => {
                let effects = self.session.dispatch_ready(epoch);
                self.run_effects(effects)
            }
            Message::ResponseReceived(epoch, result) => {
                let effects = self.session.response_received(epoch, result);
                self.run_effects(effects)
            }
            Message::RevealTick => {
                let effects = self.session.tick();
                self.run_effects(effects)
            }
            Message::SpinnerTick => {
                self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                Task::none()
            }
            Message::Stop => {
                self.session.stop();
                Task::none()
            }
            Message::DeleteAll => {
                self.session.delete_all();
                Task::none()
            }
            Message::ToggleTheme => {
                self.theme = self.theme.toggled();
                if let Err(e) = preferences::save_theme(&self.preferences_path, self.theme) {
                    tracing::warn!("Could not save theme preference: {:#}", e);
                }
                Task::none()
            }
        }
    }

    fn run_effects(&self, effects: Vec<Effect>) -> Task<Message> {
        Task::batch(effects.into_iter().map(|effect| match effect {
            Effect::ScheduleDispatch { epoch } => {
                Task::perform(tokio::time::sleep(self.submit_delay), move |_| {
                    Message::DispatchReady(epoch)
                })
            }
            Effect::Send { epoch, contents, cancel } => {
                let client = self.client.clone();
                Task::perform(
                    async move { client.generate(contents, cancel).await },
                    move |result| Message::ResponseReceived(epoch, result),
                )
            }
            Effect::ScrollToEnd => {
                scrollable::snap_to(self.chat_id.clone(), scrollable::RelativeOffset::END)
            }
        }))
    }

    fn subscription(&self) -> Subscription<Message> {
        let reveal = if self.session.is_revealing() {
            time::every(self.reveal_tick).map(|_| Message::RevealTick)
        } else {
            Subscription::none()
        };

        let spinner = if self.session.is_waiting() {
            time::every(Duration::from_millis(80)).map(|_| Message::SpinnerTick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| match event {
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) => Some(Message::Stop),
            IcedEvent::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        Subscription::batch([reveal, spinner, events])
    }

    fn view(&self) -> Element<Message> {
        let header = row![
            text("RepairVision").size(22).width(Length::Fill),
            button(text(self.theme.toggle_label()).size(14))
                .on_press(Message::ToggleTheme)
                .padding(8),
            button(text("Delete all").size(14))
                .on_press_maybe((!self.session.entries().is_empty()).then_some(Message::DeleteAll))
                .padding(8),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        let body: Element<Message> = if self.session.entries().is_empty() {
            self.suggestions_view()
        } else {
            let bubbles = Column::with_children(
                self.session.entries().iter().map(|entry| self.entry_view(entry)),
            )
            .spacing(12)
            .padding(Padding::from([10, 15]));

            scrollable(bubbles)
                .id(self.chat_id.clone())
                .height(Length::Fill)
                .into()
        };

        let mut footer = column![].spacing(6);

        if let Some(pending) = self.session.pending() {
            let kind = match pending.kind() {
                AttachmentKind::Image => "[image]",
                AttachmentKind::File => "[file]",
            };
            footer = footer.push(
                row![
                    text(format!("{} {}", kind, pending.file_name)).size(14).width(Length::Fill),
                    button(text("Remove").size(13))
                        .on_press(Message::CancelAttachment)
                        .padding(6),
                ]
                .spacing(10)
                .align_y(alignment::Vertical::Center),
            );
        }

        if let Some(notice) = self.session.notice() {
            footer = footer.push(text(notice.to_string()).size(13).color(ERROR_COLOR));
        }

        let idle = self.session.is_idle();
        let input = text_input("Ask about a repair, or drop a photo of the problem...", &self.input_text)
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16)
            .id(self.input_id.clone());

        footer = footer.push(
            row![
                input,
                button(text("Send").size(14))
                    .on_press_maybe(idle.then_some(Message::Submit))
                    .padding(12),
                button(text("Stop").size(14))
                    .on_press_maybe((!idle).then_some(Message::Stop))
                    .padding(12),
            ]
            .spacing(8)
            .align_y(alignment::Vertical::Center),
        );

        container(column![header, body, footer].spacing(10).padding(10))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn suggestions_view(&self) -> Element<Message> {
        let mut list = column![
            text("Hello there").size(28),
            text("Describe a problem or drop a photo and I'll suggest a fix.").size(15),
        ]
        .spacing(10);

        for suggestion in &self.suggestions {
            list = list.push(
                button(text(suggestion.clone()).size(14))
                    .on_press(Message::Suggestion(suggestion.clone()))
                    .padding(10)
                    .width(Length::Fill),
            );
        }

        container(list)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(15)
            .align_y(alignment::Vertical::Center)
            .into()
    }

    fn entry_view<'a>(&self, entry: &'a ChatEntry) -> Element<'a, Message> {
        let body = if entry.status == EntryStatus::Loading && self.session.is_waiting() {
            format!("{} {}", SPINNER_FRAMES[self.spinner_frame], entry.text)
        } else {
            entry.text.clone()
        };

        let mut label = text(body).size(15);
        if entry.status == EntryStatus::Error {
            label = label.color(ERROR_COLOR);
        }

        let bubble = container(label)
            .padding(12)
            .max_width(560)
            .style(container::rounded_box);

        let align = match entry.role {
            Role::User => alignment::Horizontal::Right,
            Role::Model => alignment::Horizontal::Left,
        };

        container(bubble).width(Length::Fill).align_x(align).into()
    }

    fn theme(&self) -> Theme {
        match self.theme {
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::TokyoNight,
        }
    }
}
