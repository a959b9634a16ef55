//! Terminal rendering of messages, conversations and projects.

use folio_api::{Conversation, Message, Project, Role};
use folio_core::segment::{Segment, segments};
use owo_colors::OwoColorize;

/// The bar drawn at the start of every rendered line.
pub const BAR_CHAR: &str = "▎";

/// Renders domain values as terminal text, with or without colors.
#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Creates a renderer.
    #[inline]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Renders a message, one line per output line.
    ///
    /// Assistant messages are split into prose and code; code blocks are
    /// labeled with their language and drawn with their own bar color.
    pub fn message(&self, message: &Message) -> String {
        let mut lines = vec![];
        match message.role {
            Role::User => {
                let bar = self.paint(BAR_CHAR, |s| s.bright_green().to_string());
                for line in message.text.trim().lines() {
                    lines.push(format!("{bar} {line}"));
                }
            }
            Role::Assistant => {
                let prose_bar =
                    self.paint(BAR_CHAR, |s| s.bright_cyan().to_string());
                let code_bar =
                    self.paint(BAR_CHAR, |s| s.bright_yellow().to_string());
                for segment in segments(&message.text) {
                    match segment {
                        Segment::Prose(text) => {
                            for line in text.trim().lines() {
                                let line =
                                    self.paint(line, |s| s.bright_white().to_string());
                                lines.push(format!("{prose_bar} {line}"));
                            }
                        }
                        Segment::Code(block) => {
                            let label = format!("[{}]", block.language());
                            let label = self.paint(&label, |s| s.dimmed().to_string());
                            lines.push(format!("{code_bar} {label}"));
                            for line in block.code().lines() {
                                lines.push(format!("{code_bar} {line}"));
                            }
                        }
                    }
                }
            }
        }

        let icon = match message.role {
            Role::User => "🧑",
            Role::Assistant => "🤖",
        };
        match lines.first_mut() {
            Some(first) => {
                // Put the icon right behind the bar of the first line.
                if let Some(pos) = first.find(' ') {
                    first.replace_range(pos..pos + 1, &format!("{icon} "));
                }
            }
            None => lines.push(format!("{BAR_CHAR}{icon}")),
        }
        lines.join("\n")
    }

    /// Renders a whole transcript.
    pub fn transcript(&self, messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| self.message(m))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Renders a line of the conversation list.
    pub fn conversation(&self, conversation: &Conversation, active: bool) -> String {
        let marker = if active { "*" } else { " " };
        let id = format!("#{}", conversation.id);
        let mut line = format!(
            "{marker} {:>6}  {}",
            self.paint(&id, |s| s.bold().to_string()),
            conversation.label()
        );
        if let Some(updated_at) = conversation.updated_at {
            let stamp = updated_at.format("%Y-%m-%d %H:%M").to_string();
            line.push_str(&format!(
                "  {}",
                self.paint(&stamp, |s| s.dimmed().to_string())
            ));
        }
        line
    }

    /// Renders a project of the gallery.
    pub fn project(&self, project: &Project) -> String {
        let mut out = self.paint(&project.title, |s| s.bold().to_string());
        let description = project.description.trim();
        if !description.is_empty() {
            out.push_str(&format!("\n  {description}"));
        }
        let technologies = project.technologies().collect::<Vec<_>>();
        if !technologies.is_empty() {
            let technologies = technologies.join(" · ");
            out.push_str(&format!(
                "\n  {}",
                self.paint(&technologies, |s| s.cyan().to_string())
            ));
        }
        for link in [&project.github_link, &project.live_link].into_iter().flatten() {
            out.push_str(&format!("\n  {link}"));
        }
        out
    }

    /// Renders an error line.
    pub fn error(&self, message: &str) -> String {
        let text = format!("⚠️  {message}");
        self.paint(&text, |s| s.bright_red().to_string())
    }

    fn paint(&self, text: &str, f: impl Fn(&str) -> String) -> String {
        if self.color { f(text) } else { text.to_owned() }
    }
}
