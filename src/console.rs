//! Line-oriented front-end.
//!
//! Lines starting with `/` are commands; anything else is sent as a message
//! to the selected conversation.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};

use crate::api::Attachment;
use crate::core::errors::ChatError;
use crate::core::ids::ConversationId;
use crate::core::model::{Message, Sender};
use crate::exchange::SendOutcome;
use crate::session::{CHAT_ROUTE, LOGIN_ROUTE, Navigator};
use crate::state::ClientState;

const HELP: &str = "\
commands:
  /login <username> <password>    sign in
  /register <username> <password> create an account and sign in
  /logout                         sign out
  /whoami                         show the signed-in user
  /list                           refresh and list conversations
  /new [title]                    create a conversation
  /open <id>                      select a conversation and show it
  /show                           show the selected conversation
  /rename <id> <title>            rename a conversation
  /delete <id>                    delete a conversation
  /attach <path>                  stage a file for the next message
  /detach                         drop the staged file
  /send [text]                    send text and/or the staged file
  /help                           this text
  /quit                           exit
anything else is sent as a message";

/// Output of one handled line.
#[derive(Debug, Default)]
pub struct Reply {
    /// Lines to print.
    pub lines: Vec<String>,
    /// Whether the loop should stop.
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            quit: false,
        }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}

/// Interactive console over a [`ClientState`].
pub struct Console {
    state: Arc<ClientState>,
    routes: Mutex<watch::Receiver<String>>,
}

impl Console {
    /// Create a console.
    #[must_use]
    pub fn new(state: Arc<ClientState>) -> Self {
        let routes = Mutex::new(state.routes.subscribe());
        Self { state, routes }
    }

    /// Read lines from `input` until EOF or `/quit`, writing replies to `output`.
    ///
    /// # Errors
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut greeting = Reply::line("convo client, /help for commands");
        for line in self.startup().await.lines {
            greeting.push(line);
        }
        write_reply(&mut output, &greeting).await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let reply = self.handle(&line).await;
            write_reply(&mut output, &reply).await?;
            if reply.quit {
                break;
            }
        }
        Ok(())
    }

    /// Load conversations when a session was restored at startup.
    pub async fn startup(&self) -> Reply {
        if self.state.session.is_authenticated().await {
            let mut reply = Reply::default();
            if let Some(user) = self.state.session.current_user().await {
                reply.push(format!("signed in as {}", user.username));
            }
            self.refresh(&mut reply).await;
            reply
        } else {
            Reply::line("please /login or /register")
        }
    }

    /// Handle one input line.
    pub async fn handle(&self, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::default();
        }

        let mut reply = match line.strip_prefix('/') {
            Some(command) => {
                let (name, rest) = command
                    .split_once(char::is_whitespace)
                    .map_or((command, ""), |(name, rest)| (name, rest.trim()));
                self.command(name, rest).await
            }
            None => self.send(line).await,
        };

        self.check_redirect(&mut reply).await;
        reply
    }

    async fn command(&self, name: &str, rest: &str) -> Reply {
        match name {
            "help" => Reply::line(HELP),
            "quit" | "exit" => Reply {
                lines: Vec::new(),
                quit: true,
            },
            "login" | "register" => self.authenticate(name == "register", rest).await,
            _ if !self.state.session.is_authenticated().await => {
                Reply::line("please /login or /register first")
            }
            "logout" => self.logout().await,
            "whoami" => match self.state.session.current_user().await {
                Some(user) => Reply::line(format!("{} (id {})", user.username, user.id)),
                None => Reply::line("not signed in"),
            },
            "list" => {
                let mut reply = Reply::default();
                self.refresh(&mut reply).await;
                reply
            }
            "new" => self.create(rest).await,
            "open" => match parse_id(rest) {
                Ok(id) => self.open(id).await,
                Err(reply) => reply,
            },
            "show" => self.show_selected().await,
            "rename" => self.rename(rest).await,
            "delete" => match parse_id(rest) {
                Ok(id) => self.delete(id).await,
                Err(reply) => reply,
            },
            "attach" => self.attach(rest).await,
            "detach" => {
                self.state.exchange.clear_attachment();
                Reply::line("attachment dropped")
            }
            "send" => self.send(rest).await,
            other => Reply::line(format!("unknown command /{other}, try /help")),
        }
    }

    async fn authenticate(&self, register: bool, rest: &str) -> Reply {
        let mut parts = rest.split_whitespace();
        let (Some(username), Some(password)) = (parts.next(), parts.next()) else {
            return Reply::line("usage: /login <username> <password>");
        };

        let session = &self.state.session;
        let api = self.state.api.as_ref();
        let result = if register {
            session.register(api, username, password).await
        } else {
            session.login(api, username, password).await
        };

        match result {
            Ok(user) => {
                // Consume our own navigation so it is not mistaken for a redirect.
                self.state.routes.navigate(CHAT_ROUTE);
                self.routes.lock().await.borrow_and_update();
                let mut reply = Reply::line(format!("signed in as {}", user.username));
                self.refresh(&mut reply).await;
                reply
            }
            Err(message) => {
                // A rejected sign-in is not an expired session.
                self.routes.lock().await.borrow_and_update();
                Reply::line(message)
            }
        }
    }

    async fn logout(&self) -> Reply {
        self.state.session.logout().await;
        self.state.directory.reset().await;
        self.state.routes.navigate(LOGIN_ROUTE);
        self.routes.lock().await.borrow_and_update();
        Reply::line("signed out")
    }

    async fn refresh(&self, reply: &mut Reply) {
        let directory = &self.state.directory;
        if let Err(err) = directory.list().await {
            self.report(reply, &err).await;
            return;
        }
        if let Err(err) = directory.load_pending().await {
            self.report(reply, &err).await;
        }

        let conversations = directory.conversations().await;
        if conversations.is_empty() {
            reply.push("no conversations yet, /new to start one");
            return;
        }
        let selected = directory.selected_id().await;
        for conversation in conversations {
            let marker = if Some(conversation.id) == selected { '*' } else { ' ' };
            reply.push(format!("{marker} {:>4}  {}", conversation.id.get(), conversation.title));
        }
    }

    async fn create(&self, title: &str) -> Reply {
        let title = (!title.is_empty()).then_some(title);
        match self.state.directory.create(title).await {
            Ok(id) => {
                let title = self
                    .state
                    .directory
                    .conversation(id)
                    .await
                    .map(|c| c.title)
                    .unwrap_or_default();
                Reply::line(format!("created {id}: {title}"))
            }
            Err(err) => self.failure(&err).await,
        }
    }

    async fn open(&self, id: ConversationId) -> Reply {
        if let Err(err) = self.state.directory.activate(Some(id)).await {
            return self.failure(&err).await;
        }
        self.show_selected().await
    }

    async fn show_selected(&self) -> Reply {
        let Some(conversation) = self.state.directory.selected().await else {
            return Reply::line("no conversation selected");
        };
        let mut reply = Reply::line(format!("== {} ({})", conversation.title, conversation.id));
        if conversation.messages().is_empty() {
            reply.push("(no messages)");
        }
        for message in conversation.messages() {
            reply.push(render_message(message));
        }
        reply
    }

    async fn rename(&self, rest: &str) -> Reply {
        let Some((raw_id, title)) = rest.split_once(char::is_whitespace) else {
            return Reply::line("usage: /rename <id> <title>");
        };
        let id = match parse_id(raw_id) {
            Ok(id) => id,
            Err(reply) => return reply,
        };
        match self.state.directory.rename(id, title).await {
            Ok(crate::directory::RenameOutcome::Unchanged) => Reply::line("title unchanged"),
            Ok(crate::directory::RenameOutcome::Renamed) => {
                Reply::line(format!("renamed {id} to {}", title.trim()))
            }
            Err(err) => self.failure(&err).await,
        }
    }

    async fn delete(&self, id: ConversationId) -> Reply {
        let directory = &self.state.directory;
        match directory.delete(id).await {
            Ok(()) => {
                let mut reply = Reply::line(format!("deleted {id}"));
                if let Err(err) = directory.load_pending().await {
                    self.report(&mut reply, &err).await;
                }
                match directory.selected().await {
                    Some(selected) => reply.push(format!("now in {}: {}", selected.id, selected.title)),
                    None => reply.push("no conversations left"),
                }
                reply
            }
            Err(err) => self.failure(&err).await,
        }
    }

    async fn attach(&self, path: &str) -> Reply {
        if path.is_empty() {
            return Reply::line("usage: /attach <path>");
        }
        match Attachment::from_path(path, self.state.config.max_upload_bytes).await {
            Ok(attachment) => {
                let line = format!(
                    "attached {} ({}, {} bytes)",
                    attachment.file_name(),
                    attachment.content_type(),
                    attachment.size()
                );
                self.state.exchange.stage_attachment(attachment);
                Reply::line(line)
            }
            Err(e) => Reply::line(format!("Failed to read {path}: {e}")),
        }
    }

    async fn send(&self, text: &str) -> Reply {
        if !self.state.session.is_authenticated().await {
            return Reply::line("please /login or /register first");
        }
        let Some(id) = self.state.directory.selected_id().await else {
            return Reply::line("no conversation selected, /new to start one");
        };

        let exchange = &self.state.exchange;
        exchange.set_input(text);
        match exchange.submit(id).await {
            Ok(SendOutcome::Replied(message)) => Reply::line(render_message(&message)),
            Ok(SendOutcome::Failed(err)) => {
                if err.is_auth_rejected() {
                    return Reply::default();
                }
                let notice = self
                    .state
                    .directory
                    .messages(id)
                    .await
                    .into_iter()
                    .rev()
                    .find(|m| m.is_error);
                notice.map_or_else(|| Reply::line(err.to_string()), |m| Reply::line(render_message(&m)))
            }
            Err(ChatError::EmptyInput) => Reply::default(),
            Err(err) => self.failure(&err).await,
        }
    }

    /// Describe a failed action; auth rejections are reported by the redirect.
    async fn failure(&self, err: &ChatError) -> Reply {
        let mut reply = Reply::default();
        self.report(&mut reply, err).await;
        reply
    }

    async fn report(&self, reply: &mut Reply, err: &ChatError) {
        if err.is_auth_rejected() {
            return;
        }
        match self.state.directory.last_error().await {
            Some(banner) => reply.push(format!("! {banner}")),
            None => reply.push(format!("! {err}")),
        }
    }

    async fn check_redirect(&self, reply: &mut Reply) {
        let mut routes = self.routes.lock().await;
        if !routes.has_changed().unwrap_or(false) {
            return;
        }
        let route = routes.borrow_and_update().clone();
        if route == LOGIN_ROUTE {
            self.state.directory.reset().await;
            reply.push("session expired, please /login again");
        }
    }
}

fn parse_id(raw: &str) -> Result<ConversationId, Reply> {
    raw.parse()
        .map_err(|_| Reply::line(format!("invalid conversation id {raw:?}")))
}

fn render_message(message: &Message) -> String {
    let time = message.timestamp.format("%H:%M");
    let who = match (message.sender, message.is_error) {
        (_, true) => "!",
        (Sender::User, false) => "you",
        (Sender::Bot, false) => "bot",
    };
    let mut line = format!("[{time}] {who}: {}", message.text);
    if let Some(info) = &message.file_info {
        line.push_str(&format!(
            " [{} {}: {}]",
            info.file_type, info.original_file_name, info.url
        ));
    }
    line
}

async fn write_reply<W>(output: &mut W, reply: &Reply) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in &reply.lines {
        output
            .write_all(format!("{line}\n").as_bytes())
            .await
            .context("Failed to write output")?;
    }
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}
