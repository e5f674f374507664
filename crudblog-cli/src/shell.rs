//! Interactive loop over a [`BlogController`].

use crudblog::{Action, AppState, BlogController, PostId};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::render;

pub const HELP: &str = "\
Commands:
  list               re-fetch and show every post
  view <id>          show a post in full
  close              close the view pane
  edit <id>          load a post you own into the edit form
  title <text>       set the form title
  content <text>     set the form content
  cancel             reset the form to a new post
  submit             create or update from the form
  delete <id>        delete a post you own
  login <username>   sign in (password asked next)
  logout             sign out
  help               show this help
  quit               leave the shell

Ids may be shortened to any unique prefix.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    View(String),
    Close,
    Edit(String),
    Title(String),
    Content(String),
    Cancel,
    Submit,
    Delete(String),
    Login(String),
    Logout,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let argument = |name: &str| {
            if rest.is_empty() {
                Err(format!("usage: {} <{}>", word, name))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "view" => Self::View(argument("id")?),
            "close" => Self::Close,
            "edit" => Self::Edit(argument("id")?),
            // Title and content may be set to empty text on purpose.
            "title" => Self::Title(rest.to_string()),
            "content" => Self::Content(rest.to_string()),
            "cancel" | "new" => Self::Cancel,
            "submit" | "save" => Self::Submit,
            "delete" | "rm" => Self::Delete(argument("id")?),
            "login" => Self::Login(argument("username")?),
            "logout" => Self::Logout,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

/// Expand a typed id to a post id: exact match first, then a unique prefix
pub fn resolve_id(state: &AppState, input: &str) -> PostId {
    let exact = PostId::new(input);
    if state.post(&exact).is_some() {
        return exact;
    }
    let mut matches = state.posts().iter().filter(|p| p.id.as_str().starts_with(input));
    match (matches.next(), matches.next()) {
        (Some(post), None) => post.id.clone(),
        _ => exact,
    }
}

pub struct Shell<R = Stdin> {
    controller: BlogController,
    input: Lines<BufReader<R>>,
}

impl Shell {
    pub fn new(controller: BlogController) -> Self {
        Self::with_input(controller, tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> Shell<R> {
    /// Shell reading commands from `input` instead of stdin
    pub fn with_input(controller: BlogController, input: R) -> Self {
        Self {
            controller,
            input: BufReader::new(input).lines(),
        }
    }

    pub fn controller(&self) -> &BlogController {
        &self.controller
    }

    async fn prompt(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
        Ok(self.input.next_line().await?)
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}\n\nType 'help' for commands.", render::screen(self.controller.state()));

        while let Some(line) = self.prompt("> ").await? {
            let command = match ShellCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    println!("{}", message);
                    continue;
                }
            };
            debug!("Shell command {:?}", command);

            match command {
                ShellCommand::Quit => break,
                ShellCommand::Help => {
                    println!("{}", HELP);
                    continue;
                }
                command => {
                    // Failures are already recorded in the state and rendered below.
                    let _ = self.execute(command).await;
                }
            }
            println!("{}", render::screen(self.controller.state()));
        }

        Ok(())
    }

    fn cancel_sign_in(&mut self, reason: String) -> crudblog::Result<()> {
        self.controller
            .dispatch(Action::RequestFailed(format!("Sign-in cancelled: {}", reason)))
    }

    async fn execute(&mut self, command: ShellCommand) -> crudblog::Result<()> {
        if let ShellCommand::Login(username) = command {
            let password = match self.prompt("Password: ").await {
                Ok(Some(password)) => password,
                Ok(None) => return self.cancel_sign_in("no password entered".to_string()),
                Err(e) => return self.cancel_sign_in(e.to_string()),
            };
            return self.controller.sign_in(&username, &password).await;
        }

        let controller = &mut self.controller;
        controller.dispatch(Action::DismissError)?;

        match command {
            ShellCommand::List => controller.refresh().await,
            ShellCommand::View(id) => {
                let id = resolve_id(controller.state(), &id);
                controller.dispatch(Action::View(id))
            }
            ShellCommand::Close => controller.dispatch(Action::CloseView),
            ShellCommand::Edit(id) => {
                let id = resolve_id(controller.state(), &id);
                controller.dispatch(Action::BeginUpdate(id))
            }
            ShellCommand::Title(title) => controller.dispatch(Action::EditTitle(title)),
            ShellCommand::Content(content) => controller.dispatch(Action::EditContent(content)),
            ShellCommand::Cancel => controller.dispatch(Action::CancelEdit),
            ShellCommand::Submit => match controller.submit().await? {
                Some(post) => {
                    println!("Saved \"{}\"", post.title);
                    Ok(())
                }
                None => {
                    println!("Nothing to create: title and content are both required");
                    Ok(())
                }
            },
            ShellCommand::Delete(id) => {
                let id = resolve_id(controller.state(), &id);
                controller.delete(&id).await
            }
            ShellCommand::Logout => controller.sign_out().await,
            ShellCommand::Login(_) | ShellCommand::Help | ShellCommand::Quit => Ok(()),
        }
    }
}
