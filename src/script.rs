//! Line-oriented replay scripts: one step per line, `#` starts a comment.
//!
//! ```text
//! nav /directory/home?sort=-size
//! begin 1
//! wait 50
//! end 1
//! fail 2 500 --toast Could not load preview
//! toast --on-load Saved
//! dialog Delete file?
//! action 1 delete
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::dialog::{DialogRequest, Toast};
use crate::error::{AppError, AppResult};
use crate::navigation::NavigationEvent;
use crate::resource::{ErrorInfo, RequestOptions, TrackedRequest};
use crate::scroll::{ScrollMatch, ScrollRestore, ScrollTracker};
use crate::selection::Item;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Navigate(String),
    Back,
    Forward,
    Begin {
        id: u64,
        suppress_loader: bool,
    },
    End {
        id: u64,
    },
    Fail {
        id: u64,
        status: Option<u16>,
        toast: bool,
        message: Option<String>,
    },
    Wait(Duration),
    Select(Item),
    SelectAll,
    Scroll(u32),
    Toast(Toast),
    Dialog(DialogRequest),
    Action {
        id: u64,
        name: String,
    },
    Close(u64),
}

pub fn parse_script(text: &str) -> AppResult<Vec<Step>> {
    let mut steps = Vec::new();
    for (index, line) in text.lines().enumerate() {
        match parse_step(line) {
            Ok(Some(step)) => steps.push(step),
            Ok(None) => {}
            Err(err) => {
                return Err(AppError::invalid_argument(format!(
                    "line {}: {err}",
                    index + 1
                )));
            }
        }
    }
    Ok(steps)
}

/// `Ok(None)` for blank and comment lines.
pub fn parse_step(line: &str) -> AppResult<Option<Step>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (id, args) = match trimmed.find(char::is_whitespace) {
        Some(index) => (&trimmed[..index], trimmed[index..].trim_start()),
        None => (trimmed, ""),
    };

    let step = match id {
        "nav" => Step::Navigate(required(id, args, "url")?.to_string()),
        "back" => parse_no_args(id, args, Step::Back)?,
        "forward" => parse_no_args(id, args, Step::Forward)?,
        "begin" => {
            let (flag, rest) = take_flag(args, "--no-loader");
            Step::Begin {
                id: parse_number(id, rest, "request id")?,
                suppress_loader: flag,
            }
        }
        "end" => Step::End {
            id: parse_number(id, args, "request id")?,
        },
        "fail" => parse_fail(args)?,
        "wait" => Step::Wait(Duration::from_millis(parse_number(id, args, "milliseconds")?)),
        "select" => parse_select(args)?,
        "select-all" => parse_no_args(id, args, Step::SelectAll)?,
        "scroll" => Step::Scroll(parse_number(id, args, "offset")?),
        "toast" => {
            let (on_load, text) = take_flag(args, "--on-load");
            let toast = Toast::info(required(id, text, "text")?);
            Step::Toast(if on_load { toast.on_page_load() } else { toast })
        }
        "dialog" => Step::Dialog(DialogRequest::new(required(id, args, "title")?)),
        "action" => {
            let (dialog, name) = split_first(args);
            Step::Action {
                id: parse_number(id, dialog, "dialog id")?,
                name: required(id, name, "action name")?.to_string(),
            }
        }
        "close" => Step::Close(parse_number(id, args, "dialog id")?),
        other => {
            return Err(AppError::invalid_argument(format!("unknown step `{other}`")));
        }
    };
    Ok(Some(step))
}

fn parse_no_args(id: &str, args: &str, step: Step) -> AppResult<Step> {
    if args.is_empty() {
        return Ok(step);
    }
    Err(AppError::invalid_argument(format!(
        "{id} does not accept arguments"
    )))
}

fn required<'a>(id: &str, args: &'a str, what: &str) -> AppResult<&'a str> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_argument(format!("{id} requires {what}")));
    }
    Ok(trimmed)
}

fn parse_number<T: std::str::FromStr>(id: &str, args: &str, what: &str) -> AppResult<T> {
    let text = required(id, args, what)?;
    text.parse::<T>()
        .map_err(|_| AppError::invalid_argument(format!("{id}: invalid {what} `{text}`")))
}

fn split_first(args: &str) -> (&str, &str) {
    match args.find(char::is_whitespace) {
        Some(index) => (&args[..index], args[index..].trim_start()),
        None => (args, ""),
    }
}

fn take_flag<'a>(args: &'a str, flag: &str) -> (bool, &'a str) {
    let (first, rest) = split_first(args);
    if first == flag {
        (true, rest)
    } else {
        (false, args)
    }
}

fn parse_fail(args: &str) -> AppResult<Step> {
    let (id_text, rest) = split_first(args);
    let id = parse_number("fail", id_text, "request id")?;
    let (status_text, rest) = split_first(rest);
    let status = match status_text {
        "-" => None,
        text => Some(parse_number("fail", text, "status")?),
    };
    let (toast, message) = take_flag(rest, "--toast");
    let message = Some(message.trim())
        .filter(|message| !message.is_empty())
        .map(str::to_string);
    Ok(Step::Fail {
        id,
        status,
        toast,
        message,
    })
}

fn parse_select(args: &str) -> AppResult<Step> {
    let (kind, rest) = split_first(args);
    let (id, name) = split_first(rest);
    let id = required("select", id, "item id")?;
    let name = if name.is_empty() { id } else { name };
    match kind {
        "file" => Ok(Step::Select(Item::file(id, name))),
        "dir" | "directory" => Ok(Step::Select(Item::directory(id, name))),
        _ => Err(AppError::invalid_argument(
            "select requires `file` or `dir` followed by an id",
        )),
    }
}

/// Applies steps to a session. Scroll offsets are tracked per logical page the way a
/// mounted directory view would track them.
pub struct ScriptRunner<'a> {
    session: &'a Session,
    scroll: ScrollTracker,
    requests: HashMap<u64, TrackedRequest>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            scroll: ScrollTracker::new(Arc::clone(session.scroll_history()), ScrollMatch::Path),
            requests: HashMap::new(),
        }
    }

    /// Returns the scroll decision for steps that navigated.
    pub async fn run(&mut self, step: &Step) -> AppResult<Option<ScrollRestore>> {
        let navigator = self.session.navigator();
        match step {
            Step::Navigate(url) => {
                let event = navigator.navigate(url)?;
                return Ok(Some(self.after_navigation(&event)));
            }
            Step::Back | Step::Forward => {
                let event = if *step == Step::Back {
                    navigator.back()
                } else {
                    navigator.forward()
                };
                let Some(event) = event else {
                    tracing::warn!(?step, "no history entry in that direction");
                    return Ok(None);
                };
                return Ok(Some(self.after_navigation(&event)));
            }
            Step::Begin {
                id,
                suppress_loader,
            } => {
                let request = TrackedRequest::new(
                    *id,
                    RequestOptions {
                        suppress_loader: *suppress_loader,
                        ..RequestOptions::default()
                    },
                );
                self.session.coordinator().begin(&request);
                self.requests.insert(*id, request);
            }
            Step::End { id } => {
                let request = self
                    .requests
                    .remove(id)
                    .unwrap_or_else(|| TrackedRequest::new(*id, RequestOptions::default()));
                self.session.coordinator().end(&request);
            }
            Step::Fail {
                id,
                status,
                toast,
                message,
            } => {
                let request = TrackedRequest::new(
                    *id,
                    RequestOptions {
                        show_as_toast: *toast,
                        message: message.clone().filter(|_| *toast),
                        ..RequestOptions::default()
                    },
                );
                let error = ErrorInfo::new(
                    *status,
                    message.clone().unwrap_or_else(|| "request failed".to_string()),
                );
                self.session.coordinator().fail(&request, error);
            }
            Step::Wait(duration) => tokio::time::sleep(*duration).await,
            Step::Select(item) => {
                self.session.selection().toggle(item);
            }
            Step::SelectAll => self.session.selection().request_select_all(),
            Step::Scroll(offset) => self.scroll.on_scroll(*offset),
            Step::Toast(toast) => self.session.dialogs().toast(toast.clone()),
            Step::Dialog(request) => {
                let ticket = self.session.dialogs().open(request.clone());
                tracing::debug!(dialog = ticket.id(), "dialog requested");
            }
            Step::Action { id, name } => self.session.dialogs().action(*id, name)?,
            Step::Close(id) => self.session.dialogs().close(*id)?,
        }
        Ok(None)
    }

    /// Waits long enough for every pending debounce timer to fire.
    pub async fn drain(&self) {
        let config = &self.session.config().coordinator;
        let longest = config.loading_hide_delay().max(config.error_flush_delay());
        tokio::time::sleep(longest + Duration::from_millis(1)).await;
    }

    fn after_navigation(&self, event: &Arc<NavigationEvent>) -> ScrollRestore {
        self.scroll.on_navigation(event)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ScriptRunner, Step, parse_script, parse_step};
    use crate::config::Config;
    use crate::event::{UiBus, UiEvent};
    use crate::scroll::ScrollRestore;
    use crate::selection::Item;
    use crate::session::Session;

    #[test]
    fn parses_every_step_kind() {
        let script = "\
# warm up
nav /directory/home?sort=-name,+size
back
forward
begin 1 --no-loader
end 1
fail 2 500 --toast Preview failed
fail 3 - boom
wait 50
select file 7 notes.txt
select-all
scroll 120
toast --on-load Saved
dialog Delete file?
action 1 delete
close 2
";
        let steps = parse_script(script).expect("script should parse");
        assert_eq!(steps.len(), 15);
        assert_eq!(steps[0], Step::Navigate("/directory/home?sort=-name,+size".into()));
        assert_eq!(
            steps[3],
            Step::Begin {
                id: 1,
                suppress_loader: true
            }
        );
        assert_eq!(
            steps[5],
            Step::Fail {
                id: 2,
                status: Some(500),
                toast: true,
                message: Some("Preview failed".into())
            }
        );
        assert_eq!(
            steps[6],
            Step::Fail {
                id: 3,
                status: None,
                toast: false,
                message: Some("boom".into())
            }
        );
        assert_eq!(steps[7], Step::Wait(Duration::from_millis(50)));
        assert_eq!(steps[8], Step::Select(Item::file("7", "notes.txt")));
        assert!(matches!(&steps[11], Step::Toast(toast) if toast.show_on_page_load));
    }

    #[test]
    fn reports_line_of_bad_step() {
        let err = parse_script("nav /a\nwait soon\n").expect_err("bad wait should fail");
        assert!(err.to_string().contains("line 2"));
        assert!(parse_step("back now").is_err());
        assert!(parse_step("teleport /a").is_err());
        assert!(parse_step("nav").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_produces_debounced_signals() {
        let bus = UiBus::new();
        let (_listener, rx) = bus.listen();
        let session = Session::with_bus(Config::default(), bus).expect("session should build");
        let mut runner = ScriptRunner::new(&session);
        let steps = parse_script(concat!(
            "nav /directory/a\nscroll 90\nnav /directory/b\n",
            "begin 1\nbegin 2\nend 1\nwait 50\nend 2\nback\n",
        ))
        .expect("script should parse");

        let mut restores = Vec::new();
        for step in &steps {
            if let Some(restore) = runner.run(step).await.expect("step should apply") {
                restores.push(restore);
            }
        }
        runner.drain().await;

        assert_eq!(
            restores,
            [ScrollRestore::Top, ScrollRestore::Top, ScrollRestore::Offset(90)]
        );
        let loading: Vec<bool> = rx
            .try_iter()
            .filter_map(|event| match event {
                UiEvent::LoadingUpdate { show } => Some(show),
                _ => None,
            })
            .collect();
        assert_eq!(loading, [true, false]);
    }
}
