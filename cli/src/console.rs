//! Line-oriented console transport for one local operator session.
//!
//! This is the development stand-in for a chat transport: it maps typed
//! lines onto operator events and prints the engine's replies with button
//! hints. A real deployment replaces this file with its own adapter.

use std::path::PathBuf;

use tokio::io::AsyncBufReadExt;
use tracing::info;

use sandgate_core::api::{
    ButtonPress, IncomingFile, OperatorEvent, OperatorId, Reply, ReplyButton, SessionContext,
    SessionEngine,
};

pub async fn drive(engine: SessionEngine, operator: OperatorId) -> anyhow::Result<()> {
    let mut ctx = SessionContext::new(operator);
    render(&engine.handle(&mut ctx, OperatorEvent::Start).await);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                let event = parse_event(line);
                render(&engine.handle(&mut ctx, event).await);
            }
        }
    }
    info!(operator, "console session closed");
    Ok(())
}

fn parse_event(line: &str) -> OperatorEvent {
    if let Some(rest) = line.strip_prefix("/file ") {
        let path = PathBuf::from(rest.trim());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        return OperatorEvent::File(IncomingFile {
            file_name,
            local_path: path,
        });
    }
    if let Some(rest) = line.strip_prefix("/btn ") {
        if let Some(press) = press_from(rest.trim()) {
            return OperatorEvent::Button(press);
        }
    }
    OperatorEvent::Text(line.to_string())
}

fn press_from(name: &str) -> Option<ButtonPress> {
    match name {
        "check" => Some(ButtonPress::CheckAccess),
        "sandbox" => Some(ButtonPress::OpenSandbox),
        "file" => Some(ButtonPress::SubmitFile),
        "link" => Some(ButtonPress::SubmitLink),
        "stats" => Some(ButtonPress::ShowStats),
        "health" => Some(ButtonPress::ServiceHealth),
        "submit" => Some(ButtonPress::SubmitNow),
        "refresh" => Some(ButtonPress::RefreshOutcome),
        "menu" => Some(ButtonPress::ReturnToMenu),
        _ => None,
    }
}

fn hint(press: ButtonPress) -> &'static str {
    match press {
        ButtonPress::CheckAccess => "/btn check",
        ButtonPress::OpenSandbox => "/btn sandbox",
        ButtonPress::SubmitFile => "/btn file",
        ButtonPress::SubmitLink => "/btn link",
        ButtonPress::ShowStats => "/btn stats",
        ButtonPress::ServiceHealth => "/btn health",
        ButtonPress::SubmitNow => "/btn submit",
        ButtonPress::RefreshOutcome => "/btn refresh",
        ButtonPress::ReturnToMenu => "/btn menu",
    }
}

fn render(replies: &[Reply]) {
    for reply in replies {
        println!("{}", reply.text);
        if !reply.buttons.is_empty() {
            let hints: Vec<String> = reply
                .buttons
                .iter()
                .map(|button| match button {
                    ReplyButton::Press(press) => format!("[{}]", hint(*press)),
                    ReplyButton::JobLink { url } => format!("[open {url}]"),
                })
                .collect();
            println!("{}", hints.join(" "));
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn button_hints_parse_back_to_the_same_press() {
        let presses = [
            ButtonPress::CheckAccess,
            ButtonPress::OpenSandbox,
            ButtonPress::SubmitFile,
            ButtonPress::SubmitLink,
            ButtonPress::ShowStats,
            ButtonPress::ServiceHealth,
            ButtonPress::SubmitNow,
            ButtonPress::RefreshOutcome,
            ButtonPress::ReturnToMenu,
        ];
        for press in presses {
            let name = hint(press).strip_prefix("/btn ").unwrap();
            assert_eq!(press_from(name), Some(press));
        }
    }

    #[test]
    fn lines_map_to_events() {
        assert_eq!(
            parse_event("/btn refresh"),
            OperatorEvent::Button(ButtonPress::RefreshOutcome)
        );
        assert_eq!(
            parse_event("https://example.com"),
            OperatorEvent::Text("https://example.com".to_string())
        );
        match parse_event("/file /tmp/sample.bin") {
            OperatorEvent::File(file) => {
                assert_eq!(file.file_name, "sample.bin");
                assert_eq!(file.local_path, PathBuf::from("/tmp/sample.bin"));
            }
            other => panic!("expected a file event, got {other:?}"),
        }
        // An unknown button name is treated as plain text.
        assert_eq!(
            parse_event("/btn warp"),
            OperatorEvent::Text("/btn warp".to_string())
        );
    }
}
