//! Server-rendered pages
//!
//! Every interpolated value goes through [`escape_html`].

use std::fmt::Write as _;

use crate::qbusiness::Conversation;
use crate::session::UserRecord;

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&UserRecord>, body: &str) -> String {
    let nav = match user {
        Some(user) => format!(
            r#"<span>{}</span> | <a href="/chat">Chat</a> | <a href="/conversations">Conversations</a> | <a href="/profile">Profile</a> | <a href="/logout">Sign out</a>"#,
            escape_html(&user.display_name)
        ),
        None => r#"<a href="/login">Sign in</a>"#.to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> | {nav}</nav>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

pub fn home(user: Option<&UserRecord>) -> String {
    let body = match user {
        Some(user) => format!(
            "<h1>Welcome, {}</h1>\n<p>You are signed in to Amazon Q Business.</p>",
            escape_html(&user.display_name)
        ),
        None => "<h1>Amazon Q Business</h1>\n<p>Sign in to chat with your enterprise content.</p>"
            .to_string(),
    };
    layout("Home", user, &body)
}

pub fn profile(user: &UserRecord) -> String {
    let expires = user
        .credential
        .expiration
        .map_or_else(|| "unknown".to_string(), |e| e.to_rfc3339());
    let body = format!(
        "<h1>Profile</h1>\n<dl>\n<dt>Name</dt><dd>{}</dd>\n<dt>Email</dt><dd>{}</dd>\n<dt>Subject</dt><dd>{}</dd>\n<dt>Credential expires</dt><dd>{}</dd>\n</dl>",
        escape_html(&user.display_name),
        escape_html(&user.email),
        escape_html(&user.subject),
        escape_html(&expires),
    );
    layout("Profile", Some(user), &body)
}

pub fn conversations(user: &UserRecord, conversations: &[Conversation]) -> String {
    let mut body = String::from("<h1>Conversations</h1>\n");
    if conversations.is_empty() {
        body.push_str("<p>No conversations yet.</p>");
    } else {
        body.push_str("<table>\n<tr><th>Title</th><th>Started</th><th>Id</th></tr>\n");
        for conversation in conversations {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&conversation.title),
                escape_html(&conversation.start_time.to_rfc3339()),
                escape_html(&conversation.conversation_id),
            );
        }
        body.push_str("</table>");
    }
    layout("Conversations", Some(user), &body)
}

const CHAT_SCRIPT: &str = r#"<script>
let conversationId = null;
let prevSysMessageId = null;
async function ask(event) {
  event.preventDefault();
  const input = document.getElementById("question");
  const log = document.getElementById("log");
  const question = input.value;
  input.value = "";
  const res = await fetch("/answer", {
    method: "POST",
    headers: {"Content-Type": "application/json"},
    body: JSON.stringify({question, conversationId, prevSysMessageId}),
  });
  const entry = document.createElement("p");
  if (res.ok) {
    const reply = await res.json();
    conversationId = reply.conversationId;
    prevSysMessageId = reply.systemMessageId;
    entry.textContent = reply.systemMessage;
  } else {
    entry.textContent = "Error: " + (await res.text());
  }
  log.appendChild(entry);
}
async function forget() {
  if (!conversationId) return;
  await fetch("/delete_chat", {
    method: "POST",
    headers: {"Content-Type": "application/json"},
    body: JSON.stringify({conversationId}),
  });
  conversationId = null;
  prevSysMessageId = null;
  document.getElementById("log").replaceChildren();
}
</script>"#;

pub fn chat(user: &UserRecord) -> String {
    let body = format!(
        r#"<h1>Chat</h1>
<div id="log"></div>
<form onsubmit="ask(event)">
<input id="question" name="question" size="80" autocomplete="off">
<button type="submit">Ask</button>
<button type="button" onclick="forget()">Delete conversation</button>
</form>
{CHAT_SCRIPT}"#
    );
    layout("Chat", Some(user), &body)
}
