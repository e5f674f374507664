//! Plain-text rendering of [`AppState`].

use crudblog::{AppState, Post};

const SHORT_ID_LEN: usize = 8;
const RULE: &str = "────────────────────────────────────────";

/// First characters of an id, enough to type back at the shell
pub fn short_id(post: &Post) -> &str {
    let id = post.id.as_str();
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn timestamp(post: &Post) -> String {
    post.created_at.format("%Y-%m-%d %H:%M").to_string()
}

pub fn header(state: &AppState) -> String {
    match state.session().identity() {
        Some(identity) if state.session().is_authenticated() => format!("Welcome, {}", identity),
        _ => "Please login to create or update blog posts".to_string(),
    }
}

/// One list entry: id, title, metadata and content preview
pub fn post_card(state: &AppState, post: &Post) -> String {
    let mut meta = format!("Created: {}", timestamp(post));
    if let Some(owner) = &post.owner {
        meta.push_str(&format!("  Owner: {}", owner));
    }
    if state.can_modify(post) {
        meta.push_str("  [edit] [delete]");
    }

    format!("[{}] {}\n    {}\n    {}", short_id(post), post.title, meta, post.preview())
}

pub fn post_list(state: &AppState) -> String {
    if state.posts().is_empty() {
        return "No posts yet.".to_string();
    }
    state
        .posts()
        .iter()
        .map(|post| post_card(state, post))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full post with untruncated content
pub fn post_view(post: &Post) -> String {
    let mut lines = vec![
        RULE.to_string(),
        post.title.clone(),
        format!("Created: {}", timestamp(post)),
    ];
    if let Some(updated_at) = post.updated_at.filter(|updated| *updated != post.created_at) {
        lines.push(format!("Updated: {}", updated_at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(owner) = &post.owner {
        lines.push(format!("Owner: {}", owner));
    }
    lines.push(format!("Id: {}", post.id));
    lines.push(String::new());
    lines.push(post.content.clone());
    lines.push(RULE.to_string());
    lines.join("\n")
}

/// The edit form; only shown to signed-in users
pub fn edit_buffer(state: &AppState) -> Option<String> {
    if !state.session().is_authenticated() {
        return None;
    }
    let buffer = state.buffer();
    let heading = match buffer.target() {
        Some(id) => format!("Update Blog Post ({})", id),
        None => "Create Blog Post".to_string(),
    };
    Some(format!(
        "{}\n  Title:   {}\n  Content: {}",
        heading, buffer.title, buffer.content
    ))
}

pub fn error_line(state: &AppState) -> Option<String> {
    state.last_error().map(|e| format!("Error: {}", e))
}

/// Everything the shell shows after a command
pub fn screen(state: &AppState) -> String {
    let mut sections = vec![header(state), post_list(state)];
    if let Some(post) = state.viewed() {
        sections.push(post_view(post));
    }
    sections.extend(edit_buffer(state));
    sections.extend(error_line(state));
    sections.join("\n\n")
}
