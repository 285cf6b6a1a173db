use chrono::Local;
use chrono::TimeZone;

use super::Author;
use super::Message;

#[test]
fn it_executes_new() {
    let msg = Message::new(Author::User, "Hi there!");
    assert_eq!(msg.author, Author::User);
    assert_eq!(msg.author.to_string(), "user");
    assert_eq!(msg.text, "Hi there!".to_string());
    assert!(!msg.has_image);
    assert!(!msg.timestamp.is_empty());
}

#[test]
fn it_executes_new_with_image() {
    let msg = Message::new_with_image(Author::User, "What is this? https://a.com/b.png");
    assert!(msg.has_image);
}

#[test]
fn it_formats_timestamp_as_rfc3339() {
    let at = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let msg = Message::new_at(Author::Assistant, "Done", false, at);
    assert!(msg.timestamp.starts_with("2024-03-01T12:30:00"));
}

#[test]
fn it_formats_context_line() {
    let msg = Message::new(Author::Assistant, "Rwp is 8.1");
    assert_eq!(msg.as_context_line(), "assistant: Rwp is 8.1");
}

#[test]
fn it_formats_context_line_with_image() {
    let msg = Message::new_with_image(Author::User, "Look at this fit");
    assert_eq!(
        msg.as_context_line(),
        "user: Look at this fit [included an image]"
    );
}

#[test]
fn it_formats_display_line() {
    let user = Message::new_with_image(Author::User, "fit.png");
    let model = Message::new(Author::Assistant, "Looks good");
    assert_eq!(user.as_display_line(), "💬 user: fit.png 🖼️");
    assert_eq!(model.as_display_line(), "🤖 assistant: Looks good");
}
