//! HTML pages and message rendering

use bytes::Bytes;

use crate::log::Entry;

/// Form field carrying a chat message
pub const MESSAGE_FIELD: &str = "msg";

/// Form field carrying a nickname
pub const NICK_FIELD: &str = "nick";

/// Start of the chat page; entries are appended as list items after it and
/// the list is never closed.
pub const CHAT_PAGE_PREAMBLE: &str = r#"<!DOCTYPE html>
  <html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta http-equiv="X-UA-Compatible" content="IE=edge">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>DarkChat</title>
    <style>
      body { margin: 0; padding: 0; }
      .container {
        width: 80vw; max-height: 90vh; margin: auto; padding-top: 2%; padding-bottom: 2%;
        display: flex; flex-direction: column;
      }
      .message-form { display: flex; }
      .message-input { flex-grow: 1; }
      .submit { margin: 1em; }
      ul.messages {
        list-style: none;
        display: flex;
        flex-direction: column-reverse;
        padding: 0;
        overflow-y: scroll;
      }
      li.message { width: 100% }
      li.message:nth-child(even) { background-color: lightgray; }
      li.message:nth-child(odd) { background-color: rgb(228, 228, 228); }
      .sender { font-weight: bold; }
    </style>
  </head>
  <body>
    <div class="container">
      <form action="/" method="POST" class="message-form">
        <input name="msg" class="message-input" />
        <input type="submit" value="Send" />
      </form>
      <ul class="messages">
"#;

/// Nickname registration form
pub const REGISTER_PAGE: &str = r#"<!DOCTYPE html>
  <html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta http-equiv="X-UA-Compatible" content="IE=edge">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>DarkChat</title>
    <style>
      .content {
        position: absolute;
        left: 50%;
        top: 50%;
        transform: translate(-50%, -50%);
        display: flex;
        align-items: center;
        justify-content: center;
        flex-direction: column;
      }
      .submit {
        margin: 1em;
      }
    </style>
  </head>
  <body>
      <form action="/register" method="POST" class="content">
        <h1>Enter Nickname</h1>
        <input name="nick" />
        <br />
        <input class="submit" type="submit" value="Start chatting" />
      </form>
  </body>
  </html>
"#;

/// Render one entry as an escaped list item
pub fn message_item(entry: &Entry) -> Bytes {
    let sender = htmlescape::encode_minimal(&entry.sender);
    let text = htmlescape::encode_minimal(&entry.text);

    Bytes::from(format!(
        r#"<li class="message"><span class="sender">{}:</span> {}</li>"#,
        sender, text
    ))
}
