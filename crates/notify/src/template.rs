fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

pub fn announcement_subject(serie_title: &str, title: &str) -> String {
    format!("[{serie_title}] New announcement: {title}")
}

/// HTML body of a series announcement. All inputs are escaped.
pub fn render_announcement_html(serie_title: &str, title: &str, message: &str) -> String {
    format!(
        r#"<html>
<body>
    <h2>Announcement from {serie}</h2>
    <p><strong>{title}</strong></p>
    <p style="white-space: pre-line;">{message}</p>
    <hr/>
    <p>Thank you for learning with EduConnect.</p>
</body>
</html>
"#,
        serie = escape(serie_title),
        title = escape(title),
        message = escape(message),
    )
}

pub fn new_lesson_subject(serie_title: &str) -> String {
    format!("New lesson in \"{serie_title}\"")
}

pub fn new_lesson_message(serie_title: &str, lesson_title: &str) -> String {
    format!(
        "New lesson \"{lesson_title}\" has been added to series \"{serie_title}\". Open it now to start learning!"
    )
}
