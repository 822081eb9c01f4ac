use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;
use tracing::{info, instrument};

use crate::config::MailSettings;
use crate::error::Result;

/// A composed restore notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

impl Notification {
    /// `snapshot_time` is the creation time as the host listed it, before any correction.
    pub fn restore_completed(
        recipient: &str,
        system: &str,
        snapshot_time: &str,
        destination: &Path,
    ) -> Self {
        let link = escape_html(&file_url(destination));
        let text = escape_html(&destination.display().to_string());
        Self {
            recipient: recipient.to_string(),
            subject: format!("Restored data from {} (snapshot {})", system, snapshot_time),
            html_body: format!(
                "<p>The data you requested from <b>{}</b> has been restored from the snapshot of {}.</p>\
                 <p>You can find it here: <a href=\"{}\">{}</a></p>",
                escape_html(system),
                escape_html(snapshot_time),
                link,
                text
            ),
        }
    }
}

/// Characters escaped inside one segment of a `file:` URL path.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Builds a `file:` URL for `path`.
///
/// `\\host\share\dir` becomes `file://host/share/dir` and `C:\dir` becomes
/// `file:///C:/dir`. Other paths are made absolute against the working
/// directory first.
pub fn file_url(path: &Path) -> String {
    let text = path.display().to_string();
    if let Some(url) = windows_file_url(&text) {
        return url;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let absolute = absolute.display().to_string();
    windows_file_url(&absolute).unwrap_or_else(|| {
        let parts = absolute.split('/').filter(|p| !p.is_empty());
        format!("file://{}", encode_segments(parts))
    })
}

fn windows_file_url(text: &str) -> Option<String> {
    if let Some(unc) = text.strip_prefix(r"\\") {
        let mut parts = unc.split(['\\', '/']).filter(|p| !p.is_empty());
        let host = parts.next().unwrap_or_default();
        return Some(format!("file://{}{}", host, encode_segments(parts)));
    }
    if is_drive_path(text) {
        let (drive, rest) = text.split_at(2);
        let parts = rest.split(['\\', '/']).filter(|p| !p.is_empty());
        return Some(format!("file:///{}{}", drive, encode_segments(parts)));
    }
    None
}

fn is_drive_path(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn encode_segments<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut url = String::new();
    for part in parts {
        url.push('/');
        url.extend(utf8_percent_encode(part, SEGMENT));
    }
    if url.is_empty() {
        url.push('/');
    }
    url
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub trait Mailer {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Sends through an SMTP relay.
pub struct SmtpMailer {
    sender: Mailbox,
    transport: SmtpTransport,
    relay: String,
}

impl SmtpMailer {
    /// Validates the settings up front so a missing relay or sender fails before any copying.
    pub fn from_settings(settings: &MailSettings) -> Result<Self> {
        settings.validate()?;
        let sender: Mailbox = settings.sender.parse()?;

        let mut builder = SmtpTransport::builder_dangerous(settings.relay.as_str()).port(settings.port);
        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            sender,
            transport: builder.build(),
            relay: settings.relay.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(relay = %self.relay, recipient = %notification.recipient))]
    fn send(&self, notification: &Notification) -> Result<()> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(notification.recipient.parse()?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(notification.html_body.clone())?;
        self.transport.send(&message)?;
        info!("Notification sent.");
        Ok(())
    }
}
