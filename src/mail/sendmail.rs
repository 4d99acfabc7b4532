use lettre::{
    Message, SmtpTransport, Transport,
    message::{SinglePart, header},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;

use crate::config::Config;

/// SMTP mailer, built once at startup from config and shared through
/// `AppState` rather than re-reading the environment per send.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<SmtpTransport>,
    from: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        // STARTTLS: starts unencrypted, upgrades to TLS
        let transport = SmtpTransport::starttls_relay(&config.smtp_server)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Mailer {
            transport: Arc::new(transport),
            from: config.smtp_username.clone(),
        })
    }

    /// Render an HTML template by replacing {{placeholder}} pairs and send.
    pub fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        placeholders: &[(String, String)],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut html = template.to_string();
        for (key, value) in placeholders {
            html = html.replace(key, value);
        }

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html),
            )?;

        self.transport.send(&email)?;

        Ok(())
    }
}
