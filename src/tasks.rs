use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::config::Config;

pub type Mailer = AsyncSmtpTransport<Tokio1Executor>;

pub fn build_mailer(config: &Config) -> Mailer {
    AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .expect("invalid SMTP host")
        .credentials(Credentials::new(
            config.email_user.clone(),
            config.email_pass.clone(),
        ))
        .build()
}

/// Fire-and-forget follow-up notification.  Runs on a spawned task; delivery
/// failure is logged and never affects the request that triggered it.
pub fn send_email(mailer: Mailer, from: String, to: String, subject: &str, body: &str) {
    let subject = subject.to_string();
    let body = body.to_string();
    tokio::spawn(async move {
        let from: Mailbox = match from.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(error=%e, "invalid sender address");
                return;
            }
        };
        let to: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(error=%e, "invalid recipient address");
                return;
            }
        };
        let message = match Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body)
        {
            Ok(message) => message,
            Err(e) => {
                error!(error=%e, "failed to build email");
                return;
            }
        };

        match mailer.send(message).await {
            Ok(_) => info!("follow-up email sent"),
            Err(e) => error!(error=%e, "failed to send follow-up email"),
        }
    });
}
