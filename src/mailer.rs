//! Outbound mail, behind a trait so handlers never touch SMTP directly.

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_temp_password(
        &self,
        to: &str,
        username: &str,
        temp_password: &str,
    ) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .context("smtp relay configuration")?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_temp_password(
        &self,
        to: &str,
        username: &str,
        temp_password: &str,
    ) -> anyhow::Result<()> {
        let body = format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2>Password reset</h2>\
             <p>Hello {username},</p>\
             <p>Your temporary password is: <strong>{temp_password}</strong></p>\
             <p>Please sign in and change it right away.</p>\
             <p style=\"color: #666; font-size: 12px;\">\
             This mail was sent automatically. If you did not request it, you can ignore it.\
             </p></div>"
        );

        let message = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(to.parse().context("parse to address")?)
            .subject("[storemap] Password reset")
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("build mail")?;

        self.transport.send(message).await.context("send mail")?;
        Ok(())
    }
}
